//! Compact HS256 bearer tokens.
//!
//! A token is `base64url(header) "." base64url(payload) "." base64url(signature)`, where the
//! header is always `{"alg":"HS256","typ":"JWT"}`, the payload is the JSON [`Claims`] map and
//! the signature is HMAC-SHA256 over the first two segments exactly as they appear in the token.
//! Nothing is stored server side: a token is valid for as long as its signature checks out and
//! its `exp` claim (if any) has not passed.

use std::{
    fmt,
    num::NonZeroU64,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use base64::{
    alphabet,
    engine::{
        general_purpose::{GeneralPurpose, GeneralPurposeConfig},
        DecodePaddingMode,
    },
    Engine,
};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::{
    claims::{Claims, EXPIRES_AT, ISSUED_AT},
    error::TokenError,
};

type HmacSha256 = Hmac<Sha256>;

/// URL-safe alphabet, unpadded on encode. Padding is tolerated on decode, non-canonical
/// trailing bits are not.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// The signature segment admits exactly one spelling per tag: no padding at all.
const SIGNATURE_BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

const SEPARATOR: char = '.';

#[derive(Serialize)]
struct Header {
    alg: &'static str,
    typ: &'static str,
}

const HEADER: Header = Header {
    alg: "HS256",
    typ: "JWT",
};

/// Source of the current Unix time, in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// A clock frozen at the given Unix time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// How long an issued token stays valid.
///
/// There is no zero-length lifetime: a token that never expires has to ask for
/// [`Expiry::Never`] explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    After(NonZeroU64),
    Never,
}

impl Expiry {
    pub fn from_secs(secs: u64) -> Option<Self> {
        NonZeroU64::new(secs).map(Expiry::After)
    }

    /// Sub-second precision is dropped.
    pub fn after(lifetime: Duration) -> Option<Self> {
        Self::from_secs(lifetime.as_secs())
    }
}

/// Issues and verifies tokens signed with one shared secret.
///
/// The HMAC key is set up once in the constructor; both operations afterwards only read
/// from the codec, so a single instance can be shared freely between requests.
#[derive(Clone)]
pub struct TokenCodec<C = SystemClock> {
    mac: HmacSha256,
    clock: C,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Result<Self, TokenError> {
        Self::with_clock(secret, SystemClock)
    }
}

impl<C: Clock> TokenCodec<C> {
    pub fn with_clock(secret: &str, clock: C) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }

        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| TokenError::EmptySecret)?;

        Ok(Self { mac, clock })
    }

    /// Sign `claims` into a token.
    ///
    /// `iat` is set to the current time unless the caller supplied one, and with
    /// [`Expiry::After`] `exp` is set to now plus the lifetime unless the caller supplied one.
    pub fn issue(&self, claims: &Claims, expiry: Expiry) -> Result<String, TokenError> {
        let now = self.clock.now();

        let mut payload = claims.clone();
        if !payload.contains_key(ISSUED_AT) {
            payload.insert(ISSUED_AT, now);
        }
        if let Expiry::After(lifetime) = expiry {
            if !payload.contains_key(EXPIRES_AT) {
                let lifetime = i64::try_from(lifetime.get()).unwrap_or(i64::MAX);
                payload.insert(EXPIRES_AT, now.saturating_add(lifetime));
            }
        }

        let header = BASE64URL.encode(serde_json::to_vec(&HEADER)?);
        let payload = BASE64URL.encode(serde_json::to_vec(&payload)?);
        let signature =
            SIGNATURE_BASE64URL.encode(self.sign(&header, &payload).finalize().into_bytes());

        Ok(format!("{header}{SEPARATOR}{payload}{SEPARATOR}{signature}"))
    }

    /// Check a token's structure, signature and expiry, in that order, and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let (header, payload, signature) = split_token(token)?;

        let signature = SIGNATURE_BASE64URL
            .decode(signature)
            .map_err(|_| TokenError::BadSignature)?;
        self.sign(header, payload)
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims = decode_claims(payload)?;

        if let Some(exp) = claims.get(EXPIRES_AT) {
            let exp = exp.as_timestamp().ok_or(TokenError::BadPayload)?;
            // still valid at the exact second of expiry
            if self.clock.now() > exp {
                return Err(TokenError::Expired);
            }
        }

        Ok(claims)
    }

    fn sign(&self, header: &str, payload: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(header.as_bytes());
        mac.update(&[SEPARATOR as u8]);
        mac.update(payload.as_bytes());
        mac
    }
}

impl<C> fmt::Debug for TokenCodec<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

/// Issue a token with the system clock.
pub fn issue(claims: &Claims, secret: &str, expiry: Expiry) -> Result<String, TokenError> {
    TokenCodec::new(secret)?.issue(claims, expiry)
}

/// Verify a token with the system clock.
pub fn verify(token: &str, secret: &str) -> Result<Claims, TokenError> {
    TokenCodec::new(secret)?.verify(token)
}

/// Read a token's claims WITHOUT checking its signature or expiry.
///
/// Only for diagnostics; never authorize anything based on the result.
pub fn decode_unverified(token: &str) -> Result<Claims, TokenError> {
    let (_, payload, _) = split_token(token)?;
    decode_claims(payload)
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.split(SEPARATOR);

    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed);
    };

    if header.is_empty() || payload.is_empty() || signature.is_empty() {
        return Err(TokenError::Malformed);
    }

    Ok((header, payload, signature))
}

fn decode_claims(payload: &str) -> Result<Claims, TokenError> {
    let bytes = BASE64URL
        .decode(payload)
        .map_err(|_| TokenError::BadPayload)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::BadPayload)
}

use std::{env, error::Error, num::NonZeroU64, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    claims::{self, Claims},
    codec::{Expiry, TokenCodec},
    error::{AuthError, ConfigError},
    types::{Email, HashedPassword, Principal, UserID, UserRecord},
};

const DEFAULT_TOKEN_LIFETIME: Expiry = match NonZeroU64::new(60 * 60) {
    Some(secs) => Expiry::After(secs),
    None => Expiry::Never,
};

#[async_trait]
pub trait UserDatabase: Send + Sync + 'static {
    /// Store the given user, and return its user id. If a user with the same email already
    /// exists, return the user id of that user instead and store nothing.
    async fn create_user_if_not_exists(
        &mut self,
        user: &UserRecord,
    ) -> Result<UserID, Box<dyn Error + Send + Sync>>;

    /// Retrieve the user registered under the given (normalized) email, if any.
    async fn retrieve_user(
        &self,
        email: &Email,
    ) -> Result<Option<UserRecord>, Box<dyn Error + Send + Sync>>;
}

#[derive(Clone)]
pub struct AuthConfig {
    /// The secret used to sign auth tokens.
    /// If the secret changes, all currently authenticated sessions will be terminated.
    pub auth_token_secret: String,
    /// How long auth tokens should remain valid for. After this interval, the client will have to re-login.
    pub auth_token_lifetime: Expiry,
    /// Users with one of these emails are issued admin tokens, whatever their stored record says.
    pub admin_emails: Vec<String>,
    pub database_connection: Arc<Mutex<dyn UserDatabase>>,
}

impl AuthConfig {
    /// Load the token settings from the environment (and a `.env` file, if present):
    ///
    /// - `SECRET_KEY`: required, non-empty
    /// - `AUTH_TOKEN_TTL`: lifetime in seconds, or `never`; defaults to one hour
    /// - `ADMIN_EMAILS`: comma separated; defaults to none
    pub fn from_env(database_connection: Arc<Mutex<dyn UserDatabase>>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let auth_token_secret =
            env::var("SECRET_KEY").map_err(|_| ConfigError::MissingVar("SECRET_KEY"))?;
        if auth_token_secret.is_empty() {
            return Err(ConfigError::InvalidVar {
                name: "SECRET_KEY",
                value: auth_token_secret,
            });
        }

        let auth_token_lifetime = match env::var("AUTH_TOKEN_TTL") {
            Ok(value) => parse_lifetime(&value).ok_or(ConfigError::InvalidVar {
                name: "AUTH_TOKEN_TTL",
                value,
            })?,
            Err(_) => DEFAULT_TOKEN_LIFETIME,
        };

        let admin_emails = env::var("ADMIN_EMAILS")
            .map(|value| parse_admin_emails(&value))
            .unwrap_or_default();

        tracing::debug!(
            lifetime = ?auth_token_lifetime,
            admins = admin_emails.len(),
            "loaded auth config"
        );

        Ok(Self {
            auth_token_secret,
            auth_token_lifetime,
            admin_emails,
            database_connection,
        })
    }
}

fn parse_lifetime(value: &str) -> Option<Expiry> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("never") {
        return Some(Expiry::Never);
    }
    Expiry::from_secs(value.parse().ok()?)
}

fn parse_admin_emails(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|email| Email::normalized(email).0)
        .filter(|email| !email.is_empty())
        .collect()
}

pub(crate) struct AuthInternal {
    codec: TokenCodec,
    token_lifetime: Expiry,
    admin_emails: Vec<String>,
    database_connection: Arc<Mutex<dyn UserDatabase>>,
}

impl AuthInternal {
    /// Hash with a fresh random salt; the salt travels inside the encoded hash.
    /// argon2 is CPU bound, so it runs on the blocking pool.
    pub async fn hash(&self, password: &str) -> Result<HashedPassword, AuthError> {
        let password = password.to_owned();

        let encoded = tokio::task::spawn_blocking(move || {
            let salt = Uuid::new_v4();
            argon2::hash_encoded(
                password.as_bytes(),
                salt.as_bytes(),
                &argon2::Config::default(),
            )
        })
        .await??;

        Ok(HashedPassword(encoded))
    }

    pub async fn verify_hash(
        &self,
        password: &str,
        hash: &HashedPassword,
    ) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let encoded = hash.0.clone();

        let matches = tokio::task::spawn_blocking(move || {
            argon2::verify_encoded(&encoded, password.as_bytes())
        })
        .await??;

        Ok(matches)
    }

    pub fn is_admin(&self, user: &UserRecord) -> bool {
        user.is_admin || self.admin_emails.iter().any(|email| *email == user.email.0)
    }

    pub fn generate_token(&self, user: &UserRecord) -> Result<String, AuthError> {
        let claims = Claims::new()
            .with(claims::SUBJECT, user.user_id.0.as_str())
            .with(claims::EMAIL, user.email.0.as_str())
            .with(claims::NAME, user.name.0.as_str())
            .with(claims::IS_ADMIN, self.is_admin(user));

        let token = self.codec.issue(&claims, self.token_lifetime)?;

        tracing::info!(user_id = %user.user_id.0, "issued auth token");

        Ok(token)
    }

    /// Verify a raw token. The reason for a rejection is logged here and nowhere else.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.codec.verify(token).map_err(|err| {
            tracing::debug!(%err, "rejected auth token");
            AuthError::from(err)
        })
    }

    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.verify_token(token)?;

        Principal::from_claims(&claims).ok_or_else(|| {
            tracing::debug!("rejected auth token without subject");
            AuthError::MissingSubject
        })
    }

    pub async fn create_user_if_not_exists(&self, user: &UserRecord) -> Result<UserID, AuthError> {
        let user_id = self
            .database_connection
            .lock()
            .await
            .create_user_if_not_exists(user)
            .await?;

        Ok(user_id)
    }

    pub async fn retrieve_user(&self, email: &Email) -> Result<Option<UserRecord>, AuthError> {
        let user = self
            .database_connection
            .lock()
            .await
            .retrieve_user(email)
            .await?;

        Ok(user)
    }
}

/// Shared handle to the auth service. Cloning is cheap.
#[derive(Clone)]
pub struct Auth {
    pub(crate) internal: Arc<AuthInternal>,
}

impl Auth {
    pub fn new(config: AuthConfig) -> Result<Self, ConfigError> {
        let codec = TokenCodec::new(&config.auth_token_secret)?;

        Ok(Self {
            internal: Arc::new(AuthInternal {
                codec,
                token_lifetime: config.auth_token_lifetime,
                admin_emails: config
                    .admin_emails
                    .iter()
                    .map(|email| Email::normalized(email).0)
                    .collect(),
                database_connection: config.database_connection,
            }),
        })
    }

    /// Verify a bearer token outside of a warp filter chain.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.internal.verify_token(token)
    }
}

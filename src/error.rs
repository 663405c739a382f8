use warp::reject::Reject;

/// Why a token could not be issued or verified.
///
/// Verification failures are informational only: anything past the HTTP layer
/// sees them as "unauthenticated", whatever the variant.
#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    BadSignature,
    #[error("invalid payload")]
    BadPayload,
    #[error("token expired")]
    Expired,
    #[error("claims could not be encoded")]
    Encoding {
        #[from]
        source: serde_json::Error,
    },
    #[error("token secret must not be empty")]
    EmptySecret,
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("an account with that email already exists")]
    EmailAlreadyRegistered,
    #[error("email or password incorrect")]
    LoginFailed,
    #[error("{0}")]
    InvalidInput(String),
    #[error("no bearer credential supplied")]
    MissingCredential,
    #[error("token carries no subject")]
    MissingSubject,
    #[error("administrator privileges required")]
    NotAdmin,
    #[error("error during database operation")]
    DatabaseError {
        #[from]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("error hashing password")]
    PasswordHash {
        #[from]
        source: argon2::Error,
    },
    #[error("password hashing task failed")]
    HashTask {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("error with token")]
    TokenError {
        #[from]
        source: TokenError,
    },
}

impl Reject for AuthError {}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value {value:?} for {name}")]
    InvalidVar { name: &'static str, value: String },
    #[error("invalid token settings")]
    Token {
        #[from]
        source: TokenError,
    },
}

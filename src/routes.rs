use std::{convert::Infallible, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use warp::{
    http::header::{HeaderMap, HeaderValue, AUTHORIZATION},
    hyper::StatusCode,
    path, Filter, Rejection, Reply,
};

use crate::{
    auth::{Auth, AuthInternal},
    bearer::bearer_token,
    claims::Claims,
    error::AuthError,
    types::{DisplayName, Email, Principal, UserID, UserRecord},
};

const MIN_NAME_LENGTH: usize = 2;

pub fn build_api_route_filter(
    auth: &Auth,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = path!("users" / "register")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_register);

    let login = path!("users" / "login")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_login);

    let me = path!("users" / "me")
        .and(warp::get())
        .and(authorization_header())
        .and(with_auth_state(auth.internal.clone()))
        .map(user_me);

    register.or(login).or(me)
}

/// Require a valid bearer token and extract the caller.
pub fn with_auth(auth: &Auth) -> impl Filter<Extract = (Principal,), Error = Rejection> + Clone {
    authorization_header()
        .and(with_auth_state(auth.internal.clone()))
        .and_then(user_auth_check)
}

/// Require a valid bearer token and extract every claim it carries.
pub fn with_claims(auth: &Auth) -> impl Filter<Extract = (Claims,), Error = Rejection> + Clone {
    authorization_header()
        .and(with_auth_state(auth.internal.clone()))
        .and_then(claims_check)
}

/// Like [`with_auth`], but the token must also grant admin rights.
pub fn with_admin(auth: &Auth) -> impl Filter<Extract = (Principal,), Error = Rejection> + Clone {
    with_auth(auth).and_then(admin_check)
}

pub async fn handle_auth_errors(err: Rejection) -> Result<impl Reply, Rejection> {
    if let Some(auth_error) = err.find::<AuthError>() {
        let (status, message) = match &auth_error {
            AuthError::EmailAlreadyRegistered => (
                StatusCode::CONFLICT,
                "an account with that email already exists".to_string(),
            ),
            AuthError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AuthError::LoginFailed => (
                StatusCode::UNAUTHORIZED,
                "email or password incorrect".to_string(),
            ),
            // one answer for every credential problem, whatever the token's defect
            AuthError::MissingCredential
            | AuthError::MissingSubject
            | AuthError::TokenError { .. } => {
                (StatusCode::UNAUTHORIZED, "access denied".to_string())
            }
            AuthError::NotAdmin => (StatusCode::FORBIDDEN, "not authorized".to_string()),
            AuthError::DatabaseError { .. }
            | AuthError::PasswordHash { .. }
            | AuthError::HashTask { .. } => {
                tracing::warn!(err = %auth_error, "auth request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "an unknown error has occurred".to_string(),
                )
            }
        };
        return Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "error": message })),
            status,
        ));
    }

    Err(err)
}

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {}

async fn user_register(
    input: RegisterQuery,
    auth: Arc<AuthInternal>,
) -> Result<impl Reply, Rejection> {
    let name = input.name.trim();
    let email = Email::normalized(&input.email);

    if name.is_empty() || email.0.is_empty() || input.password.is_empty() {
        Err(AuthError::InvalidInput(
            "name, email and password are required".into(),
        ))?;
    }
    if name.chars().count() < MIN_NAME_LENGTH {
        Err(AuthError::InvalidInput(format!(
            "name must be at least {MIN_NAME_LENGTH} characters"
        )))?;
    }

    let new_user = UserRecord {
        user_id: UserID(Uuid::new_v4().to_string()),
        email,
        name: DisplayName(name.to_owned()),
        hashed_password: auth.hash(&input.password).await?,
        is_admin: false,
    };

    let user_id = auth.create_user_if_not_exists(&new_user).await?;

    if user_id != new_user.user_id {
        Err(AuthError::EmailAlreadyRegistered)?;
    }

    tracing::info!(user_id = %user_id.0, "registered user");

    Ok(warp::reply::json(&RegisterResponse {}))
}

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: Principal,
}

async fn user_login(input: LoginQuery, auth: Arc<AuthInternal>) -> Result<impl Reply, Rejection> {
    let email = Email::normalized(&input.email);

    if email.0.is_empty() || input.password.is_empty() {
        Err(AuthError::InvalidInput(
            "email and password are required".into(),
        ))?;
    }

    let user = auth
        .retrieve_user(&email)
        .await?
        .ok_or(AuthError::LoginFailed)?;

    if !auth
        .verify_hash(&input.password, &user.hashed_password)
        .await?
    {
        Err(AuthError::LoginFailed)?;
    }

    let token = auth.generate_token(&user)?;
    let user = Principal {
        is_admin: auth.is_admin(&user),
        id: user.user_id,
        email: Some(user.email.0),
        name: Some(user.name.0),
    };

    Ok(warp::reply::json(&LoginResponse { token, user }))
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Principal>,
}

// Never rejects: a missing or bad credential just means "not signed in"
fn user_me(header: Option<HeaderValue>, auth: Arc<AuthInternal>) -> impl Reply {
    let user = credential(&header).and_then(|token| auth.authenticate(token).ok());

    warp::reply::json(&MeResponse {
        authenticated: user.is_some(),
        user,
    })
}

// The raw header, without warp's visible-ASCII check: a value that is not valid
// text is just another missing credential, never a 400
fn authorization_header(
) -> impl Filter<Extract = (Option<HeaderValue>,), Error = Infallible> + Clone {
    warp::header::headers_cloned().map(|headers: HeaderMap| headers.get(AUTHORIZATION).cloned())
}

fn credential(header: &Option<HeaderValue>) -> Option<&str> {
    header
        .as_ref()
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
}

fn unwrap_bearer(header: &Option<HeaderValue>) -> Result<&str, AuthError> {
    credential(header).ok_or(AuthError::MissingCredential)
}

// Unwrap the bearer token and validate it
async fn user_auth_check(
    header: Option<HeaderValue>,
    auth: Arc<AuthInternal>,
) -> Result<Principal, Rejection> {
    let token = unwrap_bearer(&header)?;

    Ok(auth.authenticate(token)?)
}

async fn claims_check(
    header: Option<HeaderValue>,
    auth: Arc<AuthInternal>,
) -> Result<Claims, Rejection> {
    let token = unwrap_bearer(&header)?;

    Ok(auth.verify_token(token)?)
}

async fn admin_check(principal: Principal) -> Result<Principal, Rejection> {
    if !principal.is_admin {
        tracing::debug!(user_id = %principal.id.0, "refused non-admin");
        Err(AuthError::NotAdmin)?;
    }

    Ok(principal)
}

// functor that adds a reference to the internal auth state into the filter chain
fn with_auth_state(
    auth: Arc<AuthInternal>,
) -> impl Filter<Extract = (Arc<AuthInternal>,), Error = Infallible> + Clone {
    warp::any().map(move || auth.clone())
}

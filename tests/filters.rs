mod common;

use serde_json::{json, Value};
use token_for_warp::{
    build_api_route_filter, claims, handle_auth_errors, with_admin, with_auth, with_claims,
    AuthError, Claims, Expiry, TokenCodec,
};
use warp::{
    http::{HeaderValue, StatusCode},
    Filter,
};

use common::{test_auth, SECRET};

fn sign(claims: &Claims, expiry: Expiry) -> String {
    TokenCodec::new(SECRET).unwrap().issue(claims, expiry).unwrap()
}

fn customer() -> Claims {
    Claims::new()
        .with(claims::SUBJECT, "u1")
        .with(claims::EMAIL, "ana@example.com")
        .with(claims::NAME, "Ana")
        .with(claims::IS_ADMIN, false)
}

fn auth_error(rejection: &warp::Rejection) -> &AuthError {
    rejection.find::<AuthError>().unwrap()
}

#[tokio::test]
async fn with_auth_extracts_the_principal() {
    let auth = test_auth();
    let token = sign(&customer(), Expiry::from_secs(60).unwrap());

    let principal = warp::test::request()
        .header("authorization", format!("bEaReR {token}"))
        .filter(&with_auth(&auth))
        .await
        .unwrap();

    assert_eq!(principal.id.0, "u1");
    assert_eq!(principal.email.as_deref(), Some("ana@example.com"));
    assert!(!principal.is_admin);
}

#[tokio::test]
async fn missing_or_foreign_scheme_is_no_credential() {
    let auth = test_auth();

    let missing = warp::test::request()
        .filter(&with_auth(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&missing), AuthError::MissingCredential));

    let basic = warp::test::request()
        .header("authorization", "Basic dXNlcjpwYXNz")
        .filter(&with_auth(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&basic), AuthError::MissingCredential));
}

#[tokio::test]
async fn expired_and_forged_tokens_are_rejected() {
    let auth = test_auth();

    let expired = sign(&customer().with(claims::EXPIRES_AT, 1), Expiry::Never);
    let rejection = warp::test::request()
        .header("authorization", format!("Bearer {expired}"))
        .filter(&with_auth(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&rejection), AuthError::TokenError { .. }));

    let forged = TokenCodec::new("guessed secret")
        .unwrap()
        .issue(&customer().with(claims::IS_ADMIN, true), Expiry::Never)
        .unwrap();
    let rejection = warp::test::request()
        .header("authorization", format!("Bearer {forged}"))
        .filter(&with_admin(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&rejection), AuthError::TokenError { .. }));
}

#[tokio::test]
async fn with_admin_requires_the_admin_flag() {
    let auth = test_auth();

    let customer_token = sign(&customer(), Expiry::Never);
    let rejection = warp::test::request()
        .header("authorization", format!("Bearer {customer_token}"))
        .filter(&with_admin(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&rejection), AuthError::NotAdmin));

    // a string "true" is not a boolean flag
    let stringly = sign(&customer().with(claims::IS_ADMIN, "true"), Expiry::Never);
    let rejection = warp::test::request()
        .header("authorization", format!("Bearer {stringly}"))
        .filter(&with_admin(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&rejection), AuthError::NotAdmin));

    let admin_token = sign(&customer().with(claims::IS_ADMIN, true), Expiry::Never);
    let admin = warp::test::request()
        .header("authorization", format!("Bearer {admin_token}"))
        .filter(&with_admin(&auth))
        .await
        .unwrap();
    assert!(admin.is_admin);
}

#[tokio::test]
async fn with_claims_exposes_every_claim() {
    let auth = test_auth();
    let token = sign(
        &customer().with("cart", "c-42"),
        Expiry::from_secs(60).unwrap(),
    );

    let claims = warp::test::request()
        .header("authorization", format!("Bearer {token}"))
        .filter(&with_claims(&auth))
        .await
        .unwrap();

    assert_eq!(claims.get_str("cart"), Some("c-42"));
    assert!(claims.issued_at().is_some());
    assert_eq!(
        claims.expires_at(),
        claims.issued_at().map(|iat| iat + 60)
    );
}

#[tokio::test]
async fn subjectless_tokens_do_not_authenticate() {
    let auth = test_auth();
    let token = sign(&Claims::new().with(claims::IS_ADMIN, true), Expiry::Never);

    let rejection = warp::test::request()
        .header("authorization", format!("Bearer {token}"))
        .filter(&with_admin(&auth))
        .await
        .unwrap_err();

    assert!(matches!(auth_error(&rejection), AuthError::MissingSubject));
}

fn latin1_credential() -> HeaderValue {
    HeaderValue::from_bytes(b"Bearer \xe9t\xe9").unwrap()
}

fn json_body(response: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn undecodable_header_is_no_credential() {
    let auth = test_auth();

    for filter_result in [
        warp::test::request()
            .header("authorization", latin1_credential())
            .filter(&with_auth(&auth))
            .await
            .unwrap_err(),
        warp::test::request()
            .header("authorization", latin1_credential())
            .filter(&with_admin(&auth))
            .await
            .unwrap_err(),
    ] {
        assert!(matches!(
            auth_error(&filter_result),
            AuthError::MissingCredential
        ));
    }

    let rejection = warp::test::request()
        .header("authorization", latin1_credential())
        .filter(&with_claims(&auth))
        .await
        .unwrap_err();
    assert!(matches!(auth_error(&rejection), AuthError::MissingCredential));

    let secure = warp::path!("secure")
        .and(with_auth(&auth))
        .map(|_| "ok")
        .recover(handle_auth_errors);
    let response = warp::test::request()
        .path("/secure")
        .header("authorization", latin1_credential())
        .reply(&secure)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&response), json!({ "error": "access denied" }));
}

#[tokio::test]
async fn me_treats_an_undecodable_header_as_signed_out() {
    let auth = test_auth();
    let routes = build_api_route_filter(&auth).recover(handle_auth_errors);

    let response = warp::test::request()
        .path("/users/me")
        .header("authorization", latin1_credential())
        .reply(&routes)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(&response), json!({ "authenticated": false }));
}

#[tokio::test]
async fn login_with_missing_fields_is_a_json_bad_request() {
    let auth = test_auth();
    let routes = build_api_route_filter(&auth).recover(handle_auth_errors);

    for body in [
        json!({ "email": "a@b.c" }),
        json!({ "password": "foobar" }),
        json!({ "email": "  ", "password": "foobar" }),
    ] {
        let response = warp::test::request()
            .method("POST")
            .path("/users/login")
            .json(&body)
            .reply(&routes)
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(
            json_body(&response),
            json!({ "error": "email and password are required" })
        );
    }
}

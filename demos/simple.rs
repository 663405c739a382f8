use std::{collections::HashMap, error::Error, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use serde_json::json;
use token_for_warp::{
    build_api_route_filter, handle_auth_errors, with_admin, with_auth, Auth, AuthConfig, Email,
    UserDatabase, UserID, UserRecord,
};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;
use warp::{path, Filter};

// SECRET_KEY=... ADMIN_EMAILS=admin@example.com cargo run --example simple
// RUST_LOG overrides the default filter, e.g. RUST_LOG=token_for_warp=debug
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let database_connection = Arc::new(Mutex::new(SimpleInMemoryDb::new()));

    let auth = Auth::new(AuthConfig::from_env(database_connection)?)?;

    let auth_routes = build_api_route_filter(&auth);

    let unsecured_homepage =
        warp::path::end().then(|| async move { warp::reply::html("hello, world!") });

    let secure_page = path!("check_user")
        .and(with_auth(&auth))
        .then(|user| async move { warp::reply::json(&json!({ "user": user })) });

    let admin_page = path!("admin" / "stats")
        .and(with_admin(&auth))
        .then(|admin| async move { warp::reply::json(&json!({ "requested_by": admin })) });

    let all_routes = unsecured_homepage
        .or(secure_page)
        .or(admin_page)
        .or(auth_routes)
        .recover(handle_auth_errors);

    warp::serve(all_routes)
        .run("127.0.0.1:4000".parse::<SocketAddr>()?)
        .await;

    Ok(())
}

struct SimpleInMemoryDb {
    storage: HashMap<Email, UserRecord>,
}

impl SimpleInMemoryDb {
    pub fn new() -> Self {
        Self {
            storage: HashMap::new(),
        }
    }
}

#[async_trait]
impl UserDatabase for SimpleInMemoryDb {
    async fn create_user_if_not_exists(
        &mut self,
        user: &UserRecord,
    ) -> Result<UserID, Box<dyn Error + Send + Sync>> {
        let stored = self
            .storage
            .entry(user.email.clone())
            .or_insert_with(|| user.clone());

        Ok(stored.user_id.clone())
    }

    async fn retrieve_user(
        &self,
        email: &Email,
    ) -> Result<Option<UserRecord>, Box<dyn Error + Send + Sync>> {
        Ok(self.storage.get(email).cloned())
    }
}

#![allow(dead_code)]

use std::{collections::HashMap, error::Error, sync::Arc};

use async_trait::async_trait;
use token_for_warp::{Auth, AuthConfig, Email, Expiry, UserDatabase, UserID, UserRecord};
use tokio::sync::Mutex;

pub const SECRET: &str = "this is a really bad secret";
pub const ADMIN_EMAIL: &str = "admin@libreria.example";

pub struct TestDB {
    storage: HashMap<Email, UserRecord>,
}

#[async_trait]
impl UserDatabase for TestDB {
    async fn create_user_if_not_exists(
        &mut self,
        user: &UserRecord,
    ) -> Result<UserID, Box<dyn Error + Send + Sync>> {
        if let Some(existing) = self.storage.get(&user.email) {
            Ok(existing.user_id.clone())
        } else {
            self.storage.insert(user.email.clone(), user.clone());
            Ok(user.user_id.clone())
        }
    }

    async fn retrieve_user(
        &self,
        email: &Email,
    ) -> Result<Option<UserRecord>, Box<dyn Error + Send + Sync>> {
        Ok(self.storage.get(email).cloned())
    }
}

pub fn test_auth() -> Auth {
    let database_connection = Arc::new(Mutex::new(TestDB {
        storage: HashMap::new(),
    }));

    let config = AuthConfig {
        auth_token_secret: SECRET.into(),
        auth_token_lifetime: Expiry::from_secs(60 * 60).unwrap(),
        admin_emails: vec![ADMIN_EMAIL.into()],
        database_connection,
    };

    Auth::new(config).unwrap()
}

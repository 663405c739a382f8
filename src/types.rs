use serde::{Deserialize, Serialize};

use crate::claims::Claims;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[repr(transparent)]
pub struct UserID(pub String);

/// Stored trimmed and lowercased, see [`Email::normalized`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[repr(transparent)]
pub struct Email(pub String);

impl Email {
    pub fn normalized(raw: &str) -> Self {
        Email(raw.trim().to_lowercase())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[repr(transparent)]
pub struct DisplayName(pub String);

#[derive(Debug, Clone, Deserialize, Serialize)]
#[repr(transparent)]
pub struct HashedPassword(pub String);

/// A user as handed to and returned from the [`crate::UserDatabase`].
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user_id: UserID,
    pub email: Email,
    pub name: DisplayName,
    pub hashed_password: HashedPassword,
    pub is_admin: bool,
}

/// The authenticated caller, read back from a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub id: UserID,
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_admin: bool,
}

impl Principal {
    /// `None` when the claims carry no subject.
    pub fn from_claims(claims: &Claims) -> Option<Self> {
        Some(Principal {
            id: UserID(claims.subject()?.to_owned()),
            email: claims.email().map(str::to_owned),
            name: claims.name().map(str::to_owned),
            is_admin: claims.is_admin(),
        })
    }
}

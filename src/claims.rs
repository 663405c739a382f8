use std::collections::{btree_map, BTreeMap};

use serde::{ser::Error as _, Deserialize, Serialize, Serializer};

pub const SUBJECT: &str = "sub";
pub const EMAIL: &str = "email";
pub const NAME: &str = "name";
pub const IS_ADMIN: &str = "is_admin";
pub const ISSUED_AT: &str = "iat";
pub const EXPIRES_AT: &str = "exp";

/// A single claim value. Only JSON scalars are representable; `null`, arrays and
/// objects are rejected when a payload is parsed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Serialize for ClaimValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ClaimValue::Bool(value) => serializer.serialize_bool(*value),
            ClaimValue::Integer(value) => serializer.serialize_i64(*value),
            // serde_json would silently write these as `null`
            ClaimValue::Float(value) if !value.is_finite() => {
                Err(S::Error::custom("claim value is not a finite number"))
            }
            ClaimValue::Float(value) => serializer.serialize_f64(*value),
            ClaimValue::String(value) => serializer.serialize_str(value),
        }
    }
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClaimValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ClaimValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric claims read as whole Unix seconds. Fractional timestamps are truncated.
    pub fn as_timestamp(&self) -> Option<i64> {
        match self {
            ClaimValue::Integer(value) => Some(*value),
            ClaimValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
            _ => None,
        }
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        ClaimValue::Bool(value)
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        ClaimValue::Integer(value)
    }
}

impl From<i32> for ClaimValue {
    fn from(value: i32) -> Self {
        ClaimValue::Integer(value.into())
    }
}

impl From<u32> for ClaimValue {
    fn from(value: u32) -> Self {
        ClaimValue::Integer(value.into())
    }
}

impl From<f64> for ClaimValue {
    fn from(value: f64) -> Self {
        ClaimValue::Float(value)
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        ClaimValue::String(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        ClaimValue::String(value.to_owned())
    }
}

/// The facts about a principal carried in a token's payload.
///
/// Keys are kept sorted so the serialized payload is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ClaimValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ClaimValue>,
    ) -> Option<ClaimValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&ClaimValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ClaimValue> {
        self.0.iter()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ClaimValue::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ClaimValue::as_bool)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ClaimValue::as_i64)
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str(SUBJECT)
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str(EMAIL)
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str(NAME)
    }

    /// Absent or non-boolean flags never grant admin rights.
    pub fn is_admin(&self) -> bool {
        self.get_bool(IS_ADMIN).unwrap_or(false)
    }

    pub fn issued_at(&self) -> Option<i64> {
        self.get(ISSUED_AT).and_then(ClaimValue::as_timestamp)
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.get(EXPIRES_AT).and_then(ClaimValue::as_timestamp)
    }
}

impl<K: Into<String>, V: Into<ClaimValue>> FromIterator<(K, V)> for Claims {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Claims {
    type Item = (String, ClaimValue);
    type IntoIter = btree_map::IntoIter<String, ClaimValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Claims {
    type Item = (&'a String, &'a ClaimValue);
    type IntoIter = btree_map::Iter<'a, String, ClaimValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

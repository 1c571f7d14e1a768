use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::roles::{Role, UnknownRole};

/// Any claims shape the codec can carry. Expiry is read through the accessor
/// so the codec stays agnostic of field names.
pub trait TokenClaims: Serialize + DeserializeOwned {
    /// Unix timestamp (seconds) after which the token is no longer valid.
    fn expires_at(&self) -> i64;
}

/// Claims carried by access tokens issued to directory users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    #[serde(rename = "sub")]
    pub subject_id: Uuid,
    #[serde(rename = "name")]
    pub subject_name: String,
    pub role: String,
    /// Random value that keeps two tokens minted in the same second distinct.
    pub nonce: String,
    #[serde(rename = "aud")]
    pub audience: String,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "iss")]
    pub issuer: String,
}

impl UserClaims {
    pub fn role(&self) -> Result<Role, UnknownRole> {
        Role::from_str(&self.role)
    }
}

impl TokenClaims for UserClaims {
    fn expires_at(&self) -> i64 {
        self.expires_at
    }
}

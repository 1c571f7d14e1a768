use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const ROLE_GUEST: &str = "guest";
pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_OPERATOR: &str = "operator";

/// Lowest to highest privilege.
pub const ROLE_HIERARCHY: &[&str] = &[ROLE_GUEST, ROLE_USER, ROLE_ADMIN, ROLE_OPERATOR];

/// Totally ordered account role. Admission compares ordinals, so the
/// declaration order here is the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest = 1,
    User = 2,
    Admin = 3,
    Operator = 4,
}

impl Role {
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => ROLE_GUEST,
            Role::User => ROLE_USER,
            Role::Admin => ROLE_ADMIN,
            Role::Operator => ROLE_OPERATOR,
        }
    }

    /// Ordinal of an optional minimum; `None` means public (0).
    pub fn minimum_ordinal(minimum: Option<Role>) -> u8 {
        minimum.map(Role::ordinal).unwrap_or(0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            ROLE_GUEST => Ok(Role::Guest),
            ROLE_USER => Ok(Role::User),
            ROLE_ADMIN => Ok(Role::Admin),
            ROLE_OPERATOR => Ok(Role::Operator),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_matches_ordinals() {
        let parsed: Vec<Role> = ROLE_HIERARCHY
            .iter()
            .map(|name| name.parse().expect("known role"))
            .collect();
        assert_eq!(parsed, vec![Role::Guest, Role::User, Role::Admin, Role::Operator]);
        assert!(parsed.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(Role::Guest.ordinal(), 1);
        assert_eq!(Role::Operator.ordinal(), 4);
    }

    #[test]
    fn unknown_and_mixed_case_strings_are_rejected() {
        assert!("root".parse::<Role>().is_err());
        assert!("Admin".parse::<Role>().is_err());
        assert_eq!(Role::minimum_ordinal(None), 0);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Role::Operator).expect("serialize");
        assert_eq!(json, "\"operator\"");
        let role: Role = serde_json::from_str("\"admin\"").expect("deserialize");
        assert_eq!(role, Role::Admin);
    }
}

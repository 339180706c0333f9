//! User account models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::string_id;

string_id!(
    /// Unique identifier for a user account.
    UserId
);

/// Error returned when parsing an enum from its wire name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

/// Account role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Subscriber,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Subscriber => "subscriber",
            Role::Admin => "admin",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Role::User => 0,
            Role::Subscriber => 1,
            Role::Admin => 2,
        }
    }

    /// Whether this role may enter areas gated at `required`.
    ///
    /// Roles are ordered user < subscriber < admin.
    pub fn can_access(&self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Dashboard path a freshly logged-in user is sent to.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::User => "/user",
            Role::Subscriber => "/subscriber",
            Role::Admin => "/admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "subscriber" => Ok(Role::Subscriber),
            "admin" => Ok(Role::Admin),
            _ => Err(ParseError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

/// Subscription state of an account.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[default]
    Inactive,
    Active,
    Suspended,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Suspended => "suspended",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "active" => Ok(SubscriptionStatus::Active),
            "suspended" => Ok(SubscriptionStatus::Suspended),
            _ => Err(ParseError {
                kind: "subscription status",
                value: s.to_string(),
            }),
        }
    }
}

/// User account record.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct User {
    pub user_id: UserId,
    pub fullname: String,
    /// Stored lowercased; unique across accounts.
    pub email: String,
    /// Argon2 PHC string. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new account with the default `user` role.
    pub fn new(
        fullname: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            fullname: fullname.into(),
            email: normalize_email(&email.into()),
            password_hash: password_hash.into(),
            role: Role::User,
            subscription_status: SubscriptionStatus::Inactive,
            created_at: Utc::now(),
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Canonical form used for email lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_access_hierarchy() {
        assert!(Role::Admin.can_access(Role::Subscriber));
        assert!(Role::Admin.can_access(Role::User));
        assert!(Role::Subscriber.can_access(Role::User));
        assert!(!Role::Subscriber.can_access(Role::Admin));
        assert!(!Role::User.can_access(Role::Subscriber));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User::new("Ada", " Ada@Example.com ", "$argon2id$secret");
        assert_eq!(user.email, "ada@example.com");

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["subscription_status"], "inactive");
    }
}

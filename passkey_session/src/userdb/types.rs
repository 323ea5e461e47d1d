use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents a core user identity in the system.
///
/// Users are created by the registration step and own zero or more passkey
/// credentials. Deactivation is a flag (`is_active`), not a deletion.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct User {
    /// Unique user identifier
    pub id: String,
    /// Email address (stored lowercased)
    pub email: String,
    /// Login identifier (stored lowercased)
    pub username: String,
    /// Full display name
    pub full_name: String,
    /// Authorization role, e.g. "user" or "admin"
    pub role: String,
    /// Whether the account may authenticate
    pub is_active: bool,
    /// Set once a passkey registration proves control of the email
    pub is_email_verified: bool,
    /// When the user last completed an authentication ceremony
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    /// When the user account was created
    pub created_at: DateTime<Utc>,
    /// When the user account was last updated
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new active, unverified user with the default role.
    pub fn new(id: String, email: String, username: String, full_name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            email: email.to_lowercase(),
            username: username.to_lowercase(),
            full_name,
            role: "user".to_string(),
            is_active: true,
            is_email_verified: false,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

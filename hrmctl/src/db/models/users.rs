//! Database models for users.

use crate::types::{GroupId, RoleId, UserId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::fmt;

/// Database request for creating a new user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

/// Database request for editing a user's profile. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub first_name: Option<String>,
    /// `Some(None)` clears the middle name
    pub middle_name: Option<Option<String>>,
    pub last_name: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub role_id: Option<RoleId>,
    pub group_id: Option<GroupId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What authentication needs to know about a user
#[derive(Clone, FromRow)]
pub struct UserCredentials {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role_id: Option<RoleId>,
}

impl fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredentials")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("role_id", &self.role_id)
            .finish()
    }
}

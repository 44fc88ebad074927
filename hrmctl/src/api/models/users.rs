//! API request/response models for users.

use crate::api::models::{reject_blank, require_non_blank};
use crate::db::models::users::UserDBResponse;
use crate::errors::{Error, Result};
use crate::types::{GroupId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use std::fmt;
use utoipa::ToSchema;

/// Registration request
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreate {
    /// Login name (must be unique)
    #[schema(example = "ada")]
    pub username: String,
    #[schema(example = "s3cret-pass", format = "password")]
    pub password: String,
    #[schema(example = "Ada")]
    pub first_name: String,
    pub middle_name: Option<String>,
    #[schema(example = "Lovelace")]
    pub last_name: String,
}

impl fmt::Debug for UserCreate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCreate")
            .field("username", &self.username)
            .field("first_name", &self.first_name)
            .field("middle_name", &self.middle_name)
            .field("last_name", &self.last_name)
            .finish_non_exhaustive()
    }
}

impl UserCreate {
    pub fn validate(&self, min_password: usize, max_password: usize) -> Result<()> {
        require_non_blank("username", &self.username)?;
        require_non_blank("first_name", &self.first_name)?;
        require_non_blank("last_name", &self.last_name)?;
        validate_password(&self.password, min_password, max_password)
    }
}

/// Profile edit. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    /// None = no change, Some(None) = clear, Some(name) = set
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub middle_name: Option<Option<String>>,
    pub last_name: Option<String>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<()> {
        reject_blank("first_name", self.first_name.as_deref())?;
        reject_blank("last_name", self.last_name.as_deref())
    }
}

/// New password for a user
#[derive(Clone, Serialize, Deserialize, ToSchema)]
pub struct PasswordChange {
    #[schema(format = "password")]
    pub password: String,
    /// Required when changing your own password
    #[serde(default)]
    #[schema(format = "password")]
    pub current_password: Option<String>,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

pub(crate) fn validate_password(password: &str, min: usize, max: usize) -> Result<()> {
    let length = password.chars().count();
    if length < min || length > max {
        return Err(Error::BadRequest {
            message: format!("password must be between {min} and {max} characters"),
        });
    }
    Ok(())
}

/// Role to grant a user, by name
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserRoleAssign {
    #[schema(example = "dev")]
    pub role_name: String,
}

/// Group to place a user in, by name
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserGroupAssign {
    #[schema(example = "eng")]
    pub group_name: String,
}

/// A user as returned by the API. The password hash never leaves the store.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
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

impl From<UserDBResponse> for UserResponse {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            first_name: db.first_name,
            middle_name: db.middle_name,
            last_name: db.last_name,
            role_id: db.role_id,
            group_id: db.group_id,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(password: &str) -> UserCreate {
        UserCreate {
            username: "ada".to_string(),
            password: password.to_string(),
            first_name: "Ada".to_string(),
            middle_name: None,
            last_name: "Lovelace".to_string(),
        }
    }

    #[test]
    fn test_registration_validation() {
        assert!(registration("long-enough").validate(8, 64).is_ok());
        assert!(registration("short").validate(8, 64).is_err());
        assert!(registration(&"x".repeat(65)).validate(8, 64).is_err());

        let mut missing = registration("long-enough");
        missing.last_name = " ".to_string();
        assert!(matches!(missing.validate(8, 64), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn test_debug_never_prints_password() {
        let rendered = format!("{:?}", registration("hunter2-secret"));
        assert!(!rendered.contains("hunter2-secret"));
        assert!(rendered.contains("ada"));
    }

    #[test]
    fn test_missing_required_field_fails_to_deserialize() {
        let result = serde_json::from_value::<UserCreate>(serde_json::json!({
            "username": "ada",
            "password": "long-enough",
            "first_name": "Ada"
        }));
        assert!(result.is_err());
    }
}

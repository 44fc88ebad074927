//! API request and response data models.
//!
//! Reads return entity JSON directly (`UserResponse`, `Vec<RoleResponse>`, ...). Mutations
//! return the [`MessageResponse`] envelope, which is also the body of every error response.
//! All models carry `utoipa` annotations for the generated OpenAPI document.

pub mod auth;
pub mod groups;
pub mod privileges;
pub mod roles;
pub mod users;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::{Error, Result};

/// `{error, message}` envelope returned by mutations and errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// `true` for failures
    pub error: bool,
    #[schema(example = "Role added")]
    pub message: String,
    /// Identity of the entity a create produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            error: false,
            message: message.into(),
            id: None,
        }
    }

    pub fn created(message: impl Into<String>, id: i64) -> Self {
        Self {
            error: false,
            message: message.into(),
            id: Some(id),
        }
    }
}

/// Reject missing or whitespace-only required fields
pub(crate) fn require_non_blank(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::BadRequest {
            message: format!("{field} is required"),
        });
    }
    Ok(())
}

/// Reject an optional field that is present but blank
pub(crate) fn reject_blank(field: &str, value: Option<&str>) -> Result<()> {
    match value {
        Some(value) => require_non_blank(field, value),
        None => Ok(()),
    }
}

//! API request/response models for roles.

use crate::api::models::{reject_blank, require_non_blank};
use crate::db::models::roles::RoleDBResponse;
use crate::errors::Result;
use crate::types::RoleId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a role
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleCreate {
    /// Role name (must be unique)
    #[schema(example = "dev")]
    pub name: String,
    #[schema(example = "Developers")]
    pub description: Option<String>,
}

impl RoleCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_blank("name", &self.name)
    }
}

/// Request body for updating a role. Omitted fields keep their current value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl RoleUpdate {
    pub fn validate(&self) -> Result<()> {
        reject_blank("name", self.name.as_deref())
    }
}

/// Privilege to attach to a role, by name
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RolePrivilegeGrant {
    #[schema(example = "create_user")]
    pub privilege_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleDBResponse> for RoleResponse {
    fn from(db: RoleDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

//! API request/response models for groups.

use crate::api::models::{reject_blank, require_non_blank};
use crate::db::models::groups::GroupDBResponse;
use crate::errors::Result;
use crate::types::GroupId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for creating a new group.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupCreate {
    /// Group name (must be unique)
    #[schema(example = "eng")]
    pub name: String,
    /// Optional description of the group's purpose
    #[schema(example = "Engineering")]
    pub description: Option<String>,
}

impl GroupCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_blank("name", &self.name)
    }
}

/// Request body for updating an existing group. All fields are optional;
/// only provided fields will be updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl GroupUpdate {
    pub fn validate(&self) -> Result<()> {
        reject_blank("name", self.name.as_deref())
    }
}

/// Role to permit within a group, by name
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupRoleAssign {
    #[schema(example = "dev")]
    pub role_name: String,
}

/// Full group details returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GroupResponse {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<GroupDBResponse> for GroupResponse {
    fn from(db: GroupDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

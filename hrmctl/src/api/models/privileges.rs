//! API request/response models for privileges.

use crate::api::models::{reject_blank, require_non_blank};
use crate::db::models::privileges::PrivilegeDBResponse;
use crate::errors::Result;
use crate::types::PrivilegeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrivilegeCreate {
    /// Privilege name (must be unique), e.g. the name a route is gated on
    #[schema(example = "create_user")]
    pub name: String,
    #[schema(example = "Register new users")]
    pub description: Option<String>,
}

impl PrivilegeCreate {
    pub fn validate(&self) -> Result<()> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PrivilegeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl PrivilegeUpdate {
    pub fn validate(&self) -> Result<()> {
        reject_blank("name", self.name.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PrivilegeResponse {
    pub id: PrivilegeId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PrivilegeDBResponse> for PrivilegeResponse {
    fn from(db: PrivilegeDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

//! Authentication request and response models.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Credentials exchanged for an identity token
#[derive(Clone, Deserialize, ToSchema)]
pub struct AuthenticateRequest {
    #[schema(example = "admin")]
    pub username: String,
    #[schema(example = "s3cret-pass", format = "password")]
    pub password: String,
}

impl fmt::Debug for AuthenticateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticateRequest")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Successful authentication. Send `token` back in the `Token` header.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticateResponse {
    pub error: bool,
    #[schema(example = "Authenticated")]
    pub message: String,
    pub token: String,
}

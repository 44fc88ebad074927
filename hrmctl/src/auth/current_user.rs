use crate::{
    AppState,
    auth::token,
    errors::{Error, Result},
    types::{RoleId, UserId},
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{debug, instrument};

/// The verified identity behind a request.
///
/// Produced only by verifying the request's identity token, and handed to the authorization
/// check as an explicit value. Nothing about the caller is looked up anywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub username: String,
    /// `None` for users who have not been granted a role; every privilege check fails for them.
    pub role_id: Option<RoleId>,
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = Error;

    #[instrument(skip_all)]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let header_name = state.config.auth.token.header_name.as_str();

        let Some(value) = parts.headers.get(header_name) else {
            return Err(Error::Unauthenticated { message: None });
        };
        let token = value.to_str().map_err(|_| Error::Unauthenticated {
            message: Some(format!("Invalid token: {header_name} header is not valid text")),
        })?;

        let user = token::verify_token(token.trim(), &state.config)?;
        debug!(user_id = user.id, role_id = ?user.role_id, "Authenticated request");
        Ok(user)
    }
}

//! HTTP request handlers for all API endpoints.
//!
//! Handlers are organized by resource type. Each one:
//! - names the privilege it is gated on through a [`RequiresPrivilege`] extractor, which runs
//!   before the body is read
//! - validates the request body
//! - resolves any names in the body to identities and performs the store operation, inside a
//!   transaction when it takes more than one statement
//!
//! # Handler Modules
//!
//! - [`auth`]: Authentication and registration
//! - [`users`]: User CRUD, password change, and role and group assignment
//! - [`roles`]: Role CRUD and the role/privilege association
//! - [`privileges`]: Privilege CRUD
//! - [`groups`]: Group CRUD, membership, and the group/role association
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the HTTP status and the
//! `{error, message}` body.
//!
//! [`RequiresPrivilege`]: crate::auth::permissions::RequiresPrivilege

pub mod auth;
pub mod groups;
pub mod privileges;
pub mod roles;
pub mod users;

use crate::db::errors::DbError;
use crate::errors::Error;
use std::fmt::Display;

/// Give a bare store `NotFound` the resource name and id the caller asked for
pub(crate) fn or_not_found(resource: &'static str, id: impl Display) -> impl FnOnce(DbError) -> Error {
    move |e| match e {
        DbError::NotFound => not_found(resource, id),
        other => Error::Database(other),
    }
}

pub(crate) fn not_found(resource: &str, id: impl Display) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: id.to_string(),
    }
}

/// Lookup by name failed
pub(crate) fn name_not_found(resource: &str, name: &str) -> Error {
    Error::NotFound {
        resource: resource.to_string(),
        id: format!("'{name}'"),
    }
}

//! Database record models matching table schemas.
//!
//! Repositories accept `*CreateDBRequest` / `*UpdateDBRequest` values and return
//! `*DBResponse` rows. These are kept apart from the API models in [`crate::api::models`] so
//! storage and wire representations can evolve independently; conversions live on the API
//! side.
//!
//! - [`users`]: user accounts and stored credentials
//! - [`roles`]: named privilege bundles
//! - [`groups`]: named role bundles
//! - [`privileges`]: atomic permission names

pub mod groups;
pub mod privileges;
pub mod roles;
pub mod users;

//! Common type definitions.
//!
//! All entity identities are `BIGSERIAL` columns in PostgreSQL, so ordering by id is
//! insertion order. They are wrapped in type aliases so signatures say which entity an id
//! belongs to:
//!
//! - [`UserId`]: user account identifier
//! - [`RoleId`]: role identifier
//! - [`GroupId`]: group identifier
//! - [`PrivilegeId`]: privilege identifier

pub type UserId = i64;
pub type RoleId = i64;
pub type GroupId = i64;
pub type PrivilegeId = i64;

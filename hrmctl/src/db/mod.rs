//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, one connection per request)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries and referential guards)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! Uniqueness and association integrity are enforced by the schema (named UNIQUE
//! constraints and composite primary keys); the repositories surface violations as
//! [`errors::DbError`] variants. Delete guards that must report a reason (a group with
//! members, a role still held) run inside a transaction before the delete.
//!
//! Migrations live in `migrations/` and are applied by [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;

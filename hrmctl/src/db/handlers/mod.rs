//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection` (a pooled connection or an open
//! transaction) and implements [`Repository`] for its table. Association tables have no
//! repository of their own: role grants live on [`Roles`], group role permissions on
//! [`Groups`], and user role/group membership on [`Users`].
//!
//! ```ignore
//! use hrmctl::db::handlers::{Repository, Roles};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut roles = Roles::new(&mut tx);
//!     let admin = roles.get_by_name("admin").await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod groups;
pub mod privileges;
pub mod repository;
pub mod roles;
pub mod users;

pub use groups::Groups;
pub use privileges::Privileges;
pub use repository::Repository;
pub use roles::Roles;
pub use users::Users;

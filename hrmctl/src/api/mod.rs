//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! - **Authentication**: `POST /authenticate` (public), `POST /register`
//! - **Users** (`/users/*`): CRUD, password change, role and group assignment
//! - **Roles** (`/newrole`, `/roles/*`): CRUD and role privileges
//! - **Privileges** (`/newpriv`, `/privs/*`): CRUD
//! - **Groups** (`/newgroup`, `/groups/*`): CRUD, membership, and permitted roles
//!
//! Every route except `/authenticate`, `/healthz` and `/docs` expects an identity token in
//! the `Token` header.
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa` annotations. The rendered documentation is
//! served at `/docs`.

pub mod handlers;
pub mod models;

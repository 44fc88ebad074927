//! Authentication and authorization.
//!
//! # Authentication
//!
//! Callers exchange a username and password at `POST /authenticate` for a signed identity
//! token (HS256, see [`token`]). Every other protected route reads that token from the
//! configured header (default `Token`) and verifies signature, algorithm, issuer, audience
//! and expiry before anything else runs. The verified claims become an
//! [`AuthenticatedUser`](current_user::AuthenticatedUser).
//!
//! Passwords are stored as Argon2id hashes ([`password`]).
//!
//! # Authorization
//!
//! Every gated route names one privilege. [`permissions::RequiresPrivilege`] resolves the
//! caller's role to its privilege set in the store and admits the request only on a match.
//! A caller without a role, a role without privileges, or a failed lookup all deny.
//!
//! ```ignore
//! async fn list_users(_: RequiresPrivilege<privilege::ReadAllUsers>, ...) { ... }
//! ```

pub mod current_user;
pub mod password;
pub mod permissions;
pub mod token;

//! Privilege-based authorization.
//!
//! Every gated handler names the privilege it needs at the type level:
//!
//! ```ignore
//! async fn delete_group(
//!     State(state): State<AppState>,
//!     _: RequiresPrivilege<privilege::DeleteGroup>,
//!     Path(id): Path<GroupId>,
//! ) -> Result<Json<MessageResponse>> { ... }
//! ```
//!
//! The extractor verifies the identity token, resolves the caller's role to its privilege
//! names and lets the handler run only if the required name is among them. Resolution
//! failures deny.

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};
use sqlx::PgConnection;
use tracing::{error, info, instrument};

use crate::{
    AppState,
    auth::current_user::AuthenticatedUser,
    db::handlers::Roles,
    errors::{Error, Result},
    types::RoleId,
};

/// A named privilege a handler can be gated on
pub trait Privilege {
    const NAME: &'static str;
}

macro_rules! privileges {
    ($($ty:ident => $name:literal, $description:literal;)*) => {
        $(
            #[doc = $description]
            pub struct $ty;

            impl super::Privilege for $ty {
                const NAME: &'static str = $name;
            }
        )*

        /// Every privilege the router gates on, as `(name, description)`
        pub const ALL: &[(&str, &str)] = &[$(($name, $description)),*];
    };
}

/// Marker types for every privilege known to the router.
pub mod privilege {
    privileges! {
        CreateUser => "create_user", "Register new users";
        ReadAllUsers => "read_all_users", "List all users";
        ReadOneUser => "read_one_user", "Read a single user";
        ModifyUser => "modify_user", "Edit user profiles and passwords";
        DeleteUser => "delete_user", "Delete users";
        GrantUserRole => "grant_user_role", "Assign a role to a user";
        RevokeUserRole => "revoke_user_role", "Remove a user's role";
        CreateRole => "create_role", "Create roles";
        ReadAllRoles => "read_all_roles", "List all roles";
        ReadOneRole => "read_one_role", "Read a single role and its privileges";
        ModifyRole => "modify_role", "Edit roles";
        DeleteRole => "delete_role", "Delete roles";
        GrantRolePrivilege => "grant_role_privilege", "Attach a privilege to a role";
        RevokeRolePrivilege => "revoke_role_privilege", "Detach a privilege from a role";
        AddPrivilege => "add_privilege", "Create privileges";
        ReadAllPrivs => "read_all_privs", "List all privileges";
        ReadOnePriv => "read_one_priv", "Read a single privilege";
        ModifyPriv => "modify_priv", "Edit privileges";
        DeletePriv => "delete_priv", "Delete privileges";
        CreateGroup => "create_group", "Create groups";
        ReadAllGroups => "read_all_groups", "List all groups";
        ReadOneGroup => "read_one_group", "Read a single group, its roles and its members";
        ModifyGroup => "modify_group", "Edit groups";
        DeleteGroup => "delete_group", "Delete groups";
        AssignGroupUser => "assign_group_user", "Add a user to a group";
        RemoveGroupUser => "remove_group_user", "Remove users from a group";
        AssignGroupRole => "assign_group_role", "Permit a role within a group";
        RemoveGroupRole => "remove_group_role", "Withdraw a role from a group";
    }
}

/// Outcome of a privilege check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The caller carries no role
    NoRole,
    /// The role resolves to an empty privilege set
    NoPrivileges,
    /// The role holds privileges, but not the required one
    NotHeld,
    /// The privilege set could not be resolved
    LookupFailed,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Membership test of `required` against a resolved privilege set.
pub fn decide(held: &[String], required: &str) -> Decision {
    if held.is_empty() {
        Decision::Deny(DenyReason::NoPrivileges)
    } else if held.iter().any(|name| name == required) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotHeld)
    }
}

/// Decide whether `role_id` holds `required`. Store errors deny.
#[instrument(skip(conn), fields(role_id = ?role_id))]
pub async fn authorize(conn: &mut PgConnection, role_id: Option<RoleId>, required: &str) -> Decision {
    let Some(role_id) = role_id else {
        return Decision::Deny(DenyReason::NoRole);
    };

    match Roles::new(conn).privilege_names(role_id).await {
        Ok(held) => decide(&held, required),
        Err(e) => {
            error!("Failed to resolve privileges for role {role_id}: {e:#}");
            Decision::Deny(DenyReason::LookupFailed)
        }
    }
}

/// Resolve the caller's decision for `required`, acquiring a connection for the lookup.
pub async fn authorize_user(state: &AppState, user: &AuthenticatedUser, required: &str) -> Decision {
    match state.db.acquire().await {
        Ok(mut conn) => authorize(&mut conn, user.role_id, required).await,
        Err(e) => {
            error!("Failed to acquire connection for privilege check: {e}");
            Decision::Deny(DenyReason::LookupFailed)
        }
    }
}

/// Turn a decision into a handler result
pub fn enforce(decision: Decision, user: &AuthenticatedUser, required: &str) -> Result<()> {
    match decision {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            info!(user_id = user.id, role_id = ?user.role_id, ?reason, "Denied {required}");
            Err(Error::InsufficientPrivileges {
                required: required.to_string(),
            })
        }
    }
}

/// Extractor that admits the request only if the caller holds privilege `P`.
pub struct RequiresPrivilege<P: Privilege> {
    pub user: AuthenticatedUser,
    _privilege: PhantomData<P>,
}

impl<P> FromRequestParts<AppState> for RequiresPrivilege<P>
where
    P: Privilege + Send + Sync,
{
    type Rejection = Error;

    #[instrument(skip_all, fields(privilege = P::NAME))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        let decision = authorize_user(state, &user, P::NAME).await;
        enforce(decision, &user, P::NAME)?;

        Ok(Self {
            user,
            _privilege: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Privileges, Repository};
    use crate::db::models::{privileges::PrivilegeCreateDBRequest, roles::RoleCreateDBRequest};
    use sqlx::PgPool;
    use std::collections::HashSet;

    fn held(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_decide_membership() {
        let set = held(&["create_user", "read_all_users"]);
        assert_eq!(decide(&set, "create_user"), Decision::Allow);
        assert_eq!(decide(&set, "delete_user"), Decision::Deny(DenyReason::NotHeld));
    }

    #[test]
    fn test_decide_empty_set_denies() {
        assert_eq!(decide(&[], "create_user"), Decision::Deny(DenyReason::NoPrivileges));
        assert_eq!(decide(&[], ""), Decision::Deny(DenyReason::NoPrivileges));
    }

    #[test]
    fn test_decide_is_exact_match() {
        let set = held(&["create_user"]);
        assert!(!decide(&set, "create").is_allowed());
        assert!(!decide(&set, "CREATE_USER").is_allowed());
        assert!(!decide(&set, "create_user ").is_allowed());
    }

    #[test]
    fn test_privilege_names_are_unique() {
        let names: HashSet<_> = privilege::ALL.iter().map(|(name, _)| *name).collect();
        assert_eq!(names.len(), privilege::ALL.len());
        assert_eq!(<privilege::CreateUser as Privilege>::NAME, "create_user");
        assert_eq!(<privilege::DeletePriv as Privilege>::NAME, "delete_priv");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_authorize_admin_scenario(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let admin = Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                name: "admin".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let create_user = Privileges::new(&mut conn)
            .create(&PrivilegeCreateDBRequest {
                name: "create_user".to_string(),
                description: None,
            })
            .await
            .unwrap();
        Roles::new(&mut conn).grant_privilege(admin.id, create_user.id).await.unwrap();

        assert_eq!(authorize(&mut conn, Some(admin.id), "create_user").await, Decision::Allow);
        assert_eq!(
            authorize(&mut conn, Some(admin.id), "delete_user").await,
            Decision::Deny(DenyReason::NotHeld)
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_authorize_denies_without_role_or_privileges(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let empty = Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                name: "empty".to_string(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(
            authorize(&mut conn, None, "create_user").await,
            Decision::Deny(DenyReason::NoRole)
        );
        assert_eq!(
            authorize(&mut conn, Some(empty.id), "create_user").await,
            Decision::Deny(DenyReason::NoPrivileges)
        );
        // A role id that resolves to nothing is indistinguishable from an empty role
        assert_eq!(
            authorize(&mut conn, Some(empty.id + 1000), "create_user").await,
            Decision::Deny(DenyReason::NoPrivileges)
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_authorize_fails_closed_on_store_error(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        sqlx::query("DROP TABLE role_privileges").execute(&mut *conn).await.unwrap();

        assert_eq!(
            authorize(&mut conn, Some(1), "create_user").await,
            Decision::Deny(DenyReason::LookupFailed)
        );
    }
}

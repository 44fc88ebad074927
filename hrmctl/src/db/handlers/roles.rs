//! Database repository for roles and their privilege associations.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::{
            privileges::PrivilegeDBResponse,
            roles::{RoleCreateDBRequest, RoleDBResponse, RoleUpdateDBRequest},
        },
    },
    types::{PrivilegeId, RoleId},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Roles<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Roles<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Roles<'c> {
    type CreateRequest = RoleCreateDBRequest;
    type UpdateRequest = RoleUpdateDBRequest;
    type Response = RoleDBResponse;
    type Id = RoleId;

    #[instrument(skip(self, request), fields(role_name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(role)
    }

    #[instrument(skip(self), fields(role_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(role)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY id",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(roles)
    }

    /// Delete a role. Refused while any user holds it or any group permits it; the role's
    /// own privilege grants go with it.
    #[instrument(skip(self), fields(role_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Foreign key checks on referencing rows take FOR KEY SHARE, so holding this lock keeps
        // the reference count below accurate until commit
        let locked: Option<RoleId> = sqlx::query_scalar("SELECT id FROM roles WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let (holders, groups): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE role_id = $1),
                (SELECT COUNT(*) FROM group_roles WHERE role_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if holders > 0 || groups > 0 {
            return Err(DbError::ProtectedEntity {
                reason: format!("role is held by {holders} user(s) and permitted by {groups} group(s)"),
                entity_type: "role".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = $1").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(role_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            UPDATE roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(role)
    }
}

impl<'c> Roles<'c> {
    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<RoleDBResponse>> {
        let role = sqlx::query_as::<_, RoleDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(role)
    }

    /// Attach a privilege to a role. A duplicate grant surfaces as a unique violation on
    /// `role_privileges`.
    #[instrument(skip(self), fields(role_id = role_id, privilege_id = privilege_id), err)]
    pub async fn grant_privilege(&mut self, role_id: RoleId, privilege_id: PrivilegeId) -> Result<()> {
        let result = sqlx::query("INSERT INTO role_privileges (role_id, privilege_id) VALUES ($1, $2)")
            .bind(role_id)
            .bind(privilege_id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Other(anyhow::anyhow!(
                "granting privilege {privilege_id} to role {role_id} inserted no rows"
            )));
        }
        Ok(())
    }

    /// Detach a privilege from a role. Returns whether a grant existed.
    #[instrument(skip(self), fields(role_id = role_id, privilege_id = privilege_id), err)]
    pub async fn revoke_privilege(&mut self, role_id: RoleId, privilege_id: PrivilegeId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM role_privileges WHERE role_id = $1 AND privilege_id = $2")
            .bind(role_id)
            .bind(privilege_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// The effective privilege set of a role: every privilege name reachable through
    /// `role_privileges`.
    #[instrument(skip(self), fields(role_id = role_id), err)]
    pub async fn privilege_names(&mut self, role_id: RoleId) -> Result<Vec<String>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.name
            FROM privileges p
            INNER JOIN role_privileges rp ON rp.privilege_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(names)
    }

    #[instrument(skip(self), fields(role_id = role_id), err)]
    pub async fn list_privileges(&mut self, role_id: RoleId) -> Result<Vec<PrivilegeDBResponse>> {
        let privileges = sqlx::query_as::<_, PrivilegeDBResponse>(
            r#"
            SELECT p.id, p.name, p.description, p.created_at, p.updated_at
            FROM privileges p
            INNER JOIN role_privileges rp ON rp.privilege_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(privileges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Groups, Privileges, Users};
    use crate::db::models::{
        groups::GroupCreateDBRequest, privileges::PrivilegeCreateDBRequest, users::UserCreateDBRequest,
    };
    use sqlx::PgPool;

    fn role(name: &str) -> RoleCreateDBRequest {
        RoleCreateDBRequest {
            name: name.to_string(),
            description: Some(format!("{name} role")),
        }
    }

    fn privilege(name: &str) -> PrivilegeCreateDBRequest {
        PrivilegeCreateDBRequest {
            name: name.to_string(),
            description: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_duplicate_role(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Roles::new(&mut conn);

        let admin = repo.create(&role("admin")).await.unwrap();
        assert_eq!(admin.description.as_deref(), Some("admin role"));

        let err = repo.create(&role("admin")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
        assert_eq!(repo.list().await.unwrap().len(), 1);
        assert_eq!(repo.get_by_name("admin").await.unwrap().unwrap().id, admin.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_grant_and_resolve_privileges(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let create_user = Privileges::new(&mut conn).create(&privilege("create_user")).await.unwrap();
        let delete_user = Privileges::new(&mut conn).create(&privilege("delete_user")).await.unwrap();

        let mut repo = Roles::new(&mut conn);
        let admin = repo.create(&role("admin")).await.unwrap();
        let empty = repo.create(&role("empty")).await.unwrap();

        repo.grant_privilege(admin.id, create_user.id).await.unwrap();
        assert_eq!(repo.privilege_names(admin.id).await.unwrap(), vec!["create_user"]);
        assert!(repo.privilege_names(empty.id).await.unwrap().is_empty());

        let err = repo.grant_privilege(admin.id, create_user.id).await.unwrap_err();
        assert!(
            matches!(err, DbError::UniqueViolation { ref table, .. } if table.as_deref() == Some("role_privileges"))
        );

        // Revoking something never granted is a no-op
        assert!(!repo.revoke_privilege(admin.id, delete_user.id).await.unwrap());
        assert!(repo.revoke_privilege(admin.id, create_user.id).await.unwrap());
        assert!(repo.list_privileges(admin.id).await.unwrap().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_role_held_by_user_is_refused(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let dev = Roles::new(&mut conn).create(&role("dev")).await.unwrap();
        let mut users = Users::new(&mut conn);
        let user = users
            .create(&UserCreateDBRequest {
                username: "ada".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Ada".to_string(),
                middle_name: None,
                last_name: "Lovelace".to_string(),
            })
            .await
            .unwrap();
        users.set_role(user.id, Some(dev.id)).await.unwrap();

        let err = Roles::new(&mut conn).delete(dev.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));
        assert!(Roles::new(&mut conn).get_by_id(dev.id).await.unwrap().is_some());

        Users::new(&mut conn).set_role(user.id, None).await.unwrap();
        assert!(Roles::new(&mut conn).delete(dev.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_role_permitted_by_group_is_refused(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let dev = Roles::new(&mut conn).create(&role("dev")).await.unwrap();
        let eng = Groups::new(&mut conn)
            .create(&GroupCreateDBRequest {
                name: "eng".to_string(),
                description: None,
            })
            .await
            .unwrap();
        Groups::new(&mut conn).add_role(eng.id, dev.id).await.unwrap();

        let err = Roles::new(&mut conn).delete(dev.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_role_drops_its_grants(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let create_user = Privileges::new(&mut conn).create(&privilege("create_user")).await.unwrap();
        let mut repo = Roles::new(&mut conn);
        let admin = repo.create(&role("admin")).await.unwrap();
        repo.grant_privilege(admin.id, create_user.id).await.unwrap();

        assert!(repo.delete(admin.id).await.unwrap());
        assert!(!repo.delete(admin.id).await.unwrap());
        // The privilege itself survives
        assert!(Privileges::new(&mut conn).get_by_id(create_user.id).await.unwrap().is_some());
    }
}

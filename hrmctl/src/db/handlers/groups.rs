//! Database repository for groups and the roles they permit.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::{
            groups::{GroupCreateDBRequest, GroupDBResponse, GroupUpdateDBRequest},
            roles::RoleDBResponse,
        },
    },
    types::{GroupId, RoleId},
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Groups<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Groups<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Groups<'c> {
    type CreateRequest = GroupCreateDBRequest;
    type UpdateRequest = GroupUpdateDBRequest;
    type Response = GroupDBResponse;
    type Id = GroupId;

    #[instrument(skip(self, request), fields(group_name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            INSERT INTO groups (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(group)
    }

    #[instrument(skip(self), fields(group_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM groups WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(group)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let groups = sqlx::query_as::<_, GroupDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM groups ORDER BY id",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(groups)
    }

    /// Delete a group. Refused while it has members; its role permissions go with it.
    #[instrument(skip(self), fields(group_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Foreign key checks on referencing rows take FOR KEY SHARE, so holding this lock keeps
        // the reference count below accurate until commit
        let locked: Option<GroupId> = sqlx::query_scalar("SELECT id FROM groups WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let members: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE group_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if members > 0 {
            return Err(DbError::ProtectedEntity {
                reason: format!("group has {members} member(s)"),
                entity_type: "group".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM groups WHERE id = $1").bind(id).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(group_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            r#"
            UPDATE groups SET
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

        Ok(group)
    }
}

impl<'c> Groups<'c> {
    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<GroupDBResponse>> {
        let group = sqlx::query_as::<_, GroupDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM groups WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(group)
    }

    /// Permit a role within a group. A duplicate surfaces as a unique violation on
    /// `group_roles`.
    #[instrument(skip(self), fields(group_id = group_id, role_id = role_id), err)]
    pub async fn add_role(&mut self, group_id: GroupId, role_id: RoleId) -> Result<()> {
        let result = sqlx::query("INSERT INTO group_roles (group_id, role_id) VALUES ($1, $2)")
            .bind(group_id)
            .bind(role_id)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::Other(anyhow::anyhow!(
                "adding role {role_id} to group {group_id} inserted no rows"
            )));
        }
        Ok(())
    }

    /// Withdraw a role from a group. Returns whether it was permitted.
    #[instrument(skip(self), fields(group_id = group_id, role_id = role_id), err)]
    pub async fn remove_role(&mut self, group_id: GroupId, role_id: RoleId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM group_roles WHERE group_id = $1 AND role_id = $2")
            .bind(group_id)
            .bind(role_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(group_id = group_id), err)]
    pub async fn list_roles(&mut self, group_id: GroupId) -> Result<Vec<RoleDBResponse>> {
        let roles = sqlx::query_as::<_, RoleDBResponse>(
            r#"
            SELECT r.id, r.name, r.description, r.created_at, r.updated_at
            FROM roles r
            INNER JOIN group_roles gr ON gr.role_id = r.id
            WHERE gr.group_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Roles, Users};
    use crate::db::models::{roles::RoleCreateDBRequest, users::UserCreateDBRequest};
    use sqlx::PgPool;

    fn group(name: &str) -> GroupCreateDBRequest {
        GroupCreateDBRequest {
            name: name.to_string(),
            description: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_update_group(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Groups::new(&mut conn);

        let eng = repo.create(&group("eng")).await.unwrap();
        let updated = repo
            .update(
                eng.id,
                &GroupUpdateDBRequest {
                    description: Some("Engineering".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "eng");
        assert_eq!(updated.description.as_deref(), Some("Engineering"));

        repo.create(&group("ops")).await.unwrap();
        let err = repo
            .update(
                eng.id,
                &GroupUpdateDBRequest {
                    name: Some("ops".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_group_with_members_is_refused(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let eng = Groups::new(&mut conn).create(&group("eng")).await.unwrap();
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
        users.set_group(user.id, Some(eng.id)).await.unwrap();

        let err = Groups::new(&mut conn).delete(eng.id).await.unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { ref entity_type, .. } if entity_type == "group"));

        // Group and member are untouched
        assert!(Groups::new(&mut conn).get_by_id(eng.id).await.unwrap().is_some());
        let member = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(member.group_id, Some(eng.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_group_racing_a_new_member_is_refused(pool: PgPool) {
        let (eng, user) = {
            let mut conn = pool.acquire().await.unwrap();
            let eng = Groups::new(&mut conn).create(&group("eng")).await.unwrap();
            let user = Users::new(&mut conn)
                .create(&UserCreateDBRequest {
                    username: "ada".to_string(),
                    password_hash: "hash".to_string(),
                    first_name: "Ada".to_string(),
                    middle_name: None,
                    last_name: "Lovelace".to_string(),
                })
                .await
                .unwrap();
            (eng, user)
        };

        // Membership is written but not yet committed when the delete starts
        let mut joining = pool.begin().await.unwrap();
        Users::new(&mut joining).set_group(user.id, Some(eng.id)).await.unwrap();

        let delete = tokio::spawn({
            let pool = pool.clone();
            async move {
                let mut conn = pool.acquire().await.unwrap();
                Groups::new(&mut conn).delete(eng.id).await
            }
        });
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        joining.commit().await.unwrap();

        let err = delete.await.unwrap().unwrap_err();
        assert!(matches!(err, DbError::ProtectedEntity { ref entity_type, .. } if entity_type == "group"));

        let mut conn = pool.acquire().await.unwrap();
        let member = Users::new(&mut conn).get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(member.group_id, Some(eng.id));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_group_roles(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let dev = Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                name: "dev".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let mut repo = Groups::new(&mut conn);
        let eng = repo.create(&group("eng")).await.unwrap();

        repo.add_role(eng.id, dev.id).await.unwrap();
        let err = repo.add_role(eng.id, dev.id).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref table, .. } if table.as_deref() == Some("group_roles")));

        let roles = repo.list_roles(eng.id).await.unwrap();
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].name, "dev");

        assert!(repo.remove_role(eng.id, dev.id).await.unwrap());
        assert!(!repo.remove_role(eng.id, dev.id).await.unwrap());

        // Empty group deletes cleanly
        repo.add_role(eng.id, dev.id).await.unwrap();
        assert!(repo.delete(eng.id).await.unwrap());
        assert!(!repo.delete(eng.id).await.unwrap());
    }
}

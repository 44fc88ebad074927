//! Database repository for users.
//!
//! Role and group membership are scalar columns on the user row, so assigning or revoking
//! either is an update of that row rather than an association insert.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::users::{UserCreateDBRequest, UserCredentials, UserDBResponse, UserUpdateDBRequest},
    },
    types::{GroupId, RoleId, UserId},
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type UpdateRequest = UserUpdateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            INSERT INTO users (username, password_hash, first_name, middle_name, last_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            "#,
        )
        .bind(&request.username)
        .bind(&request.password_hash)
        .bind(&request.first_name)
        .bind(request.middle_name.is_some())
        .bind(request.middle_name.as_ref().and_then(|inner| inner.as_deref()))
        .bind(&request.last_name)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users)
    }

    #[instrument(skip(self), fields(user_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(user_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                middle_name = CASE
                    WHEN $3 THEN $4
                    ELSE middle_name
                END,
                last_name = COALESCE($5, last_name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(request.middle_name.is_some())
        .bind(request.middle_name.as_ref().and_then(|inner| inner.as_deref()))
        .bind(&request.last_name)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }
}

impl<'c> Users<'c> {
    /// Look up the stored hash and role for a username
    #[instrument(skip(self, username), err)]
    pub async fn get_credentials(&mut self, username: &str) -> Result<Option<UserCredentials>> {
        let credentials = sqlx::query_as::<_, UserCredentials>(
            "SELECT id, username, password_hash, role_id FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(credentials)
    }

    /// Replace a user's password hash
    #[instrument(skip(self, password_hash), fields(user_id = id), err)]
    pub async fn update_password(&mut self, id: UserId, password_hash: &str) -> Result<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&mut *self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Set or clear a user's role
    #[instrument(skip(self), fields(user_id = id), err)]
    pub async fn set_role(&mut self, id: UserId, role_id: Option<RoleId>) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET role_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(role_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    /// Set or clear a user's group
    #[instrument(skip(self), fields(user_id = id), err)]
    pub async fn set_group(&mut self, id: UserId, group_id: Option<GroupId>) -> Result<UserDBResponse> {
        let user = sqlx::query_as::<_, UserDBResponse>(
            r#"
            UPDATE users SET group_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(group_id)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(user)
    }

    /// Whether the user's group lists the role among its permitted roles. A user with no
    /// group is permitted nothing.
    #[instrument(skip(self), fields(user_id = id, role_id = role_id), err)]
    pub async fn group_permits_role(&mut self, id: UserId, role_id: RoleId) -> Result<bool> {
        let permitted: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM users u
                INNER JOIN group_roles gr ON gr.group_id = u.group_id
                WHERE u.id = $1 AND gr.role_id = $2
            )
            "#,
        )
        .bind(id)
        .bind(role_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(permitted)
    }

    /// Members of a group in insertion order
    #[instrument(skip(self), fields(group_id = group_id), err)]
    pub async fn list_by_group(&mut self, group_id: GroupId) -> Result<Vec<UserDBResponse>> {
        let users = sqlx::query_as::<_, UserDBResponse>(
            r#"
            SELECT id, username, first_name, middle_name, last_name, role_id, group_id, created_at, updated_at
            FROM users
            WHERE group_id = $1
            ORDER BY id
            "#,
        )
        .bind(group_id)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(users)
    }

    /// Detach every member of a group, returning how many users were detached
    #[instrument(skip(self), fields(group_id = group_id), err)]
    pub async fn detach_all_from_group(&mut self, group_id: GroupId) -> Result<u64> {
        let result = sqlx::query("UPDATE users SET group_id = NULL, updated_at = NOW() WHERE group_id = $1")
            .bind(group_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Groups, Roles};
    use crate::db::models::{groups::GroupCreateDBRequest, roles::RoleCreateDBRequest};
    use sqlx::PgPool;

    fn user_request(username: &str) -> UserCreateDBRequest {
        UserCreateDBRequest {
            username: username.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$aGFzaGhhc2g".to_string(),
            first_name: "Ada".to_string(),
            middle_name: None,
            last_name: "Lovelace".to_string(),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&user_request("ada")).await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.role_id, None);
        assert_eq!(user.group_id, None);

        let fetched = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "ada");
        assert!(repo.get_by_id(user.id + 1000).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_is_unique_violation(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        repo.create(&user_request("ada")).await.unwrap();
        let err = repo.create(&user_request("ada")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref table, .. } if table.as_deref() == Some("users")));

        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_is_insertion_ordered(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        assert!(repo.list().await.unwrap().is_empty());
        for name in ["zed", "amy", "mo"] {
            repo.create(&user_request(name)).await.unwrap();
        }
        let names: Vec<_> = repo.list().await.unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["zed", "amy", "mo"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_user_fields_and_missing_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&user_request("ada")).await.unwrap();
        let updated = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    middle_name: Some(Some("King".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Ada");
        assert_eq!(updated.middle_name.as_deref(), Some("King"));

        // An absent middle name is kept, an explicit None clears it
        let kept = repo.update(user.id, &UserUpdateDBRequest::default()).await.unwrap();
        assert_eq!(kept.middle_name.as_deref(), Some("King"));
        let cleared = repo
            .update(
                user.id,
                &UserUpdateDBRequest {
                    middle_name: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.middle_name, None);
        assert_eq!(cleared.last_name, "Lovelace");

        let err = repo.update(user.id + 1000, &UserUpdateDBRequest::default()).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_password(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&user_request("ada")).await.unwrap();
        repo.update_password(user.id, "new-hash").await.unwrap();
        let credentials = repo.get_credentials("ada").await.unwrap().unwrap();
        assert_eq!(credentials.password_hash, "new-hash");

        assert!(matches!(repo.update_password(user.id + 1000, "x").await, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Users::new(&mut conn);

        let user = repo.create(&user_request("ada")).await.unwrap();
        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_group_permits_role(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let dev = Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                name: "dev".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let admin = Roles::new(&mut conn)
            .create(&RoleCreateDBRequest {
                name: "admin".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let mut groups = Groups::new(&mut conn);
        let eng = groups
            .create(&GroupCreateDBRequest {
                name: "eng".to_string(),
                description: None,
            })
            .await
            .unwrap();
        groups.add_role(eng.id, dev.id).await.unwrap();

        let mut users = Users::new(&mut conn);
        let user = users.create(&user_request("ada")).await.unwrap();

        // No group yet, so nothing is permitted
        assert!(!users.group_permits_role(user.id, dev.id).await.unwrap());

        users.set_group(user.id, Some(eng.id)).await.unwrap();
        assert!(users.group_permits_role(user.id, dev.id).await.unwrap());
        assert!(!users.group_permits_role(user.id, admin.id).await.unwrap());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_detach_all_from_group_keeps_users(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();

        let eng = Groups::new(&mut conn)
            .create(&GroupCreateDBRequest {
                name: "eng".to_string(),
                description: None,
            })
            .await
            .unwrap();
        let mut users = Users::new(&mut conn);
        for name in ["ada", "grace"] {
            let user = users.create(&user_request(name)).await.unwrap();
            users.set_group(user.id, Some(eng.id)).await.unwrap();
        }
        assert_eq!(users.list_by_group(eng.id).await.unwrap().len(), 2);

        assert_eq!(users.detach_all_from_group(eng.id).await.unwrap(), 2);
        assert!(users.list_by_group(eng.id).await.unwrap().is_empty());
        assert_eq!(users.list().await.unwrap().len(), 2);
    }
}

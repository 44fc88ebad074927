//! Database repository for privileges.

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::privileges::{PrivilegeCreateDBRequest, PrivilegeDBResponse, PrivilegeUpdateDBRequest},
    },
    types::PrivilegeId,
};
use sqlx::{Connection, PgConnection};
use tracing::instrument;

pub struct Privileges<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Privileges<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Privileges<'c> {
    type CreateRequest = PrivilegeCreateDBRequest;
    type UpdateRequest = PrivilegeUpdateDBRequest;
    type Response = PrivilegeDBResponse;
    type Id = PrivilegeId;

    #[instrument(skip(self, request), fields(privilege_name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let privilege = sqlx::query_as::<_, PrivilegeDBResponse>(
            r#"
            INSERT INTO privileges (name, description)
            VALUES ($1, $2)
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(privilege)
    }

    #[instrument(skip(self), fields(privilege_id = id), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let privilege = sqlx::query_as::<_, PrivilegeDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM privileges WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(privilege)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let privileges = sqlx::query_as::<_, PrivilegeDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM privileges ORDER BY id",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(privileges)
    }

    /// Delete a privilege. Refused while any role holds it.
    #[instrument(skip(self), fields(privilege_id = id), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        // Foreign key checks on referencing rows take FOR KEY SHARE, so holding this lock keeps
        // the reference count below accurate until commit
        let locked: Option<PrivilegeId> = sqlx::query_scalar("SELECT id FROM privileges WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Ok(false);
        }

        let holders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM role_privileges WHERE privilege_id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if holders > 0 {
            return Err(DbError::ProtectedEntity {
                reason: format!("privilege is held by {holders} role(s)"),
                entity_type: "privilege".to_string(),
                entity_id: Some(id.to_string()),
            });
        }

        let result = sqlx::query("DELETE FROM privileges WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(privilege_id = id), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let privilege = sqlx::query_as::<_, PrivilegeDBResponse>(
            r#"
            UPDATE privileges SET
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

        Ok(privilege)
    }
}

impl<'c> Privileges<'c> {
    #[instrument(skip(self), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<PrivilegeDBResponse>> {
        let privilege = sqlx::query_as::<_, PrivilegeDBResponse>(
            "SELECT id, name, description, created_at, updated_at FROM privileges WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(privilege)
    }

    /// Insert a privilege if no privilege with that name exists, returning the stored row
    /// either way. Existing descriptions are left alone.
    #[instrument(skip(self, request), fields(privilege_name = %request.name), err)]
    pub async fn ensure(&mut self, request: &PrivilegeCreateDBRequest) -> Result<PrivilegeDBResponse> {
        let privilege = sqlx::query_as::<_, PrivilegeDBResponse>(
            r#"
            INSERT INTO privileges (name, description)
            VALUES ($1, $2)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, description, created_at, updated_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(privilege)
    }
}

use crate::api::handlers::{name_not_found, not_found, or_not_found};
use crate::api::models::{
    MessageResponse, require_non_blank,
    privileges::PrivilegeResponse,
    roles::{RoleCreate, RolePrivilegeGrant, RoleResponse, RoleUpdate},
};
use crate::auth::permissions::{RequiresPrivilege, privilege};
use crate::db::handlers::{Privileges, Repository, Roles};
use crate::db::models::roles::{RoleCreateDBRequest, RoleUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::{
    AppState,
    types::{PrivilegeId, RoleId},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    post,
    path = "/newrole",
    tag = "roles",
    summary = "Create role",
    request_body = RoleCreate,
    responses(
        (status = 201, description = "Role created", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks create_role", body = MessageResponse),
        (status = 409, description = "Role name already taken", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::CreateRole>,
    Json(create): Json<RoleCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    create.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut pool_conn)
        .create(&RoleCreateDBRequest {
            name: create.name,
            description: create.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::created(format!("Role '{}' created", role.name), role.id)),
    ))
}

#[utoipa::path(
    get,
    path = "/roles",
    tag = "roles",
    summary = "List roles",
    responses(
        (status = 200, description = "Every role, in creation order", body = Vec<RoleResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_all_roles", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_roles(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadAllRoles>,
) -> Result<Json<Vec<RoleResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let roles = Roles::new(&mut pool_conn).list().await?;

    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Get role",
    responses(
        (status = 200, description = "Role details", body = RoleResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_role", body = MessageResponse),
        (status = 404, description = "Role not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Role ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneRole>,
    Path(id): Path<RoleId>,
) -> Result<Json<RoleResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Role", id))?;

    Ok(Json(RoleResponse::from(role)))
}

#[utoipa::path(
    put,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Update role",
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role updated", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks modify_role", body = MessageResponse),
        (status = 404, description = "Role not found", body = MessageResponse),
        (status = 409, description = "Role name already taken", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Role ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ModifyRole>,
    Path(id): Path<RoleId>,
    Json(update): Json<RoleUpdate>,
) -> Result<Json<MessageResponse>> {
    update.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let role = Roles::new(&mut pool_conn)
        .update(
            id,
            &RoleUpdateDBRequest {
                name: update.name,
                description: update.description,
            },
        )
        .await
        .map_err(or_not_found("Role", id))?;

    Ok(Json(MessageResponse::ok(format!("Role '{}' updated", role.name))))
}

/// Delete a role. Refused while any user holds it or any group permits it.
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    tag = "roles",
    summary = "Delete role",
    responses(
        (status = 200, description = "Role deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks delete_role", body = MessageResponse),
        (status = 404, description = "Role not found", body = MessageResponse),
        (status = 409, description = "Role still in use", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Role ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::DeleteRole>,
    Path(id): Path<RoleId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Roles::new(&mut pool_conn).delete(id).await? {
        Ok(Json(MessageResponse::ok("Role deleted")))
    } else {
        Err(not_found("Role", id))
    }
}

#[utoipa::path(
    get,
    path = "/roles/{id}/privileges",
    tag = "roles",
    summary = "List role privileges",
    responses(
        (status = 200, description = "Privileges the role holds", body = Vec<PrivilegeResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_role", body = MessageResponse),
        (status = 404, description = "Role not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Role ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_role_privileges(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneRole>,
    Path(id): Path<RoleId>,
) -> Result<Json<Vec<PrivilegeResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut roles = Roles::new(&mut pool_conn);

    roles.get_by_id(id).await?.ok_or_else(|| not_found("Role", id))?;
    let privileges = roles.list_privileges(id).await?;

    Ok(Json(privileges.into_iter().map(PrivilegeResponse::from).collect()))
}

/// Attach a privilege to a role, by name
#[utoipa::path(
    post,
    path = "/roles/{id}/privileges",
    tag = "roles",
    summary = "Add privilege to role",
    request_body = RolePrivilegeGrant,
    responses(
        (status = 201, description = "Privilege added", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks grant_role_privilege", body = MessageResponse),
        (status = 404, description = "Role or privilege not found", body = MessageResponse),
        (status = 409, description = "Role already holds the privilege", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Role ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn grant_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::GrantRolePrivilege>,
    Path(id): Path<RoleId>,
    Json(grant): Json<RolePrivilegeGrant>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    require_non_blank("privilege_name", &grant.privilege_name)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let privilege = Privileges::new(&mut tx)
        .get_by_name(&grant.privilege_name)
        .await?
        .ok_or_else(|| name_not_found("Privilege", &grant.privilege_name))?;

    let mut roles = Roles::new(&mut tx);
    let role = roles.get_by_id(id).await?.ok_or_else(|| not_found("Role", id))?;
    roles.grant_privilege(role.id, privilege.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok(format!(
            "Privilege '{}' added to role '{}'",
            privilege.name, role.name
        ))),
    ))
}

/// Detach a privilege from a role. Succeeds when the role doesn't hold it.
#[utoipa::path(
    delete,
    path = "/roles/{id}/privileges/{privilege_id}",
    tag = "roles",
    summary = "Remove privilege from role",
    responses(
        (status = 200, description = "Privilege removed", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks revoke_role_privilege", body = MessageResponse),
    ),
    params(
        ("id" = i64, Path, description = "Role ID"),
        ("privilege_id" = i64, Path, description = "Privilege ID"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::RevokeRolePrivilege>,
    Path((id, privilege_id)): Path<(RoleId, PrivilegeId)>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let removed = Roles::new(&mut pool_conn).revoke_privilege(id, privilege_id).await?;
    tracing::debug!(role_id = id, privilege_id, removed, "Revoked role privilege");

    Ok(Json(MessageResponse::ok("Privilege removed from role")))
}

#[cfg(test)]
mod tests {
    use crate::api::models::{MessageResponse, privileges::PrivilegeResponse, roles::RoleResponse};
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_role_crud(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_, token) = create_test_caller(
            &pool,
            &["create_role", "read_all_roles", "read_one_role", "modify_role", "delete_role"],
        )
        .await;

        let response = app
            .post("/newrole")
            .add_header("Token", &token)
            .json(&json!({"name": "dev", "description": "Developers"}))
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: MessageResponse = response.json();
        let id = created.id.unwrap();

        let response = app
            .post("/newrole")
            .add_header("Token", &token)
            .json(&json!({"name": "dev"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Role 'dev' already exists");

        app.post("/newrole")
            .add_header("Token", &token)
            .json(&json!({"name": " "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        app.put(&format!("/roles/{id}"))
            .add_header("Token", &token)
            .json(&json!({"description": "Engineers"}))
            .await
            .assert_status_ok();

        let role: RoleResponse = app.get(&format!("/roles/{id}")).add_header("Token", &token).await.json();
        assert_eq!(role.name, "dev");
        assert_eq!(role.description.as_deref(), Some("Engineers"));

        let roles: Vec<RoleResponse> = app.get("/roles").add_header("Token", &token).await.json();
        assert!(roles.iter().any(|r| r.id == id));

        app.delete(&format!("/roles/{id}"))
            .add_header("Token", &token)
            .await
            .assert_status_ok();
        app.get(&format!("/roles/{id}"))
            .add_header("Token", &token)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_role_in_use_conflicts(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_, token) = create_test_caller(&pool, &["delete_role"]).await;
        let dev = create_test_role(&pool, "dev", &[]).await;
        create_test_user(&pool, "ada", Some(dev.id)).await;

        let response = app.delete(&format!("/roles/{}", dev.id)).add_header("Token", &token).await;
        response.assert_status(StatusCode::CONFLICT);
        let body: MessageResponse = response.json();
        assert!(body.error);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_role_privileges(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_, token) = create_test_caller(
            &pool,
            &["grant_role_privilege", "revoke_role_privilege", "read_one_role"],
        )
        .await;
        let dev = create_test_role(&pool, "dev", &[]).await;

        let response = app
            .post(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &token)
            .json(&json!({"privilege_name": "read_all_users"}))
            .await;
        response.assert_status(StatusCode::CREATED);

        let response = app
            .post(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &token)
            .json(&json!({"privilege_name": "read_all_users"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: MessageResponse = response.json();
        assert_eq!(body.message, "Privilege already assigned to role");

        app.post(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &token)
            .json(&json!({"privilege_name": "fly"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        app.post("/roles/999999/privileges")
            .add_header("Token", &token)
            .json(&json!({"privilege_name": "read_all_users"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let held: Vec<PrivilegeResponse> = app
            .get(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &token)
            .await
            .json();
        assert_eq!(held.len(), 1);
        assert_eq!(held[0].name, "read_all_users");

        for _ in 0..2 {
            app.delete(&format!("/roles/{}/privileges/{}", dev.id, held[0].id))
                .add_header("Token", &token)
                .await
                .assert_status_ok();
        }

        let held: Vec<PrivilegeResponse> = app
            .get(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &token)
            .await
            .json();
        assert!(held.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_granted_privilege_takes_effect_immediately(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (_, admin_token) = create_test_caller(&pool, &["grant_role_privilege"]).await;
        let dev = create_test_role(&pool, "dev", &["read_one_role"]).await;
        let user = create_test_user(&pool, "ada", Some(dev.id)).await;
        let token = token_for(&user);

        app.get("/roles").add_header("Token", &token).await.assert_status(StatusCode::FORBIDDEN);

        app.post(&format!("/roles/{}/privileges", dev.id))
            .add_header("Token", &admin_token)
            .json(&json!({"privilege_name": "read_all_roles"}))
            .await
            .assert_status(StatusCode::CREATED);

        app.get("/roles").add_header("Token", &token).await.assert_status_ok();
    }
}

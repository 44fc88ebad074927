use crate::api::handlers::{not_found, or_not_found};
use crate::api::models::{
    MessageResponse,
    privileges::{PrivilegeCreate, PrivilegeResponse, PrivilegeUpdate},
};
use crate::auth::permissions::{RequiresPrivilege, privilege};
use crate::db::handlers::{Privileges, Repository};
use crate::db::models::privileges::{PrivilegeCreateDBRequest, PrivilegeUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::{AppState, types::PrivilegeId};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    post,
    path = "/newpriv",
    tag = "privileges",
    summary = "Create privilege",
    request_body = PrivilegeCreate,
    responses(
        (status = 201, description = "Privilege created", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks add_privilege", body = MessageResponse),
        (status = 409, description = "Privilege name already taken", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::AddPrivilege>,
    Json(create): Json<PrivilegeCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    create.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let privilege = Privileges::new(&mut pool_conn)
        .create(&PrivilegeCreateDBRequest {
            name: create.name,
            description: create.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::created(
            format!("Privilege '{}' created", privilege.name),
            privilege.id,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/privs",
    tag = "privileges",
    summary = "List privileges",
    responses(
        (status = 200, description = "Every privilege, in creation order", body = Vec<PrivilegeResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_all_privs", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_privileges(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadAllPrivs>,
) -> Result<Json<Vec<PrivilegeResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let privileges = Privileges::new(&mut pool_conn).list().await?;

    Ok(Json(privileges.into_iter().map(PrivilegeResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/privs/{id}",
    tag = "privileges",
    summary = "Get privilege",
    responses(
        (status = 200, description = "Privilege details", body = PrivilegeResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_priv", body = MessageResponse),
        (status = 404, description = "Privilege not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Privilege ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOnePriv>,
    Path(id): Path<PrivilegeId>,
) -> Result<Json<PrivilegeResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let privilege = Privileges::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Privilege", id))?;

    Ok(Json(PrivilegeResponse::from(privilege)))
}

/// Rename or redescribe a privilege. Routes are gated by name, so renaming a built-in
/// privilege locks out its holders until it is renamed back.
#[utoipa::path(
    put,
    path = "/privs/{id}",
    tag = "privileges",
    summary = "Update privilege",
    request_body = PrivilegeUpdate,
    responses(
        (status = 200, description = "Privilege updated", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks modify_priv", body = MessageResponse),
        (status = 404, description = "Privilege not found", body = MessageResponse),
        (status = 409, description = "Privilege name already taken", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Privilege ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ModifyPriv>,
    Path(id): Path<PrivilegeId>,
    Json(update): Json<PrivilegeUpdate>,
) -> Result<Json<MessageResponse>> {
    update.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let privilege = Privileges::new(&mut pool_conn)
        .update(
            id,
            &PrivilegeUpdateDBRequest {
                name: update.name,
                description: update.description,
            },
        )
        .await
        .map_err(or_not_found("Privilege", id))?;

    Ok(Json(MessageResponse::ok(format!("Privilege '{}' updated", privilege.name))))
}

/// Delete a privilege. Refused while any role holds it.
#[utoipa::path(
    delete,
    path = "/privs/{id}",
    tag = "privileges",
    summary = "Delete privilege",
    responses(
        (status = 200, description = "Privilege deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks delete_priv", body = MessageResponse),
        (status = 404, description = "Privilege not found", body = MessageResponse),
        (status = 409, description = "Privilege still held by a role", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Privilege ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_privilege(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::DeletePriv>,
    Path(id): Path<PrivilegeId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Privileges::new(&mut pool_conn).delete(id).await? {
        Ok(Json(MessageResponse::ok("Privilege deleted")))
    } else {
        Err(not_found("Privilege", id))
    }
}

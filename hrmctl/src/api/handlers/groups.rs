use crate::api::handlers::{name_not_found, not_found, or_not_found};
use crate::api::models::{
    MessageResponse, require_non_blank,
    groups::{GroupCreate, GroupResponse, GroupRoleAssign, GroupUpdate},
    roles::RoleResponse,
    users::UserResponse,
};
use crate::auth::permissions::{RequiresPrivilege, privilege};
use crate::db::handlers::{Groups, Repository, Roles, Users};
use crate::db::models::groups::{GroupCreateDBRequest, GroupUpdateDBRequest};
use crate::errors::{Error, Result};
use crate::{
    AppState,
    types::{GroupId, RoleId},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

#[utoipa::path(
    post,
    path = "/newgroup",
    tag = "groups",
    summary = "Create group",
    request_body = GroupCreate,
    responses(
        (status = 201, description = "Group created", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks create_group", body = MessageResponse),
        (status = 409, description = "Group name already taken", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::CreateGroup>,
    Json(create): Json<GroupCreate>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    create.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = Groups::new(&mut pool_conn)
        .create(&GroupCreateDBRequest {
            name: create.name,
            description: create.description,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::created(format!("Group '{}' created", group.name), group.id)),
    ))
}

#[utoipa::path(
    get,
    path = "/groups",
    tag = "groups",
    summary = "List groups",
    responses(
        (status = 200, description = "Every group, in creation order", body = Vec<GroupResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_all_groups", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_groups(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadAllGroups>,
) -> Result<Json<Vec<GroupResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let groups = Groups::new(&mut pool_conn).list().await?;

    Ok(Json(groups.into_iter().map(GroupResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Get group",
    responses(
        (status = 200, description = "Group details", body = GroupResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_group", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneGroup>,
    Path(id): Path<GroupId>,
) -> Result<Json<GroupResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = Groups::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Group", id))?;

    Ok(Json(GroupResponse::from(group)))
}

#[utoipa::path(
    put,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Update group",
    request_body = GroupUpdate,
    responses(
        (status = 200, description = "Group updated", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks modify_group", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
        (status = 409, description = "Group name already taken", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ModifyGroup>,
    Path(id): Path<GroupId>,
    Json(update): Json<GroupUpdate>,
) -> Result<Json<MessageResponse>> {
    update.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let group = Groups::new(&mut pool_conn)
        .update(
            id,
            &GroupUpdateDBRequest {
                name: update.name,
                description: update.description,
            },
        )
        .await
        .map_err(or_not_found("Group", id))?;

    Ok(Json(MessageResponse::ok(format!("Group '{}' updated", group.name))))
}

/// Delete a group. Refused while the group has members; the roles it permits are released.
#[utoipa::path(
    delete,
    path = "/groups/{id}",
    tag = "groups",
    summary = "Delete group",
    responses(
        (status = 200, description = "Group deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks delete_group", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
        (status = 409, description = "Group still has members", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::DeleteGroup>,
    Path(id): Path<GroupId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Groups::new(&mut pool_conn).delete(id).await? {
        Ok(Json(MessageResponse::ok("Group deleted")))
    } else {
        Err(not_found("Group", id))
    }
}

#[utoipa::path(
    get,
    path = "/groups/{id}/users",
    tag = "groups",
    summary = "List group members",
    responses(
        (status = 200, description = "Members of the group", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_group", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_group_users(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneGroup>,
    Path(id): Path<GroupId>,
) -> Result<Json<Vec<UserResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    Groups::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Group", id))?;
    let users = Users::new(&mut pool_conn).list_by_group(id).await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// Take every member out of the group. The users themselves are kept.
#[utoipa::path(
    delete,
    path = "/groups/{id}/users",
    tag = "groups",
    summary = "Remove all users from group",
    responses(
        (status = 200, description = "Members removed", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks remove_group_user", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_all_group_users(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::RemoveGroupUser>,
    Path(id): Path<GroupId>,
) -> Result<Json<MessageResponse>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    Groups::new(&mut tx)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("Group", id))?;
    let removed = Users::new(&mut tx).detach_all_from_group(id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::ok(format!("{removed} user(s) removed from group"))))
}

#[utoipa::path(
    get,
    path = "/groups/{id}/roles",
    tag = "groups",
    summary = "List roles permitted in group",
    responses(
        (status = 200, description = "Roles the group permits", body = Vec<RoleResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_group", body = MessageResponse),
        (status = 404, description = "Group not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_group_roles(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneGroup>,
    Path(id): Path<GroupId>,
) -> Result<Json<Vec<RoleResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut groups = Groups::new(&mut pool_conn);

    groups.get_by_id(id).await?.ok_or_else(|| not_found("Group", id))?;
    let roles = groups.list_roles(id).await?;

    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// Permit a role within a group, by name
#[utoipa::path(
    post,
    path = "/groups/{id}/roles",
    tag = "groups",
    summary = "Add role to group",
    request_body = GroupRoleAssign,
    responses(
        (status = 201, description = "Role permitted", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks assign_group_role", body = MessageResponse),
        (status = 404, description = "Group or role not found", body = MessageResponse),
        (status = 409, description = "Group already permits the role", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "Group ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn add_group_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::AssignGroupRole>,
    Path(id): Path<GroupId>,
    Json(assign): Json<GroupRoleAssign>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    require_non_blank("role_name", &assign.role_name)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let role = Roles::new(&mut tx)
        .get_by_name(&assign.role_name)
        .await?
        .ok_or_else(|| name_not_found("Role", &assign.role_name))?;

    let mut groups = Groups::new(&mut tx);
    let group = groups.get_by_id(id).await?.ok_or_else(|| not_found("Group", id))?;
    groups.add_role(group.id, role.id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok(format!(
            "Role '{}' added to group '{}'",
            role.name, group.name
        ))),
    ))
}

/// Withdraw a role from a group. Succeeds when the group doesn't permit it. Members already
/// holding the role keep it.
#[utoipa::path(
    delete,
    path = "/groups/{id}/roles/{role_id}",
    tag = "groups",
    summary = "Remove role from group",
    responses(
        (status = 200, description = "Role withdrawn", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks remove_group_role", body = MessageResponse),
    ),
    params(
        ("id" = i64, Path, description = "Group ID"),
        ("role_id" = i64, Path, description = "Role ID"),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_group_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::RemoveGroupRole>,
    Path((id, role_id)): Path<(GroupId, RoleId)>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let removed = Groups::new(&mut pool_conn).remove_role(id, role_id).await?;
    tracing::debug!(group_id = id, role_id, removed, "Removed group role");

    Ok(Json(MessageResponse::ok("Role removed from group")))
}

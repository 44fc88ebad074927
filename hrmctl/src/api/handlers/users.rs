use crate::api::handlers::{name_not_found, not_found, or_not_found};
use crate::api::models::{
    MessageResponse, require_non_blank,
    users::{PasswordChange, UserGroupAssign, UserResponse, UserRoleAssign, UserUpdate, validate_password},
};
use crate::auth::{
    current_user::AuthenticatedUser,
    password,
    permissions::{Privilege, RequiresPrivilege, authorize_user, enforce, privilege},
};
use crate::db::handlers::{Groups, Repository, Roles, Users};
use crate::db::models::users::UserUpdateDBRequest;
use crate::errors::{Error, Result};
use crate::{AppState, types::UserId};
use axum::{
    Json,
    extract::{Path, State},
};

#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    summary = "List users",
    responses(
        (status = 200, description = "Every user, in creation order", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_all_users", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadAllUsers>,
) -> Result<Json<Vec<UserResponse>>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let users = Users::new(&mut pool_conn).list().await?;

    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    summary = "Get user",
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks read_one_user", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ReadOneUser>,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .get_by_id(id)
        .await?
        .ok_or_else(|| not_found("User", id))?;

    Ok(Json(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    summary = "Update user profile",
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = MessageResponse),
        (status = 400, description = "Invalid request", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks modify_user", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::ModifyUser>,
    Path(id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<MessageResponse>> {
    update.validate()?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let request = UserUpdateDBRequest {
        first_name: update.first_name,
        middle_name: update.middle_name,
        last_name: update.last_name,
    };
    let user = Users::new(&mut pool_conn)
        .update(id, &request)
        .await
        .map_err(or_not_found("User", id))?;

    Ok(Json(MessageResponse::ok(format!("User '{}' updated", user.username))))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    summary = "Delete user",
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks delete_user", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::DeleteUser>,
    Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    if Users::new(&mut pool_conn).delete(id).await? {
        Ok(Json(MessageResponse::ok("User deleted")))
    } else {
        Err(not_found("User", id))
    }
}

/// Change a user's password. Users may always change their own by confirming the current one;
/// changing anyone else's requires `modify_user`.
#[utoipa::path(
    put,
    path = "/users/{id}/password",
    tag = "users",
    summary = "Change password",
    request_body = PasswordChange,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Password outside the allowed length, or current_password missing", body = MessageResponse),
        (status = 401, description = "Unauthorized, or current_password is incorrect", body = MessageResponse),
        (status = 403, description = "Not the caller's own account, and caller lacks modify_user", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    current_user: AuthenticatedUser,
    Path(id): Path<UserId>,
    Json(change): Json<PasswordChange>,
) -> Result<Json<MessageResponse>> {
    let password_config = &state.config.auth.password;
    validate_password(&change.password, password_config.min_length, password_config.max_length)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if current_user.id == id {
        let current_password = change.current_password.ok_or_else(|| Error::BadRequest {
            message: "current_password is required to change your own password".to_string(),
        })?;
        let credentials = Users::new(&mut pool_conn)
            .get_credentials(&current_user.username)
            .await?
            .filter(|credentials| credentials.id == id)
            .ok_or_else(|| not_found("User", id))?;
        if !password::verify_password_blocking(current_password, credentials.password_hash).await? {
            return Err(Error::Unauthenticated {
                message: Some("Current password is incorrect".to_string()),
            });
        }
    } else {
        let required = privilege::ModifyUser::NAME;
        enforce(authorize_user(&state, &current_user, required).await, &current_user, required)?;
    }

    let password_hash = password::hash_password_blocking(change.password, password_config.argon2_params()).await?;
    Users::new(&mut pool_conn)
        .update_password(id, &password_hash)
        .await
        .map_err(or_not_found("User", id))?;

    Ok(Json(MessageResponse::ok("Password changed")))
}

/// Grant a user a role, by name. The user's group must permit the role.
#[utoipa::path(
    put,
    path = "/users/{id}/role",
    tag = "users",
    summary = "Grant role to user",
    request_body = UserRoleAssign,
    responses(
        (status = 200, description = "Role granted", body = MessageResponse),
        (status = 400, description = "The user's group does not permit the role", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks grant_user_role", body = MessageResponse),
        (status = 404, description = "User or role not found", body = MessageResponse),
        (status = 409, description = "User already holds the role", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn assign_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::GrantUserRole>,
    Path(id): Path<UserId>,
    Json(assign): Json<UserRoleAssign>,
) -> Result<Json<MessageResponse>> {
    require_non_blank("role_name", &assign.role_name)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let role = Roles::new(&mut tx)
        .get_by_name(&assign.role_name)
        .await?
        .ok_or_else(|| name_not_found("Role", &assign.role_name))?;

    let mut users = Users::new(&mut tx);
    let user = users.get_by_id(id).await?.ok_or_else(|| not_found("User", id))?;

    if user.role_id == Some(role.id) {
        return Err(Error::Conflict {
            message: format!("User already holds role '{}'", role.name),
        });
    }
    if !users.group_permits_role(id, role.id).await? {
        return Err(Error::BadRequest {
            message: format!("Role '{}' is not permitted by the user's group", role.name),
        });
    }

    users.set_role(id, Some(role.id)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::ok(format!("Role '{}' granted to user", role.name))))
}

/// Clear a user's role. Succeeds when the user holds none.
#[utoipa::path(
    delete,
    path = "/users/{id}/role",
    tag = "users",
    summary = "Revoke role from user",
    responses(
        (status = 200, description = "Role revoked", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks revoke_user_role", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn revoke_role(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::RevokeUserRole>,
    Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut pool_conn)
        .set_role(id, None)
        .await
        .map_err(or_not_found("User", id))?;

    Ok(Json(MessageResponse::ok("Role revoked from user")))
}

/// Place a user in a group, by name, replacing any current group
#[utoipa::path(
    put,
    path = "/users/{id}/group",
    tag = "users",
    summary = "Add user to group",
    request_body = UserGroupAssign,
    responses(
        (status = 200, description = "User added to group", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks assign_group_user", body = MessageResponse),
        (status = 404, description = "User or group not found", body = MessageResponse),
        (status = 409, description = "User already in the group", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn assign_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::AssignGroupUser>,
    Path(id): Path<UserId>,
    Json(assign): Json<UserGroupAssign>,
) -> Result<Json<MessageResponse>> {
    require_non_blank("group_name", &assign.group_name)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let group = Groups::new(&mut tx)
        .get_by_name(&assign.group_name)
        .await?
        .ok_or_else(|| name_not_found("Group", &assign.group_name))?;

    let mut users = Users::new(&mut tx);
    let user = users.get_by_id(id).await?.ok_or_else(|| not_found("User", id))?;

    if user.group_id == Some(group.id) {
        return Err(Error::Conflict {
            message: format!("User already in group '{}'", group.name),
        });
    }

    users.set_group(id, Some(group.id)).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(MessageResponse::ok(format!("User added to group '{}'", group.name))))
}

/// Take a user out of their group. Succeeds when the user is in none.
#[utoipa::path(
    delete,
    path = "/users/{id}/group",
    tag = "users",
    summary = "Remove user from group",
    responses(
        (status = 200, description = "User removed from group", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks remove_group_user", body = MessageResponse),
        (status = 404, description = "User not found", body = MessageResponse),
    ),
    params(("id" = i64, Path, description = "User ID")),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn remove_group(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::RemoveGroupUser>,
    Path(id): Path<UserId>,
) -> Result<Json<MessageResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut pool_conn)
        .set_group(id, None)
        .await
        .map_err(or_not_found("User", id))?;

    Ok(Json(MessageResponse::ok("User removed from group")))
}

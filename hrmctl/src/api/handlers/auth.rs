use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    api::models::{
        MessageResponse, require_non_blank,
        auth::{AuthenticateRequest, AuthenticateResponse},
        users::UserCreate,
    },
    auth::{
        current_user::AuthenticatedUser,
        password,
        permissions::{RequiresPrivilege, privilege},
        token,
    },
    db::{
        handlers::{Repository, Users},
        models::users::UserCreateDBRequest,
    },
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Exchange a username and password for an identity token
#[utoipa::path(
    post,
    path = "/authenticate",
    request_body = AuthenticateRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Authenticated", body = AuthenticateResponse),
        (status = 400, description = "Missing username or password", body = MessageResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn authenticate(
    State(state): State<AppState>,
    Json(request): Json<AuthenticateRequest>,
) -> Result<Json<AuthenticateResponse>, Error> {
    require_non_blank("username", &request.username)?;
    require_non_blank("password", &request.password)?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let credentials = Users::new(&mut pool_conn)
        .get_credentials(&request.username)
        .await?
        .ok_or_else(invalid_credentials)?;
    drop(pool_conn);

    // Verify password on a blocking thread to avoid blocking async runtime
    let is_valid = password::verify_password_blocking(request.password, credentials.password_hash.clone()).await?;
    if !is_valid {
        return Err(invalid_credentials());
    }

    let user = AuthenticatedUser {
        id: credentials.id,
        username: credentials.username,
        role_id: credentials.role_id,
    };
    let token = token::create_token(&user, &state.config)?;
    tracing::info!(user_id = user.id, "User authenticated");

    Ok(Json(AuthenticateResponse {
        error: false,
        message: "Authenticated".to_string(),
        token,
    }))
}

/// Register a new user. The new user holds no role until one is granted.
#[utoipa::path(
    post,
    path = "/register",
    request_body = UserCreate,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered", body = MessageResponse),
        (status = 400, description = "Invalid input", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = MessageResponse),
        (status = 403, description = "Caller lacks create_user", body = MessageResponse),
        (status = 409, description = "Username already taken", body = MessageResponse),
    ),
    security(("TokenAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    _: RequiresPrivilege<privilege::CreateUser>,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<MessageResponse>), Error> {
    let password_config = &state.config.auth.password;
    request.validate(password_config.min_length, password_config.max_length)?;

    let password_hash = password::hash_password_blocking(request.password, password_config.argon2_params()).await?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let user = Users::new(&mut pool_conn)
        .create(&UserCreateDBRequest {
            username: request.username,
            password_hash,
            first_name: request.first_name,
            middle_name: request.middle_name,
            last_name: request.last_name,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::created(format!("User '{}' registered", user.username), user.id)),
    ))
}

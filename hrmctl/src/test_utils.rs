//! Test utilities for integration testing.

use crate::auth::{current_user::AuthenticatedUser, password, token};
use crate::config::{AuthConfig, Config, PasswordConfig};
use crate::db::{
    handlers::{Groups, Privileges, Repository, Roles, Users},
    models::{
        groups::{GroupCreateDBRequest, GroupDBResponse},
        privileges::PrivilegeCreateDBRequest,
        roles::{RoleCreateDBRequest, RoleDBResponse},
        users::{UserCreateDBRequest, UserDBResponse},
    },
};
use crate::types::{GroupId, RoleId};
use crate::{AppState, Application};
use axum_test::TestServer;
use sqlx::PgPool;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Password every test user is created with
pub const TEST_PASSWORD: &str = "test-password";

static UNIQUE: AtomicUsize = AtomicUsize::new(0);

fn unique_suffix() -> usize {
    UNIQUE.fetch_add(1, Ordering::Relaxed)
}

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        admin_password: None,
        auth: AuthConfig {
            // Fast hashing for tests
            password: PasswordConfig {
                argon2_memory_kib: 128,
                argon2_iterations: 1,
                argon2_parallelism: 1,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn create_test_state(pool: PgPool, config: Config) -> AppState {
    AppState::builder().db(pool).config(config).build()
}

/// Full application over the test pool, seeded the way startup seeds it
pub async fn create_test_app(pool: PgPool) -> TestServer {
    Application::with_pool(create_test_config(), pool)
        .await
        .expect("Failed to create application")
        .into_test_server()
}

/// Create a role holding the named privileges, adding any privilege that doesn't exist yet
pub async fn create_test_role(pool: &PgPool, name: &str, privileges: &[&str]) -> RoleDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");

    let role = Roles::new(&mut conn)
        .create(&RoleCreateDBRequest {
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("Failed to create test role");

    for name in privileges {
        let privilege = Privileges::new(&mut conn)
            .ensure(&PrivilegeCreateDBRequest {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("Failed to ensure test privilege");
        Roles::new(&mut conn)
            .grant_privilege(role.id, privilege.id)
            .await
            .expect("Failed to grant test privilege");
    }

    role
}

pub async fn create_test_group(pool: &PgPool, name: &str) -> GroupDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Groups::new(&mut conn)
        .create(&GroupCreateDBRequest {
            name: name.to_string(),
            description: None,
        })
        .await
        .expect("Failed to create test group")
}

/// Create a user with [`TEST_PASSWORD`], optionally holding a role
pub async fn create_test_user(pool: &PgPool, username: &str, role_id: Option<RoleId>) -> UserDBResponse {
    let params = create_test_config().auth.password.argon2_params();
    let password_hash = password::hash_password(TEST_PASSWORD, params).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);
    let user = users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            password_hash,
            first_name: "Test".to_string(),
            middle_name: None,
            last_name: "User".to_string(),
        })
        .await
        .expect("Failed to create test user");

    match role_id {
        Some(role_id) => users.set_role(user.id, Some(role_id)).await.expect("Failed to set test role"),
        None => user,
    }
}

pub async fn add_user_to_group(pool: &PgPool, user_id: crate::types::UserId, group_id: GroupId) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .set_group(user_id, Some(group_id))
        .await
        .expect("Failed to add user to group");
}

pub async fn permit_role_in_group(pool: &PgPool, group_id: GroupId, role_id: RoleId) {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Groups::new(&mut conn)
        .add_role(group_id, role_id)
        .await
        .expect("Failed to permit role in group");
}

/// Identity token for `user`, signed with the test configuration
pub fn token_for(user: &UserDBResponse) -> String {
    let identity = AuthenticatedUser {
        id: user.id,
        username: user.username.clone(),
        role_id: user.role_id,
    };
    token::create_token(&identity, &create_test_config()).expect("Failed to create test token")
}

/// A user whose role holds exactly `privileges`, and a token for them
pub async fn create_test_caller(pool: &PgPool, privileges: &[&str]) -> (UserDBResponse, String) {
    let n = unique_suffix();
    let role = create_test_role(pool, &format!("caller-role-{n}"), privileges).await;
    let user = create_test_user(pool, &format!("caller-{n}"), Some(role.id)).await;
    let token = token_for(&user);
    (user, token)
}

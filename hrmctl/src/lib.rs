//! # hrmctl: role-based access control for human resource management
//!
//! `hrmctl` is the access-control backend of an HR management system. It keeps track of
//! users, the groups they belong to, the roles they hold and the privileges those roles carry,
//! and it gates every operation on that data behind a per-route privilege check.
//!
//! ## Overview
//!
//! A caller authenticates with a username and password and receives a short-lived signed
//! identity token. Every other request carries that token. The server verifies it, reads the
//! caller's role from the verified claims, resolves the role to its current privilege set in the
//! database and admits the request only if the privilege the route is gated on is in that set.
//! Because privileges are resolved per request, granting or revoking a privilege on a role
//! takes effect immediately for every holder of the role.
//!
//! Groups constrain role assignment: a user can only be given a role that their group permits.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP layer and
//! uses PostgreSQL for all persistence.
//!
//! The **API layer** ([`api`]) holds the handlers and the request/response models. Reads return
//! entity JSON; mutations and errors return a `{error, message}` envelope.
//!
//! The **authentication layer** ([`auth`]) issues and verifies identity tokens, hashes
//! passwords, and performs the privilege check.
//!
//! The **database layer** ([`db`]) uses the repository pattern. Each table has a repository
//! borrowing a connection (or transaction), so a handler can compose several repositories into
//! one atomic unit of work.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use hrmctl::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = hrmctl::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     hrmctl::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    api::handlers::{auth as auth_handlers, groups, privileges, roles, users},
    auth::{password, permissions::privilege},
    db::handlers::{Privileges, Repository, Roles, Users},
    db::models::{privileges::PrivilegeCreateDBRequest, roles::RoleCreateDBRequest, users::UserCreateDBRequest},
    openapi::ApiDoc,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{Executor, PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{GroupId, PrivilegeId, RoleId, UserId};

/// Name of the role seeded with every privilege at startup
pub const ADMIN_ROLE: &str = "admin";

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder().db(pool).config(config).build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
}

/// Get the hrmctl database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Bring the privilege catalogue and the bootstrap administrator up to date.
///
/// Idempotent, and safe to run on every startup:
/// - every privilege a route can be gated on is inserted if missing
/// - the [`ADMIN_ROLE`] role is created if missing, and granted any privilege it lacks
/// - when `admin_password` is configured, the admin user is created with that role, or has its
///   password and role reset if it already exists
///
/// Everything happens in one transaction.
#[instrument(skip_all)]
pub async fn seed_database(config: &Config, db: &PgPool) -> anyhow::Result<()> {
    let password_hash = match &config.admin_password {
        Some(pwd) => Some(password::hash_password_blocking(pwd.clone(), config.auth.password.argon2_params()).await?),
        None => None,
    };

    let mut tx = db.begin().await?;

    let mut catalogue = Vec::with_capacity(privilege::ALL.len());
    for (name, description) in privilege::ALL {
        let request = PrivilegeCreateDBRequest {
            name: name.to_string(),
            description: Some(description.to_string()),
        };
        catalogue.push(Privileges::new(&mut tx).ensure(&request).await?);
    }

    let mut roles = Roles::new(&mut tx);
    let admin_role = match roles.get_by_name(ADMIN_ROLE).await? {
        Some(role) => role,
        None => {
            info!("Creating {ADMIN_ROLE} role");
            roles
                .create(&RoleCreateDBRequest {
                    name: ADMIN_ROLE.to_string(),
                    description: Some("Holds every privilege".to_string()),
                })
                .await?
        }
    };

    let held = roles.privilege_names(admin_role.id).await?;
    for privilege in catalogue.iter().filter(|p| !held.contains(&p.name)) {
        roles.grant_privilege(admin_role.id, privilege.id).await?;
    }

    if let Some(password_hash) = password_hash {
        let mut users = Users::new(&mut tx);
        let user_id = match users.get_credentials(&config.admin_username).await? {
            Some(existing) => {
                users.update_password(existing.id, &password_hash).await?;
                existing.id
            }
            None => {
                info!("Creating admin user {}", config.admin_username);
                let created = users
                    .create(&UserCreateDBRequest {
                        username: config.admin_username.clone(),
                        password_hash,
                        first_name: "System".to_string(),
                        middle_name: None,
                        last_name: "Administrator".to_string(),
                    })
                    .await?;
                created.id
            }
        };
        users.set_role(user_id, Some(admin_role.id)).await?;
    }

    tx.commit().await?;
    debug!("Database seeded successfully");
    Ok(())
}

/// Pool sizing and per-connection session settings from `database`
fn pool_options(config: &Config) -> PgPoolOptions {
    let pool_settings = &config.database.pool;
    let statement_timeout_ms = config.database.statement_timeout.as_millis();

    PgPoolOptions::new()
        .max_connections(pool_settings.max_connections)
        .min_connections(pool_settings.min_connections)
        .acquire_timeout(Duration::from_secs(pool_settings.acquire_timeout_secs))
        .idle_timeout((pool_settings.idle_timeout_secs > 0).then(|| Duration::from_secs(pool_settings.idle_timeout_secs)))
        .max_lifetime((pool_settings.max_lifetime_secs > 0).then(|| Duration::from_secs(pool_settings.max_lifetime_secs)))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // Bound every store operation a request performs
                conn.execute(format!("SET statement_timeout = {statement_timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        })
}

/// Connect the pool and run migrations
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = pool_options(config).connect(&config.database.url).await?;

    migrator().run(&pool).await?;

    Ok(pool)
}

/// Build the application router with all endpoints and middleware.
///
/// Each handler is gated on its own privilege through its extractor, so the router itself
/// carries no auth middleware. Optional Prometheus metrics are served at `/internal/metrics`.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> Router {
    let enable_metrics = state.config.enable_metrics;

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/authenticate", post(auth_handlers::authenticate))
        .route("/register", post(auth_handlers::register))
        // Users
        .route("/users", get(users::list_users))
        .route(
            "/users/{id}",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/{id}/password", put(users::change_password))
        .route("/users/{id}/role", put(users::assign_role).delete(users::revoke_role))
        .route("/users/{id}/group", put(users::assign_group).delete(users::remove_group))
        // Roles
        .route("/newrole", post(roles::create_role))
        .route("/roles", get(roles::list_roles))
        .route(
            "/roles/{id}",
            get(roles::get_role).put(roles::update_role).delete(roles::delete_role),
        )
        .route(
            "/roles/{id}/privileges",
            get(roles::list_role_privileges).post(roles::grant_privilege),
        )
        .route("/roles/{id}/privileges/{privilege_id}", delete(roles::revoke_privilege))
        // Privileges
        .route("/newpriv", post(privileges::create_privilege))
        .route("/privs", get(privileges::list_privileges))
        .route(
            "/privs/{id}",
            get(privileges::get_privilege)
                .put(privileges::update_privilege)
                .delete(privileges::delete_privilege),
        )
        // Groups
        .route("/newgroup", post(groups::create_group))
        .route("/groups", get(groups::list_groups))
        .route(
            "/groups/{id}",
            get(groups::get_group).put(groups::update_group).delete(groups::delete_group),
        )
        .route(
            "/groups/{id}/users",
            get(groups::list_group_users).delete(groups::remove_all_group_users),
        )
        .route("/groups/{id}/roles", get(groups::list_group_roles).post(groups::add_group_role))
        .route("/groups/{id}/roles/{role_id}", delete(groups::remove_group_role))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let router = if enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer)
    } else {
        router
    };

    router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

/// The assembled service: router, configuration and connection pool
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!(bind = %config.bind_address(), metrics = config.enable_metrics, "Starting hrmctl");
        let pool = setup_database(&config).await?;
        Self::with_pool(config, pool).await
    }

    /// Build the application over an already migrated pool. Seeds the database.
    pub async fn with_pool(config: Config, pool: PgPool) -> anyhow::Result<Self> {
        seed_database(&config, &pool).await?;

        let state = AppState::builder().db(pool.clone()).config(config.clone()).build();
        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "hrmctl listening on http://{}, docs at http://localhost:{}/docs",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

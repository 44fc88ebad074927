//! OpenAPI documentation, rendered at `/docs`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;

/// Identity token sent in the `Token` header
struct TokenSecurityAddon;

impl Modify for TokenSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "TokenAuth".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Token",
                    "Identity token from `POST /authenticate`, sent as-is in the `Token` header.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&TokenSecurityAddon),
    paths(
        api::handlers::auth::authenticate,
        api::handlers::auth::register,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::users::change_password,
        api::handlers::users::assign_role,
        api::handlers::users::revoke_role,
        api::handlers::users::assign_group,
        api::handlers::users::remove_group,
        api::handlers::roles::create_role,
        api::handlers::roles::list_roles,
        api::handlers::roles::get_role,
        api::handlers::roles::update_role,
        api::handlers::roles::delete_role,
        api::handlers::roles::list_role_privileges,
        api::handlers::roles::grant_privilege,
        api::handlers::roles::revoke_privilege,
        api::handlers::privileges::create_privilege,
        api::handlers::privileges::list_privileges,
        api::handlers::privileges::get_privilege,
        api::handlers::privileges::update_privilege,
        api::handlers::privileges::delete_privilege,
        api::handlers::groups::create_group,
        api::handlers::groups::list_groups,
        api::handlers::groups::get_group,
        api::handlers::groups::update_group,
        api::handlers::groups::delete_group,
        api::handlers::groups::list_group_users,
        api::handlers::groups::remove_all_group_users,
        api::handlers::groups::list_group_roles,
        api::handlers::groups::add_group_role,
        api::handlers::groups::remove_group_role,
    ),
    components(
        schemas(
            api::models::MessageResponse,
            api::models::auth::AuthenticateRequest,
            api::models::auth::AuthenticateResponse,
            api::models::users::UserCreate,
            api::models::users::UserUpdate,
            api::models::users::PasswordChange,
            api::models::users::UserRoleAssign,
            api::models::users::UserGroupAssign,
            api::models::users::UserResponse,
            api::models::roles::RoleCreate,
            api::models::roles::RoleUpdate,
            api::models::roles::RolePrivilegeGrant,
            api::models::roles::RoleResponse,
            api::models::privileges::PrivilegeCreate,
            api::models::privileges::PrivilegeUpdate,
            api::models::privileges::PrivilegeResponse,
            api::models::groups::GroupCreate,
            api::models::groups::GroupUpdate,
            api::models::groups::GroupRoleAssign,
            api::models::groups::GroupResponse,
        )
    ),
    tags(
        (name = "authentication", description = "Token issue and user registration"),
        (name = "users", description = "User accounts, their role and their group"),
        (name = "roles", description = "Roles and the privileges they carry"),
        (name = "privileges", description = "Named permissions that gate operations"),
        (name = "groups", description = "Groups of users and the roles they permit"),
    ),
    info(
        title = "hrmctl",
        version = "0.4.0",
        description = "Access control for human resource management.

## Authentication

Exchange credentials for a token at `POST /authenticate`, then send it in the `Token` header:

```
Token: eyJhbGciOiJIUzI1NiIs...
```

Tokens expire after 30 minutes by default.

## Authorization

Every route is gated on one privilege, resolved from the caller's role at request time.
A missing or invalid token yields `401`; a valid token whose role lacks the privilege yields `403`.

## Errors

Errors, like mutations, return a message envelope:

```json
{\"error\": true, \"message\": \"Group 1 not found\"}
```"
    )
)]
pub struct ApiDoc;

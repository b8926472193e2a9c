//! User and role-assignment endpoints.
//!
//! Users are created by admins only; there is no self sign-up. Every
//! user holds at least one role: creation requires one and the last role
//! can never be removed.

use diesel::Connection;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Route, State, delete, get, post};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::api::{ApiError, api_error, run_store};
use crate::config::ReefConfig;
use crate::logged_json::LoggedJson;
use crate::models::{Role, UserInput, UserWithRoles};
use crate::orm::DbConn;
use crate::orm::run_bounded;
use crate::orm::login::hash_password;
use crate::orm::role::get_role_by_name;
use crate::orm::user::{get_user, get_user_with_roles, insert_user, list_users_with_roles};
use crate::orm::user_role::{
    assign_user_role_by_name, get_user_roles, remove_user_role_by_name, user_has_role,
};
use crate::session_guards::{AdminUser, AuthenticatedUser};

#[derive(Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role_names: Vec<String>,
}

#[derive(Serialize, Deserialize, TS)]
#[ts(export)]
pub struct UserRoleRequest {
    pub role_name: String,
}

fn store_error(context: &str, e: DieselError) -> ApiError {
    error!("{}: {:?}", context, e);
    api_error(Status::ServiceUnavailable, context)
}

async fn require_user(db: &DbConn, config: &ReefConfig, user_id: i32) -> Result<(), ApiError> {
    let found = run_store(db, config, "Error loading user", move |conn| {
        get_user(conn, user_id)
    })
    .await?;

    match found {
        Some(_) => Ok(()),
        None => Err(api_error(
            Status::NotFound,
            format!("User with ID {} not found", user_id),
        )),
    }
}

/// List Users endpoint.
///
/// - **URL:** `/api/1/users`
/// - **Method:** `GET`
/// - **Authentication:** Required, `admin` role
#[get("/1/users")]
pub async fn list_users(
    db: DbConn,
    config: &State<ReefConfig>,
    _admin: AdminUser,
) -> Result<Json<Vec<UserWithRoles>>, ApiError> {
    run_store(&db, config, "Error listing users", list_users_with_roles)
        .await
        .map(Json)
}

/// Create User endpoint.
///
/// - **URL:** `/api/1/users`
/// - **Method:** `POST`
/// - **Authentication:** Required, `admin` role
///
/// ```json
/// { "email": "diver@reef.example", "password": "...", "role_names": ["viewer"] }
/// ```
///
/// 201 with the new user and roles. 400 for blank fields, no roles or an
/// unknown role; 409 if the email is taken.
#[post("/1/users", data = "<new_user>")]
pub async fn create_user(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    new_user: LoggedJson<CreateUserRequest>,
) -> Result<status::Created<Json<UserWithRoles>>, ApiError> {
    let CreateUserRequest {
        email,
        password,
        role_names,
    } = new_user.into_inner();
    let email = email.trim().to_string();

    if email.is_empty() || password.trim().is_empty() {
        return Err(api_error(Status::BadRequest, "Email and password are required"));
    }
    if role_names.is_empty() {
        return Err(api_error(Status::BadRequest, "A user needs at least one role"));
    }

    let password_hash = hash_password(&password);
    let created_email = email.clone();

    let outcome = run_bounded(&db, config.store_timeout(), move |conn| {
        conn.transaction::<_, DieselError, _>(|conn| {
            for role_name in &role_names {
                if get_role_by_name(conn, role_name)?.is_none() {
                    return Ok(Err(role_name.clone()));
                }
            }

            let user = insert_user(
                conn,
                UserInput {
                    email,
                    password_hash,
                },
            )?;
            for role_name in &role_names {
                if !user_has_role(conn, user.id, role_name)? {
                    assign_user_role_by_name(conn, user.id, role_name)?;
                }
            }

            let roles = get_user_roles(conn, user.id)?;
            Ok(Ok(UserWithRoles::new(user, roles)))
        })
    })
    .await;

    match outcome {
        Ok(Ok(Ok(user))) => {
            info!("User '{}' created by {}", created_email, admin.user.email);
            let location = format!("/api/1/users/{}", user.id);
            Ok(status::Created::new(location).body(Json(user)))
        }
        Ok(Ok(Err(unknown_role))) => Err(api_error(
            Status::BadRequest,
            format!("Unknown role '{}'", unknown_role),
        )),
        Ok(Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))) => {
            Err(api_error(
                Status::Conflict,
                format!("A user with email '{}' already exists", created_email),
            ))
        }
        Ok(Err(e)) => Err(store_error("Error creating user", e)),
        Err(e) => {
            error!("Error creating user: {}", e);
            Err(api_error(Status::ServiceUnavailable, "Error creating user"))
        }
    }
}

/// Get User Roles endpoint.
///
/// - **URL:** `/api/1/users/<user_id>/roles`
/// - **Method:** `GET`
/// - **Authentication:** Required; users may read their own roles, admins
///   anyone's
#[get("/1/users/<user_id>/roles")]
pub async fn get_user_roles_endpoint(
    db: DbConn,
    config: &State<ReefConfig>,
    user_id: i32,
    auth_user: AuthenticatedUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    if auth_user.user.id != user_id && !auth_user.has_role("admin") {
        return Err(api_error(Status::Forbidden, "Cannot view another user's roles"));
    }

    let user = run_store(&db, config, "Error loading user roles", move |conn| {
        get_user_with_roles(conn, user_id)
    })
    .await?;

    match user {
        Some(user) => Ok(Json(user.roles)),
        None => Err(api_error(
            Status::NotFound,
            format!("User with ID {} not found", user_id),
        )),
    }
}

/// Add User Role endpoint.
///
/// - **URL:** `/api/1/users/<user_id>/roles`
/// - **Method:** `POST`
/// - **Authentication:** Required, `admin` role
///
/// ```json
/// { "role_name": "admin" }
/// ```
///
/// Assigning a role the user already holds is a no-op.
#[post("/1/users/<user_id>/roles", data = "<request>")]
pub async fn add_user_role(
    db: DbConn,
    config: &State<ReefConfig>,
    user_id: i32,
    request: LoggedJson<UserRoleRequest>,
    admin: AdminUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    require_user(&db, config, user_id).await?;
    let role_name = request.into_inner().role_name;

    let lookup_name = role_name.clone();
    let role = run_store(&db, config, "Error loading role", move |conn| {
        get_role_by_name(conn, &lookup_name)
    })
    .await?;
    if role.is_none() {
        return Err(api_error(
            Status::BadRequest,
            format!("Unknown role '{}'", role_name),
        ));
    }

    let assigned_name = role_name.clone();
    let roles = run_store(&db, config, "Error assigning role", move |conn| {
        if !user_has_role(conn, user_id, &assigned_name)? {
            assign_user_role_by_name(conn, user_id, &assigned_name)?;
        }
        get_user_roles(conn, user_id)
    })
    .await?;

    info!(
        "Role '{}' assigned to user {} by {}",
        role_name, user_id, admin.user.email
    );
    Ok(Json(roles))
}

/// Remove User Role endpoint.
///
/// - **URL:** `/api/1/users/<user_id>/roles`
/// - **Method:** `DELETE`
/// - **Authentication:** Required, `admin` role
///
/// ```json
/// { "role_name": "admin" }
/// ```
///
/// 400 when the role is the user's last one; 404 when the user does not
/// hold it.
#[delete("/1/users/<user_id>/roles", data = "<request>")]
pub async fn remove_user_role(
    db: DbConn,
    config: &State<ReefConfig>,
    user_id: i32,
    request: LoggedJson<UserRoleRequest>,
    admin: AdminUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    require_user(&db, config, user_id).await?;
    let role_name = request.into_inner().role_name;

    let current_roles = run_store(&db, config, "Error loading user roles", move |conn| {
        get_user_roles(conn, user_id)
    })
    .await?;

    if !current_roles.iter().any(|r| r.name == role_name) {
        return Err(api_error(
            Status::NotFound,
            format!("User {} does not have role '{}'", user_id, role_name),
        ));
    }
    if current_roles.len() <= 1 {
        return Err(api_error(
            Status::BadRequest,
            "Cannot remove the last role from a user",
        ));
    }

    let removed_name = role_name.clone();
    let roles = run_store(&db, config, "Error removing role", move |conn| {
        remove_user_role_by_name(conn, user_id, &removed_name)?;
        get_user_roles(conn, user_id)
    })
    .await?;

    info!(
        "Role '{}' removed from user {} by {}",
        role_name, user_id, admin.user.email
    );
    Ok(Json(roles))
}

pub fn routes() -> Vec<Route> {
    routes![
        list_users,
        create_user,
        get_user_roles_endpoint,
        add_user_role,
        remove_user_role
    ]
}

//! Password login and the session check endpoint.

use rocket::http::{CookieJar, Status};
use rocket::serde::json::Json;
use rocket::tokio::time::timeout;
use rocket::{Route, State, get, post};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DbConn;
use crate::api::{ApiError, api_error, run_store};
use crate::config::ReefConfig;
use crate::models::User;
use crate::orm::login::process_login;
use crate::orm::user_role::get_user_roles;
use crate::session_guards::AuthenticatedUser;

/// Login request containing user credentials.
#[derive(Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Identity returned by both `/1/login` and `/1/hello`.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoginSuccessResponse {
    pub user_id: i32,
    pub email: String,
    pub roles: Vec<String>,
}

/// Login endpoint.
///
/// - **URL:** `/api/1/login`
/// - **Method:** `POST`
/// - **Authentication:** None required
///
/// ```json
/// { "email": "keeper@reef.example", "password": "..." }
/// ```
///
/// On success sets the HTTP-only `session` cookie and returns the user's
/// id, email and role names. Wrong credentials and unknown users both get
/// 401 with `{"error": "Invalid credentials"}`; blank fields get 400.
#[post("/1/login", data = "<login>")]
pub async fn login(
    db: DbConn,
    config: &State<ReefConfig>,
    cookies: &CookieJar<'_>,
    login: Json<LoginRequest>,
) -> Result<Json<LoginSuccessResponse>, ApiError> {
    let outcome = match timeout(config.store_timeout(), process_login(&db, cookies, &login)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("Login exceeded the store timeout of {:?}", config.store_timeout());
            Err(Status::ServiceUnavailable)
        }
    };

    match outcome {
        Ok(user) => build_user_response(&db, config, user).await.map(Json),
        Err(status) if status == Status::BadRequest => Err(api_error(
            Status::BadRequest,
            "Email and password are required",
        )),
        Err(status) if status == Status::Unauthorized => {
            Err(api_error(Status::Unauthorized, "Invalid credentials"))
        }
        Err(status) => Err(api_error(status, "Login is temporarily unavailable")),
    }
}

async fn build_user_response(
    db: &DbConn,
    config: &ReefConfig,
    user: User,
) -> Result<LoginSuccessResponse, ApiError> {
    let user_id = user.id;
    let roles = run_store(db, config, "Could not load user roles", move |conn| {
        get_user_roles(conn, user_id)
    })
    .await?;

    Ok(LoginSuccessResponse {
        user_id: user.id,
        email: user.email,
        roles: roles.into_iter().map(|role| role.name).collect(),
    })
}

/// Session check.
///
/// - **URL:** `/api/1/hello`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// Returns the same body as a successful login, or 401.
#[get("/1/hello")]
pub fn secure_hello(auth_user: AuthenticatedUser) -> Json<LoginSuccessResponse> {
    let roles = auth_user.role_names();
    Json(LoginSuccessResponse {
        user_id: auth_user.user.id,
        email: auth_user.user.email,
        roles,
    })
}

pub fn routes() -> Vec<Route> {
    routes![login, secure_hello]
}

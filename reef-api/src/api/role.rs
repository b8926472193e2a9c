//! Role listing.
//!
//! The role set is fixed by migrations (`admin`, `viewer`); assignment
//! lives under `/1/users/<id>/roles`.

use rocket::serde::json::Json;
use rocket::{Route, State, get};

use crate::api::{ApiError, run_store};
use crate::config::ReefConfig;
use crate::models::Role;
use crate::orm::{DbConn, role::get_all_roles};
use crate::session_guards::AuthenticatedUser;

/// List Roles endpoint.
///
/// - **URL:** `/api/1/roles`
/// - **Method:** `GET`
/// - **Authentication:** Required
#[get("/1/roles")]
pub async fn list_roles(
    db: DbConn,
    config: &State<ReefConfig>,
    _auth_user: AuthenticatedUser,
) -> Result<Json<Vec<Role>>, ApiError> {
    run_store(&db, config, "Could not list roles", get_all_roles)
        .await
        .map(Json)
}

pub fn routes() -> Vec<Route> {
    routes![list_roles]
}

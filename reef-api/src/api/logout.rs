//! Session termination.

use rocket::serde::json::{Json, Value, json};
use rocket::tokio::time::timeout;
use rocket::{
    Route, State,
    http::{Cookie, CookieJar},
    post,
};

use crate::DbConn;
use crate::config::ReefConfig;
use crate::orm::logout::revoke_session;

/// Logout endpoint.
///
/// - **URL:** `/api/1/logout`
/// - **Method:** `POST`
/// - **Authentication:** None required
///
/// Revokes the session named by the `session` cookie, if any, and removes
/// the cookie. Always answers 200.
#[post("/1/logout")]
pub async fn logout(db: DbConn, config: &State<ReefConfig>, cookies: &CookieJar<'_>) -> Json<Value> {
    let cookie_value = cookies.get("session").map(|c| c.value().to_string());

    if let Some(session_id) = cookie_value {
        match timeout(config.store_timeout(), revoke_session(&db, &session_id)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!("Failed to revoke session: {}", e),
            Err(_) => warn!("Revoking session timed out after {:?}", config.store_timeout()),
        }
        cookies.remove(Cookie::from("session"));
    }

    Json(json!({
        "message": "Logout successful",
        "status": "ok"
    }))
}

pub fn routes() -> Vec<Route> {
    routes![logout]
}

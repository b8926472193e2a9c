//! Health and build information.

use diesel::RunQueryDsl;
use rocket::{Route, State, serde::json::Json};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::DbConn;
use crate::built_info;
use crate::config::ReefConfig;
use crate::orm::run_with_timeout;

#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HealthStatus {
    pub status: String,
    /// `"ok"` when the readings store answered `SELECT 1` in time,
    /// `"unavailable"` otherwise.
    pub store: String,
    pub version: String,
    pub built: String,
    pub git_commit: Option<String>,
}

/// Health Status endpoint.
///
/// - **URL:** `/api/1/status`
/// - **Method:** `GET`
/// - **Authentication:** None required
///
/// ```json
/// {
///   "status": "running",
///   "store": "ok",
///   "version": "0.1.0",
///   "built": "Sat, 01 Mar 2025 12:00:00 +0000",
///   "git_commit": "3f1c2d..."
/// }
/// ```
///
/// Always answers 200 while the process is up; a store outage shows in
/// the `store` field only.
#[rocket::get("/1/status")]
pub async fn health_status(db: Option<DbConn>, config: &State<ReefConfig>) -> Json<HealthStatus> {
    let store = match db {
        Some(db) => {
            let check = run_with_timeout(&db, config.store_timeout(), |conn| {
                diesel::sql_query("SELECT 1").execute(conn).map_err(Into::into)
            })
            .await;
            if check.is_ok() { "ok" } else { "unavailable" }
        }
        None => "unavailable",
    };

    Json(HealthStatus {
        status: "running".to_string(),
        store: store.to_string(),
        version: built_info::PKG_VERSION.to_string(),
        built: built_info::BUILT_TIME_UTC.to_string(),
        git_commit: built_info::GIT_COMMIT_HASH.map(str::to_string),
    })
}

pub fn routes() -> Vec<Route> {
    routes![health_status]
}

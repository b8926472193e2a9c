//! API endpoints for viewing and editing readings.
//!
//! Every endpoint requires a session. Read endpoints accept any role;
//! writes require `admin`. Readings are never physically removed:
//! `DELETE` hides a row and `restore` brings it back.
//!
//! Edits are guarded by the row's `version`. A client sends the version
//! it last saw and gets 409 if someone else changed the row since.

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::{Route, State, delete, get, post, put};

use crate::DbConn;
use crate::api::{ApiError, api_error, parse_timestamp};
use crate::config::ReefConfig;
use crate::logged_json::LoggedJson;
use crate::models::{
    LatestReading, NewReading, QueryField, Reading, ReadingInput, ReadingValueUpdate,
};
use crate::orm::reading::{
    fetch_latest_per_name, fetch_most_recent, fetch_range, get_reading, insert_reading,
    insert_readings_batch, list_names, restore_reading, soft_delete_reading,
    update_reading_value,
};
use crate::orm::run_with_timeout;
use crate::session_guards::{AdminUser, AuthenticatedUser};

fn reading_location(reading: &Reading) -> String {
    format!("/api/1/readings/{}", reading.id)
}

/// Range query.
///
/// - **URL:** `/api/1/readings?names=pH&names=Salinity&start=...&end=...&field=name`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// `start` and `end` are RFC 3339 and inclusive. `field` selects whether
/// `names` matches the reading name (default) or its type code. Results
/// are ordered by time, oldest first. An inverted range or no `names`
/// yields `[]`.
#[get("/1/readings?<names>&<start>&<end>&<field>")]
pub async fn list_readings_in_range(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    names: Vec<String>,
    start: &str,
    end: &str,
    field: Option<QueryField>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let start = parse_timestamp("start", start)?;
    let end = parse_timestamp("end", end)?;
    let field = field.unwrap_or_default();

    let readings = run_with_timeout(&db, config.store_timeout(), move |conn| {
        fetch_range(conn, &names, start, end, field)
    })
    .await?;

    Ok(Json(readings))
}

/// Most recent readings for one name.
///
/// - **URL:** `/api/1/readings/recent/<name>?limit=20`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// Newest first. `limit` defaults to `default_recent_limit` and is capped
/// at `max_recent_limit`.
#[get("/1/readings/recent/<name>?<limit>")]
pub async fn list_recent_readings(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    name: &str,
    limit: Option<i64>,
) -> Result<Json<Vec<Reading>>, ApiError> {
    let reading_name = name.to_string();
    let limit = config.recent_limit(limit);

    let readings = run_with_timeout(&db, config.store_timeout(), move |conn| {
        fetch_most_recent(conn, &reading_name, limit)
    })
    .await?;

    Ok(Json(readings))
}

/// Latest reading per name, for dashboard tiles.
///
/// - **URL:** `/api/1/readings/latest?names=pH&names=Calcium`
/// - **Method:** `GET`
/// - **Authentication:** Required
///
/// One entry per distinct requested name, in request order. A name with no
/// visible readings has `"reading": null`.
#[get("/1/readings/latest?<names>")]
pub async fn list_latest_readings(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    names: Vec<String>,
) -> Result<Json<Vec<LatestReading>>, ApiError> {
    let latest = run_with_timeout(&db, config.store_timeout(), move |conn| {
        fetch_latest_per_name(conn, &names)
    })
    .await?;

    Ok(Json(latest))
}

/// Distinct names with at least one visible reading, sorted.
#[get("/1/readings/names")]
pub async fn list_reading_names(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
) -> Result<Json<Vec<String>>, ApiError> {
    let names = run_with_timeout(&db, config.store_timeout(), list_names).await?;
    Ok(Json(names))
}

/// Single visible reading by id; 404 when missing or soft-deleted.
#[get("/1/readings/<reading_id>")]
pub async fn get_reading_endpoint(
    db: DbConn,
    config: &State<ReefConfig>,
    _user: AuthenticatedUser,
    reading_id: i32,
) -> Result<Json<Reading>, ApiError> {
    let reading = run_with_timeout(&db, config.store_timeout(), move |conn| {
        get_reading(conn, reading_id)
    })
    .await?;

    match reading {
        Some(reading) => Ok(Json(reading)),
        None => Err(api_error(
            Status::NotFound,
            format!("Reading with ID {} not found", reading_id),
        )),
    }
}

/// Create Reading endpoint.
///
/// - **URL:** `/api/1/readings`
/// - **Method:** `POST`
/// - **Authentication:** Required, `admin` role
///
/// ```json
/// { "datetime": "2025-03-01T08:00:00Z", "name": "pH", "type": "pH", "value": 8.2 }
/// ```
///
/// Returns 201 with the stored reading (`version` 1). A non-finite value
/// is rejected with 422.
#[post("/1/readings", data = "<reading>")]
pub async fn create_reading(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    reading: LoggedJson<ReadingInput>,
) -> Result<status::Created<Json<Reading>>, ApiError> {
    let new_reading = NewReading::from(reading.into_inner());

    let created = run_with_timeout(&db, config.store_timeout(), move |conn| {
        insert_reading(conn, new_reading)
    })
    .await?;

    info!(
        "Reading {} ({}) created by {}",
        created.id, created.name, admin.user.email
    );
    Ok(status::Created::new(reading_location(&created)).body(Json(created)))
}

/// Batch create.
///
/// - **URL:** `/api/1/readings/batch`
/// - **Method:** `POST`
/// - **Authentication:** Required, `admin` role
///
/// Body is an array of readings in the single-create format. Either all
/// are stored or none are.
#[post("/1/readings/batch", data = "<readings>")]
pub async fn create_readings_batch(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    readings: LoggedJson<Vec<ReadingInput>>,
) -> Result<status::Created<Json<Vec<Reading>>>, ApiError> {
    let new_readings: Vec<NewReading> = readings.into_inner().into_iter().map(Into::into).collect();

    let created = run_with_timeout(&db, config.store_timeout(), move |conn| {
        insert_readings_batch(conn, new_readings)
    })
    .await?;

    info!("{} readings imported by {}", created.len(), admin.user.email);
    Ok(status::Created::new("/api/1/readings").body(Json(created)))
}

/// Edit a reading's value.
///
/// - **URL:** `/api/1/readings/<reading_id>`
/// - **Method:** `PUT`
/// - **Authentication:** Required, `admin` role
///
/// ```json
/// { "value": 8.3, "version": 1 }
/// ```
///
/// 409 when `version` is stale, 404 when the reading is missing or
/// soft-deleted.
#[put("/1/readings/<reading_id>", data = "<update>")]
pub async fn update_reading_endpoint(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    reading_id: i32,
    update: LoggedJson<ReadingValueUpdate>,
) -> Result<Json<Reading>, ApiError> {
    let ReadingValueUpdate { value, version } = update.into_inner();

    let updated = run_with_timeout(&db, config.store_timeout(), move |conn| {
        update_reading_value(conn, reading_id, value, version)
    })
    .await?;

    info!(
        "Reading {} set to {} (version {}) by {}",
        reading_id, updated.value, updated.version, admin.user.email
    );
    Ok(Json(updated))
}

/// Soft-delete a reading.
///
/// - **URL:** `/api/1/readings/<reading_id>?version=2`
/// - **Method:** `DELETE`
/// - **Authentication:** Required, `admin` role
///
/// Returns the hidden row. Deleting an already-hidden row returns it
/// unchanged.
#[delete("/1/readings/<reading_id>?<version>")]
pub async fn delete_reading_endpoint(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    reading_id: i32,
    version: i32,
) -> Result<Json<Reading>, ApiError> {
    let deleted = run_with_timeout(&db, config.store_timeout(), move |conn| {
        soft_delete_reading(conn, reading_id, version)
    })
    .await?;

    info!("Reading {} soft-deleted by {}", reading_id, admin.user.email);
    Ok(Json(deleted))
}

/// Undo a soft delete.
///
/// - **URL:** `/api/1/readings/<reading_id>/restore?version=3`
/// - **Method:** `POST`
/// - **Authentication:** Required, `admin` role
#[post("/1/readings/<reading_id>/restore?<version>")]
pub async fn restore_reading_endpoint(
    db: DbConn,
    config: &State<ReefConfig>,
    admin: AdminUser,
    reading_id: i32,
    version: i32,
) -> Result<Json<Reading>, ApiError> {
    let restored = run_with_timeout(&db, config.store_timeout(), move |conn| {
        restore_reading(conn, reading_id, version)
    })
    .await?;

    info!("Reading {} restored by {}", reading_id, admin.user.email);
    Ok(Json(restored))
}

pub fn routes() -> Vec<Route> {
    routes![
        list_readings_in_range,
        list_recent_readings,
        list_latest_readings,
        list_reading_names,
        get_reading_endpoint,
        create_reading,
        create_readings_batch,
        update_reading_endpoint,
        delete_reading_endpoint,
        restore_reading_endpoint
    ]
}

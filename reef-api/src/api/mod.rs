pub mod login;
pub mod logout;
pub mod reading;
pub mod role;
pub mod stats;
pub mod status;
pub mod user;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rocket::Route;
use rocket::http::Status;
use rocket::response;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::ReefConfig;
use crate::error::ReadingError;
use crate::orm::DbConn;
use crate::orm::run_bounded;

/// Error body returned by every JSON endpoint.
#[derive(Debug, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = response::status::Custom<Json<ErrorResponse>>;

pub fn api_error(status: Status, message: impl Into<String>) -> ApiError {
    response::status::Custom(
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

impl From<ReadingError> for ApiError {
    fn from(e: ReadingError) -> Self {
        if let ReadingError::StorageUnavailable(detail) = &e {
            error!("Store failure: {}", detail);
        }
        api_error(e.status(), e.to_string())
    }
}

/// Runs a Diesel closure for an account endpoint under the configured store
/// deadline. Store errors and timeouts both become 503 with `context` as the
/// message.
pub async fn run_store<F, R>(
    db: &DbConn,
    config: &ReefConfig,
    context: &'static str,
    f: F,
) -> Result<R, ApiError>
where
    F: FnOnce(&mut diesel::SqliteConnection) -> Result<R, diesel::result::Error> + Send + 'static,
    R: Send + 'static,
{
    match run_bounded(db, config.store_timeout(), f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("{}: {}", context, e);
            Err(api_error(Status::ServiceUnavailable, context))
        }
        Err(e) => {
            error!("{}: {}", context, e);
            Err(api_error(Status::ServiceUnavailable, context))
        }
    }
}

/// Parses an RFC 3339 query parameter into a naive UTC timestamp.
pub fn parse_timestamp(param: &str, raw: &str) -> Result<NaiveDateTime, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.naive_utc())
        .map_err(|_| {
            api_error(
                Status::UnprocessableEntity,
                format!("'{}' must be an RFC 3339 timestamp, got '{}'", param, raw),
            )
        })
}

/// Parses a `YYYY-MM-DD` query parameter.
pub fn parse_date(param: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        api_error(
            Status::UnprocessableEntity,
            format!("'{}' must be a YYYY-MM-DD date, got '{}'", param, raw),
        )
    })
}

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(login::routes());
    routes.extend(logout::routes());
    routes.extend(reading::routes());
    routes.extend(role::routes());
    routes.extend(stats::routes());
    routes.extend(status::routes());
    routes.extend(user::routes());
    routes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let parsed = parse_timestamp("start", "2025-03-01T10:00:00+02:00").unwrap();
        assert_eq!(parsed.to_string(), "2025-03-01 08:00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        let err = parse_timestamp("start", "yesterday").unwrap_err();
        assert_eq!(err.0, Status::UnprocessableEntity);
    }

    #[tokio::test]
    async fn test_run_store_times_out_as_unavailable() {
        let rocket = crate::orm::testing::test_rocket().ignite().await.expect("ignite");
        let db = DbConn::get_one(&rocket).await.expect("pooled connection");
        let config = ReefConfig {
            store_timeout_secs: 1,
            ..ReefConfig::default()
        };

        let err = run_store(&db, &config, "Could not list roles", |_| {
            std::thread::sleep(std::time::Duration::from_secs(2));
            Ok(())
        })
        .await
        .unwrap_err();
        assert_eq!(err.0, Status::ServiceUnavailable);
        assert_eq!(err.1.error, "Could not list roles");

        let err = run_store(&db, &config, "Could not list users", |_| {
            Err::<(), _>(diesel::result::Error::NotFound)
        })
        .await
        .unwrap_err();
        assert_eq!(err.0, Status::ServiceUnavailable);
    }

    #[test]
    fn test_reading_error_maps_to_status() {
        let err: ApiError = ReadingError::Conflict { id: 3, expected: 1, actual: 2 }.into();
        assert_eq!(err.0, Status::Conflict);
        assert!(err.1.error.contains("expected version 1"));
    }
}

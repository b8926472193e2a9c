use chrono::{DateTime, NaiveDateTime};
use diesel::connection::SimpleConnection;
use diesel::{prelude::*, sqlite::SqliteConnection};
use diesel_migrations::MigrationHarness;
use dotenvy::dotenv;
use regex::Regex;
use reef_api::orm::MIGRATIONS;

/// Opens the database named by `DATABASE_URL`, enables foreign keys and
/// brings the schema up to date.
pub fn establish_connection() -> Result<SqliteConnection, Box<dyn std::error::Error>> {
    dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let mut conn = SqliteConnection::establish(&database_url)?;
    conn.batch_execute("PRAGMA foreign_keys = ON")?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| format!("Failed to run migrations: {}", e))?;
    Ok(conn)
}

/// Keeps the items whose key matches `search_term`, as a regex unless
/// `fixed_string` is set. No term keeps everything.
pub fn filter_by_term<T>(
    items: Vec<T>,
    search_term: Option<&str>,
    fixed_string: bool,
    key: impl Fn(&T) -> &str,
) -> Result<Vec<T>, Box<dyn std::error::Error>> {
    let Some(term) = search_term else {
        return Ok(items);
    };

    if fixed_string {
        return Ok(items.into_iter().filter(|item| key(item).contains(term)).collect());
    }

    let regex = Regex::new(term).map_err(|e| format!("Invalid regex pattern '{}': {}", term, e))?;
    Ok(items.into_iter().filter(|item| regex.is_match(key(item))).collect())
}

/// Parses an RFC 3339 timestamp, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
pub fn parse_timestamp(timestamp_str: &str) -> Result<NaiveDateTime, Box<dyn std::error::Error>> {
    let trimmed = timestamp_str.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }

    Err(format!(
        "Unable to parse timestamp '{}'. Use RFC 3339 or YYYY-MM-DD HH:MM:SS",
        timestamp_str
    )
    .into())
}

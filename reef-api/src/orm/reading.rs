//! Query layer over the `readings` table.
//!
//! Every read function here only returns rows whose state is
//! [`RecordState::Active`]. Writes never remove rows: deletion flips the
//! state flag, and value edits overwrite in place guarded by the row's
//! `version` column.

use chrono::NaiveDateTime;
use diesel::QueryableByName;
use diesel::prelude::*;
use diesel::sql_types::BigInt;

use crate::error::ReadingError;
use crate::models::{LatestReading, NewReading, QueryField, Reading, RecordState};
use crate::schema::readings;

#[derive(QueryableByName)]
struct LastInsertRowId {
    #[diesel(sql_type = BigInt)]
    last_insert_rowid: i64,
}

fn ensure_finite(value: f64) -> Result<(), ReadingError> {
    if value.is_finite() { Ok(()) } else { Err(ReadingError::InvalidValue(value)) }
}

/// Returns visible readings whose `datetime` lies in `[start, end]` and whose
/// name (or type, per `field`) is one of `labels`.
///
/// Ordered by `datetime` ascending, then `id` ascending. An inverted range
/// or an empty label set yields an empty result rather than an error.
pub fn fetch_range(
    conn: &mut SqliteConnection,
    labels: &[String],
    start: NaiveDateTime,
    end: NaiveDateTime,
    field: QueryField,
) -> Result<Vec<Reading>, ReadingError> {
    if start > end || labels.is_empty() {
        return Ok(Vec::new());
    }

    let labels = labels.to_vec();
    let query = readings::table
        .filter(readings::deleted.eq(RecordState::Active))
        .filter(readings::datetime.between(start, end))
        .into_boxed();

    let query = match field {
        QueryField::Name => query.filter(readings::name.eq_any(labels)),
        QueryField::Type => query.filter(readings::type_.eq_any(labels)),
    };

    Ok(query
        .order((readings::datetime.asc(), readings::id.asc()))
        .select(Reading::as_select())
        .load(conn)?)
}

/// Returns up to `limit` visible readings for `reading_name`, most recent
/// first. Ties on `datetime` are broken by `id` descending.
pub fn fetch_most_recent(
    conn: &mut SqliteConnection,
    reading_name: &str,
    limit: i64,
) -> Result<Vec<Reading>, ReadingError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    Ok(readings::table
        .filter(readings::deleted.eq(RecordState::Active))
        .filter(readings::name.eq(reading_name))
        .order((readings::datetime.desc(), readings::id.desc()))
        .limit(limit)
        .select(Reading::as_select())
        .load(conn)?)
}

/// Returns the latest visible reading for each requested name, in request
/// order. Repeated names are reported once, at their first position.
pub fn fetch_latest_per_name(
    conn: &mut SqliteConnection,
    names: &[String],
) -> Result<Vec<LatestReading>, ReadingError> {
    let mut latest: Vec<LatestReading> = Vec::with_capacity(names.len());

    for reading_name in names {
        if latest.iter().any(|entry| &entry.name == reading_name) {
            continue;
        }
        let reading = fetch_most_recent(conn, reading_name, 1)?.into_iter().next();
        latest.push(LatestReading {
            name: reading_name.clone(),
            reading,
        });
    }

    Ok(latest)
}

/// Distinct names that have at least one visible reading, sorted.
pub fn list_names(conn: &mut SqliteConnection) -> Result<Vec<String>, ReadingError> {
    Ok(readings::table
        .filter(readings::deleted.eq(RecordState::Active))
        .select(readings::name)
        .distinct()
        .order(readings::name.asc())
        .load::<String>(conn)?)
}

/// Gets a visible reading by its ID.
pub fn get_reading(
    conn: &mut SqliteConnection,
    reading_id: i32,
) -> Result<Option<Reading>, ReadingError> {
    Ok(readings::table
        .filter(readings::id.eq(reading_id))
        .filter(readings::deleted.eq(RecordState::Active))
        .select(Reading::as_select())
        .first(conn)
        .optional()?)
}

/// Gets a reading by its ID regardless of its state.
pub fn get_reading_any_state(
    conn: &mut SqliteConnection,
    reading_id: i32,
) -> Result<Option<Reading>, ReadingError> {
    Ok(readings::table
        .filter(readings::id.eq(reading_id))
        .select(Reading::as_select())
        .first(conn)
        .optional()?)
}

/// Lists readings for the admin CLI, newest first, optionally including
/// soft-deleted rows.
pub fn list_readings(
    conn: &mut SqliteConnection,
    name_filter: Option<&str>,
    include_deleted: bool,
    limit: i64,
) -> Result<Vec<Reading>, ReadingError> {
    let mut query = readings::table.into_boxed();
    if let Some(reading_name) = name_filter {
        query = query.filter(readings::name.eq(reading_name.to_string()));
    }
    if !include_deleted {
        query = query.filter(readings::deleted.eq(RecordState::Active));
    }

    Ok(query
        .order((readings::datetime.desc(), readings::id.desc()))
        .limit(limit)
        .select(Reading::as_select())
        .load(conn)?)
}

/// Inserts a single reading and returns the stored row.
pub fn insert_reading(
    conn: &mut SqliteConnection,
    new_reading: NewReading,
) -> Result<Reading, ReadingError> {
    ensure_finite(new_reading.value)?;

    diesel::insert_into(readings::table)
        .values(&new_reading)
        .execute(conn)?;

    let last_id = diesel::sql_query("SELECT last_insert_rowid() as last_insert_rowid")
        .get_result::<LastInsertRowId>(conn)?
        .last_insert_rowid;

    let last_id = row_id(last_id)?;
    get_reading_any_state(conn, last_id)?.ok_or(ReadingError::NotFound(last_id))
}

// Reading ids are `INTEGER` columns mapped to i32; a rowid past that range
// means the table can no longer be addressed.
fn row_id(rowid: i64) -> Result<i32, ReadingError> {
    i32::try_from(rowid)
        .map_err(|_| ReadingError::StorageUnavailable(format!("row id {} out of range", rowid)))
}

/// Inserts a batch of readings in one transaction.
///
/// Every value is validated before anything is written; a single bad value
/// or store fault leaves the table untouched.
pub fn insert_readings_batch(
    conn: &mut SqliteConnection,
    new_readings: Vec<NewReading>,
) -> Result<Vec<Reading>, ReadingError> {
    for reading in &new_readings {
        ensure_finite(reading.value)?;
    }

    conn.transaction::<_, ReadingError, _>(|conn| {
        new_readings
            .into_iter()
            .map(|reading| insert_reading(conn, reading))
            .collect()
    })
}

/// Overwrites the value of a visible reading if its version still matches
/// `expected_version`, bumping the version.
pub fn update_reading_value(
    conn: &mut SqliteConnection,
    reading_id: i32,
    new_value: f64,
    expected_version: i32,
) -> Result<Reading, ReadingError> {
    ensure_finite(new_value)?;

    conn.transaction::<_, ReadingError, _>(|conn| {
        let current = get_reading(conn, reading_id)?.ok_or(ReadingError::NotFound(reading_id))?;

        let updated = diesel::update(
            readings::table
                .filter(readings::id.eq(reading_id))
                .filter(readings::version.eq(expected_version)),
        )
        .set((
            readings::value.eq(new_value),
            readings::version.eq(readings::version + 1),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(ReadingError::Conflict {
                id: reading_id,
                expected: expected_version,
                actual: current.version,
            });
        }

        get_reading_any_state(conn, reading_id)?.ok_or(ReadingError::NotFound(reading_id))
    })
}

fn set_reading_state(
    conn: &mut SqliteConnection,
    reading_id: i32,
    expected_version: i32,
    target: RecordState,
) -> Result<Reading, ReadingError> {
    conn.transaction::<_, ReadingError, _>(|conn| {
        let current = get_reading_any_state(conn, reading_id)?
            .ok_or(ReadingError::NotFound(reading_id))?;

        // Already in the requested state; nothing to write.
        if current.deleted == target {
            return Ok(current);
        }

        let updated = diesel::update(
            readings::table
                .filter(readings::id.eq(reading_id))
                .filter(readings::version.eq(expected_version)),
        )
        .set((
            readings::deleted.eq(target),
            readings::version.eq(readings::version + 1),
        ))
        .execute(conn)?;

        if updated == 0 {
            return Err(ReadingError::Conflict {
                id: reading_id,
                expected: expected_version,
                actual: current.version,
            });
        }

        get_reading_any_state(conn, reading_id)?.ok_or(ReadingError::NotFound(reading_id))
    })
}

/// Hides a reading from every read query. The row is kept.
pub fn soft_delete_reading(
    conn: &mut SqliteConnection,
    reading_id: i32,
    expected_version: i32,
) -> Result<Reading, ReadingError> {
    set_reading_state(conn, reading_id, expected_version, RecordState::Deleted)
}

/// Makes a soft-deleted reading visible again.
pub fn restore_reading(
    conn: &mut SqliteConnection,
    reading_id: i32,
    expected_version: i32,
) -> Result<Reading, ReadingError> {
    set_reading_state(conn, reading_id, expected_version, RecordState::Active)
}

use chrono::NaiveDateTime;
use diesel::{
    Identifiable, Insertable, Queryable, Selectable,
    deserialize::{self, FromSql},
    serialize::{self, Output, ToSql},
    sql_types::Integer,
    sqlite::Sqlite,
};
use rocket::FromFormField;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::schema::readings;

/// Visibility of a reading row.
///
/// The `deleted` column stores `1` for a visible row and `0` for a
/// soft-deleted one, so the "active" state is the larger number.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    TS,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = Integer)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    Active,
    Deleted,
}

impl RecordState {
    /// Raw value stored in the `deleted` column.
    pub fn flag(self) -> i32 {
        match self {
            RecordState::Active => 1,
            RecordState::Deleted => 0,
        }
    }
}

impl ToSql<Integer, Sqlite> for RecordState {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
        out.set_value(self.flag());
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Integer, Sqlite> for RecordState {
    fn from_sql(
        bytes: <Sqlite as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        match <i32 as FromSql<Integer, Sqlite>>::from_sql(bytes)? {
            1 => Ok(RecordState::Active),
            0 => Ok(RecordState::Deleted),
            other => Err(format!("Invalid deleted flag value: {}", other).into()),
        }
    }
}

/// Which column a set of labels is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromFormField, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum QueryField {
    #[default]
    Name,
    Type,
}

/// Serializes naive UTC timestamps as RFC 3339 with a `Z` suffix and
/// accepts any RFC 3339 offset on input, normalizing it to UTC.
pub mod utc_datetime {
    use chrono::{DateTime, FixedOffset, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.and_utc().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let parsed = DateTime::<FixedOffset>::deserialize(deserializer)?;
        Ok(parsed.naive_utc())
    }
}

#[derive(
    Queryable, Selectable, Identifiable, Debug, Clone, PartialEq, Serialize, Deserialize, TS,
)]
#[diesel(table_name = readings)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
#[ts(export)]
pub struct Reading {
    pub id: i32,
    #[serde(with = "utc_datetime")]
    #[ts(type = "string")]
    pub datetime: NaiveDateTime,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub value: f64,
    pub deleted: RecordState,
    pub version: i32,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = readings)]
pub struct NewReading {
    pub datetime: NaiveDateTime,
    pub name: String,
    #[diesel(column_name = type_)]
    pub type_: String,
    pub value: f64,
    pub deleted: RecordState,
    pub version: i32,
}

// For API inputs and validation
#[derive(Deserialize, Serialize, Debug, Clone, TS)]
#[ts(export)]
pub struct ReadingInput {
    #[serde(with = "utc_datetime")]
    #[ts(type = "string")]
    pub datetime: NaiveDateTime,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub value: f64,
}

impl From<ReadingInput> for NewReading {
    fn from(input: ReadingInput) -> Self {
        NewReading {
            datetime: input.datetime,
            name: input.name,
            type_: input.type_,
            value: input.value,
            deleted: RecordState::Active,
            version: 1,
        }
    }
}

/// Value edit carrying the version the editor last saw.
#[derive(Deserialize, Serialize, Debug, Clone, TS)]
#[ts(export)]
pub struct ReadingValueUpdate {
    pub value: f64,
    pub version: i32,
}

/// Latest visible reading for one requested name; `reading` is `None`
/// when no visible reading exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LatestReading {
    pub name: String,
    pub reading: Option<Reading>,
}

//! `reef-admin reading ...`: inspect readings, add them one at a time or
//! in bulk from CSV, and toggle their visibility.

use clap::Subcommand;
use diesel::sqlite::SqliteConnection;
use reef_api::models::{NewReading, Reading, ReadingInput};
use reef_api::orm::reading::{
    get_reading_any_state, insert_reading, insert_readings_batch, list_readings, restore_reading,
    soft_delete_reading,
};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::admin_cli::utils::parse_timestamp;

#[derive(Subcommand)]
pub enum ReadingAction {
    #[command(about = "List readings, newest first")]
    Ls {
        #[arg(short, long, help = "Only readings with this name")]
        name: Option<String>,
        #[arg(short, long, help = "Include soft-deleted readings")]
        all: bool,
        #[arg(short, long, default_value_t = 50, help = "Maximum number of rows")]
        limit: i64,
    },
    #[command(about = "Add a single reading")]
    Add {
        #[arg(short, long, help = "Timestamp (RFC 3339, or YYYY-MM-DD HH:MM:SS in UTC)")]
        datetime: String,
        #[arg(short, long, help = "Reading name, e.g. Salinity")]
        name: String,
        #[arg(short = 't', long = "type", help = "Reading type code, e.g. Salt")]
        type_: String,
        #[arg(short, long, help = "Measured value", allow_negative_numbers = true)]
        value: f64,
    },
    #[command(about = "Import readings from a CSV file with columns datetime,name,type,value")]
    Import {
        #[arg(help = "Path to the CSV file")]
        path: String,
    },
    #[command(about = "Soft-delete a reading")]
    Rm {
        #[arg(help = "Reading ID")]
        id: i32,
    },
    #[command(about = "Restore a soft-deleted reading")]
    Restore {
        #[arg(help = "Reading ID")]
        id: i32,
    },
}

#[derive(Debug, Deserialize)]
struct CsvReading {
    datetime: String,
    name: String,
    #[serde(rename = "type")]
    type_: String,
    value: f64,
}

pub fn handle_reading_command_with_conn(
    conn: &mut SqliteConnection,
    action: ReadingAction,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ReadingAction::Ls { name, all, limit } => {
            reading_ls_impl(conn, name.as_deref(), all, limit)?;
        }
        ReadingAction::Add {
            datetime,
            name,
            type_,
            value,
        } => {
            reading_add_impl(conn, &datetime, name, type_, value)?;
        }
        ReadingAction::Import { path } => {
            reading_import_impl(conn, &path)?;
        }
        ReadingAction::Rm { id } => {
            reading_rm_impl(conn, id)?;
        }
        ReadingAction::Restore { id } => {
            reading_restore_impl(conn, id)?;
        }
    }
    Ok(())
}

fn print_reading(reading: &Reading) {
    println!(
        "  ID: {}, {}, {} ({}) = {}, Version: {}, State: {:?}",
        reading.id,
        reading.datetime.and_utc().to_rfc3339(),
        reading.name,
        reading.type_,
        reading.value,
        reading.version,
        reading.deleted
    );
}

pub fn reading_ls_impl(
    conn: &mut SqliteConnection,
    name: Option<&str>,
    include_deleted: bool,
    limit: i64,
) -> Result<Vec<Reading>, Box<dyn std::error::Error>> {
    let readings = list_readings(conn, name, include_deleted, limit)?;

    if readings.is_empty() {
        println!("No readings found.");
    } else {
        println!("Readings:");
        for reading in &readings {
            print_reading(reading);
        }
    }

    Ok(readings)
}

pub fn reading_add_impl(
    conn: &mut SqliteConnection,
    datetime: &str,
    name: String,
    type_: String,
    value: f64,
) -> Result<Reading, Box<dyn std::error::Error>> {
    let input = ReadingInput {
        datetime: parse_timestamp(datetime)?,
        name,
        type_,
        value,
    };
    let reading = insert_reading(conn, NewReading::from(input))?;

    println!("Reading created successfully!");
    print_reading(&reading);
    Ok(reading)
}

/// Parses CSV rows into insertable readings. Any malformed row fails the
/// whole parse, naming its line.
pub fn parse_readings_csv<R: Read>(source: R) -> Result<Vec<NewReading>, Box<dyn std::error::Error>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);

    let mut parsed = Vec::new();
    for (index, result) in rdr.deserialize::<CsvReading>().enumerate() {
        // Header is line 1
        let line = index + 2;
        let row = result.map_err(|e| format!("Line {}: {}", line, e))?;
        let datetime = parse_timestamp(&row.datetime).map_err(|e| format!("Line {}: {}", line, e))?;

        parsed.push(NewReading::from(ReadingInput {
            datetime,
            name: row.name,
            type_: row.type_,
            value: row.value,
        }));
    }

    Ok(parsed)
}

/// Imports every row of a CSV file in one batch; nothing is written if any
/// row is bad.
pub fn reading_import_impl(
    conn: &mut SqliteConnection,
    path: impl AsRef<Path>,
) -> Result<usize, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| format!("Cannot open '{}': {}", path.display(), e))?;
    let new_readings = parse_readings_csv(file)?;

    if new_readings.is_empty() {
        println!("No readings found in '{}'.", path.display());
        return Ok(0);
    }

    let inserted = insert_readings_batch(conn, new_readings)?;
    println!("Imported {} reading(s) from '{}'.", inserted.len(), path.display());
    Ok(inserted.len())
}

pub fn reading_rm_impl(
    conn: &mut SqliteConnection,
    reading_id: i32,
) -> Result<Reading, Box<dyn std::error::Error>> {
    let current = get_reading_any_state(conn, reading_id)?
        .ok_or_else(|| format!("Reading with ID {} not found", reading_id))?;
    let reading = soft_delete_reading(conn, reading_id, current.version)?;

    println!("Deleted reading {}", reading_id);
    Ok(reading)
}

pub fn reading_restore_impl(
    conn: &mut SqliteConnection,
    reading_id: i32,
) -> Result<Reading, Box<dyn std::error::Error>> {
    let current = get_reading_any_state(conn, reading_id)?
        .ok_or_else(|| format!("Reading with ID {} not found", reading_id))?;
    let reading = restore_reading(conn, reading_id, current.version)?;

    println!("Restored reading {}", reading_id);
    Ok(reading)
}

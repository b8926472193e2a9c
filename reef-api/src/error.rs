//! Error types shared by the reading store and the HTTP layer.

use std::time::Duration;

use rocket::http::Status;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadingError {
    /// The store could not be reached, timed out, or returned a fault.
    /// Never retried here; callers decide.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("Reading with ID {0} not found")]
    NotFound(i32),
    #[error("Reading {id} was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { id: i32, expected: i32, actual: i32 },
    #[error("Reading value must be a finite number, got {0}")]
    InvalidValue(f64),
}

impl ReadingError {
    /// HTTP status reported to API clients for this error.
    pub fn status(&self) -> Status {
        match self {
            ReadingError::StorageUnavailable(_) => Status::ServiceUnavailable,
            ReadingError::NotFound(_) => Status::NotFound,
            ReadingError::Conflict { .. } => Status::Conflict,
            ReadingError::InvalidValue(_) => Status::UnprocessableEntity,
        }
    }
}

/// A store call that did not finish within its deadline.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("store did not respond within {}s", .0.as_secs())]
pub struct StoreTimeout(pub Duration);

impl From<StoreTimeout> for ReadingError {
    fn from(e: StoreTimeout) -> Self {
        ReadingError::StorageUnavailable(e.to_string())
    }
}

impl From<diesel::result::Error> for ReadingError {
    fn from(e: diesel::result::Error) -> Self {
        ReadingError::StorageUnavailable(e.to_string())
    }
}

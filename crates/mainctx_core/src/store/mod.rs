//! Store coordination: binding the object model to a SQLite backing file.
//!
//! # Responsibility
//! - Open and bootstrap the backing store for one context.
//! - Apply save batches atomically and serve record fetches.
//!
//! # Invariants
//! - Model version is mirrored to `PRAGMA user_version`.
//! - Context code must not read/write records before bootstrap succeeds.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod coordinator;
mod schema;

pub use coordinator::{SaveBatch, StoreCoordinator};

pub type StoreResult<T> = Result<T, StoreError>;

/// Store open/bootstrap/IO errors.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    UnsupportedSchemaVersion {
        store_version: u32,
        model_version: u32,
    },
    MissingEntityTable(String),
    MissingAttributeColumn { table: String, column: String },
    UnknownEntity(String),
    InvalidPersistedData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "store file operation failed: {err}"),
            Self::UnsupportedSchemaVersion {
                store_version,
                model_version,
            } => write!(
                f,
                "store schema version {store_version} is newer than model version {model_version}"
            ),
            Self::MissingEntityTable(table) => {
                write!(f, "store is missing entity table: {table}")
            }
            Self::MissingAttributeColumn { table, column } => {
                write!(f, "store table {table} is missing attribute column: {column}")
            }
            Self::UnknownEntity(entity) => {
                write!(f, "entity not in the bound object model: {entity}")
            }
            Self::InvalidPersistedData(message) => {
                write!(f, "invalid persisted record data: {message}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

//! Parcel store bootstrap.
//!
//! Everything the repository needs before its first query lives here:
//! opening the SQLite file (or an in-memory store for tests), tuning the
//! connection and bringing the `parcel` table to the schema this build
//! understands. The schema version is kept in `PRAGMA user_version`; a store
//! stamped by a newer build is left untouched and reported as an error.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening, migrating or querying the parcel store.
#[derive(Debug)]
pub enum DbError {
    /// SQLite refused the statement or the file could not be opened.
    Sqlite(rusqlite::Error),
    /// The store was migrated by a newer build of the tracker.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "parcel store error: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "parcel store is at schema v{db_version}, this build only knows up to v{latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

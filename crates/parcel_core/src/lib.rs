//! Parcel tracking data layer.
//!
//! Parcels are stored in SQLite through [`SqliteParcelRepository`];
//! [`ParcelService`] adds registration timestamps and status advancement.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::parcel::{
    format_timestamp, ClientId, Parcel, ParcelNumber, ParcelStatus, ParcelValidationError,
};
pub use repo::parcel_repo::{
    GatedOperation, ParcelRepository, RepoError, RepoResult, SqliteParcelRepository,
};
pub use service::parcel_service::ParcelService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}

//! Parcel use-case service.
//!
//! # Responsibility
//! - Stamp new parcels as registered at the current UTC instant.
//! - Advance status along `registered -> sent -> delivered`.
//! - Delegate every other operation to the repository unchanged.
//!
//! # Invariants
//! - The service holds no state besides the repository handle.
//! - Repository errors are returned as-is.

use crate::model::parcel::{ClientId, Parcel, ParcelNumber, ParcelStatus};
use crate::repo::parcel_repo::{ParcelRepository, RepoResult};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};

/// Business-rule layer over a parcel repository.
pub struct ParcelService<R: ParcelRepository> {
    repo: R,
}

impl<R: ParcelRepository> ParcelService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers a new parcel for `client`, timestamped now.
    pub fn register(&self, client: ClientId, address: impl Into<String>) -> RepoResult<Parcel> {
        self.register_at(client, address, Utc::now())
    }

    /// Registers a new parcel with an explicit creation instant.
    ///
    /// # Contract
    /// - Status is forced to `registered`.
    /// - The returned parcel carries the store-assigned number.
    pub fn register_at(
        &self,
        client: ClientId,
        address: impl Into<String>,
        at: DateTime<Utc>,
    ) -> RepoResult<Parcel> {
        let mut parcel = Parcel::registered(client, address, at);
        parcel.number = self.repo.add(&parcel).inspect_err(|err| {
            warn!("event=parcel_register module=service status=error client={client} error={err}");
        })?;

        info!(
            "event=parcel_register module=service status=ok number={} client={client}",
            parcel.number
        );
        Ok(parcel)
    }

    pub fn get(&self, number: ParcelNumber) -> RepoResult<Parcel> {
        self.repo.get(number)
    }

    /// Changes the delivery address; fails once the parcel has been sent.
    pub fn change_address(&self, number: ParcelNumber, address: &str) -> RepoResult<()> {
        self.repo.set_address(number, address)?;
        info!("event=parcel_change_address module=service status=ok number={number}");
        Ok(())
    }

    /// Moves the parcel one step forward and returns its resulting status.
    ///
    /// A delivered parcel stays delivered; this is reported as success
    /// without touching the store. A concurrent change between the read and
    /// the write surfaces as `RepoError::StatusConflict`.
    pub fn next_status(&self, number: ParcelNumber) -> RepoResult<ParcelStatus> {
        let current = self.repo.get(number)?.status;
        if current.is_terminal() {
            debug!("event=parcel_next_status module=service status=noop number={number} current={current}");
            return Ok(current);
        }

        let next = self.repo.advance_status(number, current).inspect_err(|err| {
            warn!("event=parcel_next_status module=service status=error number={number} error={err}");
        })?;
        info!(
            "event=parcel_next_status module=service status=ok number={number} from={current} to={next}"
        );
        Ok(next)
    }

    /// Deletes a parcel that is still registered.
    pub fn delete(&self, number: ParcelNumber) -> RepoResult<()> {
        self.repo.delete(number)?;
        info!("event=parcel_delete module=service status=ok number={number}");
        Ok(())
    }

    pub fn list_by_client(&self, client: ClientId) -> RepoResult<Vec<Parcel>> {
        self.repo.get_by_client(client)
    }
}

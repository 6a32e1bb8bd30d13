//! Parcel entity, lifecycle status and write-path validation.
//!
//! # Invariants
//! - `number` is assigned by the store and never reused.
//! - `created_at` is an RFC 3339 UTC timestamp set once at registration.
//! - `address` is mutable only while `status == ParcelStatus::Registered`.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned parcel identifier.
pub type ParcelNumber = i64;

/// Opaque identifier of the client owning a parcel.
pub type ClientId = i64;

/// Placeholder number carried by parcels that were not stored yet.
pub const UNASSIGNED_NUMBER: ParcelNumber = 0;

/// Lifecycle stage of a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParcelStatus {
    /// Accepted for delivery; address may still change.
    Registered,
    /// Handed over to the carrier.
    Sent,
    /// Terminal state.
    Delivered,
}

impl ParcelStatus {
    /// Canonical lowercase name, also used as the persisted value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "registered",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
        }
    }

    /// Parses a canonical status name.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "registered" => Some(Self::Registered),
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            _ => None,
        }
    }

    /// Returns the following stage, or `None` once delivered.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Sent),
            Self::Sent => Some(Self::Delivered),
            Self::Delivered => None,
        }
    }

    /// Whether no further status follows; `next_status` stops here.
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl Display for ParcelStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failure for parcel write paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParcelValidationError {
    EmptyAddress,
    EmptyCreatedAt,
    InvalidCreatedAt(String),
}

impl Display for ParcelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyAddress => write!(f, "parcel address cannot be empty"),
            Self::EmptyCreatedAt => write!(f, "parcel created_at cannot be empty"),
            Self::InvalidCreatedAt(value) => {
                write!(f, "parcel created_at `{value}` is not an RFC 3339 timestamp")
            }
        }
    }
}

impl Error for ParcelValidationError {}

/// A tracked shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parcel {
    /// Store-assigned identifier; `UNASSIGNED_NUMBER` before insertion.
    pub number: ParcelNumber,
    pub client: ClientId,
    pub status: ParcelStatus,
    /// Free-text delivery address.
    pub address: String,
    /// RFC 3339 UTC timestamp, e.g. `2024-05-01T10:15:30Z`.
    pub created_at: String,
}

impl Parcel {
    /// Builds a not-yet-stored parcel in the `registered` state.
    pub fn registered(client: ClientId, address: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            number: UNASSIGNED_NUMBER,
            client,
            status: ParcelStatus::Registered,
            address: address.into(),
            created_at: format_timestamp(at),
        }
    }

    /// Checks fields required before persistence.
    pub fn validate(&self) -> Result<(), ParcelValidationError> {
        validate_address(&self.address)?;
        if self.created_at.trim().is_empty() {
            return Err(ParcelValidationError::EmptyCreatedAt);
        }
        if DateTime::parse_from_rfc3339(&self.created_at).is_err() {
            return Err(ParcelValidationError::InvalidCreatedAt(
                self.created_at.clone(),
            ));
        }
        Ok(())
    }

    /// Whether address changes and deletion are still allowed.
    pub fn is_mutable(&self) -> bool {
        self.status == ParcelStatus::Registered
    }
}

/// Rejects blank delivery addresses.
pub fn validate_address(address: &str) -> Result<(), ParcelValidationError> {
    if address.trim().is_empty() {
        return Err(ParcelValidationError::EmptyAddress);
    }
    Ok(())
}

/// Formats an instant the way `created_at` is stored.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

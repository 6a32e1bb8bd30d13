//! Parcel use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into business operations.
//! - Keep callers (CLI, tests) decoupled from storage details.

pub mod parcel_service;

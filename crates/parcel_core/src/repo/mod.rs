//! Repository layer contracts and SQLite implementation.
//!
//! # Responsibility
//! - Translate parcel operations into parameterized SQL statements.
//! - Keep status-gated mutation checks next to the writes they guard.
//!
//! # Invariants
//! - Write paths validate input before touching the store.
//! - Missing rows surface as `RepoError::NotFound`, never as silent no-ops.

pub mod parcel_repo;

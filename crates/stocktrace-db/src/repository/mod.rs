//! # Repository Modules
//!
//! Each repository owns the SQL for one slice of the ledger store:
//!
//! - [`category`] - categories (natural key: name)
//! - [`location`] - location tree (natural key: generated code)
//! - [`item`] - items and their variants (natural key: generated code)
//! - [`ledger`] - the append-only stock transaction ledger
//! - [`scan`] - the pending scan queue

pub mod category;
pub mod item;
pub mod ledger;
pub mod location;
pub mod scan;

use uuid::Uuid;

/// Generates a new entity ID (UUID v4, offline-safe).
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

//! # stocktrace-core: Pure Domain Logic for the Inventory Ledger
//!
//! This crate is the **heart** of the stocktrace offline core. It contains
//! the domain types and pure logic shared by the local ledger store and the
//! sync engine, with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     stocktrace Architecture                         │
//! │                                                                     │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │           Surrounding Application (UI, reports, auth)         │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │ in-process calls                  │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │              ★ stocktrace-core (THIS CRATE) ★                 │ │
//! │  │                                                               │ │
//! │  │  ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌────────────────┐  │ │
//! │  │  │  types  │  │  codes  │  │  backup  │  │   validation   │  │ │
//! │  │  │ Item    │  │ ITM-…   │  │ Snapshot │  │  stock policy  │  │ │
//! │  │  │ Ledger  │  │ BLD-…   │  │ validate │  │  field checks  │  │ │
//! │  │  └─────────┘  └─────────┘  └──────────┘  └────────────────┘  │ │
//! │  │                                                               │ │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS          │ │
//! │  └──────────────────────────────┬────────────────────────────────┘ │
//! │                                 │                                   │
//! │  ┌──────────────────────────────▼────────────────────────────────┐ │
//! │  │               stocktrace-db (Ledger Store, SQLite)            │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Category, Location, Item, StockTransaction, ...)
//! - [`codes`] - Sequential entity code formatting and classification
//! - [`backup`] - Snapshot format and structural validation
//! - [`validation`] - Stock policy and field validation
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic, same input = same output
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Explicit Errors**: all errors are typed, never strings or panics
//! 4. **The ledger is an accounting primitive**: stock policy (e.g. "no
//!    negative stock") lives in [`validation`], never in the ledger itself

pub mod backup;
pub mod codes;
pub mod error;
pub mod types;
pub mod validation;

pub use backup::{Snapshot, SnapshotData, SNAPSHOT_VERSION};
pub use error::{CoreError, ValidationError};
pub use types::*;

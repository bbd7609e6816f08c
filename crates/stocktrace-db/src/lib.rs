//! # stocktrace-db: Ledger Store for stocktrace
//!
//! This crate provides local database access for the offline inventory
//! core. It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      stocktrace Data Flow                           │
//! │                                                                     │
//! │  Application hook (record stock movement, serve scan, export)       │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌───────────────────────────────────────────────────────────────┐ │
//! │  │                  stocktrace-db (THIS CRATE)                   │ │
//! │  │                                                               │ │
//! │  │  ┌────────────┐   ┌────────────────┐   ┌──────────────┐      │ │
//! │  │  │  Database  │   │  Repositories  │   │  Migrations  │      │ │
//! │  │  │  (pool.rs) │   │ category, item │   │  (embedded)  │      │ │
//! │  │  │            │◄──│ location,      │   │ 001_init.sql │      │ │
//! │  │  │ SqlitePool │   │ ledger, scan   │   │              │      │ │
//! │  │  └────────────┘   └────────────────┘   └──────────────┘      │ │
//! │  │                                                               │ │
//! │  │          ┌──────────────────────────────┐                     │ │
//! │  │          │  BackupCodec (export/import) │                     │ │
//! │  │          └──────────────────────────────┘                     │ │
//! │  └───────────────────────────────────────────────────────────────┘ │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  SQLite database file (or :memory: in tests)                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (category, location, item,
//!   ledger, scan)
//! - [`backup`] - Snapshot export/import codec
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stocktrace_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/stocktrace.db")).await?;
//!
//! // Record a stock movement atomically
//! let tx = db.ledger()
//!     .record(StockMutation::new(
//!         StockTarget::Item(item.id.clone()),
//!         TransactionType::StockOut,
//!         3,
//!         "user-1",
//!     ))
//!     .await?;
//! ```

pub mod backup;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use backup::{BackupCodec, ImportMode, ImportReport};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::item::ItemRepository;
pub use repository::ledger::{LedgerRepository, StockMutation};
pub use repository::location::LocationRepository;
pub use repository::scan::ScanRepository;

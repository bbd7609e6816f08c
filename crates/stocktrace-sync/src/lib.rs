//! # stocktrace-sync: Reconciliation Engine for stocktrace
//!
//! This crate pushes local ledger state to a remote store and serves scan
//! lookups offline-first. The device is always usable without a network;
//! sync is a background best-effort that never blocks local writes.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Sync Architecture                               │
//! │                                                                     │
//! │  ┌────────────────────────────────────────────────────────────┐    │
//! │  │                SyncEngine (engine.rs)                      │    │
//! │  │                                                            │    │
//! │  │  One cycle = three table passes + scan drain               │    │
//! │  │  Categories → Locations → Items (natural-key matched)      │    │
//! │  │  Push-biased last-write-wins, per-row error accumulation   │    │
//! │  └───────────────┬────────────────────────┬───────────────────┘    │
//! │                  │                        │                        │
//! │                  ▼                        ▼                        │
//! │  ┌────────────────────────┐  ┌─────────────────────────────────┐  │
//! │  │  ScanQueue             │  │  RemoteStore (remote.rs)        │  │
//! │  │  (scan_queue.rs)       │  │                                 │  │
//! │  │                        │  │  trait over the remote endpoint │  │
//! │  │  serve_scan: offline   │  │  HttpRemote: PostgREST-style    │  │
//! │  │  lookup + enqueue      │  │  JSON over HTTPS via reqwest    │  │
//! │  │  drain_pending: replay │  │                                 │  │
//! │  └────────────────────────┘  └─────────────────────────────────┘  │
//! │                                                                     │
//! │  SyncConfig (config.rs): device identity + remote endpoint,         │
//! │  TOML file with environment overrides                               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod remote;
pub mod scan_queue;

pub use config::{DeviceConfig, RemoteConfig, SyncConfig};
pub use engine::{SyncEngine, SyncOutcome, SyncReport, SyncStatus};
pub use error::{SyncError, SyncResult};
pub use remote::{HttpRemote, RemoteStore, RemoteTable};
pub use scan_queue::{DrainReport, ScanQueue};

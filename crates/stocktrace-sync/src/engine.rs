//! # Sync Reconciliation Engine
//!
//! Pushes local ledger state to the remote store, one natural-key-matched
//! row at a time, then drains the scan queue.
//!
//! ## Cycle Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Sync Cycle                                  │
//! │                                                                     │
//! │  sync_cycle()                                                       │
//! │    │                                                                │
//! │    ├─ already running?  ──yes──► SyncOutcome::AlreadyRunning        │
//! │    │                                                                │
//! │    ├─ Pass 1: categories  (matched by name)                         │
//! │    ├─ Pass 2: locations   (matched by code, parent as parent_code)  │
//! │    ├─ Pass 3: items       (matched by code, refs as names/codes)    │
//! │    │      per row: missing remotely    → insert                     │
//! │    │               local strictly newer → update (last write wins)  │
//! │    │               otherwise            → skip                      │
//! │    │      per-row errors accumulate, never abort the cycle          │
//! │    │                                                                │
//! │    ├─ record last_sync                                              │
//! │    └─ drain queued scans (one remote write per row, delete on ack)  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The engine is push-biased: remote rows never overwrite local state.
//! Rows use natural keys (category name, location/item code) instead of
//! local UUIDs, so two devices seeding the same catalog converge instead
//! of duplicating.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::remote::{RemoteStore, RemoteTable};
use crate::scan_queue::ScanQueue;
use stocktrace_db::Database;

// =============================================================================
// Outcome and Report
// =============================================================================

/// Result of asking for a sync cycle.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The cycle ran; here is what happened.
    Completed(SyncReport),
    /// Another cycle was in flight; nothing was done.
    AlreadyRunning,
}

/// Per-cycle accounting: rows pushed per table, scans delivered, and
/// every per-row error encountered along the way.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Category rows inserted or updated remotely.
    pub categories: usize,
    /// Location rows inserted or updated remotely.
    pub locations: usize,
    /// Item rows inserted or updated remotely.
    pub items: usize,
    /// Queued scans delivered and dequeued.
    pub scans_delivered: usize,
    /// Per-row failures, as `table/key: cause` strings.
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Total rows pushed across all tables.
    pub fn pushed(&self) -> usize {
        self.categories + self.locations + self.items
    }

    /// Whether every row made it through.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Point-in-time view of the engine, for status surfaces.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// A cycle is currently running.
    pub in_progress: bool,
    /// When the last cycle finished, if one has.
    pub last_sync: Option<DateTime<Utc>>,
    /// Scans still queued for remote delivery.
    pub pending_scans: i64,
}

// =============================================================================
// Engine
// =============================================================================

/// One-way reconciliation engine over a [`RemoteStore`].
pub struct SyncEngine {
    db: Arc<Database>,
    remote: Arc<dyn RemoteStore>,
    in_progress: AtomicBool,
    last_sync: RwLock<Option<DateTime<Utc>>>,
}

/// Clears the in-progress flag when a cycle ends, panics included.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncEngine {
    /// Creates an engine over a local store and a remote.
    pub fn new(db: Arc<Database>, remote: Arc<dyn RemoteStore>) -> Self {
        SyncEngine {
            db,
            remote,
            in_progress: AtomicBool::new(false),
            last_sync: RwLock::new(None),
        }
    }

    /// When the last successful cycle finished, if any.
    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read().await
    }

    /// Snapshot of the engine state for status surfaces.
    pub async fn status(&self) -> SyncResult<SyncStatus> {
        Ok(SyncStatus {
            in_progress: self.in_progress.load(Ordering::SeqCst),
            last_sync: self.last_sync().await,
            pending_scans: ScanQueue::new(self.db.clone()).pending_count().await?,
        })
    }

    /// Runs one full sync cycle, unless one is already in flight.
    pub async fn sync_cycle(&self) -> SyncResult<SyncOutcome> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Sync cycle requested while one is in flight, skipping");
            return Ok(SyncOutcome::AlreadyRunning);
        }
        let _guard = CycleGuard(&self.in_progress);

        info!("Sync cycle starting");
        let mut report = SyncReport::default();

        for table in RemoteTable::PUSH_ORDER {
            match table {
                RemoteTable::Categories => self.push_categories(&mut report).await,
                RemoteTable::Locations => self.push_locations(&mut report).await,
                RemoteTable::Items => self.push_items(&mut report).await,
            }
        }

        *self.last_sync.write().await = Some(Utc::now());

        // the table accounting survives a failed drain
        match ScanQueue::new(self.db.clone())
            .drain_pending(self.remote.as_ref())
            .await
        {
            Ok(drain) => {
                report.scans_delivered = drain.delivered;
                for failure in drain.failures {
                    report.errors.push(failure);
                }
            }
            Err(e) => report.errors.push(format!("scans: {e}")),
        }

        info!(
            pushed = report.pushed(),
            scans = report.scans_delivered,
            errors = report.errors.len(),
            "Sync cycle complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    // =========================================================================
    // Table Passes
    // =========================================================================

    async fn push_categories(&self, report: &mut SyncReport) {
        let rows = match self.db.categories().list_all().await {
            Ok(rows) => rows,
            Err(e) => {
                report.errors.push(format!("categories: {e}"));
                return;
            }
        };

        for category in rows {
            let payload = json!({
                "name": category.name,
                "description": category.description,
                "color": category.color,
                "icon": category.icon,
                "is_active": category.is_active,
                "updated_at": category.updated_at,
            });

            match self
                .push_row(RemoteTable::Categories, &category.name, category.updated_at, payload)
                .await
            {
                Ok(true) => report.categories += 1,
                Ok(false) => {}
                Err(e) => report
                    .errors
                    .push(format!("categories/{}: {e}", category.name)),
            }
        }
    }

    async fn push_locations(&self, report: &mut SyncReport) {
        let rows = match self.db.locations().list_all().await {
            Ok(rows) => rows,
            Err(e) => {
                report.errors.push(format!("locations: {e}"));
                return;
            }
        };

        for location in rows {
            let parent_code = match self.location_code(location.parent_id.as_deref()).await {
                Ok(code) => code,
                Err(e) => {
                    report
                        .errors
                        .push(format!("locations/{}: {e}", location.code));
                    continue;
                }
            };

            let payload = json!({
                "code": location.code,
                "name": location.name,
                "location_type": location.location_type,
                "parent_code": parent_code,
                "is_active": location.is_active,
                "updated_at": location.updated_at,
            });

            match self
                .push_row(RemoteTable::Locations, &location.code, location.updated_at, payload)
                .await
            {
                Ok(true) => report.locations += 1,
                Ok(false) => {}
                Err(e) => report
                    .errors
                    .push(format!("locations/{}: {e}", location.code)),
            }
        }
    }

    async fn push_items(&self, report: &mut SyncReport) {
        let rows = match self.db.items().list_all().await {
            Ok(rows) => rows,
            Err(e) => {
                report.errors.push(format!("items: {e}"));
                return;
            }
        };

        for item in rows {
            let references = self.item_references(&item).await;
            let (category_name, location_code) = match references {
                Ok(refs) => refs,
                Err(e) => {
                    report.errors.push(format!("items/{}: {e}", item.code));
                    continue;
                }
            };

            let payload = json!({
                "code": item.code,
                "name": item.name,
                "description": item.description,
                "category_name": category_name,
                "location_code": location_code,
                "current_stock": item.current_stock,
                "minimum_stock": item.minimum_stock,
                "unit": item.unit,
                "has_variants": item.has_variants,
                "is_active": item.is_active,
                "updated_at": item.updated_at,
            });

            match self
                .push_row(RemoteTable::Items, &item.code, item.updated_at, payload)
                .await
            {
                Ok(true) => report.items += 1,
                Ok(false) => {}
                Err(e) => report.errors.push(format!("items/{}: {e}", item.code)),
            }
        }
    }

    // =========================================================================
    // Row Push
    // =========================================================================

    /// Pushes one row: insert when missing remotely, update when the
    /// local copy is strictly newer. Returns whether a write happened.
    async fn push_row(
        &self,
        table: RemoteTable,
        key: &str,
        local_updated: DateTime<Utc>,
        payload: Value,
    ) -> SyncResult<bool> {
        match self.remote.find_by_natural_key(table, key).await? {
            None => {
                debug!(%table, key, "Remote row missing, inserting");
                self.remote.insert_row(table, &payload).await?;
                Ok(true)
            }
            Some(remote_row) => {
                match remote_updated_at(&remote_row) {
                    Some(remote_updated) if local_updated <= remote_updated => {
                        debug!(%table, key, "Remote row newer or equal, skipping");
                        Ok(false)
                    }
                    // missing/unparseable remote timestamp counts as stale
                    _ => {
                        debug!(%table, key, "Local row newer, updating");
                        self.remote.update_row(table, key, &payload).await?;
                        Ok(true)
                    }
                }
            }
        }
    }

    // =========================================================================
    // Reference Resolution
    // =========================================================================

    async fn location_code(&self, id: Option<&str>) -> SyncResult<Option<String>> {
        let Some(id) = id else { return Ok(None) };
        match self.db.locations().get_by_id(id).await? {
            Some(location) => Ok(Some(location.code)),
            None => {
                warn!(id, "Dangling location reference, pushing without it");
                Ok(None)
            }
        }
    }

    async fn item_references(
        &self,
        item: &stocktrace_core::Item,
    ) -> SyncResult<(Option<String>, Option<String>)> {
        let category_name = match &item.category_id {
            Some(id) => self
                .db
                .categories()
                .get_by_id(id)
                .await?
                .map(|c| c.name),
            None => None,
        };
        let location_code = self.location_code(item.location_id.as_deref()).await?;
        Ok((category_name, location_code))
    }

    #[cfg(test)]
    fn mark_in_progress(&self) {
        self.in_progress.store(true, Ordering::SeqCst);
    }
}

/// Parses the remote row's `updated_at` column, tolerating both RFC 3339
/// strings and missing values.
fn remote_updated_at(row: &Value) -> Option<DateTime<Utc>> {
    row.get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::MockRemote;
    use stocktrace_db::repository::category::CategoryInput;
    use stocktrace_db::repository::item::ItemInput;
    use stocktrace_db::repository::location::LocationInput;
    use stocktrace_db::{Database, DbConfig};
    use stocktrace_core::LocationType;

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    fn engine(db: Arc<Database>, remote: Arc<MockRemote>) -> SyncEngine {
        SyncEngine::new(db, remote)
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::AlreadyRunning => panic!("cycle did not run"),
        }
    }

    #[tokio::test]
    async fn first_cycle_inserts_missing_rows() {
        tracing_subscriber::fmt().with_test_writer().try_init().ok();

        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        db.categories()
            .insert(CategoryInput {
                name: "Cables".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let building = db
            .locations()
            .insert(LocationInput {
                name: "Main".into(),
                location_type: LocationType::Building,
                parent_id: None,
            })
            .await
            .unwrap();
        db.locations()
            .insert(LocationInput {
                name: "Workshop".into(),
                location_type: LocationType::Room,
                parent_id: Some(building.id.clone()),
            })
            .await
            .unwrap();
        let item = db
            .items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                initial_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();

        let engine = engine(db, remote.clone());
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.categories, 1);
        assert_eq!(report.locations, 2);
        assert_eq!(report.items, 1);
        assert!(report.is_clean());
        assert!(engine.last_sync().await.is_some());

        let pushed = remote.row(RemoteTable::Items, &item.code).unwrap();
        assert_eq!(pushed["current_stock"], 5);

        // child location carries its parent as a code, not a UUID
        let room = remote.row(RemoteTable::Locations, "RM-00001").unwrap();
        assert_eq!(room["parent_code"], "BLD-00001");
    }

    #[tokio::test]
    async fn newer_local_row_overwrites_remote() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        let item = db
            .items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                initial_stock: 8,
                ..Default::default()
            })
            .await
            .unwrap();

        remote.seed(
            RemoteTable::Items,
            &item.code,
            serde_json::json!({
                "code": item.code,
                "current_stock": 2,
                "updated_at": "2000-01-01T00:00:00Z",
            }),
        );

        let engine = engine(db, remote.clone());
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.items, 1);
        let row = remote.row(RemoteTable::Items, &item.code).unwrap();
        assert_eq!(row["current_stock"], 8);
    }

    #[tokio::test]
    async fn stale_local_row_is_skipped() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        let item = db
            .items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                initial_stock: 8,
                ..Default::default()
            })
            .await
            .unwrap();

        remote.seed(
            RemoteTable::Items,
            &item.code,
            serde_json::json!({
                "code": item.code,
                "current_stock": 42,
                "updated_at": "2100-01-01T00:00:00Z",
            }),
        );

        let engine = engine(db, remote.clone());
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.items, 0);
        assert!(report.is_clean());
        let row = remote.row(RemoteTable::Items, &item.code).unwrap();
        assert_eq!(row["current_stock"], 42);
    }

    #[tokio::test]
    async fn row_errors_do_not_abort_later_passes() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        db.categories()
            .insert(CategoryInput {
                name: "Cables".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        remote.fail_table(RemoteTable::Categories);

        let engine = engine(db, remote.clone());
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.categories, 0);
        assert_eq!(report.items, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("categories/Cables"));
        assert!(engine.last_sync().await.is_some());
    }

    #[tokio::test]
    async fn passes_run_in_dependency_order() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        db.categories()
            .insert(CategoryInput {
                name: "Cables".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.locations()
            .insert(LocationInput {
                name: "Main".into(),
                location_type: LocationType::Building,
                parent_id: None,
            })
            .await
            .unwrap();
        db.items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let engine = engine(db, remote.clone());
        completed(engine.sync_cycle().await.unwrap());

        assert_eq!(
            remote.lookup_order(),
            vec![RemoteTable::Categories, RemoteTable::Locations, RemoteTable::Items]
        );
    }

    #[tokio::test]
    async fn failed_scan_drain_keeps_table_accounting() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        db.categories()
            .insert(CategoryInput {
                name: "Cables".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        // make the queue unreadable so the drain itself errors
        sqlx::query("DROP TABLE pending_scans")
            .execute(db.pool())
            .await
            .unwrap();

        let engine = engine(db, remote);
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.categories, 1);
        assert_eq!(report.scans_delivered, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].starts_with("scans:"));
        assert!(engine.last_sync().await.is_some());
    }

    #[tokio::test]
    async fn concurrent_cycle_request_is_a_noop() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        let engine = engine(db, remote);
        engine.mark_in_progress();

        let outcome = engine.sync_cycle().await.unwrap();
        assert!(matches!(outcome, SyncOutcome::AlreadyRunning));
        assert!(engine.last_sync().await.is_none());
    }

    #[tokio::test]
    async fn cycle_drains_queued_scans() {
        let db = test_db().await;
        let remote = Arc::new(MockRemote::new());

        db.scans().enqueue("ITM-99999", "device-1").await.unwrap();

        let engine = engine(db.clone(), remote.clone());
        let report = completed(engine.sync_cycle().await.unwrap());

        assert_eq!(report.scans_delivered, 1);
        assert_eq!(remote.scan_count(), 1);
        assert_eq!(db.scans().count_unsynced().await.unwrap(), 0);
    }
}

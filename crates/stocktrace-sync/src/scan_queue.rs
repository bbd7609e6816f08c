//! # Scan Queue
//!
//! Serves scan lookups from the local store and replays queued scan
//! events to the remote.
//!
//! ## Scan Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         serve_scan(code)                            │
//! │                                                                     │
//! │  classify by prefix                                                 │
//! │    ITM-…            → item lookup                                   │
//! │    BLD/RM/SHF/…-…   → location lookup                               │
//! │    anything else    → try item, then location                       │
//! │                                                                     │
//! │  match   → ScanResponse::found + enqueue PendingScan                │
//! │  no match → ScanResponse::not_found, NOTHING queued                 │
//! │                                                                     │
//! │  drain_pending(remote): oldest first, one remote write per row,     │
//! │  row deleted only after its own ack. A failure leaves that row      │
//! │  (and, for connectivity failures, the rest of the queue) for the    │
//! │  next cycle.                                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::remote::RemoteStore;
use stocktrace_core::codes::{self, CodeKind};
use stocktrace_core::{Item, Location, ScanMatchKind, ScanResponse};
use stocktrace_db::Database;

// =============================================================================
// Drain Report
// =============================================================================

/// Accounting for one queue drain.
#[derive(Debug, Default)]
pub struct DrainReport {
    /// Rows delivered remotely and removed from the queue.
    pub delivered: usize,
    /// Per-row failures, as `scan/<code>: cause` strings.
    pub failures: Vec<String>,
}

// =============================================================================
// Queue
// =============================================================================

/// Offline-first scan service over the local store.
pub struct ScanQueue {
    db: Arc<Database>,
}

impl ScanQueue {
    /// Creates a queue over the local store.
    pub fn new(db: Arc<Database>) -> Self {
        ScanQueue { db }
    }

    /// Rows still waiting to be delivered.
    pub async fn pending_count(&self) -> SyncResult<i64> {
        Ok(self.db.scans().count_unsynced().await?)
    }

    /// Resolves a scanned code against local data.
    ///
    /// A match queues the scan event for later remote delivery; a miss
    /// queues nothing, so unknown codes never clog the queue.
    pub async fn serve_scan(&self, code: &str, device_id: &str) -> SyncResult<ScanResponse> {
        let response = self.lookup(code).await?;

        if response.success {
            self.db.scans().enqueue(code, device_id).await?;
            debug!(code, "Scan matched and queued");
        } else {
            debug!(code, "Scan missed, not queued");
        }

        Ok(response)
    }

    async fn lookup(&self, code: &str) -> SyncResult<ScanResponse> {
        match codes::classify(code) {
            Some(CodeKind::Item) => {
                if let Some(item) = self.db.items().get_by_code(code).await? {
                    return Ok(item_response(&item));
                }
            }
            Some(CodeKind::Location) => {
                if let Some(location) = self.db.locations().get_by_code(code).await? {
                    return Ok(location_response(&location));
                }
            }
            // unrecognized prefix: the code may still be a legacy or
            // hand-entered one, so try both tables
            None => {
                if let Some(item) = self.db.items().get_by_code(code).await? {
                    return Ok(item_response(&item));
                }
                if let Some(location) = self.db.locations().get_by_code(code).await? {
                    return Ok(location_response(&location));
                }
            }
        }

        Ok(ScanResponse::not_found())
    }

    /// Replays queued scans to the remote, oldest first.
    ///
    /// Each row is deleted only after its own remote ack, so a crash or
    /// failure mid-drain redelivers at most the unacked tail.
    pub async fn drain_pending(&self, remote: &dyn RemoteStore) -> SyncResult<DrainReport> {
        let pending = self.db.scans().list_unsynced().await?;
        let mut report = DrainReport::default();

        if pending.is_empty() {
            return Ok(report);
        }
        info!(count = pending.len(), "Draining scan queue");

        for scan in pending {
            match remote.record_scan(&scan).await {
                Ok(()) => {
                    self.db.scans().delete(&scan.id).await?;
                    report.delivered += 1;
                }
                Err(e) if e.is_retryable() => {
                    // connectivity is gone; the rest of the queue would
                    // fail the same way
                    warn!(code = %scan.code, "Remote unreachable, stopping drain");
                    report.failures.push(format!("scan/{}: {e}", scan.code));
                    break;
                }
                Err(e) => {
                    warn!(code = %scan.code, error = %e, "Scan rejected, leaving queued");
                    report.failures.push(format!("scan/{}: {e}", scan.code));
                }
            }
        }

        Ok(report)
    }
}

// =============================================================================
// Response Payloads
// =============================================================================

fn item_response(item: &Item) -> ScanResponse {
    ScanResponse::found(
        ScanMatchKind::Item,
        json!({
            "id": item.id,
            "code": item.code,
            "name": item.name,
            "current_stock": item.current_stock,
            "minimum_stock": item.minimum_stock,
            "unit": item.unit,
            "has_variants": item.has_variants,
        }),
    )
}

fn location_response(location: &Location) -> ScanResponse {
    ScanResponse::found(
        ScanMatchKind::Location,
        json!({
            "id": location.id,
            "code": location.code,
            "name": location.name,
            "location_type": location.location_type,
            "parent_id": location.parent_id,
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::MockRemote;
    use stocktrace_db::repository::item::ItemInput;
    use stocktrace_db::repository::location::LocationInput;
    use stocktrace_db::{Database, DbConfig};
    use stocktrace_core::LocationType;

    async fn test_db() -> Arc<Database> {
        Arc::new(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    #[tokio::test]
    async fn matched_item_scan_returns_data_and_queues() {
        let db = test_db().await;
        let item = db
            .items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                initial_stock: 4,
                ..Default::default()
            })
            .await
            .unwrap();

        let queue = ScanQueue::new(db.clone());
        let response = queue.serve_scan(&item.code, "device-1").await.unwrap();

        assert!(response.success);
        assert_eq!(response.kind, Some(ScanMatchKind::Item));
        let data = response.data.unwrap();
        assert_eq!(data["name"], "Patch cable");
        assert_eq!(data["current_stock"], 4);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn matched_location_scan_returns_data() {
        let db = test_db().await;
        let shelf = db
            .locations()
            .insert(LocationInput {
                name: "Shelf A".into(),
                location_type: LocationType::Shelf,
                parent_id: None,
            })
            .await
            .unwrap();

        let queue = ScanQueue::new(db);
        let response = queue.serve_scan(&shelf.code, "device-1").await.unwrap();

        assert!(response.success);
        assert_eq!(response.kind, Some(ScanMatchKind::Location));
        assert_eq!(response.data.unwrap()["code"], shelf.code);
    }

    #[tokio::test]
    async fn missed_scan_is_not_queued() {
        let db = test_db().await;
        let queue = ScanQueue::new(db);

        let response = queue.serve_scan("ITM-99999", "device-1").await.unwrap();

        assert!(!response.success);
        assert_eq!(
            response.error.as_deref(),
            Some("Code not found in local database")
        );
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unrecognized_prefix_falls_back_to_both_lookups() {
        let db = test_db().await;
        // hand-entered code outside the prefix convention
        sqlx_insert_legacy_item(&db).await;

        let queue = ScanQueue::new(db);
        let response = queue.serve_scan("LEGACY-1", "device-1").await.unwrap();

        assert!(response.success);
        assert_eq!(response.kind, Some(ScanMatchKind::Item));
    }

    /// Inserts an item whose code bypasses the generator convention.
    async fn sqlx_insert_legacy_item(db: &Database) {
        let item = db
            .items()
            .insert(ItemInput {
                name: "Legacy widget".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        sqlx::query("UPDATE items SET code = 'LEGACY-1' WHERE id = ?1")
            .bind(&item.id)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn drain_delivers_each_row_at_most_once() {
        let db = test_db().await;
        let remote = MockRemote::new();

        db.scans().enqueue("ITM-00001", "device-1").await.unwrap();
        db.scans().enqueue("ITM-00002", "device-1").await.unwrap();

        let queue = ScanQueue::new(db);
        let first = queue.drain_pending(&remote).await.unwrap();
        assert_eq!(first.delivered, 2);
        assert_eq!(remote.scan_count(), 2);

        let second = queue.drain_pending(&remote).await.unwrap();
        assert_eq!(second.delivered, 0);
        assert_eq!(remote.scan_count(), 2);
    }

    #[tokio::test]
    async fn unreachable_remote_leaves_queue_intact() {
        let db = test_db().await;
        let remote = MockRemote::new();
        remote.set_scans_unavailable(true);

        db.scans().enqueue("ITM-00001", "device-1").await.unwrap();

        let queue = ScanQueue::new(db);
        let report = queue.drain_pending(&remote).await.unwrap();

        assert_eq!(report.delivered, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        // connectivity back: the row goes through
        remote.set_scans_unavailable(false);
        let retry = queue.drain_pending(&remote).await.unwrap();
        assert_eq!(retry.delivered, 1);
        assert_eq!(queue.pending_count().await.unwrap(), 0);
    }
}

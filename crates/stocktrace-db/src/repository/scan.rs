//! # Pending Scan Repository
//!
//! Persistence for the offline scan queue.
//!
//! Rows are created by the scan queue when a lookup is served locally, and
//! deleted only after the scan's specific remote write is acknowledged.
//! There is deliberately no "mark all synced" operation.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use chrono::Utc;
use stocktrace_core::PendingScan;

/// Repository for pending scan operations.
#[derive(Debug, Clone)]
pub struct ScanRepository {
    pool: SqlitePool,
}

impl ScanRepository {
    /// Creates a new ScanRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ScanRepository { pool }
    }

    /// Enqueues a served scan for later remote delivery.
    pub async fn enqueue(&self, code: &str, device_id: &str) -> DbResult<PendingScan> {
        let scan = PendingScan {
            id: generate_id(),
            code: code.to_string(),
            device_id: device_id.to_string(),
            scanned_at: Utc::now(),
            synced: false,
        };

        debug!(code = %scan.code, device_id = %scan.device_id, "Enqueuing pending scan");

        sqlx::query(
            r#"
            INSERT INTO pending_scans (id, code, device_id, scanned_at, synced)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&scan.id)
        .bind(&scan.code)
        .bind(&scan.device_id)
        .bind(scan.scanned_at)
        .bind(scan.synced)
        .execute(&self.pool)
        .await?;

        Ok(scan)
    }

    /// Lists unsynced scans, oldest first.
    pub async fn list_unsynced(&self) -> DbResult<Vec<PendingScan>> {
        let scans = sqlx::query_as::<_, PendingScan>(
            "SELECT * FROM pending_scans WHERE synced = 0 ORDER BY scanned_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(scans)
    }

    /// Removes a scan after its remote write was acknowledged.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM pending_scans WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PendingScan", id));
        }

        Ok(())
    }

    /// Counts unsynced scans.
    pub async fn count_unsynced(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_scans WHERE synced = 0")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn enqueue_list_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.scans();

        let scan = repo.enqueue("ITM-00001", "device-1").await.unwrap();
        assert_eq!(repo.count_unsynced().await.unwrap(), 1);

        let pending = repo.list_unsynced().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].code, "ITM-00001");
        assert!(!pending[0].synced);

        repo.delete(&scan.id).await.unwrap();
        assert_eq!(repo.count_unsynced().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_unknown_scan_errors() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.scans().delete("missing").await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}

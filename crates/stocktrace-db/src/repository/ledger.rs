//! # Stock Ledger Repository
//!
//! The append-only stock transaction ledger and its single atomic
//! mutation.
//!
//! ## Atomic Unit
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                 record() - SINGLE SQLite TRANSACTION                │
//! │                                                                     │
//! │  1. SELECT current_stock FROM items/item_variants WHERE id = ?      │
//! │          │                                                          │
//! │          ▼  balance_before                                          │
//! │  2. balance_after = balance_before + signed_quantity                │
//! │          │                                                          │
//! │          ▼                                                          │
//! │  3. UPDATE items/item_variants SET current_stock = balance_after    │
//! │  4. INSERT INTO stock_transactions ( …, balance_before,             │
//! │                                      balance_after, … )             │
//! │          │                                                          │
//! │          ▼                                                          │
//! │  COMMIT ← both writes land or neither does                          │
//! │                                                                     │
//! │  INVARIANTS                                                         │
//! │  • balance_after == balance_before + signed_quantity                │
//! │  • current_stock always equals the latest transaction's             │
//! │    balance_after                                                    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The ledger is a pure accounting primitive: it does NOT forbid a
//! negative resulting stock. The "no negative stock" policy belongs to the
//! calling layer (`stocktrace_core::validation::check_stock_out`).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use stocktrace_core::{StockTarget, StockTransaction, TransactionType};

/// Parameters for one stock mutation.
#[derive(Debug, Clone)]
pub struct StockMutation {
    /// The item or variant whose stock changes.
    pub target: StockTarget,

    /// Kind of movement.
    pub transaction_type: TransactionType,

    /// Caller-supplied quantity: positive magnitude for in/out, signed
    /// delta for adjustments.
    pub quantity: i64,

    /// Identity of the user performing the mutation.
    pub performed_by: String,

    /// Optional location the movement happened at.
    pub location_id: Option<String>,

    /// Optional free-form notes.
    pub notes: Option<String>,

    /// Optional recipient (who the stock was issued to).
    pub recipient: Option<String>,
}

impl StockMutation {
    /// Creates a mutation with the required fields.
    pub fn new(
        target: StockTarget,
        transaction_type: TransactionType,
        quantity: i64,
        performed_by: impl Into<String>,
    ) -> Self {
        StockMutation {
            target,
            transaction_type,
            quantity,
            performed_by: performed_by.into(),
            location_id: None,
            notes: None,
            recipient: None,
        }
    }

    /// Sets the location.
    pub fn at_location(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets the recipient.
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }
}

/// Repository for the stock transaction ledger.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Records a stock mutation as a single atomic unit.
    ///
    /// Reads the target's current stock, computes the new balance, writes
    /// the stock value to the target AND appends the corresponding
    /// transaction inside one SQLite transaction: either both writes land
    /// or neither does. Returns the created transaction.
    pub async fn record(&self, mutation: StockMutation) -> DbResult<StockTransaction> {
        let signed_quantity = mutation
            .transaction_type
            .signed_quantity(mutation.quantity);

        let mut tx = self.pool.begin().await?;

        let (table, entity) = match &mutation.target {
            StockTarget::Item(_) => ("items", "Item"),
            StockTarget::Variant(_) => ("item_variants", "ItemVariant"),
        };
        let target_id = match &mutation.target {
            StockTarget::Item(id) | StockTarget::Variant(id) => id.clone(),
        };

        let balance_before: i64 = sqlx::query_scalar(&format!(
            "SELECT current_stock FROM {table} WHERE id = ?1"
        ))
        .bind(&target_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found(entity, &target_id))?;

        let balance_after = balance_before + signed_quantity;
        let now = Utc::now();

        debug!(
            target = %target_id,
            transaction_type = %mutation.transaction_type,
            quantity = signed_quantity,
            balance_before,
            balance_after,
            "Recording stock mutation"
        );

        sqlx::query(&format!(
            "UPDATE {table} SET current_stock = ?2, updated_at = ?3 WHERE id = ?1"
        ))
        .bind(&target_id)
        .bind(balance_after)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let (item_id, variant_id) = mutation.target.clone().into_columns();

        let transaction = StockTransaction {
            id: generate_id(),
            item_id,
            variant_id,
            transaction_type: mutation.transaction_type,
            quantity: signed_quantity,
            balance_before,
            balance_after,
            location_id: mutation.location_id,
            notes: mutation.notes,
            recipient: mutation.recipient,
            performed_by: mutation.performed_by,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, item_id, variant_id, transaction_type, quantity,
                balance_before, balance_after, location_id, notes,
                recipient, performed_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.item_id)
        .bind(&transaction.variant_id)
        .bind(transaction.transaction_type)
        .bind(transaction.quantity)
        .bind(transaction.balance_before)
        .bind(transaction.balance_after)
        .bind(&transaction.location_id)
        .bind(&transaction.notes)
        .bind(&transaction.recipient)
        .bind(&transaction.performed_by)
        .bind(transaction.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(transaction)
    }

    /// Returns the most recent transactions for a target, newest first.
    ///
    /// Restartable query, not a live subscription: callers re-invoke it
    /// to refresh.
    pub async fn list_transactions(
        &self,
        target: &StockTarget,
        limit: u32,
    ) -> DbResult<Vec<StockTransaction>> {
        let (column, id) = match target {
            StockTarget::Item(id) => ("item_id", id),
            StockTarget::Variant(id) => ("variant_id", id),
        };

        let transactions = sqlx::query_as::<_, StockTransaction>(&format!(
            "SELECT * FROM stock_transactions WHERE {column} = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))
        .bind(id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(transactions)
    }

    /// Counts all ledger entries (diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::item::{ItemInput, VariantInput};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    async fn seed_item(db: &Database, stock: i64) -> stocktrace_core::Item {
        db.items()
            .insert(ItemInput {
                name: "Patch cable".into(),
                initial_stock: stock,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn stock_in_out_and_adjustment() {
        let db = test_db().await;
        let item = seed_item(&db, 10).await;
        let ledger = db.ledger();
        let target = StockTarget::Item(item.id.clone());

        let tx1 = ledger
            .record(StockMutation::new(
                target.clone(),
                TransactionType::StockIn,
                5,
                "user-1",
            ))
            .await
            .unwrap();
        assert_eq!(tx1.balance_before, 10);
        assert_eq!(tx1.balance_after, 15);

        let tx2 = ledger
            .record(
                StockMutation::new(target.clone(), TransactionType::StockOut, 3, "user-1")
                    .with_recipient("workshop"),
            )
            .await
            .unwrap();
        assert_eq!(tx2.quantity, -3);
        assert_eq!(tx2.balance_after, 12);

        let tx3 = ledger
            .record(StockMutation::new(
                target.clone(),
                TransactionType::Adjustment,
                -2,
                "user-1",
            ))
            .await
            .unwrap();
        assert_eq!(tx3.balance_after, 10);

        // every entry satisfies the balance invariant
        for tx in [&tx1, &tx2, &tx3] {
            assert!(tx.balances());
        }

        // stored stock equals the latest balance_after
        let reloaded = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(reloaded.current_stock, 10);
    }

    #[tokio::test]
    async fn stored_stock_tracks_latest_transaction() {
        let db = test_db().await;
        let item = seed_item(&db, 0).await;
        let ledger = db.ledger();
        let target = StockTarget::Item(item.id.clone());

        let moves = [
            (TransactionType::StockIn, 8),
            (TransactionType::StockOut, 2),
            (TransactionType::StockIn, 1),
            (TransactionType::Adjustment, -4),
            (TransactionType::StockOut, 3),
        ];

        for (kind, quantity) in moves {
            ledger
                .record(StockMutation::new(target.clone(), kind, quantity, "user-1"))
                .await
                .unwrap();
        }

        let latest = ledger
            .list_transactions(&target, 1)
            .await
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        let reloaded = db.items().get_by_id(&item.id).await.unwrap().unwrap();

        assert_eq!(reloaded.current_stock, latest.balance_after);
        assert_eq!(reloaded.current_stock, 0);
    }

    #[tokio::test]
    async fn ledger_does_not_forbid_negative_stock() {
        let db = test_db().await;
        let item = seed_item(&db, 1).await;
        let ledger = db.ledger();

        // policy enforcement belongs to the caller, not the ledger
        let tx = ledger
            .record(StockMutation::new(
                StockTarget::Item(item.id.clone()),
                TransactionType::StockOut,
                5,
                "user-1",
            ))
            .await
            .unwrap();

        assert_eq!(tx.balance_after, -4);
    }

    #[tokio::test]
    async fn variant_stock_is_independent_of_item_stock() {
        let db = test_db().await;
        let item = seed_item(&db, 100).await;
        let variant = db
            .items()
            .insert_variant(
                &item.id,
                VariantInput {
                    name: "Red".into(),
                    initial_stock: 5,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        db.ledger()
            .record(StockMutation::new(
                StockTarget::Variant(variant.id.clone()),
                TransactionType::StockOut,
                2,
                "user-1",
            ))
            .await
            .unwrap();

        let item_after = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        let variant_after = db.items().get_variant(&variant.id).await.unwrap().unwrap();

        assert_eq!(item_after.current_stock, 100);
        assert_eq!(variant_after.current_stock, 3);
    }

    #[tokio::test]
    async fn list_transactions_newest_first_with_limit() {
        let db = test_db().await;
        let item = seed_item(&db, 0).await;
        let ledger = db.ledger();
        let target = StockTarget::Item(item.id.clone());

        for quantity in 1..=5 {
            ledger
                .record(StockMutation::new(
                    target.clone(),
                    TransactionType::StockIn,
                    quantity,
                    "user-1",
                ))
                .await
                .unwrap();
        }

        let recent = ledger.list_transactions(&target, 3).await.unwrap();
        assert_eq!(recent.len(), 3);
        // newest first: the last recorded movement leads
        assert_eq!(recent[0].balance_after, 15);
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let db = test_db().await;
        let err = db
            .ledger()
            .record(StockMutation::new(
                StockTarget::Item("missing".into()),
                TransactionType::StockIn,
                1,
                "user-1",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, DbError::NotFound { .. }));
    }
}

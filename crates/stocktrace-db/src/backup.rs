//! # Backup Codec
//!
//! Serializes the entire ledger store to a portable snapshot and imports
//! snapshots back, with replace or merge semantics.
//!
//! ## Import Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Import Semantics                             │
//! │                                                                     │
//! │  REPLACE                                                            │
//! │  ───────                                                            │
//! │  1. Clear all ledger tables                                         │
//! │  2. Insert every snapshot row with its original identity            │
//! │                                                                     │
//! │  MERGE                                                              │
//! │  ─────                                                              │
//! │  Categories: skip-if-name-exists                                    │
//! │  Locations:  parents before children (topological order),           │
//! │              skip-if-code-exists, parent refs remapped              │
//! │              old id → new local id                                  │
//! │  Items:      skip-if-code-exists, category/location refs remapped   │
//! │  Variants:   imported only when the parent item resolved;           │
//! │              otherwise silently dropped                             │
//! │  Transactions: imported only when the target resolved;              │
//! │              otherwise silently dropped                             │
//! │                                                                     │
//! │  Both modes report per-table counts of rows actually INSERTED       │
//! │  (not rows seen), so callers can detect silent skips.               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-row failures are skipped (with a warning) rather than aborting the
//! whole import: the overriding goal of import is best-effort recovery of
//! a damaged or partial store. Known accuracy gap, reflected in the
//! report counts.

use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::DbResult;
use crate::repository::generate_id;
use crate::repository::item::ItemRepository;
use stocktrace_core::{
    Category, Item, ItemVariant, Location, Snapshot, SnapshotData, StockTransaction,
};

// =============================================================================
// Modes and Reports
// =============================================================================

/// How an imported snapshot is applied to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Clear all local tables first, then insert everything fresh.
    Replace,
    /// Fold the snapshot into existing data, skipping natural-key
    /// duplicates and remapping references.
    Merge,
}

/// Per-table counts of rows actually inserted by an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub categories: usize,
    pub locations: usize,
    pub items: usize,
    pub item_variants: usize,
    pub stock_transactions: usize,
}

impl ImportReport {
    /// Total rows inserted across all tables.
    pub fn total(&self) -> usize {
        self.categories
            + self.locations
            + self.items
            + self.item_variants
            + self.stock_transactions
    }
}

// =============================================================================
// Codec
// =============================================================================

/// Export/import codec operating directly on the ledger tables.
#[derive(Debug, Clone)]
pub struct BackupCodec {
    pool: SqlitePool,
}

impl BackupCodec {
    /// Creates a new BackupCodec.
    pub fn new(pool: SqlitePool) -> Self {
        BackupCodec { pool }
    }

    /// Exports the entire store (active and inactive rows) as a versioned
    /// snapshot.
    pub async fn export(&self) -> DbResult<Snapshot> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        let locations =
            sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;
        let item_variants = ItemRepository::new(self.pool.clone())
            .list_all_variants()
            .await?;
        let stock_transactions = sqlx::query_as::<_, StockTransaction>(
            "SELECT * FROM stock_transactions ORDER BY created_at, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let snapshot = Snapshot::new(SnapshotData {
            categories,
            locations,
            items,
            item_variants,
            stock_transactions,
        });

        info!(rows = snapshot.row_count(), "Exported snapshot");
        Ok(snapshot)
    }

    /// Imports a validated snapshot.
    ///
    /// Returns per-table counts of rows actually inserted.
    pub async fn import(&self, snapshot: &Snapshot, mode: ImportMode) -> DbResult<ImportReport> {
        info!(
            mode = ?mode,
            version = %snapshot.version,
            rows = snapshot.row_count(),
            "Importing snapshot"
        );

        match mode {
            ImportMode::Replace => self.import_replace(snapshot).await,
            ImportMode::Merge => self.import_merge(snapshot).await,
        }
    }

    // =========================================================================
    // Replace
    // =========================================================================

    async fn import_replace(&self, snapshot: &Snapshot) -> DbResult<ImportReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = ImportReport::default();

        // Children before parents so FK constraints hold mid-clear.
        for table in [
            "stock_transactions",
            "item_variants",
            "items",
            "locations",
            "categories",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *tx)
                .await?;
        }

        for category in &snapshot.data.categories {
            if try_insert(insert_category(&mut tx, category).await, "category") {
                report.categories += 1;
            }
        }

        // Parents before children for the locations tree.
        for location in topological_order(&snapshot.data.locations) {
            if try_insert(insert_location(&mut tx, location).await, "location") {
                report.locations += 1;
            }
        }

        for item in &snapshot.data.items {
            if try_insert(insert_item(&mut tx, item).await, "item") {
                report.items += 1;
            }
        }

        for variant in &snapshot.data.item_variants {
            if try_insert(insert_variant(&mut tx, variant).await, "variant") {
                report.item_variants += 1;
            }
        }

        for transaction in &snapshot.data.stock_transactions {
            if try_insert(insert_transaction(&mut tx, transaction).await, "transaction") {
                report.stock_transactions += 1;
            }
        }

        tx.commit().await?;

        info!(inserted = report.total(), "Replace import complete");
        Ok(report)
    }

    // =========================================================================
    // Merge
    // =========================================================================

    async fn import_merge(&self, snapshot: &Snapshot) -> DbResult<ImportReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = ImportReport::default();

        // old snapshot id → local id, for reference remapping
        let mut category_ids: HashMap<String, String> = HashMap::new();
        let mut location_ids: HashMap<String, String> = HashMap::new();
        let mut item_ids: HashMap<String, String> = HashMap::new();
        let mut variant_ids: HashMap<String, String> = HashMap::new();

        // --- Categories: skip-if-name-exists ---------------------------------
        for category in &snapshot.data.categories {
            let existing: Option<String> = sqlx::query_scalar(
                "SELECT id FROM categories WHERE name = ?1 AND is_active = 1",
            )
            .bind(&category.name)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(local_id) = existing {
                debug!(name = %category.name, "Merge: category exists, skipping");
                category_ids.insert(category.id.clone(), local_id);
                continue;
            }

            let mut row = category.clone();
            row.id = generate_id();
            if try_insert(insert_category(&mut tx, &row).await, "category") {
                category_ids.insert(category.id.clone(), row.id);
                report.categories += 1;
            }
        }

        // --- Locations: parents first, skip-if-code-exists, remap parents ---
        for location in topological_order(&snapshot.data.locations) {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM locations WHERE code = ?1")
                    .bind(&location.code)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some(local_id) = existing {
                debug!(code = %location.code, "Merge: location exists, skipping");
                location_ids.insert(location.id.clone(), local_id);
                continue;
            }

            let mut row = location.clone();
            row.id = generate_id();
            // parent resolved through the map; unresolvable parents detach
            // the subtree root rather than dropping it
            row.parent_id = location
                .parent_id
                .as_ref()
                .and_then(|old| location_ids.get(old).cloned());
            if try_insert(insert_location(&mut tx, &row).await, "location") {
                location_ids.insert(location.id.clone(), row.id);
                report.locations += 1;
            }
        }

        // --- Items: skip-if-code-exists, remap category/location refs -------
        for item in &snapshot.data.items {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM items WHERE code = ?1")
                    .bind(&item.code)
                    .fetch_optional(&mut *tx)
                    .await?;

            if let Some(local_id) = existing {
                debug!(code = %item.code, "Merge: item exists, skipping");
                item_ids.insert(item.id.clone(), local_id);
                continue;
            }

            let mut row = item.clone();
            row.id = generate_id();
            row.category_id = item
                .category_id
                .as_ref()
                .and_then(|old| category_ids.get(old).cloned());
            row.location_id = item
                .location_id
                .as_ref()
                .and_then(|old| location_ids.get(old).cloned());
            if try_insert(insert_item(&mut tx, &row).await, "item") {
                item_ids.insert(item.id.clone(), row.id);
                report.items += 1;
            }
        }

        // --- Variants: only when the parent item resolved --------------------
        for variant in &snapshot.data.item_variants {
            let Some(local_item_id) = item_ids.get(&variant.item_id) else {
                warn!(variant = %variant.name, "Merge: parent item unresolved, dropping variant");
                continue;
            };

            let existing: Option<String> = sqlx::query_scalar(
                "SELECT id FROM item_variants WHERE item_id = ?1 AND name = ?2",
            )
            .bind(local_item_id)
            .bind(&variant.name)
            .fetch_optional(&mut *tx)
            .await?;

            if let Some(local_id) = existing {
                variant_ids.insert(variant.id.clone(), local_id);
                continue;
            }

            let mut row = variant.clone();
            row.id = generate_id();
            row.item_id = local_item_id.clone();
            if try_insert(insert_variant(&mut tx, &row).await, "variant") {
                variant_ids.insert(variant.id.clone(), row.id);
                report.item_variants += 1;
            }
        }

        // --- Transactions: only when the target resolved ----------------------
        // Original ids are kept so re-importing the same snapshot cannot
        // duplicate the ledger.
        for transaction in &snapshot.data.stock_transactions {
            let already: Option<String> =
                sqlx::query_scalar("SELECT id FROM stock_transactions WHERE id = ?1")
                    .bind(&transaction.id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if already.is_some() {
                continue;
            }

            let mut row = transaction.clone();
            row.item_id = match &transaction.item_id {
                Some(old) => match item_ids.get(old) {
                    Some(new) => Some(new.clone()),
                    None => {
                        warn!(id = %transaction.id, "Merge: target item unresolved, dropping transaction");
                        continue;
                    }
                },
                None => None,
            };
            row.variant_id = match &transaction.variant_id {
                Some(old) => match variant_ids.get(old) {
                    Some(new) => Some(new.clone()),
                    None => {
                        warn!(id = %transaction.id, "Merge: target variant unresolved, dropping transaction");
                        continue;
                    }
                },
                None => None,
            };
            row.location_id = transaction
                .location_id
                .as_ref()
                .and_then(|old| location_ids.get(old).cloned());

            if try_insert(insert_transaction(&mut tx, &row).await, "transaction") {
                report.stock_transactions += 1;
            }
        }

        tx.commit().await?;

        info!(inserted = report.total(), "Merge import complete");
        Ok(report)
    }
}

// =============================================================================
// Row Inserts
// =============================================================================

/// Logs and swallows a per-row insert failure; returns whether the row
/// landed.
fn try_insert(result: DbResult<()>, kind: &str) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(kind = kind, error = %e, "Import: row skipped");
            false
        }
    }
}

async fn insert_category(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, row: &Category) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO categories (id, name, description, color, icon, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&row.id)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.color)
    .bind(&row.icon)
    .bind(row.is_active)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_location(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, row: &Location) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO locations (id, code, name, location_type, parent_id, is_active, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&row.id)
    .bind(&row.code)
    .bind(&row.name)
    .bind(row.location_type)
    .bind(&row.parent_id)
    .bind(row.is_active)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_item(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, row: &Item) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO items (
            id, code, name, description, category_id, location_id,
            current_stock, minimum_stock, unit, has_variants,
            is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&row.id)
    .bind(&row.code)
    .bind(&row.name)
    .bind(&row.description)
    .bind(&row.category_id)
    .bind(&row.location_id)
    .bind(row.current_stock)
    .bind(row.minimum_stock)
    .bind(&row.unit)
    .bind(row.has_variants)
    .bind(row.is_active)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_variant(tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>, row: &ItemVariant) -> DbResult<()> {
    let attributes_json = serde_json::to_string(&row.attributes)
        .map_err(|e| crate::error::DbError::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO item_variants (
            id, item_id, name, attributes,
            current_stock, minimum_stock, is_active, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&row.id)
    .bind(&row.item_id)
    .bind(&row.name)
    .bind(&attributes_json)
    .bind(row.current_stock)
    .bind(row.minimum_stock)
    .bind(row.is_active)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    row: &StockTransaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_transactions (
            id, item_id, variant_id, transaction_type, quantity,
            balance_before, balance_after, location_id, notes,
            recipient, performed_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
    )
    .bind(&row.id)
    .bind(&row.item_id)
    .bind(&row.variant_id)
    .bind(row.transaction_type)
    .bind(row.quantity)
    .bind(row.balance_before)
    .bind(row.balance_after)
    .bind(&row.location_id)
    .bind(&row.notes)
    .bind(&row.recipient)
    .bind(&row.performed_by)
    .bind(row.created_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

// =============================================================================
// Topological Order
// =============================================================================

/// Orders locations so every parent precedes its children.
///
/// Parents outside the snapshot count as already-satisfied. If the
/// snapshot itself contains a parent cycle, the remainder is appended
/// as-is and those rows fail their FK checks individually (and are
/// skipped) instead of hanging the import.
fn topological_order(locations: &[Location]) -> Vec<&Location> {
    let snapshot_ids: HashSet<&str> = locations.iter().map(|l| l.id.as_str()).collect();
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut ordered: Vec<&Location> = Vec::with_capacity(locations.len());

    loop {
        let mut progressed = false;

        for location in locations {
            if emitted.contains(location.id.as_str()) {
                continue;
            }
            let ready = match &location.parent_id {
                None => true,
                Some(parent) => {
                    !snapshot_ids.contains(parent.as_str()) || emitted.contains(parent.as_str())
                }
            };
            if ready {
                emitted.insert(location.id.as_str());
                ordered.push(location);
                progressed = true;
            }
        }

        if !progressed {
            break;
        }
    }

    // cycle leftovers, if any
    for location in locations {
        if !emitted.contains(location.id.as_str()) {
            ordered.push(location);
        }
    }

    ordered
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::category::CategoryInput;
    use crate::repository::item::{ItemInput, VariantInput};
    use crate::repository::ledger::StockMutation;
    use crate::repository::location::LocationInput;
    use stocktrace_core::{LocationType, StockTarget, TransactionType};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Populates a store with one of everything, linked together.
    async fn seed(db: &Database) {
        let category = db
            .categories()
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
        let room = db
            .locations()
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
                category_id: Some(category.id.clone()),
                location_id: Some(room.id.clone()),
                initial_stock: 5,
                ..Default::default()
            })
            .await
            .unwrap();

        db.items()
            .insert_variant(
                &item.id,
                VariantInput {
                    name: "Blue 2m".into(),
                    initial_stock: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        db.ledger()
            .record(StockMutation::new(
                StockTarget::Item(item.id.clone()),
                TransactionType::StockIn,
                3,
                "user-1",
            ))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn export_then_replace_reproduces_row_counts() {
        let source = test_db().await;
        seed(&source).await;

        let snapshot = source.backup().export().await.unwrap();
        assert_eq!(snapshot.data.categories.len(), 1);
        assert_eq!(snapshot.data.locations.len(), 2);
        assert_eq!(snapshot.data.items.len(), 1);
        assert_eq!(snapshot.data.item_variants.len(), 1);
        assert_eq!(snapshot.data.stock_transactions.len(), 1);

        let target = test_db().await;
        let report = target
            .backup()
            .import(&snapshot, ImportMode::Replace)
            .await
            .unwrap();

        assert_eq!(report.categories, 1);
        assert_eq!(report.locations, 2);
        assert_eq!(report.items, 1);
        assert_eq!(report.item_variants, 1);
        assert_eq!(report.stock_transactions, 1);

        let reexport = target.backup().export().await.unwrap();
        assert_eq!(reexport.row_count(), snapshot.row_count());
    }

    #[tokio::test]
    async fn replace_clears_preexisting_rows() {
        let source = test_db().await;
        seed(&source).await;
        let snapshot = source.backup().export().await.unwrap();

        let target = test_db().await;
        target
            .categories()
            .insert(CategoryInput {
                name: "Old junk".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        target
            .backup()
            .import(&snapshot, ImportMode::Replace)
            .await
            .unwrap();

        assert!(target
            .categories()
            .get_by_name("Old junk")
            .await
            .unwrap()
            .is_none());
        assert!(target
            .categories()
            .get_by_name("Cables")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn merge_reimport_creates_no_duplicates() {
        let source = test_db().await;
        seed(&source).await;
        let snapshot = source.backup().export().await.unwrap();

        let target = test_db().await;
        let first = target
            .backup()
            .import(&snapshot, ImportMode::Merge)
            .await
            .unwrap();
        assert_eq!(first.categories, 1);
        assert_eq!(first.locations, 2);
        assert_eq!(first.items, 1);

        let second = target
            .backup()
            .import(&snapshot, ImportMode::Merge)
            .await
            .unwrap();
        assert_eq!(second.categories, 0);
        assert_eq!(second.locations, 0);
        assert_eq!(second.items, 0);
        assert_eq!(second.item_variants, 0);
        assert_eq!(second.stock_transactions, 0);

        assert_eq!(target.categories().count().await.unwrap(), 1);
        assert_eq!(target.locations().count().await.unwrap(), 2);
        assert_eq!(target.items().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn merge_remaps_location_parents_to_new_ids() {
        let source = test_db().await;
        seed(&source).await;
        let snapshot = source.backup().export().await.unwrap();

        let target = test_db().await;
        target
            .backup()
            .import(&snapshot, ImportMode::Merge)
            .await
            .unwrap();

        let building = target
            .locations()
            .get_by_code("BLD-00001")
            .await
            .unwrap()
            .unwrap();
        let room = target
            .locations()
            .get_by_code("RM-00001")
            .await
            .unwrap()
            .unwrap();

        // fresh local ids, parent linkage preserved through the remap
        assert_ne!(building.id, snapshot.data.locations[0].id);
        assert_eq!(room.parent_id.as_deref(), Some(building.id.as_str()));
    }

    #[tokio::test]
    async fn merge_drops_variant_without_resolvable_parent() {
        let source = test_db().await;
        seed(&source).await;
        let mut snapshot = source.backup().export().await.unwrap();

        // orphan the variant
        snapshot.data.items.clear();
        snapshot.data.stock_transactions.clear();

        let target = test_db().await;
        let report = target
            .backup()
            .import(&snapshot, ImportMode::Merge)
            .await
            .unwrap();

        assert_eq!(report.item_variants, 0);
    }

    #[test]
    fn topological_order_emits_parents_first() {
        use chrono::Utc;

        let parent = Location {
            id: "p".into(),
            code: "BLD-00001".into(),
            name: "Parent".into(),
            location_type: LocationType::Building,
            parent_id: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let child = Location {
            id: "c".into(),
            code: "RM-00001".into(),
            name: "Child".into(),
            location_type: LocationType::Room,
            parent_id: Some("p".into()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // child listed first in the snapshot
        let rows = vec![child, parent];
        let ordered = topological_order(&rows);
        assert_eq!(ordered[0].id, "p");
        assert_eq!(ordered[1].id, "c");
    }
}

//! # Item Repository
//!
//! Database operations for items and their variants.
//!
//! `current_stock` on both rows is owned by the ledger: nothing here
//! mutates it except the initial value at insert. Stock movements go
//! through [`crate::repository::ledger`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use stocktrace_core::codes;
use stocktrace_core::{Item, ItemVariant};

/// Fields accepted when creating or updating an item.
#[derive(Debug, Clone)]
pub struct ItemInput {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub location_id: Option<String>,
    /// Initial stock at creation. Later changes go through the ledger.
    pub initial_stock: i64,
    pub minimum_stock: i64,
    pub unit: String,
    pub has_variants: bool,
}

impl Default for ItemInput {
    fn default() -> Self {
        ItemInput {
            name: String::new(),
            description: None,
            category_id: None,
            location_id: None,
            initial_stock: 0,
            minimum_stock: 0,
            unit: "pcs".to_string(),
            has_variants: false,
        }
    }
}

/// Fields accepted when creating a variant.
#[derive(Debug, Clone, Default)]
pub struct VariantInput {
    pub name: String,
    pub attributes: HashMap<String, String>,
    pub initial_stock: i64,
    pub minimum_stock: i64,
}

/// Private row type: `attributes` is a JSON text column locally.
#[derive(sqlx::FromRow)]
struct VariantRow {
    id: String,
    item_id: String,
    name: String,
    attributes: String,
    current_stock: i64,
    minimum_stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl VariantRow {
    fn into_variant(self) -> ItemVariant {
        // A corrupt attributes column degrades to an empty map rather than
        // failing the whole read.
        let attributes = serde_json::from_str(&self.attributes).unwrap_or_default();
        ItemVariant {
            id: self.id,
            item_id: self.item_id,
            name: self.name,
            attributes,
            current_stock: self.current_stock,
            minimum_stock: self.minimum_stock,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Repository for item and variant database operations.
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    /// Creates a new ItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Derives the next item code from the current item count.
    pub async fn next_code(&self) -> DbResult<String> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;

        Ok(codes::next_item_code(count))
    }

    /// Inserts a new item with a generated code.
    pub async fn insert(&self, input: ItemInput) -> DbResult<Item> {
        let code = self.next_code().await?;
        let now = Utc::now();

        let item = Item {
            id: generate_id(),
            code,
            name: input.name,
            description: input.description,
            category_id: input.category_id,
            location_id: input.location_id,
            current_stock: input.initial_stock,
            minimum_stock: input.minimum_stock,
            unit: input.unit,
            has_variants: input.has_variants,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(code = %item.code, name = %item.name, "Inserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                id, code, name, description, category_id, location_id,
                current_stock, minimum_stock, unit, has_variants,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&item.id)
        .bind(&item.code)
        .bind(&item.name)
        .bind(&item.description)
        .bind(&item.category_id)
        .bind(&item.location_id)
        .bind(item.current_stock)
        .bind(item.minimum_stock)
        .bind(&item.unit)
        .bind(item.has_variants)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(item)
    }

    /// Gets an item by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Gets an item by its code (the natural key).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(item)
    }

    /// Lists all items, active and inactive, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>("SELECT * FROM items ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Lists active items sorted by code.
    pub async fn list_active(&self) -> DbResult<Vec<Item>> {
        let items =
            sqlx::query_as::<_, Item>("SELECT * FROM items WHERE is_active = 1 ORDER BY code")
                .fetch_all(&self.pool)
                .await?;

        Ok(items)
    }

    /// Updates an item's mutable fields. Stock is untouched here.
    pub async fn update(&self, id: &str, input: ItemInput) -> DbResult<()> {
        debug!(id = %id, "Updating item");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE items SET
                name = ?2,
                description = ?3,
                category_id = ?4,
                location_id = ?5,
                minimum_stock = ?6,
                unit = ?7,
                has_variants = ?8,
                updated_at = ?9
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.category_id)
        .bind(&input.location_id)
        .bind(input.minimum_stock)
        .bind(&input.unit)
        .bind(input.has_variants)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Soft-deletes an item. Transactions referencing it are retained.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting item");

        let now = Utc::now();

        let result = sqlx::query("UPDATE items SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }

        Ok(())
    }

    /// Counts active items.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    // =========================================================================
    // Variants
    // =========================================================================

    /// Inserts a variant under an item. The parent item must exist.
    pub async fn insert_variant(&self, item_id: &str, input: VariantInput) -> DbResult<ItemVariant> {
        if self.get_by_id(item_id).await?.is_none() {
            return Err(DbError::not_found("Item", item_id));
        }

        let now = Utc::now();
        let variant = ItemVariant {
            id: generate_id(),
            item_id: item_id.to_string(),
            name: input.name,
            attributes: input.attributes,
            current_stock: input.initial_stock,
            minimum_stock: input.minimum_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(item_id = %item_id, name = %variant.name, "Inserting variant");

        let attributes_json = serde_json::to_string(&variant.attributes)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO item_variants (
                id, item_id, name, attributes,
                current_stock, minimum_stock, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.item_id)
        .bind(&variant.name)
        .bind(&attributes_json)
        .bind(variant.current_stock)
        .bind(variant.minimum_stock)
        .bind(variant.is_active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Gets a variant by its ID.
    pub async fn get_variant(&self, id: &str) -> DbResult<Option<ItemVariant>> {
        let row = sqlx::query_as::<_, VariantRow>("SELECT * FROM item_variants WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(VariantRow::into_variant))
    }

    /// Lists all variants of an item, oldest first.
    pub async fn list_variants(&self, item_id: &str) -> DbResult<Vec<ItemVariant>> {
        let rows = sqlx::query_as::<_, VariantRow>(
            "SELECT * FROM item_variants WHERE item_id = ?1 ORDER BY created_at",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(VariantRow::into_variant).collect())
    }

    /// Lists every variant in the store (backup export).
    pub async fn list_all_variants(&self) -> DbResult<Vec<ItemVariant>> {
        let rows =
            sqlx::query_as::<_, VariantRow>("SELECT * FROM item_variants ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(VariantRow::into_variant).collect())
    }

    /// Soft-deletes a variant.
    pub async fn soft_delete_variant(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result =
            sqlx::query("UPDATE item_variants SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("ItemVariant", id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn item_codes_are_sequential() {
        let db = test_db().await;
        let repo = db.items();

        let first = repo
            .insert(ItemInput {
                name: "Patch cable".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let second = repo
            .insert(ItemInput {
                name: "Crimping tool".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(first.code, "ITM-00001");
        assert_eq!(second.code, "ITM-00002");
    }

    #[tokio::test]
    async fn variant_attributes_round_trip() {
        let db = test_db().await;
        let repo = db.items();

        let item = repo
            .insert(ItemInput {
                name: "T-shirt".into(),
                has_variants: true,
                ..Default::default()
            })
            .await
            .unwrap();

        let mut attributes = HashMap::new();
        attributes.insert("color".to_string(), "red".to_string());
        attributes.insert("size".to_string(), "XL".to_string());

        let variant = repo
            .insert_variant(
                &item.id,
                VariantInput {
                    name: "Red / XL".into(),
                    attributes: attributes.clone(),
                    initial_stock: 7,
                    minimum_stock: 1,
                },
            )
            .await
            .unwrap();

        let loaded = repo.get_variant(&variant.id).await.unwrap().unwrap();
        assert_eq!(loaded.attributes, attributes);
        assert_eq!(loaded.current_stock, 7);
    }

    #[tokio::test]
    async fn variant_requires_existing_item() {
        let db = test_db().await;
        let repo = db.items();

        let err = repo
            .insert_variant("missing", VariantInput::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}

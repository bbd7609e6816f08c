//! # Category Repository
//!
//! Database operations for categories.
//!
//! Name is the natural key: unique within the active set, and what the
//! sync engine matches on remotely. Deletes are soft and refused while any
//! active item still references the category.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use stocktrace_core::Category;

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone, Default)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Inserts a new category.
    ///
    /// ## Returns
    /// * `Ok(Category)` - Inserted category
    /// * `Err(DbError::UniqueViolation)` - Active category with this name exists
    pub async fn insert(&self, input: CategoryInput) -> DbResult<Category> {
        let now = Utc::now();
        let category = Category {
            id: generate_id(),
            name: input.name,
            description: input.description,
            color: input.color,
            icon: input.icon,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(name = %category.name, "Inserting category");

        sqlx::query(
            r#"
            INSERT INTO categories (id, name, description, color, icon, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.color)
        .bind(&category.icon)
        .bind(category.is_active)
        .bind(category.created_at)
        .bind(category.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(category)
    }

    /// Gets a category by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Gets an active category by name (the natural key).
    pub async fn get_by_name(&self, name: &str) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE name = ?1 AND is_active = 1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists all categories, active and inactive, oldest first.
    ///
    /// The sync engine walks this full list so soft-deleted rows still
    /// propagate their inactive flag outward.
    pub async fn list_all(&self) -> DbResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(categories)
    }

    /// Lists active categories sorted by name.
    pub async fn list_active(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_active = 1 ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Updates a category's mutable fields.
    pub async fn update(&self, id: &str, input: CategoryInput) -> DbResult<()> {
        debug!(id = %id, "Updating category");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE categories SET
                name = ?2,
                description = ?3,
                color = ?4,
                icon = ?5,
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&input.color)
        .bind(&input.icon)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }

    /// Soft-deletes a category.
    ///
    /// ## Referential Guard
    /// Refused while any active item references the category; the error
    /// carries the dependent count. The active flag is left unchanged.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let dependents: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE category_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if dependents > 0 {
            return Err(DbError::referential_conflict("Category", id, dependents));
        }

        debug!(id = %id, "Soft-deleting category");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE categories SET is_active = 0, updated_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }

        Ok(())
    }

    /// Counts active categories.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM categories WHERE is_active = 1")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn insert_and_lookup_by_name() {
        let db = test_db().await;
        let repo = db.categories();

        let created = repo.insert(input("Cables")).await.unwrap();
        let found = repo.get_by_name("Cables").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn duplicate_active_name_is_rejected() {
        let db = test_db().await;
        let repo = db.categories();

        repo.insert(input("Tools")).await.unwrap();
        let err = repo.insert(input("Tools")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn name_reusable_after_soft_delete() {
        let db = test_db().await;
        let repo = db.categories();

        let first = repo.insert(input("Seasonal")).await.unwrap();
        repo.soft_delete(&first.id).await.unwrap();

        // uniqueness applies to the active set only
        repo.insert(input("Seasonal")).await.unwrap();
    }

    #[tokio::test]
    async fn delete_blocked_by_active_item() {
        let db = test_db().await;
        let repo = db.categories();

        let category = repo.insert(input("Cables")).await.unwrap();

        let items = db.items();
        items
            .insert(crate::repository::item::ItemInput {
                name: "Patch cable".into(),
                category_id: Some(category.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();

        let err = repo.soft_delete(&category.id).await.unwrap_err();
        assert!(
            matches!(err, DbError::ReferentialConflict { dependents: 1, .. }),
            "unexpected error: {err:?}"
        );

        // active flag unchanged
        let still_there = repo.get_by_id(&category.id).await.unwrap().unwrap();
        assert!(still_there.is_active);
    }
}

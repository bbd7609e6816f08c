//! # Location Repository
//!
//! Database operations for the storage location tree.
//!
//! ## Location Tree
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │               Location Tree (parent_id edges)                       │
//! │                                                                     │
//! │  BLD-00001 "Main building"                                          │
//! │   └── RM-00001 "Workshop"                                           │
//! │        ├── SHF-00001 "Shelf A"                                      │
//! │        │    └── BOX-00001 "Screws"                                  │
//! │        └── DRW-00001 "Small parts"                                  │
//! │                                                                     │
//! │  Acyclicity is validated on WRITE (insert/update), not just read:   │
//! │  the proposed parent chain is walked and must never reach the       │
//! │  row being written.                                                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Codes are derived from the per-type count at insert time. This is NOT
//! concurrency-safe (two in-flight inserts can propose the same code); the
//! UNIQUE index rejects the loser and the remote store is the uniqueness
//! authority across devices.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;
use stocktrace_core::codes;
use stocktrace_core::{Location, LocationType};

/// Fields accepted when creating or updating a location.
#[derive(Debug, Clone)]
pub struct LocationInput {
    pub name: String,
    pub location_type: LocationType,
    pub parent_id: Option<String>,
}

/// Repository for location database operations.
#[derive(Debug, Clone)]
pub struct LocationRepository {
    pool: SqlitePool,
}

impl LocationRepository {
    /// Creates a new LocationRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LocationRepository { pool }
    }

    /// Derives the next location code for a type from the current count.
    pub async fn next_code(&self, location_type: LocationType) -> DbResult<String> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE location_type = ?1")
                .bind(location_type)
                .fetch_one(&self.pool)
                .await?;

        Ok(codes::next_location_code(location_type, count))
    }

    /// Inserts a new location with a generated code.
    ///
    /// The parent chain is validated for cycles before the write.
    pub async fn insert(&self, input: LocationInput) -> DbResult<Location> {
        let id = generate_id();

        if let Some(parent_id) = &input.parent_id {
            self.validate_parent(&id, parent_id).await?;
        }

        let code = self.next_code(input.location_type).await?;
        let now = Utc::now();

        let location = Location {
            id,
            code,
            name: input.name,
            location_type: input.location_type,
            parent_id: input.parent_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(code = %location.code, "Inserting location");

        sqlx::query(
            r#"
            INSERT INTO locations (id, code, name, location_type, parent_id, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&location.id)
        .bind(&location.code)
        .bind(&location.name)
        .bind(location.location_type)
        .bind(&location.parent_id)
        .bind(location.is_active)
        .bind(location.created_at)
        .bind(location.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(location)
    }

    /// Gets a location by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    /// Gets a location by its code (the natural key).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Location>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE code = ?1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(location)
    }

    /// Lists all locations, active and inactive, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<Location>> {
        let locations =
            sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?;

        Ok(locations)
    }

    /// Lists active locations sorted by code.
    pub async fn list_active(&self) -> DbResult<Vec<Location>> {
        let locations = sqlx::query_as::<_, Location>(
            "SELECT * FROM locations WHERE is_active = 1 ORDER BY code",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(locations)
    }

    /// Updates a location's mutable fields (name and parent).
    ///
    /// The location type and code are fixed at creation: the code embeds
    /// the type prefix, and re-typing a location would orphan its code.
    pub async fn update(
        &self,
        id: &str,
        name: &str,
        parent_id: Option<&str>,
    ) -> DbResult<()> {
        if let Some(parent) = parent_id {
            self.validate_parent(id, parent).await?;
        }

        debug!(id = %id, "Updating location");

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE locations SET name = ?2, parent_id = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(name)
        .bind(parent_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        Ok(())
    }

    /// Soft-deletes a location.
    ///
    /// ## Referential Guard
    /// Refused while active child locations or active items still reference
    /// it; the error carries the combined dependent count.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let child_locations: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM locations WHERE parent_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let items: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM items WHERE location_id = ?1 AND is_active = 1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        let dependents = child_locations + items;
        if dependents > 0 {
            return Err(DbError::referential_conflict("Location", id, dependents));
        }

        debug!(id = %id, "Soft-deleting location");

        let now = Utc::now();

        let result =
            sqlx::query("UPDATE locations SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(now)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Location", id));
        }

        Ok(())
    }

    /// Validates that assigning `parent_id` to `id` creates no cycle.
    ///
    /// Walks the parent chain upward from the proposed parent; reaching
    /// `id` means the assignment would close a loop. The walk is bounded
    /// by the location count, so a pre-existing (corrupt) loop cannot hang
    /// the validation.
    async fn validate_parent(&self, id: &str, parent_id: &str) -> DbResult<()> {
        if id == parent_id {
            return Err(DbError::LocationCycle { id: id.to_string() });
        }

        let bound: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations")
            .fetch_one(&self.pool)
            .await?;

        let mut current = Some(parent_id.to_string());
        let mut hops = 0i64;

        while let Some(ancestor) = current {
            if ancestor == id {
                return Err(DbError::LocationCycle { id: id.to_string() });
            }
            if hops > bound {
                return Err(DbError::LocationCycle { id: id.to_string() });
            }
            hops += 1;

            current = sqlx::query_scalar("SELECT parent_id FROM locations WHERE id = ?1")
                .bind(&ancestor)
                .fetch_optional(&self.pool)
                .await?
                .flatten();
        }

        Ok(())
    }

    /// Counts active locations.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM locations WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

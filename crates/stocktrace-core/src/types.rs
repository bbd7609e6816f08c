//! # Domain Types
//!
//! Core domain types used throughout stocktrace.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Domain Types                               │
//! │                                                                     │
//! │  ┌───────────────┐   ┌───────────────┐   ┌────────────────────┐    │
//! │  │   Category    │   │   Location    │   │       Item         │    │
//! │  │ ───────────── │   │ ───────────── │   │ ────────────────── │    │
//! │  │ id (UUID)     │   │ id (UUID)     │   │ id (UUID)          │    │
//! │  │ name (unique) │   │ code (BLD-…)  │   │ code (ITM-…)       │    │
//! │  │ color, icon   │   │ parent_id     │   │ current_stock      │    │
//! │  └───────────────┘   └───────────────┘   └─────────┬──────────┘    │
//! │                                                    │               │
//! │  ┌───────────────┐   ┌───────────────┐   ┌─────────▼──────────┐    │
//! │  │ PendingScan   │   │StockTransact. │   │    ItemVariant     │    │
//! │  │ ───────────── │   │ ───────────── │   │ ────────────────── │    │
//! │  │ code          │   │ balance_before│   │ attributes map     │    │
//! │  │ device_id     │   │ balance_after │   │ own current_stock  │    │
//! │  │ synced flag   │   │ IMMUTABLE     │   │                    │    │
//! │  └───────────────┘   └───────────────┘   └────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Ledger entities have:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Natural key (name, code) - human-readable, used by the sync engine to
//!   match rows across the local and remote stores

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Category
// =============================================================================

/// A category grouping items (e.g. "Cables", "Tools").
///
/// Names are unique within the active set; the sync engine matches
/// categories across stores by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name - the natural key for sync matching.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Display color (hex string, UI concern passed through).
    pub color: Option<String>,

    /// Display icon name (UI concern passed through).
    pub icon: Option<String>,

    /// Whether the category is active (soft delete).
    pub is_active: bool,

    /// When the category was created.
    pub created_at: DateTime<Utc>,

    /// When the category was last updated.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Location
// =============================================================================

/// The physical granularity of a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Building,
    Room,
    Shelf,
    Box,
    Drawer,
}

impl LocationType {
    /// All location types, coarsest first.
    pub const ALL: [LocationType; 5] = [
        LocationType::Building,
        LocationType::Room,
        LocationType::Shelf,
        LocationType::Box,
        LocationType::Drawer,
    ];
}

impl std::fmt::Display for LocationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LocationType::Building => "building",
            LocationType::Room => "room",
            LocationType::Shelf => "shelf",
            LocationType::Box => "box",
            LocationType::Drawer => "drawer",
        };
        f.write_str(s)
    }
}

/// A storage location. Locations form a tree via `parent_id`
/// (building → room → shelf → box/drawer); cycles are rejected on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Location {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Generated code (e.g. "RM-00003") - the natural key for sync matching.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Physical granularity of this location.
    pub location_type: LocationType,

    /// Optional parent location (tree edge, no cycles).
    pub parent_id: Option<String>,

    /// Whether the location is active (soft delete).
    pub is_active: bool,

    /// When the location was created.
    pub created_at: DateTime<Utc>,

    /// When the location was last updated.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Item
// =============================================================================

/// An inventory item.
///
/// `current_stock` may only be mutated through the ledger's atomic
/// stock-mutation operation; it always equals the `balance_after` of the
/// item's most recent [`StockTransaction`] (or its creation value if none
/// exist).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Item {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Generated code (e.g. "ITM-00010") - the natural key for sync matching.
    pub code: String,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Optional category reference.
    pub category_id: Option<String>,

    /// Optional location reference.
    pub location_id: Option<String>,

    /// Current stock level. Mutated only by the ledger.
    pub current_stock: i64,

    /// Minimum stock threshold (low-stock reporting).
    pub minimum_stock: i64,

    /// Unit of measure (e.g. "pcs", "m").
    pub unit: String,

    /// Whether stock is tracked per-variant instead of on the item itself.
    pub has_variants: bool,

    /// Whether the item is active (soft delete).
    pub is_active: bool,

    /// When the item was created.
    pub created_at: DateTime<Utc>,

    /// When the item was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Whether the item is at or below its minimum stock threshold.
    pub fn is_low_stock(&self) -> bool {
        self.current_stock <= self.minimum_stock
    }
}

// =============================================================================
// Item Variant
// =============================================================================

/// A variant of an item (e.g. size or color). A variant's stock is tracked
/// independently of its parent item's stock field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemVariant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Parent item reference.
    pub item_id: String,

    /// Variant name (e.g. "Red / XL").
    pub name: String,

    /// Free-form attribute map (e.g. {"color": "red", "size": "XL"}).
    /// Stored as a JSON text column in the local database.
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Current stock level of this variant. Mutated only by the ledger.
    pub current_stock: i64,

    /// Minimum stock threshold for this variant.
    pub minimum_stock: i64,

    /// Whether the variant is active (soft delete).
    pub is_active: bool,

    /// When the variant was created.
    pub created_at: DateTime<Utc>,

    /// When the variant was last updated.
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Transactions
// =============================================================================

/// The kind of stock movement recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Stock received - adds the quantity.
    StockIn,
    /// Stock issued - subtracts the quantity.
    StockOut,
    /// Manual correction - adds a caller-signed delta.
    Adjustment,
}

impl TransactionType {
    /// Converts a caller-supplied quantity into the signed delta applied to
    /// the target's stock. `quantity` is expected positive for
    /// `StockIn`/`StockOut` and caller-signed for `Adjustment`.
    pub fn signed_quantity(&self, quantity: i64) -> i64 {
        match self {
            TransactionType::StockIn => quantity,
            TransactionType::StockOut => -quantity,
            TransactionType::Adjustment => quantity,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::StockIn => "stock_in",
            TransactionType::StockOut => "stock_out",
            TransactionType::Adjustment => "adjustment",
        };
        f.write_str(s)
    }
}

/// The target of a stock mutation: an item or one of its variants,
/// mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockTarget {
    /// Mutate an item's own stock.
    Item(String),
    /// Mutate a variant's stock (independent of the parent item).
    Variant(String),
}

impl StockTarget {
    /// Splits the target into `(item_id, variant_id)` columns as stored on
    /// a [`StockTransaction`] row. Exactly one side is `Some`.
    pub fn into_columns(self) -> (Option<String>, Option<String>) {
        match self {
            StockTarget::Item(id) => (Some(id), None),
            StockTarget::Variant(id) => (None, Some(id)),
        }
    }
}

/// One entry in the stock ledger.
///
/// Immutable once created: corrections are modeled as new compensating
/// transactions, never edits. Invariant:
/// `balance_after == balance_before + quantity` (quantity is signed).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockTransaction {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Target item, when the mutation applied to an item's own stock.
    pub item_id: Option<String>,

    /// Target variant, when the mutation applied to a variant.
    pub variant_id: Option<String>,

    /// Kind of stock movement.
    pub transaction_type: TransactionType,

    /// Signed quantity applied to the balance.
    pub quantity: i64,

    /// Target stock before this transaction.
    pub balance_before: i64,

    /// Target stock after this transaction.
    pub balance_after: i64,

    /// Optional location the movement happened at.
    pub location_id: Option<String>,

    /// Optional free-form notes.
    pub notes: Option<String>,

    /// Optional recipient (who the stock was issued to).
    pub recipient: Option<String>,

    /// Identity of the user who performed the mutation.
    pub performed_by: String,

    /// When the transaction was recorded.
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Checks the ledger balance invariant for this entry.
    pub fn balances(&self) -> bool {
        self.balance_after == self.balance_before + self.quantity
    }

    /// Returns the target of this transaction, or `None` if the row is
    /// malformed (neither or both sides set).
    pub fn target(&self) -> Option<StockTarget> {
        match (&self.item_id, &self.variant_id) {
            (Some(id), None) => Some(StockTarget::Item(id.clone())),
            (None, Some(id)) => Some(StockTarget::Variant(id.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Pending Scans
// =============================================================================

/// A scan served locally while offline, queued for delivery to the remote
/// audit trail. Created only by the scan queue; deleted only after its
/// specific remote write is acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PendingScan {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// The scanned code string (item or location code).
    pub code: String,

    /// Identifier of the device that served the scan.
    pub device_id: String,

    /// When the scan was served.
    pub scanned_at: DateTime<Utc>,

    /// Whether the scan has been delivered remotely. Rows are deleted on
    /// confirmed delivery, so persisted rows normally carry `false`.
    pub synced: bool,
}

// =============================================================================
// Scan Responses
// =============================================================================

/// What a scanned code resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMatchKind {
    Item,
    Location,
}

/// Response payload for a scan lookup, shaped for the device-facing scan
/// transport: `{success, type?, data?, error?, timestamp, offline}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    /// Whether the code matched a local entity.
    pub success: bool,

    /// What the code matched, when it did.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ScanMatchKind>,

    /// Matched entity fields (name, stock/type, ...), when it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message on a miss.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the scan was served.
    pub timestamp: DateTime<Utc>,

    /// Always true for responses served from the local store.
    pub offline: bool,
}

impl ScanResponse {
    /// Builds a successful scan response.
    pub fn found(kind: ScanMatchKind, data: serde_json::Value) -> Self {
        ScanResponse {
            success: true,
            kind: Some(kind),
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
            offline: true,
        }
    }

    /// Builds a not-found scan response.
    pub fn not_found() -> Self {
        ScanResponse {
            success: false,
            kind: None,
            data: None,
            error: Some("Code not found in local database".to_string()),
            timestamp: Utc::now(),
            offline: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_quantity_by_type() {
        assert_eq!(TransactionType::StockIn.signed_quantity(5), 5);
        assert_eq!(TransactionType::StockOut.signed_quantity(5), -5);
        assert_eq!(TransactionType::Adjustment.signed_quantity(-3), -3);
        assert_eq!(TransactionType::Adjustment.signed_quantity(3), 3);
    }

    #[test]
    fn transaction_balance_invariant() {
        let tx = StockTransaction {
            id: "t1".into(),
            item_id: Some("i1".into()),
            variant_id: None,
            transaction_type: TransactionType::StockOut,
            quantity: -3,
            balance_before: 5,
            balance_after: 2,
            location_id: None,
            notes: None,
            recipient: None,
            performed_by: "user".into(),
            created_at: Utc::now(),
        };
        assert!(tx.balances());
        assert_eq!(tx.target(), Some(StockTarget::Item("i1".into())));
    }

    #[test]
    fn scan_response_shapes() {
        let miss = ScanResponse::not_found();
        assert!(!miss.success);
        assert!(miss.offline);
        assert_eq!(
            miss.error.as_deref(),
            Some("Code not found in local database")
        );

        let hit = ScanResponse::found(
            ScanMatchKind::Item,
            serde_json::json!({ "name": "Patch cable", "current_stock": 4 }),
        );
        assert!(hit.success);
        assert_eq!(hit.kind, Some(ScanMatchKind::Item));
        assert!(hit.error.is_none());
    }

    #[test]
    fn location_type_serde_round_trip() {
        let json = serde_json::to_string(&LocationType::Drawer).unwrap();
        assert_eq!(json, "\"drawer\"");
        let back: LocationType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, LocationType::Drawer);
    }
}

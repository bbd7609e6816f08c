//! # Backup Snapshot Format
//!
//! Portable snapshot of the entire local ledger, plus structural
//! validation of candidate imports.
//!
//! ## Snapshot Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Snapshot Document                              │
//! │                                                                     │
//! │  {                                                                  │
//! │    "version":    "1.0.0",            ← semver format tag            │
//! │    "exportedAt": "2026-08-31T…Z",    ← ISO-8601 export time         │
//! │    "data": {                                                        │
//! │      "categories":         [ … ],                                   │
//! │      "locations":          [ … ],                                   │
//! │      "items":              [ … ],                                   │
//! │      "item_variants":      [ … ],                                   │
//! │      "stock_transactions": [ … ]                                    │
//! │    }                                                                │
//! │  }                                                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation is purely structural (shape and array-typed tables) and
//! never panics; row-level referential problems are handled by the import
//! path in `stocktrace-db`, which skips unresolvable rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{Category, Item, ItemVariant, Location, StockTransaction};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// Table fields that must be present (and array-typed) under `data`.
const REQUIRED_TABLES: [&str; 3] = ["categories", "locations", "items"];

/// Table fields that may be absent, but must be arrays when present.
const OPTIONAL_TABLES: [&str; 2] = ["item_variants", "stock_transactions"];

// =============================================================================
// Snapshot Types
// =============================================================================

/// A versioned, portable snapshot of the local ledger store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format version (semver string).
    pub version: String,

    /// When the snapshot was exported.
    #[serde(rename = "exportedAt")]
    pub exported_at: DateTime<Utc>,

    /// All ledger tables.
    pub data: SnapshotData,
}

/// The table payload of a [`Snapshot`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    pub categories: Vec<Category>,
    pub locations: Vec<Location>,
    pub items: Vec<Item>,
    #[serde(default)]
    pub item_variants: Vec<ItemVariant>,
    #[serde(default)]
    pub stock_transactions: Vec<StockTransaction>,
}

impl Snapshot {
    /// Builds a snapshot tagged with the current format version and export
    /// time.
    pub fn new(data: SnapshotData) -> Self {
        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            exported_at: Utc::now(),
            data,
        }
    }

    /// Total row count across all tables (diagnostics).
    pub fn row_count(&self) -> usize {
        self.data.categories.len()
            + self.data.locations.len()
            + self.data.items.len()
            + self.data.item_variants.len()
            + self.data.stock_transactions.len()
    }
}

// =============================================================================
// Structural Validation
// =============================================================================

/// Validates a candidate snapshot document structurally and returns the
/// typed snapshot on success.
///
/// Checks, in order:
/// 1. top level is an object with `version` (semver string), `exportedAt`
///    (timestamp string), and `data` (object)
/// 2. required table fields exist under `data` and are arrays
/// 3. optional table fields, when present, are arrays
/// 4. rows deserialize into their entity types
///
/// Never panics; every failure is a descriptive [`ValidationError`].
pub fn validate(candidate: &Value) -> Result<Snapshot, ValidationError> {
    let obj = candidate
        .as_object()
        .ok_or_else(|| malformed("top level is not an object"))?;

    let version = obj
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing 'version' string"))?;
    validate_version(version)?;

    if !obj.get("exportedAt").map(Value::is_string).unwrap_or(false) {
        return Err(malformed("missing 'exportedAt' timestamp"));
    }

    let data = obj
        .get("data")
        .and_then(Value::as_object)
        .ok_or_else(|| malformed("missing 'data' object"))?;

    for table in REQUIRED_TABLES {
        match data.get(table) {
            Some(v) if v.is_array() => {}
            Some(_) => {
                return Err(ValidationError::TableNotArray {
                    table: table.to_string(),
                })
            }
            None => return Err(malformed(&format!("missing table '{table}'"))),
        }
    }

    for table in OPTIONAL_TABLES {
        if let Some(v) = data.get(table) {
            if !v.is_array() {
                return Err(ValidationError::TableNotArray {
                    table: table.to_string(),
                });
            }
        }
    }

    serde_json::from_value(candidate.clone()).map_err(|e| ValidationError::MalformedSnapshot {
        reason: e.to_string(),
    })
}

/// Checks that a version tag looks like `MAJOR.MINOR.PATCH`.
fn validate_version(version: &str) -> Result<(), ValidationError> {
    let parts: Vec<&str> = version.split('.').collect();
    let ok = parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::InvalidFormat {
            field: "version".to_string(),
            reason: format!("'{version}' is not a semver string"),
        })
    }
}

fn malformed(reason: &str) -> ValidationError {
    ValidationError::MalformedSnapshot {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn empty_snapshot_value() -> Value {
        json!({
            "version": "1.0.0",
            "exportedAt": "2026-08-31T12:00:00Z",
            "data": {
                "categories": [],
                "locations": [],
                "items": [],
                "item_variants": [],
                "stock_transactions": []
            }
        })
    }

    #[test]
    fn accepts_well_formed_snapshot() {
        let snapshot = validate(&empty_snapshot_value()).unwrap();
        assert_eq!(snapshot.version, "1.0.0");
        assert_eq!(snapshot.row_count(), 0);
    }

    #[test]
    fn optional_tables_may_be_absent() {
        let mut value = empty_snapshot_value();
        let data = value["data"].as_object_mut().unwrap();
        data.remove("item_variants");
        data.remove("stock_transactions");
        assert!(validate(&value).is_ok());
    }

    #[test]
    fn rejects_missing_required_table() {
        let mut value = empty_snapshot_value();
        value["data"].as_object_mut().unwrap().remove("items");
        let err = validate(&value).unwrap_err();
        assert!(err.to_string().contains("items"));
    }

    #[test]
    fn rejects_non_array_table() {
        let mut value = empty_snapshot_value();
        value["data"]["categories"] = json!({"bogus": true});
        let err = validate(&value).unwrap_err();
        assert!(matches!(err, ValidationError::TableNotArray { ref table } if table == "categories"));
    }

    #[test]
    fn rejects_bad_version() {
        let mut value = empty_snapshot_value();
        value["version"] = json!("not-semver");
        assert!(validate(&value).is_err());

        value["version"] = json!(42);
        assert!(validate(&value).is_err());
    }

    #[test]
    fn rejects_non_object_top_level() {
        assert!(validate(&json!([1, 2, 3])).is_err());
        assert!(validate(&json!("snapshot")).is_err());
    }

    #[test]
    fn round_trips_through_serde() {
        let snapshot = Snapshot::new(SnapshotData::default());
        let value = serde_json::to_value(&snapshot).unwrap();
        // serialized form uses the wire field name
        assert!(value.get("exportedAt").is_some());
        let back = validate(&value).unwrap();
        assert_eq!(back.version, SNAPSHOT_VERSION);
    }
}

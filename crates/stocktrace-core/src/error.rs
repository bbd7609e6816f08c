//! # Error Types
//!
//! Domain-specific error types for stocktrace-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  stocktrace-core errors (this file)                                 │
//! │  ├── CoreError        - Stock policy and target errors              │
//! │  └── ValidationError  - Input and snapshot validation failures      │
//! │                                                                     │
//! │  stocktrace-db errors (separate crate)                              │
//! │  └── DbError          - Database failures, referential conflicts    │
//! │                                                                     │
//! │  stocktrace-sync errors (separate crate)                            │
//! │  └── SyncError        - Remote/transport failures                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (code, counts, field names)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Domain-policy errors.
///
/// These represent business rule violations checked by the calling layer
/// before it touches the ledger. The ledger itself stays a pure accounting
/// primitive and does not enforce them.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A stock-out would drive the target's stock negative.
    ///
    /// Enforced by the calling policy layer via
    /// [`validation::check_stock_out`](crate::validation::check_stock_out),
    /// never by the ledger mutation itself.
    #[error("Insufficient stock for {code}: available {available}, requested {requested}")]
    InsufficientStock {
        code: String,
        available: i64,
        requested: i64,
    },

    /// A stock mutation named neither or both of item/variant.
    #[error("Stock mutation must target exactly one of item or variant")]
    AmbiguousTarget,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input and snapshot validation errors.
///
/// These occur when caller input or an imported snapshot doesn't meet
/// structural requirements. Reported to the caller, never panicked on.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Field value has an invalid format.
    #[error("{field} is invalid: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// A quantity that must be positive was zero or negative.
    #[error("{field} must be positive, got {value}")]
    NotPositive { field: String, value: i64 },

    /// A candidate snapshot does not have the required top-level shape.
    #[error("Malformed snapshot: {reason}")]
    MalformedSnapshot { reason: String },

    /// A snapshot table field was present but not array-typed.
    #[error("Snapshot table '{table}' must be an array")]
    TableNotArray { table: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = CoreError::InsufficientStock {
            code: "ITM-00001".into(),
            available: 2,
            requested: 5,
        };
        let msg = err.to_string();
        assert!(msg.contains("ITM-00001"));
        assert!(msg.contains("available 2"));
        assert!(msg.contains("requested 5"));
    }
}

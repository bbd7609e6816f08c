//! # Validation Module
//!
//! Stock policy and field validation for the calling layer.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Validation Layers                             │
//! │                                                                     │
//! │  Layer 1: Calling application                                       │
//! │  └── THIS MODULE: stock policy + field checks                       │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 2: Ledger Store (stocktrace-db)                              │
//! │  └── Pure accounting: records whatever the policy layer allowed     │
//! │           │                                                         │
//! │           ▼                                                         │
//! │  Layer 3: Database (SQLite)                                         │
//! │  ├── NOT NULL / UNIQUE constraints                                  │
//! │  └── Foreign key constraints                                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The separation is deliberate: the ledger mutation itself never forbids
//! a negative resulting stock, so it stays a pure accounting primitive.
//! Callers that want the "no negative stock" policy run
//! [`check_stock_out`] first.

use crate::error::{CoreError, ValidationError};
use crate::types::TransactionType;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Stock Policy
// =============================================================================

/// Rejects a stock-out that would drive the target's stock negative.
///
/// `code` is the target's entity code, used only for the error message.
pub fn check_stock_out(code: &str, available: i64, requested: i64) -> Result<(), CoreError> {
    if requested > available {
        return Err(CoreError::InsufficientStock {
            code: code.to_string(),
            available,
            requested,
        });
    }
    Ok(())
}

/// Validates the caller-supplied quantity for a mutation type.
///
/// `StockIn`/`StockOut` take positive magnitudes; `Adjustment` takes a
/// signed, non-zero delta.
pub fn validate_quantity(transaction_type: TransactionType, quantity: i64) -> ValidationResult<()> {
    match transaction_type {
        TransactionType::StockIn | TransactionType::StockOut => {
            if quantity <= 0 {
                return Err(ValidationError::NotPositive {
                    field: "quantity".to_string(),
                    value: quantity,
                });
            }
        }
        TransactionType::Adjustment => {
            if quantity == 0 {
                return Err(ValidationError::InvalidFormat {
                    field: "quantity".to_string(),
                    reason: "adjustment delta must be non-zero".to_string(),
                });
            }
        }
    }
    Ok(())
}

// =============================================================================
// Field Validators
// =============================================================================

/// Validates an entity display name (non-empty, at most 200 characters).
pub fn validate_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates an entity code (non-empty, uppercase alphanumerics and
/// hyphens).
pub fn validate_code(code: &str) -> ValidationResult<()> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must contain only uppercase letters, digits, and hyphens".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_out_policy() {
        assert!(check_stock_out("ITM-00001", 5, 5).is_ok());
        assert!(check_stock_out("ITM-00001", 5, 3).is_ok());

        let err = check_stock_out("ITM-00001", 2, 5).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock {
                available: 2,
                requested: 5,
                ..
            }
        ));
    }

    #[test]
    fn quantity_rules_per_type() {
        assert!(validate_quantity(TransactionType::StockIn, 1).is_ok());
        assert!(validate_quantity(TransactionType::StockIn, 0).is_err());
        assert!(validate_quantity(TransactionType::StockOut, -1).is_err());
        assert!(validate_quantity(TransactionType::Adjustment, -7).is_ok());
        assert!(validate_quantity(TransactionType::Adjustment, 0).is_err());
    }

    #[test]
    fn name_and_code_checks() {
        assert!(validate_name("Patch cable").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(201)).is_err());

        assert!(validate_code("ITM-00010").is_ok());
        assert!(validate_code("itm-00010").is_err());
        assert!(validate_code("").is_err());
    }
}

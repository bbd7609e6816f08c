//! # Sequential Entity Codes
//!
//! Formatting and classification of human-readable entity codes.
//!
//! ## Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Code Format                                   │
//! │                                                                     │
//! │  {prefix}-{zero-padded sequence}                                    │
//! │                                                                     │
//! │  Items:       ITM-00010                                            │
//! │  Locations:   per location_type                                     │
//! │    building → BLD-00001      box    → BOX-00004                     │
//! │    room     → RM-00002       drawer → DRW-00005                     │
//! │    shelf    → SHF-00003                                             │
//! │                                                                     │
//! │  Sequence = 1 + count of existing entities of that kind/subtype.    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Known Weak Invariant
//! The sequence is count-derived, NOT a gap-free concurrency-safe counter:
//! two concurrent writers can observe the same count and propose the same
//! code. The remote system of record is the uniqueness authority and is
//! expected to reject or reconcile collisions. Do not strengthen this here
//! without also changing the remote contract.

use crate::types::LocationType;

/// Prefix used for item codes.
pub const ITEM_PREFIX: &str = "ITM";

/// Zero-pad width of the sequence part.
pub const SEQUENCE_WIDTH: usize = 5;

/// Returns the code prefix for a location type.
pub fn location_prefix(location_type: LocationType) -> &'static str {
    match location_type {
        LocationType::Building => "BLD",
        LocationType::Room => "RM",
        LocationType::Shelf => "SHF",
        LocationType::Box => "BOX",
        LocationType::Drawer => "DRW",
    }
}

/// Formats a code from a prefix and a sequence number.
pub fn format_code(prefix: &str, sequence: i64) -> String {
    format!("{prefix}-{sequence:0width$}", width = SEQUENCE_WIDTH)
}

/// Derives the next item code from the current item count.
pub fn next_item_code(existing_count: i64) -> String {
    format_code(ITEM_PREFIX, existing_count + 1)
}

/// Derives the next location code from the current count of locations of
/// the same type.
pub fn next_location_code(location_type: LocationType, existing_count: i64) -> String {
    format_code(location_prefix(location_type), existing_count + 1)
}

// =============================================================================
// Classification
// =============================================================================

/// The entity kind a scanned code refers to, derived from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeKind {
    Item,
    Location,
}

/// Classifies a scanned code by its prefix convention.
///
/// Returns `None` for codes that match neither convention; the scan queue
/// then falls back to trying both lookups.
pub fn classify(code: &str) -> Option<CodeKind> {
    let prefix = code.split('-').next()?;
    if prefix == ITEM_PREFIX {
        return Some(CodeKind::Item);
    }
    if LocationType::ALL
        .iter()
        .any(|lt| location_prefix(*lt) == prefix)
    {
        return Some(CodeKind::Location);
    }
    None
}

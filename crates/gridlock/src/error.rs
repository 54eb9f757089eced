//! Error types for placement legalization.

use thiserror::Error;

/// Fatal errors raised before or during legalization.
///
/// Per-cell placement failures are not errors; they are collected and
/// returned in the legalization result. Internal invariant violations
/// (painting over an occupied footprint, erasing an unplaced cell) are
/// bugs and panic instead.
#[derive(Debug, Error)]
pub enum LegalizeError {
    /// A movable instance is wider or taller than the core row grid.
    #[error("instance {0} does not fit inside the row core area")]
    DoesNotFit(String),

    /// Movable cell area exceeds the free area of the core.
    #[error("design utilization {0:.1}% exceeds 100%")]
    UtilizationExceeded(f64),

    /// A row origin is not aligned to the site and row grid.
    #[error("row {0} is not aligned to the site grid")]
    MisalignedRow(usize),

    /// An instance references a master index outside the design.
    #[error("instance {inst} references master {index} out of range")]
    BadMaster { inst: String, index: usize },

    /// A region group references an instance index outside the design.
    #[error("group {group} references instance {index} out of range")]
    BadGroupMember { group: String, index: usize },

    /// Brick packing could not place a group cell; the group is not
    /// legalizable under its region constraints.
    #[error("cannot place instance {0}")]
    GroupPlacement(String),
}

/// Result type for legalization operations.
pub type Result<T> = std::result::Result<T, LegalizeError>;

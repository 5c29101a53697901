// crates/spec-harvest-store/src/error.rs
// ============================================================================
// Module: SpecDb Errors
// Description: Error taxonomy for the relational state store.
// Purpose: Distinguish fatal startup integrity failures from per-call schema
//          and database errors.
// Dependencies: spec-harvest-core, thiserror
// ============================================================================

//! ## Overview
//! Write failures propagate; the store never silently discards. Integrity
//! failures at startup are fatal and name every violated invariant with a
//! violating-row count. Per-call failures carry enough context for the
//! caller to decide between retry and abort.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use spec_harvest_core::ComponentParseError;
use thiserror::Error;

// ============================================================================
// SECTION: Integrity Report
// ============================================================================

/// One violated startup invariant with its violating-row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityViolation {
    /// Stable invariant name (e.g. `component_value_identity_ref`).
    pub invariant: &'static str,
    /// Number of rows violating the invariant.
    pub violating_rows: u64,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} rows)", self.invariant, self.violating_rows)
    }
}

/// Renders the violation list for the fatal integrity error.
fn render_violations(violations: &[IntegrityViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// SpecDb errors.
///
/// # Invariants
/// - `Integrity` is raised only at startup and must abort the process.
/// - Messages avoid embedding raw row payloads.
#[derive(Debug, Error)]
pub enum SpecDbError {
    /// Underlying database engine error.
    #[error("specdb engine error: {0}")]
    Db(String),
    /// Write violated a prepared statement's schema constraints.
    #[error("specdb schema violation: {0}")]
    Schema(String),
    /// Invalid argument or stored data.
    #[error("specdb invalid data: {0}")]
    Invalid(String),
    /// A referenced row does not exist.
    #[error("specdb missing row: {0}")]
    MissingRow(String),
    /// Stored label failed to parse into its domain vocabulary.
    #[error("specdb stored label invalid: {0}")]
    StoredLabel(#[from] ComponentParseError),
    /// Store schema version is ahead of this binary.
    #[error("specdb schema version mismatch: {0}")]
    VersionMismatch(String),
    /// Startup invariants are violated; the process must not continue.
    #[error("specdb integrity failure: {}", render_violations(.violations))]
    Integrity {
        /// Every violated invariant with its row count.
        violations: Vec<IntegrityViolation>,
    },
}

impl SpecDbError {
    /// Wraps a rusqlite error, classifying constraint violations.
    #[must_use]
    pub fn from_sqlite(err: &rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Schema(err.to_string())
            }
            _ => Self::Db(err.to_string()),
        }
    }
}

/// Maps a rusqlite result into the store error space.
pub(crate) fn db_err(err: rusqlite::Error) -> SpecDbError {
    SpecDbError::from_sqlite(&err)
}

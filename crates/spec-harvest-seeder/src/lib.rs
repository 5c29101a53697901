// crates/spec-harvest-seeder/src/lib.rs
// ============================================================================
// Module: Spec Harvest Seeder
// Description: Idempotent SpecDb population from external JSON artifacts.
// Purpose: Load component databases, enum vocabularies, per-product
//          candidates, and overrides into the store.
// Dependencies: spec-harvest-core, spec-harvest-store, spec-harvest-storage
// ============================================================================

//! ## Overview
//! The seeder reads seed artifacts through the object store and writes them
//! through the SpecDb. Missing paths are empty collections, not errors.
//! Per-item failures aggregate into the report's `errors` list and seeding
//! continues; seeding the same inputs twice produces the same counts modulo
//! timestamps.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod component_stage;
pub mod enum_stage;
pub mod product_stage;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_storage::ObjectStore;
use spec_harvest_store::SpecDb;
use spec_harvest_store::SpecDbError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal seeder errors; per-item issues aggregate in the report instead.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Store operation failed.
    #[error("seed store error: {0}")]
    Store(#[from] SpecDbError),
    /// Storage listing or read failed outright.
    #[error("seed storage error: {0}")]
    Storage(#[from] spec_harvest_storage::StorageError),
}

/// One aggregated per-item seeding issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedIssue {
    /// Artifact or entry the issue arose in.
    pub context: String,
    /// Failure description.
    pub message: String,
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Per-stage counts from one seeding pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    /// Component identities upserted.
    pub identities: u64,
    /// Component aliases added.
    pub aliases: u64,
    /// Component property values upserted.
    pub component_values: u64,
    /// Synthetic component candidates written.
    pub component_candidates: u64,
    /// Component overrides applied.
    pub component_overrides: u64,
    /// Enum lists ensured.
    pub enum_lists: u64,
    /// Enum values upserted.
    pub enum_values: u64,
    /// Pipeline enum-suggestion candidates written.
    pub enum_candidates: u64,
    /// Product rows upserted.
    pub products: u64,
    /// Per-product candidates written.
    pub candidates: u64,
    /// Per-product field overrides applied.
    pub field_overrides: u64,
    /// Aggregated per-item issues.
    pub errors: Vec<SeedIssue>,
}

impl SeedReport {
    /// Records one per-item issue.
    pub(crate) fn issue(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.errors.push(SeedIssue {
            context: context.into(),
            message: message.into(),
        });
    }
}

// ============================================================================
// SECTION: Seeder
// ============================================================================

/// Orchestrates all seeding stages for one category.
pub struct Seeder<'a> {
    /// Artifact storage handle.
    storage: &'a dyn ObjectStore,
    /// Root for category seed data.
    helper_root: String,
    /// Root for per-product artifacts.
    output_root: String,
    /// Category being seeded.
    category: Category,
}

impl<'a> Seeder<'a> {
    /// Creates a seeder for one category.
    #[must_use]
    pub fn new(
        storage: &'a dyn ObjectStore,
        helper_root: impl Into<String>,
        output_root: impl Into<String>,
        category: Category,
    ) -> Self {
        Self {
            storage,
            helper_root: helper_root.into(),
            output_root: output_root.into(),
            category,
        }
    }

    /// Returns the category being seeded.
    #[must_use]
    pub const fn category(&self) -> &Category {
        &self.category
    }

    /// Returns the artifact storage handle.
    pub(crate) const fn storage(&self) -> &'a dyn ObjectStore {
        self.storage
    }

    /// Returns the helper-files root.
    pub(crate) fn helper_root(&self) -> &str {
        &self.helper_root
    }

    /// Returns the output root.
    pub(crate) fn output_root(&self) -> &str {
        &self.output_root
    }

    /// Runs every seeding stage in order.
    ///
    /// # Errors
    ///
    /// Returns [`SeedError`] only on store or storage failures that make
    /// continuing pointless; per-item issues land in the report.
    pub fn seed_all(&self, db: &mut SpecDb) -> Result<SeedReport, SeedError> {
        let mut report = SeedReport::default();
        self.seed_component_dbs(db, &mut report)?;
        self.seed_component_overrides(db, &mut report)?;
        self.seed_known_enum_values(db, &mut report)?;
        self.seed_enum_suggestions(db, &mut report)?;
        self.seed_product_candidates(db, &mut report)?;
        self.seed_product_overrides(db, &mut report)?;
        Ok(report)
    }
}

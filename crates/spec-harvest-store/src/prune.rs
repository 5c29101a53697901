// crates/spec-harvest-store/src/prune.rs
// ============================================================================
// Module: Orphan Pointer Pruning
// Description: Clear stale accepted/selected candidate pointers.
// Purpose: Keep candidate pointers consistent after reseeds delete candidate
//          rows.
// Dependencies: rusqlite, crate::db
// ============================================================================

//! ## Overview
//! Field states and review states point at the candidate that justified
//! their value. A reseed deletes and rewrites candidates, which can strand
//! those pointers. Pruning clears any pointer whose candidate row no longer
//! exists, or whose candidate no longer belongs to the pointer's (product,
//! field) slot, and reports per-table counts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Rows cleared per pointer-bearing table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruneReport {
    /// `accepted_candidate_id` pointers cleared on field states.
    pub field_states_cleared: u64,
    /// `selected_candidate_id` pointers cleared on review states.
    pub review_states_cleared: u64,
    /// `selected_candidate_id` pointers cleared on assertions.
    pub assertions_cleared: u64,
}

// ============================================================================
// SECTION: Pruning
// ============================================================================

impl SpecDb {
    /// Clears stale candidate pointers everywhere they occur.
    ///
    /// A pointer is stale when its candidate row is gone, or when the
    /// candidate's (product, field) no longer matches the pointer's slot.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no change persists on
    /// error.
    pub fn prune_orphan_candidate_pointers(&mut self) -> Result<PruneReport, SpecDbError> {
        let now = unix_millis();
        let tx = self.conn_mut().transaction().map_err(db_err)?;

        let field_states_cleared = tx
            .execute(
                "UPDATE item_field_states SET accepted_candidate_id = NULL, updated_at = ?1
                 WHERE accepted_candidate_id IS NOT NULL
                   AND NOT EXISTS (
                     SELECT 1 FROM candidates c
                     WHERE c.candidate_id = item_field_states.accepted_candidate_id
                       AND c.category = item_field_states.category
                       AND c.product_id = item_field_states.product_id
                       AND c.field_key = item_field_states.field_key)",
                params![now],
            )
            .map_err(db_err)?;

        // Grid-slot review states resolve their (product, field) through the
        // field state they review; other slot kinds only require existence.
        let review_states_cleared = tx
            .execute(
                "UPDATE key_review_states SET selected_candidate_id = NULL, updated_at = ?1
                 WHERE selected_candidate_id IS NOT NULL
                   AND (
                     NOT EXISTS (
                       SELECT 1 FROM candidates c
                       WHERE c.candidate_id = key_review_states.selected_candidate_id)
                     OR (
                       kind = 'grid_key'
                       AND NOT EXISTS (
                         SELECT 1 FROM candidates c
                         JOIN item_field_states s
                           ON s.id = key_review_states.item_state_id
                         WHERE c.candidate_id = key_review_states.selected_candidate_id
                           AND c.category = s.category
                           AND c.product_id = s.product_id
                           AND c.field_key = s.field_key)))",
                params![now],
            )
            .map_err(db_err)?;

        let assertions_cleared = tx
            .execute(
                "UPDATE source_assertions SET selected_candidate_id = NULL
                 WHERE selected_candidate_id IS NOT NULL
                   AND NOT EXISTS (
                     SELECT 1 FROM candidates c
                     WHERE c.candidate_id = source_assertions.selected_candidate_id
                       AND c.category = source_assertions.category
                       AND c.product_id = source_assertions.product_id
                       AND c.field_key = source_assertions.field_key)",
                params![],
            )
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(PruneReport {
            field_states_cleared: u64::try_from(field_states_cleared).unwrap_or(u64::MAX),
            review_states_cleared: u64::try_from(review_states_cleared).unwrap_or(u64::MAX),
            assertions_cleared: u64::try_from(assertions_cleared).unwrap_or(u64::MAX),
        })
    }
}

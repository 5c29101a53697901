// crates/spec-harvest-store/src/candidates.rs
// ============================================================================
// Module: Candidate Operations
// Description: Insert and fetch observed-value candidates.
// Purpose: Persist atomic value assertions with full source provenance.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! A candidate is one observed value for one field of one product, with the
//! provenance that justified it. Inserts replace on duplicate id, so reseeds
//! and re-extractions converge. Batch inserts are atomic: one failing row
//! rolls back the whole batch.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::CandidateId;
use spec_harvest_core::Category;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;

use crate::db::SpecDb;
use crate::error::SpecDbError;
use crate::error::db_err;

// ============================================================================
// SECTION: Candidate Record
// ============================================================================

/// One observed-value candidate with provenance.
///
/// # Invariants
/// - `candidate_id` is globally unique and deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    /// Deterministic candidate identifier.
    pub candidate_id: CandidateId,
    /// Category scope.
    pub category: Category,
    /// Product the value was observed for.
    pub product_id: ProductId,
    /// Field the value was observed for.
    pub field_key: FieldKey,
    /// Observed value text.
    pub value: String,
    /// Extraction score.
    pub score: f64,
    /// Rank among the field's candidates.
    pub rank: i64,
    /// Source page URL.
    pub source_url: String,
    /// Source host.
    pub source_host: String,
    /// Source tier label.
    pub source_tier: String,
    /// Extraction method label.
    pub source_method: String,
    /// Snippet identifier within the captured page.
    pub snippet_id: String,
    /// Hash of the snippet content.
    pub snippet_hash: String,
    /// Quoted supporting text.
    pub quote: String,
    /// RFC3339 retrieval timestamp.
    pub retrieved_at: String,
    /// Harvest run identifier.
    pub run_id: String,
    /// Whether the field resolves against the component database.
    pub is_component_field: bool,
    /// Whether the field is multi-valued.
    pub is_list_field: bool,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Executes one candidate upsert against a connection-like handle.
fn insert_candidate_stmt(
    conn: &rusqlite::Connection,
    candidate: &CandidateRecord,
) -> Result<(), SpecDbError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT OR REPLACE INTO candidates
             (candidate_id, category, product_id, field_key, value, score, rank,
              source_url, source_host, source_tier, source_method,
              snippet_id, snippet_hash, quote, retrieved_at, run_id,
              is_component_field, is_list_field)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18)",
        )
        .map_err(db_err)?;
    stmt.execute(params![
        candidate.candidate_id.as_str(),
        candidate.category.as_str(),
        candidate.product_id.as_str(),
        candidate.field_key.as_str(),
        candidate.value,
        candidate.score,
        candidate.rank,
        candidate.source_url,
        candidate.source_host,
        candidate.source_tier,
        candidate.source_method,
        candidate.snippet_id,
        candidate.snippet_hash,
        candidate.quote,
        candidate.retrieved_at,
        candidate.run_id,
        i64::from(candidate.is_component_field),
        i64::from(candidate.is_list_field),
    ])
    .map_err(db_err)?;
    Ok(())
}

/// Maps one candidates row into a record.
fn read_candidate_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CandidateRecord> {
    Ok(CandidateRecord {
        candidate_id: CandidateId::new(row.get::<_, String>(0)?),
        category: Category::new(row.get::<_, String>(1)?),
        product_id: ProductId::new(row.get::<_, String>(2)?),
        field_key: FieldKey::new(row.get::<_, String>(3)?),
        value: row.get(4)?,
        score: row.get(5)?,
        rank: row.get(6)?,
        source_url: row.get(7)?,
        source_host: row.get(8)?,
        source_tier: row.get(9)?,
        source_method: row.get(10)?,
        snippet_id: row.get(11)?,
        snippet_hash: row.get(12)?,
        quote: row.get(13)?,
        retrieved_at: row.get(14)?,
        run_id: row.get(15)?,
        is_component_field: row.get::<_, i64>(16)? != 0,
        is_list_field: row.get::<_, i64>(17)? != 0,
    })
}

/// Columns selected for candidate reads, in [`read_candidate_row`] order.
const CANDIDATE_COLUMNS: &str = "candidate_id, category, product_id, field_key, value, score, \
     rank, source_url, source_host, source_tier, source_method, snippet_id, snippet_hash, \
     quote, retrieved_at, run_id, is_component_field, is_list_field";

impl SpecDb {
    /// Inserts one candidate, replacing any row with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn insert_candidate(&mut self, candidate: &CandidateRecord) -> Result<(), SpecDbError> {
        insert_candidate_stmt(self.conn(), candidate)
    }

    /// Inserts a candidate batch atomically.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no rows persist on error.
    pub fn insert_candidates(
        &mut self,
        candidates: &[CandidateRecord],
    ) -> Result<(), SpecDbError> {
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        for candidate in candidates {
            insert_candidate_stmt(&tx, candidate)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Deletes every candidate for a product, for reseeds.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn delete_product_candidates(
        &mut self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<u64, SpecDbError> {
        let deleted = self
            .conn()
            .execute(
                "DELETE FROM candidates WHERE category = ?1 AND product_id = ?2",
                params![category.as_str(), product_id.as_str()],
            )
            .map_err(db_err)?;
        Ok(u64::try_from(deleted).unwrap_or(u64::MAX))
    }

    /// Fetches every candidate for a product, ranked.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn candidates_for_product(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Vec<CandidateRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(&format!(
                "SELECT {CANDIDATE_COLUMNS} FROM candidates
                 WHERE category = ?1 AND product_id = ?2
                 ORDER BY field_key, rank, candidate_id"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), product_id.as_str()], read_candidate_row)
            .map_err(db_err)?;
        collect_candidates(rows)
    }

    /// Fetches candidates for one (product, field), ranked.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn candidates_for_field(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<Vec<CandidateRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(&format!(
                "SELECT {CANDIDATE_COLUMNS} FROM candidates
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3
                 ORDER BY rank, candidate_id"
            ))
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                read_candidate_row,
            )
            .map_err(db_err)?;
        collect_candidates(rows)
    }
}

/// Drains a candidate row iterator into a vector.
fn collect_candidates(
    rows: impl Iterator<Item = rusqlite::Result<CandidateRecord>>,
) -> Result<Vec<CandidateRecord>, SpecDbError> {
    let mut candidates = Vec::new();
    for row in rows {
        candidates.push(row.map_err(db_err)?);
    }
    Ok(candidates)
}

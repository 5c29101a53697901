// crates/spec-harvest-store/src/sources.rs
// ============================================================================
// Module: Source Lineage Operations
// Description: Source registry rows, assertions, and evidence references.
// Purpose: Persist the evidence lineage binding candidates to the slots they
//          support.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! One source registry row exists per (product, host, run) capture. An
//! assertion promotes a candidate into the lineage tables and anchors it to
//! exactly one slot matching its context kind; each assertion carries one or
//! more evidence references. Anchors are typed at the API boundary so an
//! ill-anchored assertion cannot be expressed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::CandidateId;
use spec_harvest_core::Category;
use spec_harvest_core::FieldKey;
use spec_harvest_core::Host;
use spec_harvest_core::ProductId;
use spec_harvest_core::RunId;
use spec_harvest_core::SourceId;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::ComponentValueId;
use crate::ids::EnumListId;
use crate::ids::ItemStateId;
use crate::ids::ListValueId;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One source capture row.
///
/// # Invariants
/// - `source_id` is unique across categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Source registry identifier.
    pub source_id: SourceId,
    /// Category scope.
    pub category: Category,
    /// Product the capture belongs to.
    pub product_id: ProductId,
    /// Host the page was fetched from.
    pub host: Host,
    /// Harvest run identifier.
    pub run_id: RunId,
    /// Captured page URL.
    pub url: String,
    /// Source tier label.
    pub tier: String,
    /// Fetch method label.
    pub method: String,
}

/// Slot an assertion anchors to; the kind is implied by the variant.
///
/// # Invariants
/// - Exactly one slot reference per assertion, by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssertionSlot {
    /// Anchored to an item field state.
    Item {
        /// Field state rowid.
        item_state_id: ItemStateId,
    },
    /// Anchored to a component property value.
    Component {
        /// Component value rowid.
        component_value_id: ComponentValueId,
    },
    /// Anchored to an enum list value.
    List {
        /// List value rowid.
        list_value_id: ListValueId,
        /// Owning enum list rowid.
        enum_list_id: EnumListId,
    },
}

impl AssertionSlot {
    /// Returns the stable context-kind label for the slot.
    #[must_use]
    pub const fn context_kind(self) -> &'static str {
        match self {
            Self::Item {
                ..
            } => "item",
            Self::Component {
                ..
            } => "component",
            Self::List {
                ..
            } => "list",
        }
    }
}

/// One assertion row binding a candidate to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    /// Assertion identifier; equals the candidate id.
    pub assertion_id: CandidateId,
    /// Source registry row the assertion references.
    pub source_id: SourceId,
    /// Category scope.
    pub category: Category,
    /// Product the assertion belongs to.
    pub product_id: ProductId,
    /// Field the assertion covers.
    pub field_key: FieldKey,
    /// Slot the assertion anchors to.
    pub slot: AssertionSlot,
    /// Candidate currently selected for the slot, when any.
    pub selected_candidate_id: Option<CandidateId>,
}

/// One evidence reference under an assertion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRefRecord {
    /// Snippet identifier within the captured page.
    pub snippet_id: String,
    /// Snippet page URL.
    pub url: String,
    /// Quoted supporting text.
    pub quote: String,
    /// Hash of the snippet content.
    pub snippet_hash: String,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates one source registry row.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_source(&mut self, source: &SourceRecord) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT INTO source_registry
                 (source_id, category, product_id, host, run_id, url, tier, method,
                  captured_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (source_id) DO UPDATE SET
                   url = excluded.url,
                   tier = excluded.tier,
                   method = excluded.method",
                params![
                    source.source_id.as_str(),
                    source.category.as_str(),
                    source.product_id.as_str(),
                    source.host.as_str(),
                    source.run_id.as_str(),
                    source.url,
                    source.tier,
                    source.method,
                    unix_millis()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Inserts an assertion with its evidence references atomically.
    ///
    /// Replaces any prior assertion with the same id, rewriting its evidence
    /// references from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::Invalid`] when no evidence reference is given
    /// and engine errors otherwise.
    pub fn insert_assertion(
        &mut self,
        assertion: &AssertionRecord,
        evidence: &[EvidenceRefRecord],
    ) -> Result<(), SpecDbError> {
        if evidence.is_empty() {
            return Err(SpecDbError::Invalid(
                "assertion requires at least one evidence reference".to_string(),
            ));
        }
        let (item_state_id, component_value_id, list_value_id, enum_list_id) =
            match assertion.slot {
                AssertionSlot::Item {
                    item_state_id,
                } => (Some(item_state_id.get()), None, None, None),
                AssertionSlot::Component {
                    component_value_id,
                } => (None, Some(component_value_id.get()), None, None),
                AssertionSlot::List {
                    list_value_id,
                    enum_list_id,
                } => (None, None, Some(list_value_id.get()), Some(enum_list_id.get())),
            };
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM source_evidence_refs WHERE assertion_id = ?1",
            params![assertion.assertion_id.as_str()],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT OR REPLACE INTO source_assertions
             (assertion_id, source_id, category, product_id, field_key, context_kind,
              item_state_id, component_value_id, list_value_id, enum_list_id,
              selected_candidate_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                assertion.assertion_id.as_str(),
                assertion.source_id.as_str(),
                assertion.category.as_str(),
                assertion.product_id.as_str(),
                assertion.field_key.as_str(),
                assertion.slot.context_kind(),
                item_state_id,
                component_value_id,
                list_value_id,
                enum_list_id,
                assertion.selected_candidate_id.as_ref().map(CandidateId::as_str),
            ],
        )
        .map_err(db_err)?;
        for reference in evidence {
            tx.execute(
                "INSERT INTO source_evidence_refs
                 (assertion_id, snippet_id, url, quote, snippet_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    assertion.assertion_id.as_str(),
                    reference.snippet_id,
                    reference.url,
                    reference.quote,
                    reference.snippet_hash,
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Lists the evidence references under an assertion.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn evidence_refs(
        &self,
        assertion_id: &CandidateId,
    ) -> Result<Vec<EvidenceRefRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT snippet_id, url, quote, snippet_hash FROM source_evidence_refs
                 WHERE assertion_id = ?1 ORDER BY id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![assertion_id.as_str()], |row| {
                Ok(EvidenceRefRecord {
                    snippet_id: row.get(0)?,
                    url: row.get(1)?,
                    quote: row.get(2)?,
                    snippet_hash: row.get(3)?,
                })
            })
            .map_err(db_err)?;
        let mut references = Vec::new();
        for row in rows {
            references.push(row.map_err(db_err)?);
        }
        Ok(references)
    }
}

// crates/spec-harvest-store/src/items.rs
// ============================================================================
// Module: Item State Operations
// Description: Accepted field values, component links, and list links.
// Purpose: Maintain the per-product accepted state and its links into the
//          component and enum reference data.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! An item field state is the current accepted value for one field of one
//! product. States are created lazily on first observation and mutated by
//! the runtime gate, overrides, and component cascade. List-link sync
//! expands a delimited multi-value into the link set implied by its tokens
//! and replaces the prior set atomically; running it twice with the same
//! value is a no-op.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::CandidateId;
use spec_harvest_core::Category;
use spec_harvest_core::FieldKey;
use spec_harvest_core::LinkMatchType;
use spec_harvest_core::ProductId;
use spec_harvest_core::tokenize_list_value;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::IdentityRowId;
use crate::ids::ItemStateId;
use crate::ids::ListValueId;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One accepted field state row.
///
/// # Invariants
/// - `(category, product_id, field_key)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFieldStateRecord {
    /// Store rowid.
    pub id: ItemStateId,
    /// Product the state belongs to.
    pub product_id: ProductId,
    /// Field the state covers.
    pub field_key: FieldKey,
    /// Accepted value text.
    pub value: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Source label (`extraction`, `component_db`, `override`, ...).
    pub source: String,
    /// Candidate the value derives from, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether an override pinned the value.
    pub overridden: bool,
    /// Whether the field awaits AI review.
    pub needs_ai_review: bool,
    /// Whether AI review completed for the current value.
    pub ai_review_complete: bool,
}

/// Mutable inputs for one field-state upsert.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemFieldStateUpsert {
    /// Accepted value text.
    pub value: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Source label.
    pub source: String,
    /// Candidate the value derives from, when any.
    pub accepted_candidate_id: Option<CandidateId>,
    /// Whether an override pinned the value.
    pub overridden: bool,
    /// Whether the field awaits AI review.
    pub needs_ai_review: bool,
    /// Whether AI review completed for the current value.
    pub ai_review_complete: bool,
}

// ============================================================================
// SECTION: Field State Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates one field state; returns its rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_item_field_state(
        &mut self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        upsert: &ItemFieldStateUpsert,
    ) -> Result<ItemStateId, SpecDbError> {
        self.conn()
            .execute(
                "INSERT INTO item_field_states
                 (category, product_id, field_key, value, confidence, source,
                  accepted_candidate_id, overridden, needs_ai_review, ai_review_complete,
                  updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT (category, product_id, field_key) DO UPDATE SET
                   value = excluded.value,
                   confidence = excluded.confidence,
                   source = excluded.source,
                   accepted_candidate_id = excluded.accepted_candidate_id,
                   overridden = excluded.overridden,
                   needs_ai_review = excluded.needs_ai_review,
                   ai_review_complete = excluded.ai_review_complete,
                   updated_at = excluded.updated_at",
                params![
                    category.as_str(),
                    product_id.as_str(),
                    field_key.as_str(),
                    upsert.value,
                    upsert.confidence,
                    upsert.source,
                    upsert.accepted_candidate_id.as_ref().map(CandidateId::as_str),
                    i64::from(upsert.overridden),
                    i64::from(upsert.needs_ai_review),
                    i64::from(upsert.ai_review_complete),
                    unix_millis()
                ],
            )
            .map_err(db_err)?;
        let id: i64 = self
            .conn()
            .query_row(
                "SELECT id FROM item_field_states
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(ItemStateId::new(id))
    }

    /// Loads one field state when present.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn item_field_state(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<Option<ItemFieldStateRecord>, SpecDbError> {
        self.conn()
            .query_row(
                "SELECT id, value, confidence, source, accepted_candidate_id, overridden,
                        needs_ai_review, ai_review_complete
                 FROM item_field_states
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                |row| {
                    Ok(ItemFieldStateRecord {
                        id: ItemStateId::new(row.get(0)?),
                        product_id: product_id.clone(),
                        field_key: field_key.clone(),
                        value: row.get(1)?,
                        confidence: row.get(2)?,
                        source: row.get(3)?,
                        accepted_candidate_id: row
                            .get::<_, Option<String>>(4)?
                            .map(CandidateId::new),
                        overridden: row.get::<_, i64>(5)? != 0,
                        needs_ai_review: row.get::<_, i64>(6)? != 0,
                        ai_review_complete: row.get::<_, i64>(7)? != 0,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Loads every field state for a product, keyed ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn item_field_states(
        &self,
        category: &Category,
        product_id: &ProductId,
    ) -> Result<Vec<ItemFieldStateRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT id, field_key, value, confidence, source, accepted_candidate_id,
                        overridden, needs_ai_review, ai_review_complete
                 FROM item_field_states
                 WHERE category = ?1 AND product_id = ?2 ORDER BY field_key",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), product_id.as_str()], |row| {
                Ok(ItemFieldStateRecord {
                    id: ItemStateId::new(row.get(0)?),
                    product_id: product_id.clone(),
                    field_key: FieldKey::new(row.get::<_, String>(1)?),
                    value: row.get(2)?,
                    confidence: row.get(3)?,
                    source: row.get(4)?,
                    accepted_candidate_id: row
                        .get::<_, Option<String>>(5)?
                        .map(CandidateId::new),
                    overridden: row.get::<_, i64>(6)? != 0,
                    needs_ai_review: row.get::<_, i64>(7)? != 0,
                    ai_review_complete: row.get::<_, i64>(8)? != 0,
                })
            })
            .map_err(db_err)?;
        let mut states = Vec::new();
        for row in rows {
            states.push(row.map_err(db_err)?);
        }
        Ok(states)
    }
}

// ============================================================================
// SECTION: Link Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates the component link for one field.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_item_component_link(
        &mut self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        identity_id: IdentityRowId,
        match_type: LinkMatchType,
        match_score: f64,
    ) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT INTO item_component_links
                 (category, product_id, field_key, identity_id, match_type, match_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (category, product_id, field_key) DO UPDATE SET
                   identity_id = excluded.identity_id,
                   match_type = excluded.match_type,
                   match_score = excluded.match_score",
                params![
                    category.as_str(),
                    product_id.as_str(),
                    field_key.as_str(),
                    identity_id.get(),
                    match_type.as_str(),
                    match_score
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Adds one list link for a field; repeated adds are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_item_list_link(
        &mut self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        list_value_id: ListValueId,
    ) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO item_list_links
                 (category, product_id, field_key, list_value_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.as_str(),
                    product_id.as_str(),
                    field_key.as_str(),
                    list_value_id.get()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Lists the link targets for one field, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn item_list_links(
        &self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
    ) -> Result<Vec<ListValueId>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT list_value_id FROM item_list_links
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3
                 ORDER BY list_value_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(
                params![category.as_str(), product_id.as_str(), field_key.as_str()],
                |row| row.get::<_, i64>(0),
            )
            .map_err(db_err)?;
        let mut links = Vec::new();
        for row in rows {
            links.push(ListValueId::new(row.map_err(db_err)?));
        }
        Ok(links)
    }

    /// Synchronizes a field's list links with its delimited value.
    ///
    /// Tokenizes `value`, resolves each token against the field's enum list
    /// (creating missing open values), and replaces the prior link set with
    /// the implied one atomically. Calling twice with the same value leaves
    /// the link set unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no change persists on error.
    pub fn sync_item_list_links_for_field_value(
        &mut self,
        category: &Category,
        product_id: &ProductId,
        field_key: &FieldKey,
        value: &str,
    ) -> Result<Vec<ListValueId>, SpecDbError> {
        let tokens = tokenize_list_value(value);
        let mut value_ids = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let resolved = self.lookup_list_value(category, field_key, token)?;
            let value_id = match resolved {
                Some(record) => record.id,
                None => self.upsert_list_value(category, field_key, token, "open")?,
            };
            if !value_ids.contains(&value_id) {
                value_ids.push(value_id);
            }
        }
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM item_list_links
             WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
            params![category.as_str(), product_id.as_str(), field_key.as_str()],
        )
        .map_err(db_err)?;
        for value_id in &value_ids {
            tx.execute(
                "INSERT OR IGNORE INTO item_list_links
                 (category, product_id, field_key, list_value_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    category.as_str(),
                    product_id.as_str(),
                    field_key.as_str(),
                    value_id.get()
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(value_ids)
    }
}

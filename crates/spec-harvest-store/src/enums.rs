// crates/spec-harvest-store/src/enums.rs
// ============================================================================
// Module: Enum Operations
// Description: Controlled vocabularies and their values.
// Purpose: Maintain enum lists per field with rename/delete cascades that
//          keep links, assertions, and review state consistent.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! An enum list is a named controlled vocabulary for one field; list values
//! must reference their list. Lookup is exact first, case-insensitive
//! second. Rename rewrites the value text and every linked product's field
//! state; delete removes links, anchored assertions with their evidence
//! refs, and the value's review state with history, all in one transaction
//! with explicit statement ordering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_core::FieldKey;
use spec_harvest_core::snake_case;
use spec_harvest_core::tokenize_list_value;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::EnumListId;
use crate::ids::ListValueId;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One enum list value row.
///
/// # Invariants
/// - Always references an existing enum list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListValueRecord {
    /// Store rowid.
    pub id: ListValueId,
    /// Owning list rowid.
    pub list_id: EnumListId,
    /// Field the vocabulary belongs to.
    pub field_key: FieldKey,
    /// Presentation value text.
    pub value: String,
    /// Snake-cased lookup form.
    pub normalized: String,
    /// Vocabulary policy label (`open` or `closed`).
    pub policy: String,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl SpecDb {
    /// Ensures an enum list exists for a field; returns its rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn ensure_enum_list(
        &mut self,
        category: &Category,
        field_key: &FieldKey,
    ) -> Result<EnumListId, SpecDbError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO enum_lists (category, field_key) VALUES (?1, ?2)",
                params![category.as_str(), field_key.as_str()],
            )
            .map_err(db_err)?;
        let id: i64 = self
            .conn()
            .query_row(
                "SELECT id FROM enum_lists WHERE category = ?1 AND field_key = ?2",
                params![category.as_str(), field_key.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(EnumListId::new(id))
    }

    /// Inserts or updates one list value; returns its rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_list_value(
        &mut self,
        category: &Category,
        field_key: &FieldKey,
        value: &str,
        policy: &str,
    ) -> Result<ListValueId, SpecDbError> {
        let list_id = self.ensure_enum_list(category, field_key)?;
        self.conn()
            .execute(
                "INSERT INTO enum_values (list_id, category, field_key, value, normalized, policy)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (category, field_key, value) DO UPDATE SET
                   normalized = excluded.normalized,
                   policy = excluded.policy",
                params![
                    list_id.get(),
                    category.as_str(),
                    field_key.as_str(),
                    value,
                    snake_case(value),
                    policy
                ],
            )
            .map_err(db_err)?;
        let id: i64 = self
            .conn()
            .query_row(
                "SELECT id FROM enum_values
                 WHERE category = ?1 AND field_key = ?2 AND value = ?3",
                params![category.as_str(), field_key.as_str(), value],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(ListValueId::new(id))
    }

    /// Looks up a list value: exact match first, case-insensitive fallback.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn lookup_list_value(
        &self,
        category: &Category,
        field_key: &FieldKey,
        value: &str,
    ) -> Result<Option<ListValueRecord>, SpecDbError> {
        let exact = self.read_list_value_where(
            "category = ?1 AND field_key = ?2 AND value = ?3",
            params![category.as_str(), field_key.as_str(), value],
        )?;
        if exact.is_some() {
            return Ok(exact);
        }
        self.read_list_value_where(
            "category = ?1 AND field_key = ?2 AND value = ?3 COLLATE NOCASE",
            params![category.as_str(), field_key.as_str(), value],
        )
    }

    /// Reads a single list value row matching a predicate.
    fn read_list_value_where(
        &self,
        predicate: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<ListValueRecord>, SpecDbError> {
        self.conn()
            .query_row(
                &format!(
                    "SELECT id, list_id, field_key, value, normalized, policy
                     FROM enum_values WHERE {predicate} LIMIT 1"
                ),
                args,
                |row| {
                    Ok(ListValueRecord {
                        id: ListValueId::new(row.get(0)?),
                        list_id: EnumListId::new(row.get(1)?),
                        field_key: FieldKey::new(row.get::<_, String>(2)?),
                        value: row.get(3)?,
                        normalized: row.get(4)?,
                        policy: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Renames a list value by id, rewriting linked field states.
    ///
    /// Links reference the value by rowid and follow automatically; field
    /// states holding the old token are re-rendered with the new one. The
    /// rename is transactional.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::MissingRow`] when the value is absent and
    /// engine errors otherwise.
    pub fn rename_list_value(
        &mut self,
        value_id: ListValueId,
        new_value: &str,
    ) -> Result<(), SpecDbError> {
        let now = unix_millis();
        let normalized = snake_case(new_value);
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        let old: Option<(String, String, String)> = tx
            .query_row(
                "SELECT category, field_key, value FROM enum_values WHERE id = ?1",
                params![value_id.get()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(db_err)?;
        let Some((category, field_key, old_value)) = old else {
            return Err(SpecDbError::MissingRow(format!("list value not found: {value_id}")));
        };
        tx.execute(
            "UPDATE enum_values SET value = ?2, normalized = ?3 WHERE id = ?1",
            params![value_id.get(), new_value, normalized],
        )
        .map_err(db_err)?;

        // Field states of linked products re-render the renamed token.
        let linked: Vec<String> = {
            let mut stmt = tx
                .prepare(
                    "SELECT product_id FROM item_list_links
                     WHERE list_value_id = ?1 ORDER BY product_id",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![value_id.get()], |row| row.get::<_, String>(0))
                .map_err(db_err)?;
            let mut products = Vec::new();
            for row in rows {
                products.push(row.map_err(db_err)?);
            }
            products
        };
        for product_id in linked {
            let current: Option<String> = tx
                .query_row(
                    "SELECT value FROM item_field_states
                     WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
                    params![category, product_id, field_key],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            let Some(current) = current else {
                continue;
            };
            let rewritten: Vec<String> = tokenize_list_value(&current)
                .into_iter()
                .map(|token| {
                    if token.eq_ignore_ascii_case(&old_value) {
                        new_value.to_string()
                    } else {
                        token
                    }
                })
                .collect();
            tx.execute(
                "UPDATE item_field_states SET value = ?4, updated_at = ?5
                 WHERE category = ?1 AND product_id = ?2 AND field_key = ?3",
                params![category, product_id, field_key, rewritten.join(", "), now],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Deletes a list value, cascading to links, assertions, and review
    /// state.
    ///
    /// Anchored assertions are removed with their evidence references so the
    /// assertion-anchor invariant holds after the delete.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::MissingRow`] when the value is absent and
    /// engine errors otherwise.
    pub fn delete_list_value(&mut self, value_id: ListValueId) -> Result<(), SpecDbError> {
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM item_list_links WHERE list_value_id = ?1",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM source_evidence_refs WHERE assertion_id IN
               (SELECT assertion_id FROM source_assertions WHERE list_value_id = ?1)",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM source_assertions WHERE list_value_id = ?1",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM key_review_run_sources WHERE run_id IN
               (SELECT id FROM key_review_runs WHERE review_state_id IN
                 (SELECT id FROM key_review_states WHERE list_value_id = ?1))",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM key_review_runs WHERE review_state_id IN
               (SELECT id FROM key_review_states WHERE list_value_id = ?1)",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM key_review_audit WHERE review_state_id IN
               (SELECT id FROM key_review_states WHERE list_value_id = ?1)",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "DELETE FROM key_review_states WHERE list_value_id = ?1",
            params![value_id.get()],
        )
        .map_err(db_err)?;
        let deleted = tx
            .execute("DELETE FROM enum_values WHERE id = ?1", params![value_id.get()])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(SpecDbError::MissingRow(format!("list value not found: {value_id}")));
        }
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Lists the values of one enum list, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn list_values(
        &self,
        category: &Category,
        field_key: &FieldKey,
    ) -> Result<Vec<ListValueRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT id, list_id, field_key, value, normalized, policy FROM enum_values
                 WHERE category = ?1 AND field_key = ?2 ORDER BY value",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), field_key.as_str()], |row| {
                Ok(ListValueRecord {
                    id: ListValueId::new(row.get(0)?),
                    list_id: EnumListId::new(row.get(1)?),
                    field_key: FieldKey::new(row.get::<_, String>(2)?),
                    value: row.get(3)?,
                    normalized: row.get(4)?,
                    policy: row.get(5)?,
                })
            })
            .map_err(db_err)?;
        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(db_err)?);
        }
        Ok(values)
    }
}

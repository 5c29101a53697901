// crates/spec-harvest-store/src/components.rs
// ============================================================================
// Module: Component Operations
// Description: Identity, alias, and property-value persistence plus identity
//              merge.
// Purpose: Maintain the component reference data products link against.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! A component identity is one physical part model, keyed by (category,
//! type, canonical name, maker). Identities own aliases and property values.
//! Merging two identities rewrites every reference (links, values, aliases,
//! review state) from source to target inside one transaction with explicit
//! statement ordering; property collisions resolve by review-status rank
//! `confirmed > accepted > pending`, and the source identity is deleted
//! last. Cascade triggers are never relied on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_core::ComponentType;
use spec_harvest_core::PropertyKey;
use spec_harvest_core::ReviewStatus;
use spec_harvest_core::VariancePolicy;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::ComponentValueId;
use crate::ids::IdentityRowId;

// ============================================================================
// SECTION: Records
// ============================================================================

/// One component identity row.
///
/// # Invariants
/// - `(category, component_type, canonical_name, maker)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentIdentityRecord {
    /// Store rowid.
    pub id: IdentityRowId,
    /// Category scope.
    pub category: Category,
    /// Component type token.
    pub component_type: ComponentType,
    /// Canonical part-model name.
    pub canonical_name: String,
    /// Maker name.
    pub maker: String,
    /// Review status.
    pub review_status: ReviewStatus,
    /// Whether an override replaced the seeded alias set.
    pub aliases_overridden: bool,
}

/// One component property value row.
///
/// # Invariants
/// - Always references an existing identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValueRecord {
    /// Store rowid.
    pub id: ComponentValueId,
    /// Owning identity rowid.
    pub identity_id: IdentityRowId,
    /// Property key.
    pub property_key: PropertyKey,
    /// Property value text.
    pub value: String,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    /// How linked products may deviate from this value.
    pub variance_policy: VariancePolicy,
    /// Constraint expressions evaluated against linked products.
    pub constraints: Vec<String>,
    /// Whether the value awaits review.
    pub needs_review: bool,
    /// Whether an override pinned the value.
    pub overridden: bool,
}

/// Natural key addressing one component identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentKey {
    /// Category scope.
    pub category: Category,
    /// Component type token.
    pub component_type: ComponentType,
    /// Canonical part-model name.
    pub canonical_name: String,
    /// Maker name.
    pub maker: String,
}

// ============================================================================
// SECTION: Identity Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates a component identity; returns its rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_component_identity(
        &mut self,
        key: &ComponentKey,
        review_status: ReviewStatus,
        aliases_overridden: bool,
    ) -> Result<IdentityRowId, SpecDbError> {
        let now = unix_millis();
        self.conn()
            .execute(
                "INSERT INTO component_identities
                 (category, component_type, canonical_name, maker, review_status,
                  aliases_overridden, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
                 ON CONFLICT (category, component_type, canonical_name, maker) DO UPDATE SET
                   review_status = excluded.review_status,
                   aliases_overridden = excluded.aliases_overridden,
                   updated_at = excluded.updated_at",
                params![
                    key.category.as_str(),
                    key.component_type.as_str(),
                    key.canonical_name,
                    key.maker,
                    review_status.as_str(),
                    i64::from(aliases_overridden),
                    now
                ],
            )
            .map_err(db_err)?;
        self.component_identity_id(key)?.ok_or_else(|| {
            SpecDbError::MissingRow(format!(
                "component identity vanished after upsert: {}",
                key.canonical_name
            ))
        })
    }

    /// Looks up an identity rowid by its natural key.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn component_identity_id(
        &self,
        key: &ComponentKey,
    ) -> Result<Option<IdentityRowId>, SpecDbError> {
        self.conn()
            .query_row(
                "SELECT id FROM component_identities
                 WHERE category = ?1 AND component_type = ?2
                   AND canonical_name = ?3 AND maker = ?4",
                params![
                    key.category.as_str(),
                    key.component_type.as_str(),
                    key.canonical_name,
                    key.maker
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_err)
            .map(|id| id.map(IdentityRowId::new))
    }

    /// Loads an identity record by rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure or an unparseable stored
    /// label.
    pub fn component_identity(
        &self,
        identity_id: IdentityRowId,
    ) -> Result<Option<ComponentIdentityRecord>, SpecDbError> {
        let row = self
            .conn()
            .query_row(
                "SELECT category, component_type, canonical_name, maker, review_status,
                        aliases_overridden
                 FROM component_identities WHERE id = ?1",
                params![identity_id.get()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, i64>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err)?;
        row.map(|(category, component_type, canonical_name, maker, status, overridden)| {
            Ok(ComponentIdentityRecord {
                id: identity_id,
                category: Category::new(category),
                component_type: ComponentType::new(component_type),
                canonical_name,
                maker,
                review_status: ReviewStatus::parse(&status)?,
                aliases_overridden: overridden != 0,
            })
        })
        .transpose()
    }

    /// Adds an alias to an identity; repeated adds are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn add_component_alias(
        &mut self,
        identity_id: IdentityRowId,
        alias: &str,
    ) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO component_aliases (identity_id, alias) VALUES (?1, ?2)",
                params![identity_id.get(), alias],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Replaces an identity's alias set, marking it overridden.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no change persists on error.
    pub fn override_component_aliases(
        &mut self,
        identity_id: IdentityRowId,
        aliases: &[String],
    ) -> Result<(), SpecDbError> {
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM component_aliases WHERE identity_id = ?1",
            params![identity_id.get()],
        )
        .map_err(db_err)?;
        for alias in aliases {
            tx.execute(
                "INSERT OR IGNORE INTO component_aliases (identity_id, alias) VALUES (?1, ?2)",
                params![identity_id.get(), alias],
            )
            .map_err(db_err)?;
        }
        tx.execute(
            "UPDATE component_identities SET aliases_overridden = 1, updated_at = ?2
             WHERE id = ?1",
            params![identity_id.get(), unix_millis()],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;
        Ok(())
    }

    /// Finds an identity by component type and alias or canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn find_component_by_alias(
        &self,
        category: &Category,
        component_type: &ComponentType,
        alias: &str,
    ) -> Result<Option<IdentityRowId>, SpecDbError> {
        let canonical: Option<i64> = self
            .conn()
            .query_row(
                "SELECT id FROM component_identities
                 WHERE category = ?1 AND component_type = ?2
                   AND canonical_name = ?3 COLLATE NOCASE",
                params![category.as_str(), component_type.as_str(), alias],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        if let Some(id) = canonical {
            return Ok(Some(IdentityRowId::new(id)));
        }
        self.conn()
            .query_row(
                "SELECT ci.id FROM component_aliases ca
                 JOIN component_identities ci ON ci.id = ca.identity_id
                 WHERE ci.category = ?1 AND ci.component_type = ?2
                   AND ca.alias = ?3 COLLATE NOCASE",
                params![category.as_str(), component_type.as_str(), alias],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_err)
            .map(|id| id.map(IdentityRowId::new))
    }

    /// Lists an identity's aliases, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn component_aliases(
        &self,
        identity_id: IdentityRowId,
    ) -> Result<Vec<String>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT alias FROM component_aliases WHERE identity_id = ?1 ORDER BY alias",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![identity_id.get()], |row| row.get::<_, String>(0))
            .map_err(db_err)?;
        let mut aliases = Vec::new();
        for row in rows {
            aliases.push(row.map_err(db_err)?);
        }
        Ok(aliases)
    }
}

// ============================================================================
// SECTION: Value Operations
// ============================================================================

/// Mutable inputs for one component-value upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentValueUpsert {
    /// Property key.
    pub property_key: PropertyKey,
    /// Property value text.
    pub value: String,
    /// Extraction confidence in [0, 1].
    pub confidence: f64,
    /// Variance policy for linked products.
    pub variance_policy: VariancePolicy,
    /// Constraint expressions.
    pub constraints: Vec<String>,
    /// Whether the value awaits review.
    pub needs_review: bool,
    /// Whether an override pinned the value.
    pub overridden: bool,
}

impl SpecDb {
    /// Inserts or updates one property value under an identity.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::MissingRow`] when the identity does not exist
    /// and engine errors otherwise.
    pub fn upsert_component_value(
        &mut self,
        key: &ComponentKey,
        upsert: &ComponentValueUpsert,
    ) -> Result<ComponentValueId, SpecDbError> {
        let identity_id = self.component_identity_id(key)?.ok_or_else(|| {
            SpecDbError::MissingRow(format!(
                "component identity not found for value upsert: {}",
                key.canonical_name
            ))
        })?;
        let constraints = serde_json::to_string(&upsert.constraints)
            .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
        self.conn()
            .execute(
                "INSERT INTO component_values
                 (identity_id, category, component_type, canonical_name, maker,
                  property_key, value, confidence, variance_policy, constraints,
                  needs_review, overridden, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (category, component_type, canonical_name, maker, property_key)
                 DO UPDATE SET
                   identity_id = excluded.identity_id,
                   value = excluded.value,
                   confidence = excluded.confidence,
                   variance_policy = excluded.variance_policy,
                   constraints = excluded.constraints,
                   needs_review = excluded.needs_review,
                   overridden = excluded.overridden,
                   updated_at = excluded.updated_at",
                params![
                    identity_id.get(),
                    key.category.as_str(),
                    key.component_type.as_str(),
                    key.canonical_name,
                    key.maker,
                    upsert.property_key.as_str(),
                    upsert.value,
                    upsert.confidence,
                    upsert.variance_policy.as_str(),
                    constraints,
                    i64::from(upsert.needs_review),
                    i64::from(upsert.overridden),
                    unix_millis()
                ],
            )
            .map_err(db_err)?;
        let id: i64 = self
            .conn()
            .query_row(
                "SELECT id FROM component_values
                 WHERE category = ?1 AND component_type = ?2 AND canonical_name = ?3
                   AND maker = ?4 AND property_key = ?5",
                params![
                    key.category.as_str(),
                    key.component_type.as_str(),
                    key.canonical_name,
                    key.maker,
                    upsert.property_key.as_str()
                ],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(ComponentValueId::new(id))
    }

    /// Loads every property value under an identity.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure or an unparseable stored
    /// label.
    pub fn component_values(
        &self,
        identity_id: IdentityRowId,
    ) -> Result<Vec<ComponentValueRecord>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT id, property_key, value, confidence, variance_policy, constraints,
                        needs_review, overridden
                 FROM component_values WHERE identity_id = ?1 ORDER BY property_key",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![identity_id.get()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                ))
            })
            .map_err(db_err)?;
        let mut values = Vec::new();
        for row in rows {
            let (id, property_key, value, confidence, policy, constraints, review, overridden) =
                row.map_err(db_err)?;
            let constraints: Vec<String> = serde_json::from_str(&constraints)
                .map_err(|err| SpecDbError::Invalid(err.to_string()))?;
            values.push(ComponentValueRecord {
                id: ComponentValueId::new(id),
                identity_id,
                property_key: PropertyKey::new(property_key),
                value,
                confidence,
                variance_policy: VariancePolicy::parse(&policy)?,
                constraints,
                needs_review: review != 0,
                overridden: overridden != 0,
            });
        }
        Ok(values)
    }
}

// ============================================================================
// SECTION: Identity Merge
// ============================================================================

/// Counts of references rewritten by one identity merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeReport {
    /// Item-component links moved to the target identity.
    pub links_moved: u64,
    /// Property values moved to the target identity.
    pub values_moved: u64,
    /// Property values dropped after losing a collision.
    pub values_dropped: u64,
    /// Aliases moved to the target identity.
    pub aliases_moved: u64,
    /// Review states moved to the target identity.
    pub review_states_moved: u64,
}

impl SpecDb {
    /// Merges `source` into `target`, rewriting all references and deleting
    /// the source identity.
    ///
    /// Property collisions resolve by review-status rank `confirmed >
    /// accepted > pending`; on a tie the target's value wins. The whole merge
    /// holds one transaction and rolls back entirely on failure.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::MissingRow`] when either identity is absent,
    /// [`SpecDbError::Invalid`] when `source == target`, and engine errors
    /// otherwise.
    pub fn merge_component_identities(
        &mut self,
        source: IdentityRowId,
        target: IdentityRowId,
    ) -> Result<MergeReport, SpecDbError> {
        if source == target {
            return Err(SpecDbError::Invalid(
                "cannot merge a component identity into itself".to_string(),
            ));
        }
        let source_status = self.identity_status(source)?;
        let target_status = self.identity_status(target)?;
        let target_key = self.identity_key(target)?;

        let mut report = MergeReport::default();
        let now = unix_millis();
        let tx = self.conn_mut().transaction().map_err(db_err)?;

        // Links: point at the target unless the product already links there.
        report.links_moved = exec_count(
            &tx,
            "UPDATE item_component_links SET identity_id = ?2
             WHERE identity_id = ?1
               AND NOT EXISTS (
                 SELECT 1 FROM item_component_links other
                 WHERE other.identity_id = ?2
                   AND other.category = item_component_links.category
                   AND other.product_id = item_component_links.product_id
                   AND other.field_key = item_component_links.field_key)",
            params![source.get(), target.get()],
        )?;
        tx.execute(
            "DELETE FROM item_component_links WHERE identity_id = ?1",
            params![source.get()],
        )
        .map_err(db_err)?;

        // Values: colliding properties resolve by status rank, then move.
        let keep_source = source_status.rank() > target_status.rank();
        let (dropped_owner, survivor_owner) = if keep_source {
            (target, source)
        } else {
            (source, target)
        };
        report.values_dropped = resolve_value_collisions(&tx, dropped_owner, survivor_owner)?;
        report.values_moved = exec_count(
            &tx,
            "UPDATE component_values SET
               identity_id = ?2,
               component_type = ?3,
               canonical_name = ?4,
               maker = ?5,
               updated_at = ?6
             WHERE identity_id = ?1",
            params![
                source.get(),
                target.get(),
                target_key.component_type.as_str(),
                target_key.canonical_name,
                target_key.maker,
                now
            ],
        )?;

        // Aliases: idempotent moves; duplicates collapse into the target.
        report.aliases_moved = exec_count(
            &tx,
            "UPDATE OR IGNORE component_aliases SET identity_id = ?2 WHERE identity_id = ?1",
            params![source.get(), target.get()],
        )?;
        tx.execute(
            "DELETE FROM component_aliases WHERE identity_id = ?1",
            params![source.get()],
        )
        .map_err(db_err)?;
        tx.execute(
            "INSERT OR IGNORE INTO component_aliases (identity_id, alias) VALUES (?1, ?2)",
            params![target.get(), source_key_alias(&tx, source)?],
        )
        .map_err(db_err)?;

        // Review states: identity-keyed component slots move when the target
        // has no state for the property yet; stale duplicates are removed
        // with their history.
        report.review_states_moved = exec_count(
            &tx,
            "UPDATE key_review_states SET component_identity_id = ?2
             WHERE component_identity_id = ?1
               AND NOT EXISTS (
                 SELECT 1 FROM key_review_states other
                 WHERE other.component_identity_id = ?2
                   AND other.category = key_review_states.category
                   AND other.property_key = key_review_states.property_key
                   AND other.kind = 'component_key')",
            params![source.get(), target.get()],
        )?;
        delete_review_states_for_identity(&tx, source)?;

        // The source identity goes last, after every reference moved.
        let deleted = tx
            .execute("DELETE FROM component_identities WHERE id = ?1", params![source.get()])
            .map_err(db_err)?;
        if deleted == 0 {
            return Err(SpecDbError::MissingRow(format!(
                "merge source identity not found: {source}"
            )));
        }
        tx.commit().map_err(db_err)?;
        Ok(report)
    }

    /// Reads the review status of an identity, failing when absent.
    fn identity_status(&self, identity_id: IdentityRowId) -> Result<ReviewStatus, SpecDbError> {
        let status: Option<String> = self
            .conn()
            .query_row(
                "SELECT review_status FROM component_identities WHERE id = ?1",
                params![identity_id.get()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        let status = status.ok_or_else(|| {
            SpecDbError::MissingRow(format!("component identity not found: {identity_id}"))
        })?;
        Ok(ReviewStatus::parse(&status)?)
    }

    /// Reads the natural key of an identity, failing when absent.
    fn identity_key(&self, identity_id: IdentityRowId) -> Result<ComponentKey, SpecDbError> {
        let key = self
            .conn()
            .query_row(
                "SELECT category, component_type, canonical_name, maker
                 FROM component_identities WHERE id = ?1",
                params![identity_id.get()],
                |row| {
                    Ok(ComponentKey {
                        category: Category::new(row.get::<_, String>(0)?),
                        component_type: ComponentType::new(row.get::<_, String>(1)?),
                        canonical_name: row.get(2)?,
                        maker: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)?;
        key.ok_or_else(|| {
            SpecDbError::MissingRow(format!("component identity not found: {identity_id}"))
        })
    }
}

/// Executes a statement and returns the affected-row count.
fn exec_count(
    tx: &rusqlite::Transaction<'_>,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<u64, SpecDbError> {
    let affected = tx.execute(sql, args).map_err(db_err)?;
    Ok(u64::try_from(affected).unwrap_or(u64::MAX))
}

/// Reads the source identity's canonical name to keep as a target alias.
fn source_key_alias(
    tx: &rusqlite::Transaction<'_>,
    source: IdentityRowId,
) -> Result<String, SpecDbError> {
    tx.query_row(
        "SELECT canonical_name FROM component_identities WHERE id = ?1",
        params![source.get()],
        |row| row.get(0),
    )
    .map_err(db_err)
}

/// Resolves colliding property values between two identities.
///
/// Assertions anchored to a dropped value repoint to the surviving value of
/// the same property; review states keyed by a dropped value are deleted
/// with their history; the dropped rows go last. Returns the dropped count.
fn resolve_value_collisions(
    tx: &rusqlite::Transaction<'_>,
    dropped_owner: IdentityRowId,
    survivor_owner: IdentityRowId,
) -> Result<u64, SpecDbError> {
    let dropped_set = "SELECT dv.id FROM component_values dv
         WHERE dv.identity_id = ?1 AND dv.property_key IN
           (SELECT property_key FROM component_values WHERE identity_id = ?2)";
    tx.execute(
        &format!(
            "UPDATE source_assertions SET component_value_id = (
               SELECT sv.id FROM component_values sv
               WHERE sv.identity_id = ?2
                 AND sv.property_key = (SELECT dv.property_key FROM component_values dv
                                        WHERE dv.id = source_assertions.component_value_id))
             WHERE component_value_id IN ({dropped_set})"
        ),
        params![dropped_owner.get(), survivor_owner.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_run_sources WHERE run_id IN
               (SELECT id FROM key_review_runs WHERE review_state_id IN
                 (SELECT id FROM key_review_states WHERE component_value_id IN
                   ({dropped_set})))"
        ),
        params![dropped_owner.get(), survivor_owner.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_runs WHERE review_state_id IN
               (SELECT id FROM key_review_states WHERE component_value_id IN ({dropped_set}))"
        ),
        params![dropped_owner.get(), survivor_owner.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_audit WHERE review_state_id IN
               (SELECT id FROM key_review_states WHERE component_value_id IN ({dropped_set}))"
        ),
        params![dropped_owner.get(), survivor_owner.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        &format!(
            "DELETE FROM key_review_states WHERE component_value_id IN ({dropped_set})"
        ),
        params![dropped_owner.get(), survivor_owner.get()],
    )
    .map_err(db_err)?;
    exec_count(
        tx,
        &format!("DELETE FROM component_values WHERE id IN ({dropped_set})"),
        params![dropped_owner.get(), survivor_owner.get()],
    )
}

/// Deletes remaining review states for an identity with their history.
fn delete_review_states_for_identity(
    tx: &rusqlite::Transaction<'_>,
    identity_id: IdentityRowId,
) -> Result<(), SpecDbError> {
    tx.execute(
        "DELETE FROM key_review_run_sources WHERE run_id IN
           (SELECT id FROM key_review_runs WHERE review_state_id IN
             (SELECT id FROM key_review_states WHERE component_identity_id = ?1))",
        params![identity_id.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        "DELETE FROM key_review_runs WHERE review_state_id IN
           (SELECT id FROM key_review_states WHERE component_identity_id = ?1)",
        params![identity_id.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        "DELETE FROM key_review_audit WHERE review_state_id IN
           (SELECT id FROM key_review_states WHERE component_identity_id = ?1)",
        params![identity_id.get()],
    )
    .map_err(db_err)?;
    tx.execute(
        "DELETE FROM key_review_states WHERE component_identity_id = ?1",
        params![identity_id.get()],
    )
    .map_err(db_err)?;
    Ok(())
}

// crates/spec-harvest-store/src/reviews.rs
// ============================================================================
// Module: Key Review Operations
// Description: Review slots, AI run history, and the audit trail.
// Purpose: Track review state per logical slot with an append-only history
//          of runs and decisions.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! A review slot is the logical cell being reviewed: a (product, field)
//! grid cell, an enum list value, or a component property (addressed either
//! through its value row or through identity + property name). Upserts are
//! keyed by the slot identity, never by free-form identifiers. Runs and
//! audit entries are append-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::CandidateId;
use spec_harvest_core::Category;
use spec_harvest_core::PropertyKey;

use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::ComponentValueId;
use crate::ids::IdentityRowId;
use crate::ids::ItemStateId;
use crate::ids::ListValueId;
use crate::ids::ReviewRunId;
use crate::ids::ReviewStateId;

// ============================================================================
// SECTION: Slot Identity
// ============================================================================

/// Logical identity of one reviewable slot.
///
/// # Invariants
/// - Component slots carry either a value rowid or identity + non-empty
///   property, by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewSlot {
    /// A (product, field) grid cell, via its field state.
    Grid {
        /// Field state rowid.
        item_state_id: ItemStateId,
    },
    /// An enum list value.
    Enum {
        /// List value rowid.
        list_value_id: ListValueId,
    },
    /// A component property via its value row.
    ComponentValue {
        /// Component value rowid.
        component_value_id: ComponentValueId,
    },
    /// A component property via identity and property name.
    ComponentProperty {
        /// Component identity rowid.
        identity_id: IdentityRowId,
        /// Property name on the identity.
        property_key: PropertyKey,
    },
}

impl ReviewSlot {
    /// Returns the stable kind label stored for the slot.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Grid {
                ..
            } => "grid_key",
            Self::Enum {
                ..
            } => "enum_key",
            Self::ComponentValue {
                ..
            }
            | Self::ComponentProperty {
                ..
            } => "component_key",
        }
    }
}

// ============================================================================
// SECTION: Records
// ============================================================================

/// One review state row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStateRecord {
    /// Store rowid.
    pub id: ReviewStateId,
    /// Slot the state covers.
    pub slot: ReviewSlot,
    /// Review status label.
    pub status: String,
    /// Whether the slot awaits review.
    pub needs_review: bool,
    /// Candidate currently selected for the slot, when any.
    pub selected_candidate_id: Option<CandidateId>,
}

/// One AI review run, appended per invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewRunRecord {
    /// Provider label.
    pub provider: String,
    /// Model identifier.
    pub model: String,
    /// Prompt tokens consumed.
    pub tokens_in: u64,
    /// Completion tokens produced.
    pub tokens_out: u64,
    /// Run cost in USD.
    pub cost_usd: f64,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: u64,
    /// Verdict label, when the run completed.
    pub verdict: Option<String>,
    /// Unix-millisecond start timestamp.
    pub started_at: i64,
    /// Unix-millisecond completion timestamp, when finished.
    pub completed_at: Option<i64>,
}

/// Audit event kinds recorded against a review slot.
///
/// # Invariants
/// - Variants are stable for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAuditEvent {
    /// An AI review ran.
    AiReview,
    /// A user accepted the slot value.
    UserAccept,
    /// A user overrode an AI decision.
    UserOverrideAi,
}

impl ReviewAuditEvent {
    /// Returns the stable label for the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiReview => "ai_review",
            Self::UserAccept => "user_accept",
            Self::UserOverrideAi => "user_override_ai",
        }
    }
}

// ============================================================================
// SECTION: Candidate Reviews
// ============================================================================

/// Context a candidate decision applies to.
///
/// # Invariants
/// - Variants are stable for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateContext {
    /// Decision about a (product, field) cell.
    Item,
    /// Decision about a component property.
    Component,
    /// Decision about an enum list value.
    List,
}

impl CandidateContext {
    /// Returns the stable label for the context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Component => "component",
            Self::List => "list",
        }
    }
}

/// Human and AI decision lanes for one candidate in one context.
///
/// # Invariants
/// - `(candidate_id, context, context_id)` is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateReviewRecord {
    /// Human decision label, when a human decided.
    pub human_decision: Option<String>,
    /// Unix-millisecond timestamp of the human decision.
    pub human_decided_at: Option<i64>,
    /// AI decision label, when a model decided.
    pub ai_decision: Option<String>,
    /// Unix-millisecond timestamp of the AI decision.
    pub ai_decided_at: Option<i64>,
    /// Model identifier behind the AI decision.
    pub ai_model: Option<String>,
}

// ============================================================================
// SECTION: Slot Predicates
// ============================================================================

/// Returns the slot-identity predicate and its bound values.
fn slot_predicate(slot: &ReviewSlot) -> (&'static str, Vec<rusqlite::types::Value>) {
    match slot {
        ReviewSlot::Grid {
            item_state_id,
        } => (
            "kind = 'grid_key' AND item_state_id = ?2",
            vec![rusqlite::types::Value::Integer(item_state_id.get())],
        ),
        ReviewSlot::Enum {
            list_value_id,
        } => (
            "kind = 'enum_key' AND list_value_id = ?2",
            vec![rusqlite::types::Value::Integer(list_value_id.get())],
        ),
        ReviewSlot::ComponentValue {
            component_value_id,
        } => (
            "kind = 'component_key' AND component_value_id = ?2",
            vec![rusqlite::types::Value::Integer(component_value_id.get())],
        ),
        ReviewSlot::ComponentProperty {
            identity_id,
            property_key,
        } => (
            "kind = 'component_key' AND component_identity_id = ?2 AND property_key = ?3",
            vec![
                rusqlite::types::Value::Integer(identity_id.get()),
                rusqlite::types::Value::Text(property_key.as_str().to_string()),
            ],
        ),
    }
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl SpecDb {
    /// Inserts or updates the review state for a slot; returns its rowid.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_review_state(
        &mut self,
        category: &Category,
        slot: &ReviewSlot,
        status: &str,
        needs_review: bool,
        selected_candidate_id: Option<&CandidateId>,
    ) -> Result<ReviewStateId, SpecDbError> {
        let now = unix_millis();
        let existing = self.review_state_id(category, slot)?;
        if let Some(id) = existing {
            self.conn()
                .execute(
                    "UPDATE key_review_states SET
                       status = ?2, needs_review = ?3, selected_candidate_id = ?4,
                       updated_at = ?5
                     WHERE id = ?1",
                    params![
                        id.get(),
                        status,
                        i64::from(needs_review),
                        selected_candidate_id.map(CandidateId::as_str),
                        now
                    ],
                )
                .map_err(db_err)?;
            return Ok(id);
        }
        let (item_state_id, list_value_id, component_value_id, component_identity_id, property) =
            match slot {
                ReviewSlot::Grid {
                    item_state_id,
                } => (Some(item_state_id.get()), None, None, None, None),
                ReviewSlot::Enum {
                    list_value_id,
                } => (None, Some(list_value_id.get()), None, None, None),
                ReviewSlot::ComponentValue {
                    component_value_id,
                } => (None, None, Some(component_value_id.get()), None, None),
                ReviewSlot::ComponentProperty {
                    identity_id,
                    property_key,
                } => (None, None, None, Some(identity_id.get()), Some(property_key.as_str())),
            };
        self.conn()
            .execute(
                "INSERT INTO key_review_states
                 (category, kind, item_state_id, list_value_id, component_value_id,
                  component_identity_id, property_key, status, needs_review,
                  selected_candidate_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    category.as_str(),
                    slot.kind(),
                    item_state_id,
                    list_value_id,
                    component_value_id,
                    component_identity_id,
                    property,
                    status,
                    i64::from(needs_review),
                    selected_candidate_id.map(CandidateId::as_str),
                    now
                ],
            )
            .map_err(db_err)?;
        Ok(ReviewStateId::new(self.conn().last_insert_rowid()))
    }

    /// Looks up the review-state rowid for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn review_state_id(
        &self,
        category: &Category,
        slot: &ReviewSlot,
    ) -> Result<Option<ReviewStateId>, SpecDbError> {
        let (predicate, mut bound) = slot_predicate(slot);
        let mut args: Vec<rusqlite::types::Value> =
            vec![rusqlite::types::Value::Text(category.as_str().to_string())];
        args.append(&mut bound);
        self.conn()
            .query_row(
                &format!(
                    "SELECT id FROM key_review_states WHERE category = ?1 AND {predicate}"
                ),
                rusqlite::params_from_iter(args),
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(db_err)
            .map(|id| id.map(ReviewStateId::new))
    }

    /// Loads the review state for a slot when present.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn review_state(
        &self,
        category: &Category,
        slot: &ReviewSlot,
    ) -> Result<Option<ReviewStateRecord>, SpecDbError> {
        let Some(id) = self.review_state_id(category, slot)? else {
            return Ok(None);
        };
        self.conn()
            .query_row(
                "SELECT status, needs_review, selected_candidate_id
                 FROM key_review_states WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok(ReviewStateRecord {
                        id,
                        slot: slot.clone(),
                        status: row.get(0)?,
                        needs_review: row.get::<_, i64>(1)? != 0,
                        selected_candidate_id: row
                            .get::<_, Option<String>>(2)?
                            .map(CandidateId::new),
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Appends one AI review run with its consulted sources.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no rows persist on error.
    pub fn append_review_run(
        &mut self,
        review_state_id: ReviewStateId,
        run: &ReviewRunRecord,
        sources: &[(String, String)],
    ) -> Result<ReviewRunId, SpecDbError> {
        let tokens_in = i64::try_from(run.tokens_in).unwrap_or(i64::MAX);
        let tokens_out = i64::try_from(run.tokens_out).unwrap_or(i64::MAX);
        let latency_ms = i64::try_from(run.latency_ms).unwrap_or(i64::MAX);
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        tx.execute(
            "INSERT INTO key_review_runs
             (review_state_id, provider, model, tokens_in, tokens_out, cost_usd,
              latency_ms, verdict, started_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                review_state_id.get(),
                run.provider,
                run.model,
                tokens_in,
                tokens_out,
                run.cost_usd,
                latency_ms,
                run.verdict.as_deref(),
                run.started_at,
                run.completed_at,
            ],
        )
        .map_err(db_err)?;
        let run_id = tx.last_insert_rowid();
        for (source_id, url) in sources {
            tx.execute(
                "INSERT INTO key_review_run_sources (run_id, source_id, url)
                 VALUES (?1, ?2, ?3)",
                params![run_id, source_id, url],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(ReviewRunId::new(run_id))
    }

    /// Appends one audit entry for a review slot.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn append_review_audit(
        &mut self,
        review_state_id: ReviewStateId,
        event: ReviewAuditEvent,
        actor: &str,
        model: Option<&str>,
        detail: Option<&str>,
    ) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT INTO key_review_audit
                 (review_state_id, event, actor, model, detail, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    review_state_id.get(),
                    event.as_str(),
                    actor,
                    model,
                    detail,
                    unix_millis()
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Inserts or updates the decision lanes for one candidate in context.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure.
    pub fn upsert_candidate_review(
        &mut self,
        candidate_id: &CandidateId,
        context: CandidateContext,
        context_id: i64,
        review: &CandidateReviewRecord,
    ) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "INSERT INTO candidate_reviews
                 (candidate_id, context_type, context_id, human_decision, human_decided_at,
                  ai_decision, ai_decided_at, ai_model)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (candidate_id, context_type, context_id) DO UPDATE SET
                   human_decision = excluded.human_decision,
                   human_decided_at = excluded.human_decided_at,
                   ai_decision = excluded.ai_decision,
                   ai_decided_at = excluded.ai_decided_at,
                   ai_model = excluded.ai_model",
                params![
                    candidate_id.as_str(),
                    context.as_str(),
                    context_id,
                    review.human_decision.as_deref(),
                    review.human_decided_at,
                    review.ai_decision.as_deref(),
                    review.ai_decided_at,
                    review.ai_model.as_deref(),
                ],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Loads the decision lanes for one candidate in context.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn candidate_review(
        &self,
        candidate_id: &CandidateId,
        context: CandidateContext,
        context_id: i64,
    ) -> Result<Option<CandidateReviewRecord>, SpecDbError> {
        self.conn()
            .query_row(
                "SELECT human_decision, human_decided_at, ai_decision, ai_decided_at, ai_model
                 FROM candidate_reviews
                 WHERE candidate_id = ?1 AND context_type = ?2 AND context_id = ?3",
                params![candidate_id.as_str(), context.as_str(), context_id],
                |row| {
                    Ok(CandidateReviewRecord {
                        human_decision: row.get(0)?,
                        human_decided_at: row.get(1)?,
                        ai_decision: row.get(2)?,
                        ai_decided_at: row.get(3)?,
                        ai_model: row.get(4)?,
                    })
                },
            )
            .optional()
            .map_err(db_err)
    }

    /// Counts audit entries for a review slot.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read failure.
    pub fn review_audit_count(
        &self,
        review_state_id: ReviewStateId,
    ) -> Result<u64, SpecDbError> {
        let count: i64 = self
            .conn()
            .query_row(
                "SELECT COUNT(1) FROM key_review_audit WHERE review_state_id = ?1",
                params![review_state_id.get()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

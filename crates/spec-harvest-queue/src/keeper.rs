// crates/spec-harvest-queue/src/keeper.rs
// ============================================================================
// Module: Queue Keeper
// Description: Selection policy, run recording, failure backoff, staleness.
// Purpose: Drive the per-product queue rows through their status lattice.
// Dependencies: spec-harvest-core, spec-harvest-store, crate::snapshot
// ============================================================================

//! ## Overview
//! Eligible rows are those not terminally parked and past their retry
//! timestamp. The selection score rewards pending and stale work, higher
//! priority, missing and contradicting fields, and low confidence; it
//! penalizes accumulated attempts and rounds. Run recording applies the
//! status-inference ladder; failure recording doubles the retry delay per
//! consecutive failure up to a ceiling.

// ============================================================================
// SECTION: Imports
// ============================================================================

use spec_harvest_core::Category;
use spec_harvest_core::ProductId;
use spec_harvest_core::ProductQueueRow;
use spec_harvest_core::QueueStatus;
use spec_harvest_core::RunSummarySnapshot;
use spec_harvest_storage::ObjectStore;
use spec_harvest_store::SpecDb;
use spec_harvest_store::SpecDbError;
use thiserror::Error;

use crate::snapshot::write_snapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Queue keeper errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Store operation failed.
    #[error("queue store error: {0}")]
    Store(#[from] SpecDbError),
    /// Snapshot mirroring failed.
    #[error("queue snapshot error: {0}")]
    Snapshot(#[from] spec_harvest_storage::StorageError),
    /// Snapshot serialization failed.
    #[error("queue snapshot encode error: {0}")]
    Encode(String),
    /// Requested row does not exist.
    #[error("queue row not found: {0}")]
    MissingRow(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Tuning for the queue keeper.
///
/// # Invariants
/// - Retry delays are positive seconds.
#[derive(Debug, Clone)]
pub struct QueueKeeperConfig {
    /// Category the keeper operates on.
    pub category: Category,
    /// Base retry delay applied after the first failure, in seconds.
    pub base_retry_seconds: u32,
    /// Ceiling on the computed retry delay, in seconds.
    pub max_retry_seconds: u32,
    /// Whether mutations also write the JSON snapshot.
    pub queue_json_write: bool,
}

impl QueueKeeperConfig {
    /// Creates a keeper configuration with the standard retry curve.
    #[must_use]
    pub const fn new(category: Category, queue_json_write: bool) -> Self {
        Self {
            category,
            base_retry_seconds: 60,
            max_retry_seconds: 3_600,
            queue_json_write,
        }
    }
}

// ============================================================================
// SECTION: Run Inputs
// ============================================================================

/// Inputs recorded after one harvest run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunRecord {
    /// Compact run summary snapshot.
    pub summary: RunSummarySnapshot,
    /// Cost of the run in USD.
    pub cost_usd: f64,
    /// Source URLs attempted during the run.
    pub urls_attempted: Vec<String>,
    /// Whether the cost budget was exceeded.
    pub budget_exceeded: bool,
}

/// Counts from one enqueue pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueReport {
    /// Products enqueued (new rows created).
    pub enqueued: u64,
    /// Products already present.
    pub existing: u64,
    /// Products rejected by the identity gate.
    pub rejected: u64,
}

// ============================================================================
// SECTION: Selection Score
// ============================================================================

/// Statuses never eligible for selection.
const PARKED_STATUSES: &[QueueStatus] = &[
    QueueStatus::Complete,
    QueueStatus::Blocked,
    QueueStatus::Paused,
    QueueStatus::Skipped,
    QueueStatus::InProgress,
    QueueStatus::NeedsManual,
    QueueStatus::Exhausted,
    QueueStatus::Failed,
];

/// Computes the selection score for one row.
#[must_use]
pub fn select_score(row: &ProductQueueRow) -> f64 {
    let summary = row.last_summary.clone().unwrap_or_default();
    let missing_required = u32::try_from(summary.missing_required.len()).unwrap_or(u32::MAX);
    let critical_missing = u32::try_from(summary.critical_missing.len()).unwrap_or(u32::MAX);
    let priority = f64::from(row.priority.clamp(1, 5));
    let mut score = 0.0;
    score += 90.0 * f64::from(u8::from(row.status == QueueStatus::Pending));
    score += 35.0 * f64::from(u8::from(row.status == QueueStatus::Stale));
    score += 40.0 * f64::from(u8::from(row.status == QueueStatus::Running));
    score += 10.0 * f64::from(u8::from(row.status == QueueStatus::NeedsManual));
    score += 12.0 * (6.0 - priority);
    score += 10.0 * f64::from(missing_required);
    score += 16.0 * f64::from(critical_missing);
    score += 6.0 * f64::from(summary.contradictions);
    score += 12.0 * (1.0 - summary.confidence.clamp(0.0, 1.0));
    score -= 4.0 * f64::from(row.attempts_total);
    score -= 3.0 * f64::from(row.rounds_completed);
    score -= 50.0 * f64::from(u8::from(row.status == QueueStatus::Blocked));
    score
}

// ============================================================================
// SECTION: Keeper
// ============================================================================

/// Policy layer over the product-queue rows of one category.
pub struct QueueKeeper {
    /// Keeper configuration.
    config: QueueKeeperConfig,
}

impl QueueKeeper {
    /// Creates a keeper with the given configuration.
    #[must_use]
    pub const fn new(config: QueueKeeperConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the keeper's category.
    #[must_use]
    pub const fn category(&self) -> &Category {
        &self.config.category
    }

    /// Enqueues products that pass the identity gate.
    ///
    /// Rejected products are not enqueued and only counted.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on store or snapshot failure.
    pub fn enqueue_all(
        &self,
        db: &mut SpecDb,
        store: &dyn ObjectStore,
        products: &[ProductId],
        identity_gate: &dyn Fn(&ProductId) -> bool,
    ) -> Result<EnqueueReport, QueueError> {
        let mut report = EnqueueReport::default();
        for product_id in products {
            if !identity_gate(product_id) {
                report.rejected += 1;
                continue;
            }
            if db.queue_row(&self.config.category, product_id)?.is_some() {
                report.existing += 1;
                continue;
            }
            let row = ProductQueueRow::new(self.config.category.clone(), product_id.clone());
            db.upsert_queue_row(&row)?;
            report.enqueued += 1;
        }
        self.mirror_snapshot(db, store)?;
        Ok(report)
    }

    /// Selects the next product to run, if any row is eligible.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on store failure.
    pub fn select_next(
        &self,
        db: &SpecDb,
        now_ms: i64,
    ) -> Result<Option<ProductQueueRow>, QueueError> {
        let rows = db.queue_rows(&self.config.category)?;
        let mut best: Option<(f64, ProductQueueRow)> = None;
        for row in rows {
            if PARKED_STATUSES.contains(&row.status) {
                continue;
            }
            if row.next_retry_at.is_some_and(|ts| ts > now_ms) {
                continue;
            }
            let score = select_score(&row);
            let better = match &best {
                None => true,
                Some((best_score, best_row)) => {
                    score > *best_score
                        || ((score - *best_score).abs() < f64::EPSILON
                            && row.product_id < best_row.product_id)
                }
            };
            if better {
                best = Some((score, row));
            }
        }
        Ok(best.map(|(_score, row)| row))
    }

    /// Records one run result and infers the next status.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MissingRow`] when the row is absent and store
    /// or snapshot failures otherwise.
    pub fn record_run(
        &self,
        db: &mut SpecDb,
        store: &dyn ObjectStore,
        product_id: &ProductId,
        run: &RunRecord,
    ) -> Result<ProductQueueRow, QueueError> {
        let mut row = db
            .queue_row(&self.config.category, product_id)?
            .ok_or_else(|| QueueError::MissingRow(product_id.as_str().to_string()))?;
        row.attempts_total = row.attempts_total.saturating_add(1);
        row.rounds_completed = row.rounds_completed.saturating_add(1);
        row.cost_usd_total += run.cost_usd;
        row.note_urls_attempted(&run.urls_attempted);
        row.last_summary = Some(run.summary.clone());
        row.retry_count = 0;
        row.next_retry_at = None;

        row.status = if run.summary.validated {
            row.last_completed_at = Some(run.summary.recorded_at);
            row.next_action = None;
            QueueStatus::Complete
        } else if run.budget_exceeded || run.summary.round_exhausted {
            QueueStatus::Exhausted
        } else if run.summary.identity_gate_failed || run.summary.llm_budget_blocked {
            QueueStatus::NeedsManual
        } else if row.status == QueueStatus::Pending {
            QueueStatus::Running
        } else {
            row.status
        };

        db.upsert_queue_row(&row)?;
        self.mirror_snapshot(db, store)?;
        Ok(row)
    }

    /// Records one run failure and schedules the retry.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::MissingRow`] when the row is absent and store
    /// or snapshot failures otherwise.
    pub fn record_failure(
        &self,
        db: &mut SpecDb,
        store: &dyn ObjectStore,
        product_id: &ProductId,
        now_ms: i64,
    ) -> Result<ProductQueueRow, QueueError> {
        let mut row = db
            .queue_row(&self.config.category, product_id)?
            .ok_or_else(|| QueueError::MissingRow(product_id.as_str().to_string()))?;
        row.retry_count = row.retry_count.saturating_add(1);
        row.attempts_total = row.attempts_total.saturating_add(1);
        if row.retry_count >= row.max_attempts {
            row.status = QueueStatus::Failed;
            row.next_retry_at = None;
        } else {
            let exponent = row.retry_count.saturating_sub(1).min(31);
            let delay_seconds = u64::from(self.config.base_retry_seconds)
                .saturating_mul(1_u64 << exponent)
                .min(u64::from(self.config.max_retry_seconds));
            let delay_ms = i64::try_from(delay_seconds.saturating_mul(1_000))
                .unwrap_or(i64::MAX);
            row.status = QueueStatus::Pending;
            row.next_retry_at = Some(now_ms.saturating_add(delay_ms));
        }
        db.upsert_queue_row(&row)?;
        self.mirror_snapshot(db, store)?;
        Ok(row)
    }

    /// Moves complete rows older than the threshold to `stale`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] on store or snapshot failure.
    pub fn mark_stale(
        &self,
        db: &mut SpecDb,
        store: &dyn ObjectStore,
        stale_after_days: u32,
        now_ms: i64,
    ) -> Result<u64, QueueError> {
        let threshold_ms = i64::from(stale_after_days).saturating_mul(86_400_000);
        let mut moved = 0_u64;
        for mut row in db.queue_rows(&self.config.category)? {
            if row.status != QueueStatus::Complete {
                continue;
            }
            let Some(completed_at) = row.last_completed_at else {
                continue;
            };
            if now_ms.saturating_sub(completed_at) <= threshold_ms {
                continue;
            }
            row.status = QueueStatus::Stale;
            row.next_action = Some("recrawl_stale".to_string());
            db.upsert_queue_row(&row)?;
            moved += 1;
        }
        if moved > 0 {
            self.mirror_snapshot(db, store)?;
        }
        Ok(moved)
    }

    /// Writes the JSON snapshot when mirroring is enabled.
    fn mirror_snapshot(&self, db: &SpecDb, store: &dyn ObjectStore) -> Result<(), QueueError> {
        if !self.config.queue_json_write {
            return Ok(());
        }
        write_snapshot(db, store, &self.config.category)?;
        Ok(())
    }
}

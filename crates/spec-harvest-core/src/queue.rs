// crates/spec-harvest-core/src/queue.rs
// ============================================================================
// Module: Product Queue Model
// Description: Queue row, status lattice, and run-summary snapshot shapes.
// Purpose: Share the product-queue row shape between the store and the queue
//          keeper.
// Dependencies: crate::identifiers, serde
// ============================================================================

//! ## Overview
//! One queue row exists per (category, product). The row carries the
//! authoritative status, attempt and retry counters, the retry-backoff
//! pointer, a compact summary of the last run, the rolling cost total, and a
//! bounded, deduplicated list of recently attempted URLs. Selection scoring
//! and transitions live in the queue keeper; this module is shape only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Category;
use crate::identifiers::ProductId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on the deduplicated `last_urls_attempted` list.
pub const MAX_LAST_URLS: usize = 300;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Authoritative processing status of a queued product.
///
/// # Invariants
/// - Variants are stable for persistence and snapshot serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for its first or next run.
    Pending,
    /// A run is currently executing.
    Running,
    /// Last run validated the product.
    Complete,
    /// Previously complete, now older than the staleness threshold.
    Stale,
    /// Operator paused the product.
    Paused,
    /// Operator skipped the product.
    Skipped,
    /// Hard-blocked by host budget or policy.
    Blocked,
    /// Requires manual review before another run.
    NeedsManual,
    /// Retry budget exhausted by failures.
    Failed,
    /// Round or cost budget exhausted.
    Exhausted,
    /// Claimed by a worker but not yet running.
    InProgress,
}

impl QueueStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Stale => "stale",
            Self::Paused => "paused",
            Self::Skipped => "skipped",
            Self::Blocked => "blocked",
            Self::NeedsManual => "needs_manual",
            Self::Failed => "failed",
            Self::Exhausted => "exhausted",
            Self::InProgress => "in_progress",
        }
    }

    /// Parses a stable label back into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "complete" => Some(Self::Complete),
            "stale" => Some(Self::Stale),
            "paused" => Some(Self::Paused),
            "skipped" => Some(Self::Skipped),
            "blocked" => Some(Self::Blocked),
            "needs_manual" => Some(Self::NeedsManual),
            "failed" => Some(Self::Failed),
            "exhausted" => Some(Self::Exhausted),
            "in_progress" => Some(Self::InProgress),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// Compact snapshot of the last run for a product.
///
/// # Invariants
/// - `confidence` lies in [0, 1].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummarySnapshot {
    /// Whether the run validated the product record.
    pub validated: bool,
    /// Aggregate confidence over accepted fields.
    pub confidence: f64,
    /// Required fields still missing.
    pub missing_required: Vec<String>,
    /// Critical fields still missing.
    pub critical_missing: Vec<String>,
    /// Count of contradicting accepted values.
    pub contradictions: u32,
    /// Source URLs attempted during the run.
    pub sources_attempted: u32,
    /// Reason the host budget stopped the run, when it did.
    #[serde(default)]
    pub budget_block_reason: Option<String>,
    /// Whether identity validation rejected the product.
    #[serde(default)]
    pub identity_gate_failed: bool,
    /// Whether the LLM spend budget blocked review.
    #[serde(default)]
    pub llm_budget_blocked: bool,
    /// Whether the round result declared the product exhausted.
    #[serde(default)]
    pub round_exhausted: bool,
    /// Unix-millisecond timestamp of the run.
    pub recorded_at: i64,
}

// ============================================================================
// SECTION: Queue Row
// ============================================================================

/// One product-queue row.
///
/// # Invariants
/// - `(category, product_id)` is unique in the store.
/// - `priority` lies in 1..=5 with 1 highest.
/// - `last_urls_attempted` is deduplicated and holds at most
///   [`MAX_LAST_URLS`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductQueueRow {
    /// Category scope.
    pub category: Category,
    /// Product identifier.
    pub product_id: ProductId,
    /// Authoritative status.
    pub status: QueueStatus,
    /// Priority, 1 (highest) through 5.
    pub priority: u8,
    /// Total runs attempted.
    pub attempts_total: u32,
    /// Consecutive failure retries.
    pub retry_count: u32,
    /// Retry ceiling before the row fails hard.
    pub max_attempts: u32,
    /// Unix-millisecond timestamp before which the row is ineligible.
    #[serde(default)]
    pub next_retry_at: Option<i64>,
    /// Snapshot of the last completed run.
    #[serde(default)]
    pub last_summary: Option<RunSummarySnapshot>,
    /// Rolling cost total for the product in USD.
    pub cost_usd_total: f64,
    /// Deduplicated, bounded list of recently attempted URLs.
    pub last_urls_attempted: Vec<String>,
    /// Unix-millisecond timestamp of the last completed run.
    #[serde(default)]
    pub last_completed_at: Option<i64>,
    /// Hint naming the next action for the row.
    #[serde(default)]
    pub next_action: Option<String>,
    /// Completed harvest rounds.
    pub rounds_completed: u32,
}

impl ProductQueueRow {
    /// Creates a fresh pending row with defaults.
    #[must_use]
    pub fn new(category: Category, product_id: ProductId) -> Self {
        Self {
            category,
            product_id,
            status: QueueStatus::Pending,
            priority: 3,
            attempts_total: 0,
            retry_count: 0,
            max_attempts: 5,
            next_retry_at: None,
            last_summary: None,
            cost_usd_total: 0.0,
            last_urls_attempted: Vec::new(),
            last_completed_at: None,
            next_action: None,
            rounds_completed: 0,
        }
    }

    /// Merges attempted URLs, deduplicating and trimming to the bound.
    pub fn note_urls_attempted(&mut self, urls: &[String]) {
        for url in urls {
            if !self.last_urls_attempted.contains(url) {
                self.last_urls_attempted.push(url.clone());
            }
        }
        if self.last_urls_attempted.len() > MAX_LAST_URLS {
            let excess = self.last_urls_attempted.len() - MAX_LAST_URLS;
            self.last_urls_attempted.drain(.. excess);
        }
    }
}

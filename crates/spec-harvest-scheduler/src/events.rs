// crates/spec-harvest-scheduler/src/events.rs
// ============================================================================
// Module: Scheduler Events
// Description: Observable scheduler event shapes and the sink seam.
// Purpose: Let hosts and tests observe pool state without racing real I/O.
// Dependencies: spec-harvest-core, serde
// ============================================================================

//! ## Overview
//! Every observable scheduler transition emits one [`SchedulerEvent`] on the
//! caller-supplied sink. Event shapes are part of the drain contract, so
//! they derive serde and carry stable snake-case labels. The sink is
//! synchronous and must not block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::FetchOutcome;
use spec_harvest_core::FetcherMode;

// ============================================================================
// SECTION: Pool Snapshot
// ============================================================================

/// Point-in-time counters for the drain pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Fetches currently in flight.
    pub in_flight: usize,
    /// Sources not yet started.
    pub queued: usize,
    /// Sources fetched successfully.
    pub processed: u64,
    /// Sources skipped before or after a fetch.
    pub skipped: u64,
    /// Sources that exhausted their attempts.
    pub failed: u64,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// One observable scheduler transition.
///
/// # Invariants
/// - Shapes are stable; consumers match on the serialized `type` tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    /// Pool state changed.
    SchedulerTick {
        /// Current pool counters.
        snapshot: PoolSnapshot,
    },
    /// A would-be starter suspended for host pacing.
    SchedulerHostWait {
        /// Host being paced.
        host: String,
        /// Remaining wait in milliseconds.
        wait_ms: u64,
    },
    /// A fetch completed with a classified outcome.
    FetchResult {
        /// Source URL fetched.
        source: String,
        /// Mode used for the attempt.
        mode: FetcherMode,
        /// Classified outcome.
        outcome: FetchOutcome,
        /// HTTP status observed (0 when no response).
        status: u16,
    },
    /// A fetch attempt raised instead of returning a response.
    FetchErrorRaised {
        /// Source URL fetched.
        source: String,
        /// Mode used for the attempt.
        mode: FetcherMode,
        /// Failure description.
        message: String,
    },
    /// A source was skipped before fetching.
    SourceSkipped {
        /// Source URL skipped.
        source: String,
        /// Skip reason.
        reason: String,
    },
    /// The fallback ladder rotated to an alternate mode.
    SchedulerFallbackStarted {
        /// Source URL being retried.
        source: String,
        /// Mode the failed attempt used.
        from_mode: FetcherMode,
        /// Mode the next attempt will use.
        to_mode: FetcherMode,
        /// Outcome that triggered the rotation.
        outcome: FetchOutcome,
    },
    /// A fallback attempt succeeded.
    SchedulerFallbackSucceeded {
        /// Source URL that recovered.
        source: String,
        /// Mode that succeeded.
        mode: FetcherMode,
        /// Fallback attempts consumed before success.
        attempts: u32,
    },
    /// The fallback ladder ran out of modes or retries.
    SchedulerFallbackExhausted {
        /// Source URL that failed.
        source: String,
        /// Last outcome observed.
        outcome: FetchOutcome,
        /// Fallback attempts consumed.
        attempts: u32,
    },
    /// The drain finished.
    SchedulerDrainCompleted {
        /// Final drain counters.
        outcome: DrainOutcome,
    },
}

/// Final counters returned by a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainOutcome {
    /// Sources fetched successfully.
    pub processed: u64,
    /// Sources skipped.
    pub skipped: u64,
    /// Sources that exhausted their attempts.
    pub failed: u64,
    /// Fallback rotations across all sources.
    pub fallback_attempts: u64,
    /// Wall-clock drain duration in milliseconds.
    pub elapsed_ms: u64,
}

// ============================================================================
// SECTION: Sink
// ============================================================================

/// Receiver for scheduler events.
///
/// # Invariants
/// - Implementations must be cheap and non-blocking; the pool emits inline.
pub trait SchedulerEventSink: Send + Sync {
    /// Receives one event.
    fn emit(&self, event: SchedulerEvent);
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl SchedulerEventSink for NullEventSink {
    fn emit(&self, _event: SchedulerEvent) {}
}

// crates/spec-harvest-core/src/budget.rs
// ============================================================================
// Module: Host Budget
// Description: Per-host score accumulation and gating state machine.
// Purpose: Gate hosts into open/active/degraded/backoff/blocked from observed
//          fetch outcomes, with monotone retry cooldowns.
// Dependencies: crate::outcome, serde
// ============================================================================

//! ## Overview
//! Each host accumulates outcome counters during a drain. A clamped score in
//! [0, 100] summarizes behavior: capped bonuses for successes and evidence
//! use, linear penalties per adverse outcome. The state machine reads the
//! score plus the cooldown timestamp to gate further fetches against the
//! host. The budget map is owned by a single drain invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::Host;
use crate::outcome::FetchOutcome;

// ============================================================================
// SECTION: Score Coefficients
// ============================================================================

/// Baseline score for a fresh host row.
const BASE_SCORE: f64 = 100.0;
/// Bonus per `ok` outcome.
const OK_BONUS: f64 = 2.0;
/// Cap on the number of `ok` outcomes that earn a bonus.
const OK_BONUS_CAP: u32 = 6;
/// Cap on the evidence-used bonus.
const EVIDENCE_BONUS_CAP: u32 = 10;
/// Penalty per `not_found` outcome.
const NOT_FOUND_PENALTY: f64 = 6.0;
/// Penalty per `blocked` outcome.
const BLOCKED_PENALTY: f64 = 8.0;
/// Penalty per `rate_limited` outcome.
const RATE_LIMITED_PENALTY: f64 = 12.0;
/// Penalty per `bot_challenge` outcome.
const BOT_CHALLENGE_PENALTY: f64 = 14.0;
/// Penalty per dedupe hit.
const DEDUPE_HIT_PENALTY: f64 = 1.0;
/// Penalty per `server_error` outcome.
const SERVER_ERROR_PENALTY: f64 = 4.0;
/// Penalty per `fetch_error` outcome.
const FETCH_ERROR_PENALTY: f64 = 3.0;
/// Penalty per `network_timeout` outcome.
const NETWORK_TIMEOUT_PENALTY: f64 = 3.0;
/// Penalty per `login_wall` outcome.
const LOGIN_WALL_PENALTY: f64 = 8.0;
/// Penalty per `bad_content` outcome.
const BAD_CONTENT_PENALTY: f64 = 5.0;
/// Penalty per parse failure.
const PARSE_FAIL_PENALTY: f64 = 2.0;
/// Score threshold below which a host is degraded (or blocked in cooldown).
const DEGRADED_SCORE_THRESHOLD: f64 = 55.0;
/// Combined blocked + rate-limited count that hardens cooldown to blocked.
const BLOCKED_COUNT_THRESHOLD: u32 = 2;

// ============================================================================
// SECTION: Budget Row
// ============================================================================

/// Accumulated per-host counters for one drain.
///
/// # Invariants
/// - Counters only grow; `next_retry_ts` is monotone non-decreasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBudgetRow {
    /// One counter per fetch outcome label.
    pub outcome_counts: BTreeMap<FetchOutcome, u32>,
    /// Fetches started against the host.
    pub started_count: u32,
    /// Fetches completed against the host.
    pub completed_count: u32,
    /// Snippets from this host used as accepted evidence.
    pub evidence_used: u32,
    /// Pages fetched but failed to parse.
    pub parse_fail_count: u32,
    /// Candidates discarded as duplicates of prior observations.
    pub dedupe_hits: u32,
    /// Unix-millisecond timestamp before which the host is cooling down.
    pub next_retry_ts: Option<i64>,
}

impl HostBudgetRow {
    /// Returns the counter for one outcome label.
    #[must_use]
    pub fn outcome_count(&self, outcome: FetchOutcome) -> u32 {
        self.outcome_counts.get(&outcome).copied().unwrap_or(0)
    }

    /// Records one classified outcome.
    pub fn note_outcome(&mut self, outcome: FetchOutcome) {
        let slot = self.outcome_counts.entry(outcome).or_insert(0);
        *slot = slot.saturating_add(1);
    }

    /// Records a fetch start.
    pub fn note_started(&mut self) {
        self.started_count = self.started_count.saturating_add(1);
    }

    /// Records a fetch completion.
    pub fn note_completed(&mut self) {
        self.completed_count = self.completed_count.saturating_add(1);
    }

    /// Raises `next_retry_ts`; an earlier proposed timestamp never regresses
    /// the stored one.
    pub fn note_retry_ts(&mut self, proposed_ts: i64) {
        match self.next_retry_ts {
            Some(current) if current >= proposed_ts => {}
            _ => self.next_retry_ts = Some(proposed_ts),
        }
    }
}

// ============================================================================
// SECTION: Scoring
// ============================================================================

/// Computes the clamped budget score for a host row.
#[must_use]
pub fn score_host_budget(row: &HostBudgetRow) -> f64 {
    let ok = row.outcome_count(FetchOutcome::Ok).min(OK_BONUS_CAP);
    let evidence = row.evidence_used.min(EVIDENCE_BONUS_CAP);
    let score = BASE_SCORE + OK_BONUS * f64::from(ok) + f64::from(evidence)
        - NOT_FOUND_PENALTY * f64::from(row.outcome_count(FetchOutcome::NotFound))
        - BLOCKED_PENALTY * f64::from(row.outcome_count(FetchOutcome::Blocked))
        - RATE_LIMITED_PENALTY * f64::from(row.outcome_count(FetchOutcome::RateLimited))
        - BOT_CHALLENGE_PENALTY * f64::from(row.outcome_count(FetchOutcome::BotChallenge))
        - DEDUPE_HIT_PENALTY * f64::from(row.dedupe_hits)
        - SERVER_ERROR_PENALTY * f64::from(row.outcome_count(FetchOutcome::ServerError))
        - FETCH_ERROR_PENALTY * f64::from(row.outcome_count(FetchOutcome::FetchError))
        - NETWORK_TIMEOUT_PENALTY * f64::from(row.outcome_count(FetchOutcome::NetworkTimeout))
        - LOGIN_WALL_PENALTY * f64::from(row.outcome_count(FetchOutcome::LoginWall))
        - BAD_CONTENT_PENALTY * f64::from(row.outcome_count(FetchOutcome::BadContent))
        - PARSE_FAIL_PENALTY * f64::from(row.parse_fail_count);
    score.clamp(0.0, 100.0)
}

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Gating state for a host.
///
/// # Invariants
/// - Variants are stable for persistence and event labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostBudgetState {
    /// No adverse signal; fetches may start.
    Open,
    /// Fetches are in flight and nothing is degraded.
    Active,
    /// Score or content quality dropped; fetch with caution.
    Degraded,
    /// Cooling down; retry after `next_retry_ts`.
    Backoff,
    /// Cooling down with hard adverse signal; do not fetch.
    Blocked,
}

impl HostBudgetState {
    /// Returns the stable label for the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Degraded => "degraded",
            Self::Backoff => "backoff",
            Self::Blocked => "blocked",
        }
    }
}

/// Resolves the gating state for a host row at `now_ms`.
#[must_use]
pub fn resolve_host_budget_state(row: &HostBudgetRow, now_ms: i64) -> HostBudgetState {
    let score = score_host_budget(row);
    let cooldown_active = row.next_retry_ts.is_some_and(|ts| ts > now_ms);
    if cooldown_active {
        let adverse = row
            .outcome_count(FetchOutcome::Blocked)
            .saturating_add(row.outcome_count(FetchOutcome::RateLimited));
        if score < DEGRADED_SCORE_THRESHOLD || adverse >= BLOCKED_COUNT_THRESHOLD {
            return HostBudgetState::Blocked;
        }
        return HostBudgetState::Backoff;
    }
    if row.outcome_count(FetchOutcome::BadContent) > 0
        || row.parse_fail_count > 0
        || score < DEGRADED_SCORE_THRESHOLD
    {
        return HostBudgetState::Degraded;
    }
    if row.started_count > row.completed_count {
        return HostBudgetState::Active;
    }
    HostBudgetState::Open
}

// ============================================================================
// SECTION: Backoff Application
// ============================================================================

/// Cooldown base delays applied on adverse outcomes, in seconds.
///
/// # Invariants
/// - Values are positive; zero disables the corresponding cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffDelays {
    /// Base delay applied on a `rate_limited` outcome.
    pub base_delay_429_seconds: u32,
    /// Base delay applied on `blocked` / `bot_challenge` outcomes.
    pub base_delay_403_seconds: u32,
}

impl Default for BackoffDelays {
    fn default() -> Self {
        Self {
            base_delay_429_seconds: 60,
            base_delay_403_seconds: 60,
        }
    }
}

/// Applies a cooldown for an adverse outcome; other outcomes are no-ops.
pub fn apply_backoff(
    row: &mut HostBudgetRow,
    outcome: FetchOutcome,
    now_ms: i64,
    delays: BackoffDelays,
) {
    let delay_seconds = match outcome {
        FetchOutcome::RateLimited => i64::from(delays.base_delay_429_seconds),
        FetchOutcome::Blocked | FetchOutcome::BotChallenge => {
            i64::from(delays.base_delay_403_seconds)
        }
        _ => return,
    };
    row.note_retry_ts(now_ms.saturating_add(delay_seconds.saturating_mul(1_000)));
}

// ============================================================================
// SECTION: Budget Map
// ============================================================================

/// Per-host budget rows owned by a single drain invocation.
pub type HostBudgetMap = BTreeMap<Host, HostBudgetRow>;

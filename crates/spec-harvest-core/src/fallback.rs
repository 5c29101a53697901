// crates/spec-harvest-core/src/fallback.rs
// ============================================================================
// Module: Fetcher Fallback Policy
// Description: Pure decision function mapping fetch outcomes to next actions.
// Purpose: Decide whether to skip, retry in place, or rotate to an alternate
//          fetcher mode after a fetch attempt.
// Dependencies: crate::outcome, serde
// ============================================================================

//! ## Overview
//! The fallback policy is a pure function: given an outcome, the current
//! fetcher mode, the set of modes already exhausted for the source, and the
//! retry count, it returns the next action. The mode ladder is a fixed cyclic
//! ordering; exhausting it (or hitting the retry bound) marks the source
//! exhausted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::outcome::FetchOutcome;

// ============================================================================
// SECTION: Fetcher Modes
// ============================================================================

/// Fetcher implementation used for one attempt.
///
/// # Invariants
/// - Variants are stable for persistence and event labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetcherMode {
    /// Crawlee-driven fetcher.
    Crawlee,
    /// Headless-browser fetcher.
    Playwright,
    /// Plain HTTP fetcher.
    Http,
}

impl FetcherMode {
    /// Returns the stable label for the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crawlee => "crawlee",
            Self::Playwright => "playwright",
            Self::Http => "http",
        }
    }

    /// Returns the alternate-mode ladder for this mode, in preference order.
    #[must_use]
    pub const fn ladder(self) -> [Self; 2] {
        match self {
            Self::Crawlee => [Self::Playwright, Self::Http],
            Self::Playwright => [Self::Http, Self::Crawlee],
            Self::Http => [Self::Crawlee, Self::Playwright],
        }
    }
}

// ============================================================================
// SECTION: Fallback Decision
// ============================================================================

/// Action the scheduler takes after a fetch attempt.
///
/// # Invariants
/// - Variants are stable for event labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackAction {
    /// Fetch succeeded; nothing to do.
    None,
    /// Outcome is terminal for this source; skip it.
    Skip,
    /// Rotate to the next fetcher mode on the ladder.
    TryAlternateFetcher,
    /// Wait, then retry the same mode.
    WaitAndRetrySame,
}

/// Decision produced by [`decide_fallback`].
///
/// # Invariants
/// - `next_mode` is `Some` only for `TryAlternateFetcher` with ladder left.
/// - `exhausted` implies `next_mode` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackDecision {
    /// Action to take for the source.
    pub action: FallbackAction,
    /// Mode to use for the next attempt, when rotating.
    pub next_mode: Option<FetcherMode>,
    /// Whether the scheduler should wait before the next attempt.
    pub should_wait: bool,
    /// Whether the source has no attempts left.
    pub exhausted: bool,
}

/// Maps a fetch outcome to the next scheduler action.
///
/// The ladder from `current_mode` is scanned in order; the first entry not in
/// `exhausted_modes` is chosen. An empty ladder or `retry_count >=
/// max_retries` marks the decision exhausted.
#[must_use]
pub fn decide_fallback(
    outcome: FetchOutcome,
    current_mode: FetcherMode,
    exhausted_modes: &[FetcherMode],
    retry_count: u32,
    max_retries: u32,
) -> FallbackDecision {
    match outcome {
        FetchOutcome::Ok => FallbackDecision {
            action: FallbackAction::None,
            next_mode: None,
            should_wait: false,
            exhausted: false,
        },
        FetchOutcome::NotFound | FetchOutcome::BadContent | FetchOutcome::LoginWall => {
            FallbackDecision {
                action: FallbackAction::Skip,
                next_mode: None,
                should_wait: false,
                exhausted: false,
            }
        }
        FetchOutcome::RateLimited => {
            if retry_count >= max_retries {
                FallbackDecision {
                    action: FallbackAction::Skip,
                    next_mode: None,
                    should_wait: false,
                    exhausted: true,
                }
            } else {
                FallbackDecision {
                    action: FallbackAction::WaitAndRetrySame,
                    next_mode: Some(current_mode),
                    should_wait: true,
                    exhausted: false,
                }
            }
        }
        FetchOutcome::Blocked
        | FetchOutcome::BotChallenge
        | FetchOutcome::ServerError
        | FetchOutcome::NetworkTimeout
        | FetchOutcome::FetchError => {
            let next_mode = current_mode
                .ladder()
                .into_iter()
                .find(|candidate| !exhausted_modes.contains(candidate));
            match next_mode {
                Some(mode) if retry_count < max_retries => FallbackDecision {
                    action: FallbackAction::TryAlternateFetcher,
                    next_mode: Some(mode),
                    should_wait: false,
                    exhausted: false,
                },
                _ => FallbackDecision {
                    action: FallbackAction::Skip,
                    next_mode: None,
                    should_wait: false,
                    exhausted: true,
                },
            }
        }
    }
}

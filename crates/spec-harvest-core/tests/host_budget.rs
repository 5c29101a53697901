// crates/spec-harvest-core/tests/host_budget.rs
// ============================================================================
// Module: Host Budget Unit Tests
// Description: Score bounds, bonus caps, monotone cooldowns, state machine.
// Purpose: Pin the budget scoring coefficients and gating transitions.
// ============================================================================

//! Unit and property tests for the host budget.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use spec_harvest_core::BackoffDelays;
use spec_harvest_core::FetchOutcome;
use spec_harvest_core::HostBudgetRow;
use spec_harvest_core::HostBudgetState;
use spec_harvest_core::apply_backoff;
use spec_harvest_core::resolve_host_budget_state;
use spec_harvest_core::score_host_budget;

fn row_with(outcome: FetchOutcome, count: u32) -> HostBudgetRow {
    let mut row = HostBudgetRow::default();
    for _ in 0 .. count {
        row.note_outcome(outcome);
    }
    row
}

#[test]
fn fresh_row_scores_one_hundred() {
    let row = HostBudgetRow::default();
    assert!((score_host_budget(&row) - 100.0).abs() < f64::EPSILON);
}

#[test]
fn ok_bonus_caps_at_twelve() {
    let mut row = row_with(FetchOutcome::Ok, 20);
    // Pull the score off the ceiling so the bonus is observable.
    row.outcome_counts.insert(FetchOutcome::NotFound, 5);
    let capped = score_host_budget(&row);
    let mut reference = row_with(FetchOutcome::Ok, 6);
    reference.outcome_counts.insert(FetchOutcome::NotFound, 5);
    assert!((capped - score_host_budget(&reference)).abs() < f64::EPSILON);
    assert!((capped - (100.0 + 12.0 - 30.0)).abs() < f64::EPSILON);
}

#[test]
fn evidence_bonus_caps_at_ten() {
    let mut row = HostBudgetRow::default();
    row.evidence_used = 50;
    row.outcome_counts.insert(FetchOutcome::Blocked, 3);
    let capped = score_host_budget(&row);
    assert!((capped - (100.0 + 10.0 - 24.0)).abs() < f64::EPSILON);
}

#[test]
fn six_blocked_outcomes_degrade_the_host() {
    let row = row_with(FetchOutcome::Blocked, 6);
    assert!(score_host_budget(&row) < 55.0);
    assert_eq!(resolve_host_budget_state(&row, 1_000), HostBudgetState::Degraded);
}

#[test]
fn cooldown_with_adverse_counts_blocks() {
    let mut row = row_with(FetchOutcome::Blocked, 1);
    row.note_outcome(FetchOutcome::RateLimited);
    row.note_retry_ts(10_000);
    assert_eq!(resolve_host_budget_state(&row, 1_000), HostBudgetState::Blocked);
}

#[test]
fn cooldown_without_adverse_counts_backs_off() {
    let mut row = row_with(FetchOutcome::Ok, 3);
    row.note_retry_ts(10_000);
    assert_eq!(resolve_host_budget_state(&row, 1_000), HostBudgetState::Backoff);
}

#[test]
fn expired_cooldown_releases_the_host() {
    let mut row = row_with(FetchOutcome::Ok, 3);
    row.note_retry_ts(10_000);
    assert_eq!(resolve_host_budget_state(&row, 20_000), HostBudgetState::Open);
}

#[test]
fn in_flight_fetches_mark_the_host_active() {
    let mut row = HostBudgetRow::default();
    row.note_started();
    assert_eq!(resolve_host_budget_state(&row, 0), HostBudgetState::Active);
    row.note_completed();
    assert_eq!(resolve_host_budget_state(&row, 0), HostBudgetState::Open);
}

#[test]
fn parse_failures_degrade_the_host() {
    let mut row = HostBudgetRow::default();
    row.parse_fail_count = 1;
    assert_eq!(resolve_host_budget_state(&row, 0), HostBudgetState::Degraded);
}

#[test]
fn retry_timestamp_is_monotone() {
    let mut row = HostBudgetRow::default();
    row.note_retry_ts(5_000);
    row.note_retry_ts(3_000);
    assert_eq!(row.next_retry_ts, Some(5_000));
    row.note_retry_ts(7_000);
    assert_eq!(row.next_retry_ts, Some(7_000));
}

#[test]
fn backoff_applies_configured_delays() {
    let delays = BackoffDelays {
        base_delay_429_seconds: 30,
        base_delay_403_seconds: 90,
    };
    let mut row = HostBudgetRow::default();
    apply_backoff(&mut row, FetchOutcome::RateLimited, 1_000, delays);
    assert_eq!(row.next_retry_ts, Some(31_000));
    apply_backoff(&mut row, FetchOutcome::Blocked, 1_000, delays);
    assert_eq!(row.next_retry_ts, Some(91_000));
    apply_backoff(&mut row, FetchOutcome::Ok, 1_000, delays);
    assert_eq!(row.next_retry_ts, Some(91_000));
}

proptest! {
    #[test]
    fn score_stays_within_bounds(
        ok in 0_u32 .. 50,
        not_found in 0_u32 .. 50,
        blocked in 0_u32 .. 50,
        rate_limited in 0_u32 .. 50,
        bot_challenge in 0_u32 .. 50,
        evidence in 0_u32 .. 50,
        dedupe in 0_u32 .. 50,
        parse_fail in 0_u32 .. 50,
    ) {
        let mut row = HostBudgetRow::default();
        row.outcome_counts.insert(FetchOutcome::Ok, ok);
        row.outcome_counts.insert(FetchOutcome::NotFound, not_found);
        row.outcome_counts.insert(FetchOutcome::Blocked, blocked);
        row.outcome_counts.insert(FetchOutcome::RateLimited, rate_limited);
        row.outcome_counts.insert(FetchOutcome::BotChallenge, bot_challenge);
        row.evidence_used = evidence;
        row.dedupe_hits = dedupe;
        row.parse_fail_count = parse_fail;
        let score = score_host_budget(&row);
        prop_assert!((0.0 ..= 100.0).contains(&score));
    }

    #[test]
    fn penalties_are_monotone_in_count(count in 0_u32 .. 30) {
        let lower = score_host_budget(&row_with(FetchOutcome::Blocked, count));
        let higher = score_host_budget(&row_with(FetchOutcome::Blocked, count + 1));
        prop_assert!(higher <= lower);
    }
}

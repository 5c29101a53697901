// crates/spec-harvest-core/tests/outcome_classifier.rs
// ============================================================================
// Module: Outcome Classifier Unit Tests
// Description: Status and message precedence tests for fetch classification.
// Purpose: Pin the ten-label taxonomy and its corner cases.
// ============================================================================

//! Unit tests for the fetch-outcome classifier precedence rules.

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

use spec_harvest_core::FetchOutcome;
use spec_harvest_core::classify_fetch_outcome;

#[test]
fn status_200_is_ok() {
    assert_eq!(classify_fetch_outcome(200, ""), FetchOutcome::Ok);
    assert_eq!(classify_fetch_outcome(200, "blocked"), FetchOutcome::Ok);
}

#[test]
fn gone_statuses_are_not_found() {
    assert_eq!(classify_fetch_outcome(404, ""), FetchOutcome::NotFound);
    assert_eq!(classify_fetch_outcome(410, ""), FetchOutcome::NotFound);
}

#[test]
fn status_429_is_rate_limited() {
    assert_eq!(classify_fetch_outcome(429, ""), FetchOutcome::RateLimited);
}

#[test]
fn five_hundreds_are_server_errors() {
    assert_eq!(classify_fetch_outcome(500, ""), FetchOutcome::ServerError);
    assert_eq!(classify_fetch_outcome(503, ""), FetchOutcome::ServerError);
    assert_eq!(classify_fetch_outcome(599, ""), FetchOutcome::ServerError);
}

#[test]
fn auth_statuses_are_login_walls() {
    assert_eq!(classify_fetch_outcome(401, ""), FetchOutcome::LoginWall);
    assert_eq!(classify_fetch_outcome(407, ""), FetchOutcome::LoginWall);
}

#[test]
fn status_403_splits_on_login_patterns() {
    assert_eq!(
        classify_fetch_outcome(403, "Please sign-in to continue"),
        FetchOutcome::LoginWall
    );
    assert_eq!(classify_fetch_outcome(403, "Access denied"), FetchOutcome::Blocked);
    assert_eq!(classify_fetch_outcome(403, ""), FetchOutcome::Blocked);
}

#[test]
fn status_zero_sniffs_network_failures() {
    assert_eq!(classify_fetch_outcome(0, "ECONNRESET"), FetchOutcome::NetworkTimeout);
    assert_eq!(classify_fetch_outcome(0, "socket hang up"), FetchOutcome::NetworkTimeout);
    assert_eq!(
        classify_fetch_outcome(0, "navigation timed out after 30s"),
        FetchOutcome::NetworkTimeout
    );
    assert_eq!(classify_fetch_outcome(0, "DNS lookup failed"), FetchOutcome::NetworkTimeout);
}

#[test]
fn status_zero_sniffs_rate_limits_and_challenges() {
    assert_eq!(
        classify_fetch_outcome(0, "upstream rate limit exceeded"),
        FetchOutcome::RateLimited
    );
    assert_eq!(
        classify_fetch_outcome(0, "cloudflare captcha presented"),
        FetchOutcome::BotChallenge
    );
    assert_eq!(classify_fetch_outcome(0, "request blocked by origin"), FetchOutcome::Blocked);
}

#[test]
fn status_zero_with_empty_message_is_fetch_error() {
    assert_eq!(classify_fetch_outcome(0, ""), FetchOutcome::FetchError);
    assert_eq!(classify_fetch_outcome(0, "mysterious"), FetchOutcome::FetchError);
}

#[test]
fn unmapped_statuses_default_to_blocked() {
    assert_eq!(classify_fetch_outcome(302, ""), FetchOutcome::Blocked);
    assert_eq!(classify_fetch_outcome(418, ""), FetchOutcome::Blocked);
}

#[test]
fn classification_is_case_insensitive() {
    assert_eq!(classify_fetch_outcome(0, "EConnReset"), FetchOutcome::NetworkTimeout);
    assert_eq!(classify_fetch_outcome(403, "SIGN IN required"), FetchOutcome::LoginWall);
}

// crates/spec-harvest-core/src/outcome.rs
// ============================================================================
// Module: Fetch Outcome Classification
// Description: Ten-label outcome taxonomy for fetch attempts.
// Purpose: Map HTTP status codes and transport messages onto stable outcome
//          labels consumed by the fallback policy and host budget.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every fetch attempt resolves to exactly one [`FetchOutcome`]. Status codes
//! classify first; status `0` (no HTTP response) falls back to message
//! sniffing. Labels are stable for persistence and budget accounting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Outcome Labels
// ============================================================================

/// Classification of one fetch attempt.
///
/// # Invariants
/// - Variants are stable for persistence and telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchOutcome {
    /// 200-class success.
    Ok,
    /// Resource is gone (404/410).
    NotFound,
    /// Host asked us to slow down (429 or rate-limit message).
    RateLimited,
    /// 5xx response.
    ServerError,
    /// Authentication wall (401/407, or 403 with a sign-in message).
    LoginWall,
    /// Access denied without an authentication path.
    Blocked,
    /// Bot-detection challenge page.
    BotChallenge,
    /// Connection-level failure (reset, hang up, timeout, DNS).
    NetworkTimeout,
    /// Transport failure with no recognizable cause.
    FetchError,
    /// Response arrived but the content was unusable.
    BadContent,
}

impl FetchOutcome {
    /// Returns the stable label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::LoginWall => "login_wall",
            Self::Blocked => "blocked",
            Self::BotChallenge => "bot_challenge",
            Self::NetworkTimeout => "network_timeout",
            Self::FetchError => "fetch_error",
            Self::BadContent => "bad_content",
        }
    }

    /// All outcome labels in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Ok,
        Self::NotFound,
        Self::RateLimited,
        Self::ServerError,
        Self::LoginWall,
        Self::Blocked,
        Self::BotChallenge,
        Self::NetworkTimeout,
        Self::FetchError,
        Self::BadContent,
    ];
}

// ============================================================================
// SECTION: Classification
// ============================================================================

/// Message substrings indicating an authentication wall.
const LOGIN_PATTERNS: &[&str] = &["login", "log in", "sign-in", "sign in", "signin"];

/// Message substrings indicating connection-level failure.
const NETWORK_PATTERNS: &[&str] =
    &["econnreset", "socket hang up", "timeout", "timed out", "dns"];

/// Message substrings indicating rate limiting.
const RATE_LIMIT_PATTERNS: &[&str] = &["rate limit", "rate-limit", "too many requests", "429"];

/// Message substrings indicating a bot challenge.
const CHALLENGE_PATTERNS: &[&str] =
    &["captcha", "challenge", "cloudflare", "are you a robot", "bot detection"];

/// Message substrings indicating a hard block.
const BLOCKED_PATTERNS: &[&str] = &["blocked", "forbidden", "access denied", "denied"];

/// Returns true when the lowercased message contains any pattern.
fn matches_any(message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|pattern| message.contains(pattern))
}

/// Classifies one fetch attempt from its HTTP status and transport message.
///
/// Status `0` means no HTTP response was obtained; the message decides.
#[must_use]
pub fn classify_fetch_outcome(status: u16, message: &str) -> FetchOutcome {
    let lowered = message.to_ascii_lowercase();
    match status {
        200 => FetchOutcome::Ok,
        404 | 410 => FetchOutcome::NotFound,
        429 => FetchOutcome::RateLimited,
        500 ..= 599 => FetchOutcome::ServerError,
        401 | 407 => FetchOutcome::LoginWall,
        403 => {
            if matches_any(&lowered, LOGIN_PATTERNS) {
                FetchOutcome::LoginWall
            } else {
                FetchOutcome::Blocked
            }
        }
        0 => {
            if matches_any(&lowered, NETWORK_PATTERNS) {
                FetchOutcome::NetworkTimeout
            } else if matches_any(&lowered, RATE_LIMIT_PATTERNS) {
                FetchOutcome::RateLimited
            } else if matches_any(&lowered, CHALLENGE_PATTERNS) {
                FetchOutcome::BotChallenge
            } else if matches_any(&lowered, BLOCKED_PATTERNS) {
                FetchOutcome::Blocked
            } else {
                FetchOutcome::FetchError
            }
        }
        _ => FetchOutcome::Blocked,
    }
}

// crates/spec-harvest-scheduler/src/drain.rs
// ============================================================================
// Module: Drain Pool
// Description: Bounded host-aware fetch pool with fallback ladder.
// Purpose: Drain a source queue under a concurrency bound, per-host pacing,
//          cooperative stop, and mode-ladder retry.
// Dependencies: spec-harvest-core, tokio, url, crate::events
// ============================================================================

//! ## Overview
//! The drain coordinates up to `concurrency` in-flight fetches. Between the
//! completion of a fetch and the start of the next fetch to the same host it
//! enforces the per-host delay by tracking last-completion timestamps and
//! suspending a would-be starter for the remaining delta. Stop requests are
//! cooperative: no new work starts, in-flight fetches complete. The only
//! suspension points are the fetcher and the sleeper.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use spec_harvest_core::FallbackAction;
use spec_harvest_core::FetchOutcome;
use spec_harvest_core::FetcherMode;
use spec_harvest_core::classify_fetch_outcome;
use spec_harvest_core::decide_fallback;
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

use crate::events::DrainOutcome;
use crate::events::PoolSnapshot;
use crate::events::SchedulerEvent;
use crate::events::SchedulerEventSink;

// ============================================================================
// SECTION: Fetcher Seam
// ============================================================================

/// Response returned by one fetch attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status (0 when no response was obtained).
    pub status: u16,
    /// Transport or body message used for classification.
    pub message: String,
    /// Page body when the fetch produced one.
    pub body: Option<String>,
}

/// Failure raised by a fetch attempt instead of a response.
///
/// # Invariants
/// - The message is classification input; it must describe the transport
///   failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("fetch failed: {message}")]
pub struct FetchFailure {
    /// Transport failure description.
    pub message: String,
}

/// Mode-aware source fetcher.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetches one source with the given mode.
    ///
    /// # Errors
    ///
    /// Returns [`FetchFailure`] when no response could be obtained; the
    /// failure message feeds outcome classification.
    async fn fetch(&self, source: &str, mode: FetcherMode)
    -> Result<FetchResponse, FetchFailure>;
}

/// Injectable suspension seam for pacing and retry waits.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspends the caller for the given duration.
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============================================================================
// SECTION: Drain Configuration
// ============================================================================

/// Tuning for one drain invocation.
///
/// # Invariants
/// - `concurrency` is at least 1.
/// - Host override keys are lowercased host names.
#[derive(Debug, Clone)]
pub struct DrainConfig {
    /// Maximum in-flight fetches.
    pub concurrency: usize,
    /// Minimum milliseconds between fetch starts against one host.
    pub per_host_delay_ms: u64,
    /// Per-host overrides of the pacing delay.
    pub host_delay_overrides: BTreeMap<String, u64>,
    /// Fetcher mode for first attempts.
    pub initial_mode: FetcherMode,
    /// Retry ceiling per source across the fallback ladder.
    pub max_retries: u32,
    /// Wait applied before a same-mode retry, in milliseconds.
    pub retry_wait_ms: u64,
}

impl Default for DrainConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            per_host_delay_ms: 900,
            host_delay_overrides: BTreeMap::new(),
            initial_mode: FetcherMode::Crawlee,
            max_retries: 2,
            retry_wait_ms: 1_000,
        }
    }
}

impl DrainConfig {
    /// Returns the pacing delay for a host, honoring overrides.
    #[must_use]
    fn delay_for_host(&self, host: &str) -> u64 {
        match self.host_delay_overrides.get(host) {
            Some(value) if *value > 0 => *value,
            _ => self.per_host_delay_ms,
        }
    }
}

/// Caller-supplied control hooks for one drain.
pub struct DrainHooks {
    /// Returns a skip reason for sources that should not be fetched.
    pub should_skip: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    /// Returns true when the drain should stop taking new work.
    pub should_stop: Box<dyn Fn() -> bool + Send + Sync>,
    /// Maps a fetch response onto an outcome label.
    pub classify: Arc<dyn Fn(&FetchResponse) -> FetchOutcome + Send + Sync>,
}

impl Default for DrainHooks {
    fn default() -> Self {
        Self {
            should_skip: Box::new(|_source| None),
            should_stop: Box::new(|| false),
            classify: Arc::new(|response: &FetchResponse| {
                classify_fetch_outcome(response.status, &response.message)
            }),
        }
    }
}

// ============================================================================
// SECTION: Pacing Map
// ============================================================================

/// Per-host pacing state owned by one drain.
///
/// Starts reserve their slot up front so concurrent starters to one host
/// stay separated by the delay; completions push the next allowed start
/// past `completion + delay`.
#[derive(Debug, Default)]
struct HostPacing {
    /// Host to earliest instant the next fetch may start.
    next_allowed: HashMap<String, Instant>,
}

impl HostPacing {
    /// Reserves the next start slot for a host; returns the wait.
    fn reserve(&mut self, host: &str, delay: Duration) -> Duration {
        let now = Instant::now();
        let earliest = self.next_allowed.get(host).copied().unwrap_or(now);
        let start_at = earliest.max(now);
        self.next_allowed.insert(host.to_string(), start_at + delay);
        start_at.saturating_duration_since(now)
    }

    /// Records a fetch completion for a host.
    fn note_completion(&mut self, host: &str, delay: Duration) {
        let allowed = Instant::now() + delay;
        let slot = self.next_allowed.entry(host.to_string()).or_insert(allowed);
        if *slot < allowed {
            *slot = allowed;
        }
    }
}

/// Extracts the lowercased host from a source URL.
fn host_of(source: &str) -> String {
    Url::parse(source)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_else(|| source.to_ascii_lowercase())
}

// ============================================================================
// SECTION: Drain
// ============================================================================

/// Result of one source's processing inside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceResult {
    /// Fetched successfully.
    Processed {
        /// Fallback rotations consumed.
        fallback_attempts: u32,
    },
    /// Skipped on a terminal outcome.
    Skipped {
        /// Fallback rotations consumed.
        fallback_attempts: u32,
    },
    /// Exhausted the ladder or retry budget.
    Failed {
        /// Fallback rotations consumed.
        fallback_attempts: u32,
    },
}

/// Drains a source queue through the fetch pool.
///
/// Sources are taken in order; completion order depends on fetch latency.
/// The returned counters match the final `SchedulerDrainCompleted` event.
pub async fn drain_queue(
    config: &DrainConfig,
    sources: Vec<String>,
    fetcher: Arc<dyn SourceFetcher>,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn SchedulerEventSink>,
    hooks: &DrainHooks,
) -> DrainOutcome {
    let started = Instant::now();
    let concurrency = config.concurrency.max(1);
    let pacing = Arc::new(Mutex::new(HostPacing::default()));
    let mut outcome = DrainOutcome::default();
    let mut queue = sources.into_iter();
    let mut queued = queue.len();
    let mut pool: JoinSet<SourceResult> = JoinSet::new();

    loop {
        if !(hooks.should_stop)() {
            while pool.len() < concurrency {
                let Some(source) = queue.next() else {
                    break;
                };
                queued = queued.saturating_sub(1);
                if let Some(reason) = (hooks.should_skip)(&source) {
                    outcome.skipped += 1;
                    events.emit(SchedulerEvent::SourceSkipped {
                        source,
                        reason,
                    });
                    continue;
                }
                pool.spawn(process_source(
                    source,
                    config.clone(),
                    Arc::clone(&fetcher),
                    Arc::clone(&sleeper),
                    Arc::clone(&events),
                    Arc::clone(&pacing),
                    Arc::clone(&hooks.classify),
                ));
                events.emit(SchedulerEvent::SchedulerTick {
                    snapshot: snapshot_of(&outcome, pool.len(), queued),
                });
            }
        }
        let Some(joined) = pool.join_next().await else {
            break;
        };
        match joined {
            Ok(SourceResult::Processed {
                fallback_attempts,
            }) => {
                outcome.processed += 1;
                outcome.fallback_attempts += u64::from(fallback_attempts);
            }
            Ok(SourceResult::Skipped {
                fallback_attempts,
            }) => {
                outcome.skipped += 1;
                outcome.fallback_attempts += u64::from(fallback_attempts);
            }
            Ok(SourceResult::Failed {
                fallback_attempts,
            }) => {
                outcome.failed += 1;
                outcome.fallback_attempts += u64::from(fallback_attempts);
            }
            Err(_join_error) => {
                outcome.failed += 1;
            }
        }
        events.emit(SchedulerEvent::SchedulerTick {
            snapshot: snapshot_of(&outcome, pool.len(), queued),
        });
    }

    outcome.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    events.emit(SchedulerEvent::SchedulerDrainCompleted {
        outcome,
    });
    outcome
}

/// Builds a pool snapshot from the running counters.
const fn snapshot_of(outcome: &DrainOutcome, in_flight: usize, queued: usize) -> PoolSnapshot {
    PoolSnapshot {
        in_flight,
        queued,
        processed: outcome.processed,
        skipped: outcome.skipped,
        failed: outcome.failed,
    }
}

/// Processes one source through pacing, fetching, and the fallback ladder.
async fn process_source(
    source: String,
    config: DrainConfig,
    fetcher: Arc<dyn SourceFetcher>,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn SchedulerEventSink>,
    pacing: Arc<Mutex<HostPacing>>,
    classify: Arc<dyn Fn(&FetchResponse) -> FetchOutcome + Send + Sync>,
) -> SourceResult {
    let host = host_of(&source);
    let delay = Duration::from_millis(config.delay_for_host(&host));
    let mut mode = config.initial_mode;
    let mut exhausted_modes: Vec<FetcherMode> = Vec::new();
    let mut retry_count = 0_u32;
    let mut fallback_attempts = 0_u32;

    loop {
        wait_for_host(&host, delay, &sleeper, &events, &pacing).await;

        let fetched = fetcher.fetch(&source, mode).await;
        if let Ok(mut guard) = pacing.lock() {
            guard.note_completion(&host, delay);
        }

        let outcome = match fetched {
            Ok(response) => {
                let outcome = classify(&response);
                events.emit(SchedulerEvent::FetchResult {
                    source: source.clone(),
                    mode,
                    outcome,
                    status: response.status,
                });
                outcome
            }
            Err(failure) => {
                events.emit(SchedulerEvent::FetchErrorRaised {
                    source: source.clone(),
                    mode,
                    message: failure.message.clone(),
                });
                classify_fetch_outcome(0, &failure.message)
            }
        };

        if outcome == FetchOutcome::Ok {
            if fallback_attempts > 0 {
                events.emit(SchedulerEvent::SchedulerFallbackSucceeded {
                    source: source.clone(),
                    mode,
                    attempts: fallback_attempts,
                });
            }
            return SourceResult::Processed {
                fallback_attempts,
            };
        }

        let decision =
            decide_fallback(outcome, mode, &exhausted_modes, retry_count, config.max_retries);
        if decision.exhausted {
            events.emit(SchedulerEvent::SchedulerFallbackExhausted {
                source: source.clone(),
                outcome,
                attempts: fallback_attempts,
            });
            return SourceResult::Failed {
                fallback_attempts,
            };
        }
        match decision.action {
            FallbackAction::None => {
                return SourceResult::Processed {
                    fallback_attempts,
                };
            }
            FallbackAction::Skip => {
                return SourceResult::Skipped {
                    fallback_attempts,
                };
            }
            FallbackAction::WaitAndRetrySame => {
                retry_count += 1;
                sleeper.sleep(Duration::from_millis(config.retry_wait_ms)).await;
            }
            FallbackAction::TryAlternateFetcher => {
                let Some(next_mode) = decision.next_mode else {
                    return SourceResult::Failed {
                        fallback_attempts,
                    };
                };
                events.emit(SchedulerEvent::SchedulerFallbackStarted {
                    source: source.clone(),
                    from_mode: mode,
                    to_mode: next_mode,
                    outcome,
                });
                exhausted_modes.push(mode);
                mode = next_mode;
                retry_count += 1;
                fallback_attempts += 1;
            }
        }
    }
}

/// Suspends until the host's reserved start slot arrives.
async fn wait_for_host(
    host: &str,
    delay: Duration,
    sleeper: &Arc<dyn Sleeper>,
    events: &Arc<dyn SchedulerEventSink>,
    pacing: &Arc<Mutex<HostPacing>>,
) {
    if delay.is_zero() {
        return;
    }
    let wait = match pacing.lock() {
        Ok(mut guard) => guard.reserve(host, delay),
        Err(_poisoned) => Duration::ZERO,
    };
    if wait.is_zero() {
        return;
    }
    events.emit(SchedulerEvent::SchedulerHostWait {
        host: host.to_string(),
        wait_ms: u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
    });
    sleeper.sleep(wait).await;
}

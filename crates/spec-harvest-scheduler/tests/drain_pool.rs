// crates/spec-harvest-scheduler/tests/drain_pool.rs
// ============================================================================
// Module: Drain Pool Unit Tests
// Description: Serial ordering, host pacing, fallback ladder, stop and skip.
// Purpose: Validate the drain contract without real network I/O.
// ============================================================================

//! Unit tests for the fetch scheduler drain:
//! - Strict serial processing at concurrency 1
//! - Per-host start separation at the configured delay
//! - Fallback rotation through the mode ladder until exhaustion
//! - Skip and stop hooks
//! - Event emission including the final drain summary

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

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use spec_harvest_core::FetcherMode;
use spec_harvest_scheduler::DrainConfig;
use spec_harvest_scheduler::DrainHooks;
use spec_harvest_scheduler::FetchFailure;
use spec_harvest_scheduler::FetchResponse;
use spec_harvest_scheduler::SchedulerEvent;
use spec_harvest_scheduler::SchedulerEventSink;
use spec_harvest_scheduler::Sleeper;
use spec_harvest_scheduler::SourceFetcher;
use spec_harvest_scheduler::TokioSleeper;
use spec_harvest_scheduler::drain_queue;

// ============================================================================
// SECTION: Test Doubles
// ============================================================================

/// Records fetch start/end spans and serves scripted statuses.
struct ScriptedFetcher {
    /// Status per (source, attempt) in arrival order.
    statuses: Mutex<Vec<u16>>,
    /// Recorded (source, mode, start, end) spans.
    spans: Mutex<Vec<(String, FetcherMode, Instant, Instant)>>,
    /// Simulated fetch latency.
    latency: Duration,
}

impl ScriptedFetcher {
    fn new(statuses: Vec<u16>, latency: Duration) -> Self {
        Self {
            statuses: Mutex::new(statuses),
            spans: Mutex::new(Vec::new()),
            latency,
        }
    }

    fn spans(&self) -> Vec<(String, FetcherMode, Instant, Instant)> {
        self.spans.lock().expect("spans lock").clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch(
        &self,
        source: &str,
        mode: FetcherMode,
    ) -> Result<FetchResponse, FetchFailure> {
        let start = Instant::now();
        tokio::time::sleep(self.latency).await;
        let status = {
            let mut statuses = self.statuses.lock().expect("statuses lock");
            if statuses.is_empty() { 200 } else { statuses.remove(0) }
        };
        let end = Instant::now();
        self.spans.lock().expect("spans lock").push((source.to_string(), mode, start, end));
        Ok(FetchResponse {
            status,
            message: String::new(),
            body: Some("<html></html>".to_string()),
        })
    }
}

/// Collects every emitted event.
#[derive(Default)]
struct RecordingSink {
    /// Events in emission order.
    events: Mutex<Vec<SchedulerEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<SchedulerEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl SchedulerEventSink for RecordingSink {
    fn emit(&self, event: SchedulerEvent) {
        self.events.lock().expect("events lock").push(event);
    }
}

fn config(concurrency: usize, per_host_delay_ms: u64) -> DrainConfig {
    DrainConfig {
        concurrency,
        per_host_delay_ms,
        retry_wait_ms: 1,
        ..DrainConfig::default()
    }
}

// ============================================================================
// SECTION: Ordering and Pacing
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_one_processes_sources_strictly_serially() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![200, 200, 200], Duration::from_millis(20)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(1, 0),
        vec![
            "https://a.example.com/1".to_string(),
            "https://b.example.com/2".to_string(),
            "https://c.example.com/3".to_string(),
        ],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.processed, 3);
    let spans = fetcher.spans();
    assert_eq!(spans.len(), 3);
    for window in spans.windows(2) {
        let (_, _, _, previous_end) = &window[0];
        let (_, _, next_start, _) = &window[1];
        assert!(previous_end <= next_start, "fetches overlapped at concurrency 1");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn same_host_starts_are_separated_by_the_delay() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![200, 200], Duration::from_millis(5)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(2, 200),
        vec![
            "https://example.com/1".to_string(),
            "https://example.com/2".to_string(),
        ],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.processed, 2);
    let spans = fetcher.spans();
    assert_eq!(spans.len(), 2);
    let mut starts: Vec<Instant> = spans.iter().map(|(_, _, start, _)| *start).collect();
    starts.sort();
    let separation = starts[1].saturating_duration_since(starts[0]);
    assert!(
        separation >= Duration::from_millis(200),
        "start separation was {separation:?}"
    );
    let events = sink.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, SchedulerEvent::SchedulerHostWait { .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn distinct_hosts_are_not_paced_against_each_other() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![200, 200], Duration::from_millis(5)));
    let sink = Arc::new(RecordingSink::default());
    let started = Instant::now();
    let outcome = drain_queue(
        &config(2, 500),
        vec![
            "https://a.example.com/1".to_string(),
            "https://b.example.com/2".to_string(),
        ],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.processed, 2);
    assert!(started.elapsed() < Duration::from_millis(400), "cross-host pacing leaked");
}

// ============================================================================
// SECTION: Fallback Ladder
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn blocked_sources_rotate_through_the_ladder_and_recover() {
    // First attempt blocked, second (playwright) succeeds.
    let fetcher = Arc::new(ScriptedFetcher::new(vec![403, 200], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(1, 0),
        vec!["https://example.com/1".to_string()],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.fallback_attempts, 1);
    let spans = fetcher.spans();
    assert_eq!(spans[0].1, FetcherMode::Crawlee);
    assert_eq!(spans[1].1, FetcherMode::Playwright);
    let events = sink.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, SchedulerEvent::SchedulerFallbackStarted { .. }))
    );
    assert!(events.iter().any(|event| matches!(
        event,
        SchedulerEvent::SchedulerFallbackSucceeded { attempts: 1, .. }
    )));
}

#[tokio::test(flavor = "multi_thread")]
async fn persistent_blocks_exhaust_the_ladder() {
    let fetcher =
        Arc::new(ScriptedFetcher::new(vec![403, 403, 403, 403], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(1, 0),
        vec!["https://example.com/1".to_string()],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.failed, 1);
    assert_eq!(outcome.processed, 0);
    let events = sink.events();
    assert!(
        events
            .iter()
            .any(|event| matches!(event, SchedulerEvent::SchedulerFallbackExhausted { .. }))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn not_found_sources_are_skipped_not_failed() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![404], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(1, 0),
        vec!["https://example.com/old".to_string()],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.failed, 0);
}

// ============================================================================
// SECTION: Hooks and Events
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn skip_hook_short_circuits_before_fetching() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![200], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let hooks = DrainHooks {
        should_skip: Box::new(|source| {
            source.contains("forum").then(|| "low-tier host".to_string())
        }),
        ..DrainHooks::default()
    };
    let outcome = drain_queue(
        &config(1, 0),
        vec![
            "https://forum.example.com/t".to_string(),
            "https://example.com/spec".to_string(),
        ],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &hooks,
    )
    .await;
    assert_eq!(outcome.skipped, 1);
    assert_eq!(outcome.processed, 1);
    assert_eq!(fetcher.spans().len(), 1);
    let events = sink.events();
    assert!(events.iter().any(|event| matches!(
        event,
        SchedulerEvent::SourceSkipped { reason, .. } if reason == "low-tier host"
    )));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_hook_prevents_new_work_but_finishes_in_flight() {
    let fetcher =
        Arc::new(ScriptedFetcher::new(vec![200, 200, 200], Duration::from_millis(10)));
    let sink = Arc::new(RecordingSink::default());
    let seen = Arc::new(AtomicU64::new(0));
    let seen_for_hook = Arc::clone(&seen);
    let hooks = DrainHooks {
        should_stop: Box::new(move || seen_for_hook.fetch_add(1, Ordering::SeqCst) > 0),
        ..DrainHooks::default()
    };
    let outcome = drain_queue(
        &config(1, 0),
        vec![
            "https://a.example.com/1".to_string(),
            "https://b.example.com/2".to_string(),
            "https://c.example.com/3".to_string(),
        ],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &hooks,
    )
    .await;
    // The first poll admits one source; every later poll refuses new work.
    assert_eq!(outcome.processed, 1);
    assert_eq!(fetcher.spans().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn drain_emits_a_final_summary_event() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![200], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let outcome = drain_queue(
        &config(1, 0),
        vec!["https://example.com/1".to_string()],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::new(TokioSleeper),
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    let events = sink.events();
    let last = events.last().expect("events emitted");
    match last {
        SchedulerEvent::SchedulerDrainCompleted {
            outcome: summary,
        } => {
            assert_eq!(summary.processed, outcome.processed);
            assert_eq!(summary.skipped, outcome.skipped);
            assert_eq!(summary.failed, outcome.failed);
        }
        other => panic!("expected drain summary, got {other:?}"),
    }
}

/// A sleeper that records requested waits and sleeps for real.
struct CountingSleeper {
    /// Total requested sleep time in milliseconds.
    requested_ms: AtomicU64,
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.requested_ms.fetch_add(millis, Ordering::SeqCst);
        tokio::time::sleep(duration).await;
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn rate_limits_wait_through_the_injected_sleeper() {
    let fetcher = Arc::new(ScriptedFetcher::new(vec![429, 200], Duration::from_millis(1)));
    let sink = Arc::new(RecordingSink::default());
    let sleeper = Arc::new(CountingSleeper {
        requested_ms: AtomicU64::new(0),
    });
    let outcome = drain_queue(
        &DrainConfig {
            concurrency: 1,
            per_host_delay_ms: 0,
            retry_wait_ms: 25,
            ..DrainConfig::default()
        },
        vec!["https://example.com/1".to_string()],
        Arc::clone(&fetcher) as Arc<dyn SourceFetcher>,
        Arc::clone(&sleeper) as Arc<dyn Sleeper>,
        Arc::clone(&sink) as Arc<dyn spec_harvest_scheduler::SchedulerEventSink>,
        &DrainHooks::default(),
    )
    .await;
    assert_eq!(outcome.processed, 1);
    assert!(sleeper.requested_ms.load(Ordering::SeqCst) >= 25);
}

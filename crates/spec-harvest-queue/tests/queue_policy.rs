// crates/spec-harvest-queue/tests/queue_policy.rs
// ============================================================================
// Module: Queue Policy Unit Tests
// Description: Selection scoring, status inference, failure backoff, and
//              staleness sweeps.
// Purpose: Validate the queue keeper against the SpecDb and the snapshot
//          mirror.
// ============================================================================

//! Unit tests for the queue keeper:
//! - Selection eligibility and deterministic tie-breaking
//! - Run recording with status inference
//! - Exponential failure backoff up to the hard-failure ceiling
//! - Staleness sweep with the recrawl hint
//! - JSON snapshot mirroring and legacy-path fallback

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

use spec_harvest_core::Category;
use spec_harvest_core::ProductId;
use spec_harvest_core::ProductQueueRow;
use spec_harvest_core::QueueStatus;
use spec_harvest_core::RunSummarySnapshot;
use spec_harvest_queue::QueueKeeper;
use spec_harvest_queue::QueueKeeperConfig;
use spec_harvest_queue::RunRecord;
use spec_harvest_queue::read_snapshot;
use spec_harvest_queue::select_score;
use spec_harvest_storage::LocalObjectStore;
use spec_harvest_store::SpecDb;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn category() -> Category {
    Category::new("mouse")
}

fn keeper(json_write: bool) -> QueueKeeper {
    QueueKeeper::new(QueueKeeperConfig::new(category(), json_write))
}

fn fixture() -> (SpecDb, LocalObjectStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    let db = SpecDb::open_in_memory().expect("open");
    (db, store, dir)
}

fn pending_row(product: &str) -> ProductQueueRow {
    ProductQueueRow::new(category(), ProductId::new(product))
}

fn validated_summary(at: i64) -> RunSummarySnapshot {
    RunSummarySnapshot {
        validated: true,
        confidence: 0.92,
        recorded_at: at,
        ..RunSummarySnapshot::default()
    }
}

// ============================================================================
// SECTION: Selection
// ============================================================================

#[test]
fn tie_break_prefers_the_lexicographically_smaller_product() {
    let (mut db, _store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("beta")).expect("beta");
    db.upsert_queue_row(&pending_row("alpha")).expect("alpha");
    let keeper = keeper(false);
    let selected = keeper.select_next(&db, 0).expect("select").expect("candidate");
    assert_eq!(selected.product_id, ProductId::new("alpha"));
}

#[test]
fn parked_rows_are_never_selected() {
    let (mut db, _store, _dir) = fixture();
    for (product, status) in [
        ("a", QueueStatus::Complete),
        ("b", QueueStatus::Blocked),
        ("c", QueueStatus::Paused),
        ("d", QueueStatus::Skipped),
        ("e", QueueStatus::InProgress),
        ("f", QueueStatus::NeedsManual),
        ("g", QueueStatus::Exhausted),
        ("h", QueueStatus::Failed),
    ] {
        let mut row = pending_row(product);
        row.status = status;
        db.upsert_queue_row(&row).expect("row");
    }
    let keeper = keeper(false);
    assert!(keeper.select_next(&db, 0).expect("select").is_none());
}

#[test]
fn future_retries_defer_selection() {
    let (mut db, _store, _dir) = fixture();
    let mut row = pending_row("p1");
    row.next_retry_at = Some(10_000);
    db.upsert_queue_row(&row).expect("row");
    let keeper = keeper(false);
    assert!(keeper.select_next(&db, 5_000).expect("early").is_none());
    assert!(keeper.select_next(&db, 15_000).expect("late").is_some());
}

#[test]
fn scoring_rewards_gaps_and_penalizes_attempts() {
    let fresh = pending_row("p1");
    let mut worked = pending_row("p2");
    worked.attempts_total = 5;
    worked.last_summary = Some(RunSummarySnapshot {
        confidence: 1.0,
        recorded_at: 0,
        ..RunSummarySnapshot::default()
    });
    assert!(select_score(&fresh) > select_score(&worked));

    let mut gappy = pending_row("p3");
    gappy.last_summary = Some(RunSummarySnapshot {
        confidence: 0.5,
        missing_required: vec!["weight".to_string()],
        critical_missing: vec!["sensor".to_string()],
        contradictions: 1,
        recorded_at: 0,
        ..RunSummarySnapshot::default()
    });
    assert!(select_score(&gappy) > select_score(&fresh));
}

#[test]
fn higher_priority_rows_score_higher() {
    let mut urgent = pending_row("p1");
    urgent.priority = 1;
    let mut relaxed = pending_row("p2");
    relaxed.priority = 5;
    assert!(select_score(&urgent) > select_score(&relaxed));
}

// ============================================================================
// SECTION: Run Recording
// ============================================================================

#[test]
fn validated_runs_complete_the_row() {
    let (mut db, store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("p1")).expect("row");
    let keeper = keeper(false);
    let row = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord {
                summary: validated_summary(1_000),
                cost_usd: 0.25,
                urls_attempted: vec!["https://example.com/a".to_string()],
                budget_exceeded: false,
            },
        )
        .expect("record");
    assert_eq!(row.status, QueueStatus::Complete);
    assert_eq!(row.attempts_total, 1);
    assert_eq!(row.last_completed_at, Some(1_000));
    assert!((row.cost_usd_total - 0.25).abs() < f64::EPSILON);
}

#[test]
fn budget_exhaustion_and_manual_gates_park_the_row() {
    let (mut db, store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("p1")).expect("row");
    db.upsert_queue_row(&pending_row("p2")).expect("row");
    let keeper = keeper(false);

    let exhausted = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord {
                summary: RunSummarySnapshot::default(),
                cost_usd: 0.0,
                urls_attempted: Vec::new(),
                budget_exceeded: true,
            },
        )
        .expect("record");
    assert_eq!(exhausted.status, QueueStatus::Exhausted);

    let manual = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p2"),
            &RunRecord {
                summary: RunSummarySnapshot {
                    identity_gate_failed: true,
                    ..RunSummarySnapshot::default()
                },
                cost_usd: 0.0,
                urls_attempted: Vec::new(),
                budget_exceeded: false,
            },
        )
        .expect("record");
    assert_eq!(manual.status, QueueStatus::NeedsManual);
}

#[test]
fn unvalidated_runs_move_pending_rows_to_running() {
    let (mut db, store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("p1")).expect("row");
    let keeper = keeper(false);
    let row = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord::default(),
        )
        .expect("record");
    assert_eq!(row.status, QueueStatus::Running);
}

#[test]
fn attempted_urls_deduplicate_and_stay_bounded() {
    let (mut db, store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("p1")).expect("row");
    let keeper = keeper(false);
    let urls: Vec<String> =
        (0 .. 350).map(|index| format!("https://example.com/{index}")).collect();
    let row = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord {
                urls_attempted: urls.clone(),
                ..RunRecord::default()
            },
        )
        .expect("record");
    assert_eq!(row.last_urls_attempted.len(), 300);

    let again = keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord {
                urls_attempted: urls,
                ..RunRecord::default()
            },
        )
        .expect("record again");
    assert_eq!(again.last_urls_attempted.len(), 300);
}

// ============================================================================
// SECTION: Failure Backoff
// ============================================================================

#[test]
fn failures_back_off_exponentially_until_hard_failure() {
    let (mut db, store, _dir) = fixture();
    let mut row = pending_row("p1");
    row.max_attempts = 3;
    db.upsert_queue_row(&row).expect("row");
    let keeper = keeper(false);

    let first = keeper
        .record_failure(&mut db, &store, &ProductId::new("p1"), 0)
        .expect("first failure");
    assert_eq!(first.status, QueueStatus::Pending);
    assert_eq!(first.next_retry_at, Some(60_000));

    let second = keeper
        .record_failure(&mut db, &store, &ProductId::new("p1"), 0)
        .expect("second failure");
    assert_eq!(second.next_retry_at, Some(120_000));

    let third = keeper
        .record_failure(&mut db, &store, &ProductId::new("p1"), 0)
        .expect("third failure");
    assert_eq!(third.status, QueueStatus::Failed);
    assert_eq!(third.next_retry_at, None);
}

#[test]
fn backoff_delay_is_capped() {
    let (mut db, store, _dir) = fixture();
    let mut row = pending_row("p1");
    row.max_attempts = 20;
    row.retry_count = 10;
    db.upsert_queue_row(&row).expect("row");
    let keeper = keeper(false);
    let next = keeper
        .record_failure(&mut db, &store, &ProductId::new("p1"), 0)
        .expect("failure");
    assert_eq!(next.next_retry_at, Some(3_600_000));
}

// ============================================================================
// SECTION: Staleness
// ============================================================================

#[test]
fn stale_sweep_moves_old_completions() {
    let (mut db, store, _dir) = fixture();
    let day_ms = 86_400_000_i64;
    let mut old = pending_row("old");
    old.status = QueueStatus::Complete;
    old.last_completed_at = Some(0);
    db.upsert_queue_row(&old).expect("old");
    let mut recent = pending_row("recent");
    recent.status = QueueStatus::Complete;
    recent.last_completed_at = Some(29 * day_ms);
    db.upsert_queue_row(&recent).expect("recent");

    let keeper = keeper(false);
    let moved = keeper
        .mark_stale(&mut db, &store, 30, 30 * day_ms + 1)
        .expect("sweep");
    assert_eq!(moved, 1);
    let swept = db
        .queue_row(&category(), &ProductId::new("old"))
        .expect("row")
        .expect("present");
    assert_eq!(swept.status, QueueStatus::Stale);
    assert_eq!(swept.next_action.as_deref(), Some("recrawl_stale"));
    let kept = db
        .queue_row(&category(), &ProductId::new("recent"))
        .expect("row")
        .expect("present");
    assert_eq!(kept.status, QueueStatus::Complete);
}

// ============================================================================
// SECTION: Snapshot
// ============================================================================

#[test]
fn snapshot_mirrors_on_mutation_and_reads_back() {
    let (mut db, store, _dir) = fixture();
    db.upsert_queue_row(&pending_row("p1")).expect("row");
    let keeper = keeper(true);
    keeper
        .record_run(
            &mut db,
            &store,
            &ProductId::new("p1"),
            &RunRecord {
                summary: validated_summary(42),
                ..RunRecord::default()
            },
        )
        .expect("record");
    let snapshot = read_snapshot(&store, "helper_files", &category())
        .expect("read")
        .expect("present");
    assert_eq!(snapshot.category, category());
    assert_eq!(snapshot.updated_at, 42);
    let row = snapshot.products.get("p1").expect("row present");
    assert_eq!(row.status, QueueStatus::Complete);
}

#[test]
fn snapshot_read_falls_back_to_the_legacy_path() {
    let (_db, store, _dir) = fixture();
    let legacy =
        spec_harvest_queue::legacy_snapshot_key("helper_files", &category()).expect("key");
    let body = serde_json::json!({
        "category": "mouse",
        "updated_at": 7,
        "products": {}
    });
    let bytes = serde_json::to_vec(&body).expect("encode");
    use spec_harvest_storage::ObjectStore;
    store.write_object(&legacy, &bytes, "application/json").expect("write legacy");
    let snapshot = read_snapshot(&store, "helper_files", &category())
        .expect("read")
        .expect("present");
    assert_eq!(snapshot.updated_at, 7);
}

#[test]
fn identity_gate_rejections_are_counted_not_enqueued() {
    let (mut db, store, _dir) = fixture();
    let keeper = keeper(false);
    let report = keeper
        .enqueue_all(
            &mut db,
            &store,
            &[ProductId::new("good"), ProductId::new("bad")],
            &|product| product.as_str() != "bad",
        )
        .expect("enqueue");
    assert_eq!(report.enqueued, 1);
    assert_eq!(report.rejected, 1);
    assert!(db.queue_row(&category(), &ProductId::new("bad")).expect("row").is_none());
}

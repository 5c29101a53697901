// crates/spec-harvest-queue/src/lib.rs
// ============================================================================
// Module: Spec Harvest Queue
// Description: Product queue keeper over the SpecDb.
// Purpose: Select the next product to harvest, record run results and
//          failures, sweep stale completions, and mirror a JSON snapshot.
// Dependencies: spec-harvest-core, spec-harvest-store, spec-harvest-storage
// ============================================================================

//! ## Overview
//! The queue keeper owns the queue policy; the store persists its rows.
//! Selection scores eligible rows and picks the highest, breaking ties on
//! ascending product id. Run recording infers the next status from the run
//! summary; failure recording schedules exponential-backoff retries until
//! the attempt ceiling fails the row hard. When snapshot mirroring is on,
//! every mutation also writes the JSON snapshot.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod keeper;
pub mod snapshot;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use keeper::EnqueueReport;
pub use keeper::QueueError;
pub use keeper::QueueKeeper;
pub use keeper::QueueKeeperConfig;
pub use keeper::RunRecord;
pub use keeper::select_score;
pub use snapshot::QueueSnapshot;
pub use snapshot::legacy_snapshot_key;
pub use snapshot::modern_snapshot_key;
pub use snapshot::read_snapshot;
pub use snapshot::write_snapshot;

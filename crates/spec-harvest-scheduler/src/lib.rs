// crates/spec-harvest-scheduler/src/lib.rs
// ============================================================================
// Module: Spec Harvest Scheduler
// Description: Host-aware fetch pool with fallback ladder.
// Purpose: Coordinate bounded concurrent fetches with per-host pacing,
//          cooperative stop, and observable events.
// Dependencies: spec-harvest-core, tokio, async-trait, url, serde
// ============================================================================

//! ## Overview
//! The scheduler is the only component that suspends: on the caller-supplied
//! fetcher and on the injectable sleeper. Outcome classification, the
//! fallback decision, and the host budget are pure logic from
//! `spec-harvest-core`. Tests observe pool state through the event sink
//! without racing real I/O.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod drain;
pub mod events;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use drain::DrainConfig;
pub use drain::DrainHooks;
pub use drain::FetchFailure;
pub use drain::FetchResponse;
pub use drain::Sleeper;
pub use drain::SourceFetcher;
pub use drain::TokioSleeper;
pub use drain::drain_queue;
pub use events::DrainOutcome;
pub use events::NullEventSink;
pub use events::PoolSnapshot;
pub use events::SchedulerEvent;
pub use events::SchedulerEventSink;

// crates/spec-harvest-store/src/lib.rs
// ============================================================================
// Module: Spec Harvest Store
// Description: The SpecDb relational state store over embedded SQLite.
// Purpose: Own every persisted row of the harvesting engine with integrity
//          invariants enforced at startup and on every write.
// Dependencies: rusqlite, spec-harvest-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The SpecDb is the single shared mutable resource of the engine: typed
//! schema with per-category isolation, candidate/assertion/evidence lineage,
//! slot-keyed review state, and the authoritative-component cascade. Access
//! is synchronous and single-writer; multi-row writes hold one transaction
//! and roll back entirely on error.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod candidates;
pub mod cascade;
pub mod components;
pub mod db;
pub mod enums;
pub mod error;
pub mod ids;
pub mod items;
pub mod prune;
pub mod queue_rows;
pub mod reviews;
pub mod schema;
pub mod sources;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use candidates::CandidateRecord;
pub use cascade::CascadeOutcome;
pub use components::ComponentIdentityRecord;
pub use components::ComponentKey;
pub use components::ComponentValueRecord;
pub use components::ComponentValueUpsert;
pub use components::MergeReport;
pub use db::CategoryCounts;
pub use db::ProductRecord;
pub use db::SpecDb;
pub use enums::ListValueRecord;
pub use error::IntegrityViolation;
pub use error::SpecDbError;
pub use ids::ComponentValueId;
pub use ids::EnumListId;
pub use ids::IdentityRowId;
pub use ids::ItemStateId;
pub use ids::ListValueId;
pub use ids::ReviewRunId;
pub use ids::ReviewStateId;
pub use items::ItemFieldStateRecord;
pub use items::ItemFieldStateUpsert;
pub use prune::PruneReport;
pub use reviews::CandidateContext;
pub use reviews::CandidateReviewRecord;
pub use reviews::ReviewAuditEvent;
pub use reviews::ReviewRunRecord;
pub use reviews::ReviewSlot;
pub use reviews::ReviewStateRecord;
pub use schema::SCHEMA_VERSION;
pub use sources::AssertionRecord;
pub use sources::AssertionSlot;
pub use sources::EvidenceRefRecord;
pub use sources::SourceRecord;

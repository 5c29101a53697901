// crates/spec-harvest-core/src/lib.rs
// ============================================================================
// Module: Spec Harvest Core
// Description: Typed domain model for the spec harvesting engine.
// Purpose: Provide identifiers, value semantics, outcome classification,
//          fallback policy, host budgets, constraints, and the runtime gate.
// Dependencies: serde, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! `spec-harvest-core` is dependency-light and fully synchronous: every
//! function here is a pure computation over caller-supplied state. The store,
//! scheduler, queue keeper, and seeder crates build on these types. Nothing
//! in this crate performs I/O or reads wall-clock time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod budget;
pub mod component;
pub mod constraints;
pub mod contract;
pub mod fallback;
pub mod gate;
pub mod identifiers;
pub mod outcome;
pub mod queue;
pub mod value;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use budget::BackoffDelays;
pub use budget::HostBudgetMap;
pub use budget::HostBudgetRow;
pub use budget::HostBudgetState;
pub use budget::apply_backoff;
pub use budget::resolve_host_budget_state;
pub use budget::score_host_budget;
pub use component::ComponentParseError;
pub use component::LinkMatchType;
pub use component::ReviewStatus;
pub use component::VariancePolicy;
pub use constraints::ConstraintOutcome;
pub use constraints::ConstraintScope;
pub use constraints::evaluate_constraint;
pub use constraints::evaluate_constraints;
pub use contract::EnumPolicy;
pub use contract::EnumVocabulary;
pub use contract::EvidenceContract;
pub use contract::FieldContract;
pub use contract::FieldRuleSet;
pub use contract::FieldShape;
pub use contract::FieldType;
pub use contract::NumericRange;
pub use contract::RequiredLevel;
pub use fallback::FallbackAction;
pub use fallback::FallbackDecision;
pub use fallback::FetcherMode;
pub use fallback::decide_fallback;
pub use gate::EvidencePack;
pub use gate::EvidenceRef;
pub use gate::FieldProvenance;
pub use gate::GateChange;
pub use gate::GateFailure;
pub use gate::GateReport;
pub use gate::GateStage;
pub use gate::run_gate;
pub use identifiers::CandidateId;
pub use identifiers::Category;
pub use identifiers::ComponentType;
pub use identifiers::FieldKey;
pub use identifiers::Host;
pub use identifiers::ProductId;
pub use identifiers::PropertyKey;
pub use identifiers::RunId;
pub use identifiers::SourceId;
pub use outcome::FetchOutcome;
pub use outcome::classify_fetch_outcome;
pub use queue::MAX_LAST_URLS;
pub use queue::ProductQueueRow;
pub use queue::QueueStatus;
pub use queue::RunSummarySnapshot;
pub use value::FieldValue;
pub use value::UNKNOWN_SENTINEL;
pub use value::is_unknown_placeholder;
pub use value::parse_lenient_number;
pub use value::snake_case;
pub use value::tokenize_list_value;

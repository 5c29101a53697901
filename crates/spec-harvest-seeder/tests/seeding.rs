// crates/spec-harvest-seeder/tests/seeding.rs
// ============================================================================
// Module: Seeder Unit Tests
// Description: Component, enum, and per-product seeding with idempotence.
// Purpose: Validate artifact loading, override application, and repeat-run
//          count stability.
// ============================================================================

//! Unit tests for the seeder:
//! - Component database loading with aliases, policies, and constraints
//! - Component override application
//! - Enum known values and pipeline suggestions
//! - Per-product candidate seeding with reseed semantics
//! - Per-product field overrides with candidate lineage
//! - Idempotence: seeding the same inputs twice yields the same counts

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

use serde_json::json;
use spec_harvest_core::Category;
use spec_harvest_core::ComponentType;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::VariancePolicy;
use spec_harvest_seeder::Seeder;
use spec_harvest_storage::Key;
use spec_harvest_storage::LocalObjectStore;
use spec_harvest_storage::ObjectStore;
use spec_harvest_store::SpecDb;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixture
// ============================================================================

fn category() -> Category {
    Category::new("mouse")
}

fn write_json(store: &LocalObjectStore, parts: &[&str], value: &serde_json::Value) {
    let key = Key::join(parts).expect("key");
    let bytes = serde_json::to_vec_pretty(value).expect("encode");
    store.write_object(&key, &bytes, "application/json").expect("write");
}

fn seeded_fixture() -> (LocalObjectStore, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());

    write_json(
        &store,
        &["helper_files", "mouse", "_generated", "component_db", "sensor.json"],
        &json!({
            "component_type": "sensor",
            "entries": {
                "paw3395": {
                    "canonical_name": "PAW3395",
                    "maker": "PixArt",
                    "aliases": ["3395", "paw-3395"],
                    "properties": {
                        "max_dpi": 26000,
                        "sensor_type": "optical"
                    },
                    "__variance_policies": {"max_dpi": "upper_bound"},
                    "__constraints": {"max_dpi": ["dpi <= max_dpi"]}
                }
            }
        }),
    );
    write_json(
        &store,
        &["helper_files", "mouse", "_overrides", "components", "paw3395.json"],
        &json!({
            "componentType": "sensor",
            "name": "PAW3395",
            "review_status": "confirmed",
            "properties": {"max_dpi": 26500}
        }),
    );
    write_json(
        &store,
        &["helper_files", "mouse", "_generated", "known_values.json"],
        &json!({
            "enums": {
                "connection": {"policy": "closed", "values": ["wired", "wireless"]},
                "shape": {"policy": "open", "values": ["ergo", "ambi"]}
            }
        }),
    );
    write_json(
        &store,
        &["helper_files", "mouse", "_suggestions", "enums.json"],
        &json!({"enums": {"shape": ["asymmetric"]}}),
    );
    write_json(
        &store,
        &["out", "mouse", "mouse-g-pro", "latest", "candidates.json"],
        &json!({
            "weight": [
                {"value": "54", "score": 0.9, "rank": 1, "host": "example.com",
                 "method": "dom", "run_id": "run-1", "snippet_id": "s1"},
                {"value": "55", "score": 0.4, "rank": 2, "host": "other.com",
                 "method": "dom", "run_id": "run-1", "snippet_id": "s2"}
            ],
            "sensor": [
                {"candidate_id": "raw-77", "value": "PAW3395", "score": 0.8, "rank": 1,
                 "host": "example.com", "method": "dom", "run_id": "run-1"}
            ]
        }),
    );
    write_json(
        &store,
        &["helper_files", "mouse", "_overrides", "mouse-g-pro.overrides.json"],
        &json!({
            "overrides": {
                "weight": {
                    "value": "53",
                    "override_provenance": {
                        "url": "https://example.com/spec",
                        "quote": "53 grams"
                    }
                }
            }
        }),
    );
    (store, dir)
}

// ============================================================================
// SECTION: Stages
// ============================================================================

#[test]
fn component_databases_seed_identities_values_and_candidates() {
    let (store, _dir) = seeded_fixture();
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let report = seeder.seed_all(&mut db).expect("seed");
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.identities, 1);
    assert_eq!(report.aliases, 2);
    assert_eq!(report.component_values, 2);
    assert_eq!(report.component_candidates, 2);
    assert_eq!(report.component_overrides, 1);

    let identity = db
        .find_component_by_alias(&category(), &ComponentType::new("sensor"), "3395")
        .expect("find")
        .expect("present");
    let record = db.component_identity(identity).expect("identity").expect("present");
    assert_eq!(record.review_status, spec_harvest_core::ReviewStatus::Confirmed);

    let values = db.component_values(identity).expect("values");
    let max_dpi = values
        .iter()
        .find(|value| value.property_key.as_str() == "max_dpi")
        .expect("max_dpi");
    // The override pinned the value after the generated db seeded it.
    assert_eq!(max_dpi.value, "26500");
    assert!(max_dpi.overridden);
    let generated = values
        .iter()
        .find(|value| value.property_key.as_str() == "sensor_type")
        .expect("sensor_type");
    assert_eq!(generated.value, "optical");
    assert_eq!(generated.variance_policy, VariancePolicy::Authoritative);
}

#[test]
fn enum_artifacts_seed_lists_values_and_suggestion_candidates() {
    let (store, _dir) = seeded_fixture();
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let report = seeder.seed_all(&mut db).expect("seed");
    assert_eq!(report.enum_lists, 2);
    assert_eq!(report.enum_values, 4);
    assert_eq!(report.enum_candidates, 1);

    let wired = db
        .lookup_list_value(&category(), &FieldKey::new("connection"), "wired")
        .expect("lookup")
        .expect("present");
    assert_eq!(wired.policy, "closed");
    // Suggestions become candidates, not vocabulary rows.
    assert!(
        db.lookup_list_value(&category(), &FieldKey::new("shape"), "asymmetric")
            .expect("lookup")
            .is_none()
    );
}

#[test]
fn product_candidates_seed_with_deterministic_scoped_ids() {
    let (store, _dir) = seeded_fixture();
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let report = seeder.seed_all(&mut db).expect("seed");
    assert_eq!(report.products, 1);
    assert_eq!(report.candidates, 3);
    // The weight override adds a manual candidate on top of the batch.
    assert_eq!(report.field_overrides, 1);

    let weight = db
        .candidates_for_field(&category(), &ProductId::new("mouse-g-pro"), &FieldKey::new("weight"))
        .expect("fetch");
    assert_eq!(weight.len(), 3);
    assert!(weight.iter().all(|candidate| {
        candidate.candidate_id.as_str().starts_with("item-source_")
            || candidate.candidate_id.as_str().starts_with("manual-item_")
    }));

    let state = db
        .item_field_state(&category(), &ProductId::new("mouse-g-pro"), &FieldKey::new("weight"))
        .expect("state")
        .expect("present");
    assert_eq!(state.value, "53");
    assert!(state.overridden);
    assert_eq!(state.source, "override");
    let accepted = state.accepted_candidate_id.expect("lineage");
    assert!(accepted.as_str().starts_with("manual-item_"));
}

#[test]
fn missing_artifacts_are_empty_collections() {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let report = seeder.seed_all(&mut db).expect("seed");
    assert!(report.errors.is_empty());
    assert_eq!(report.identities, 0);
    assert_eq!(report.candidates, 0);
    assert!(!db.is_seeded(&category()).expect("probe"));
}

#[test]
fn seeding_twice_produces_identical_counts() {
    let (store, _dir) = seeded_fixture();
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let first = seeder.seed_all(&mut db).expect("first pass");
    let second = seeder.seed_all(&mut db).expect("second pass");
    assert_eq!(first, second);

    let counts = db.counts(&category()).expect("counts");
    assert_eq!(counts.component_identities, 1);
    assert_eq!(counts.enum_values, 4);
    // 3 extracted + 1 manual product candidates, 2 component, 1 suggestion.
    assert_eq!(counts.candidates, 7);
}

#[test]
fn malformed_artifacts_aggregate_errors_and_continue() {
    let (store, _dir) = seeded_fixture();
    let bad = Key::join(&[
        "helper_files",
        "mouse",
        "_generated",
        "component_db",
        "switch.json",
    ])
    .expect("key");
    store
        .write_object(&bad, b"{\"component_type\": 7}", "application/json")
        .expect("write bad");
    let mut db = SpecDb::open_in_memory().expect("open");
    let seeder = Seeder::new(&store, "helper_files", "out", category());
    let report = seeder.seed_all(&mut db).expect("seed");
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].context.ends_with("switch.json"));
    // The well-formed sensor database still seeded.
    assert_eq!(report.identities, 1);
}

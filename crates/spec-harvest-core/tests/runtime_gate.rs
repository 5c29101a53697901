// crates/spec-harvest-core/tests/runtime_gate.rs
// ============================================================================
// Module: Runtime Gate Unit Tests
// Description: Normalize, cross-validate, and evidence-audit pipeline tests.
// Purpose: Pin the three-stage contract including the evidence corner cases.
// ============================================================================

//! Unit tests for the runtime validation gate.

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

use std::collections::BTreeMap;

use spec_harvest_core::EnumPolicy;
use spec_harvest_core::EnumVocabulary;
use spec_harvest_core::EvidenceContract;
use spec_harvest_core::EvidencePack;
use spec_harvest_core::EvidenceRef;
use spec_harvest_core::FieldContract;
use spec_harvest_core::FieldKey;
use spec_harvest_core::FieldProvenance;
use spec_harvest_core::FieldRuleSet;
use spec_harvest_core::FieldShape;
use spec_harvest_core::FieldType;
use spec_harvest_core::FieldValue;
use spec_harvest_core::GateStage;
use spec_harvest_core::NumericRange;
use spec_harvest_core::RequiredLevel;
use spec_harvest_core::run_gate;

fn number_contract(min: f64, max: f64) -> FieldContract {
    FieldContract {
        field_type: FieldType::Number,
        shape: FieldShape::Scalar,
        unit: Some("g".to_string()),
        range: Some(NumericRange {
            min: Some(min),
            max: Some(max),
        }),
        required_level: RequiredLevel::Expected,
        evidence: EvidenceContract::default(),
    }
}

fn rules_with(field: &str, contract: FieldContract) -> FieldRuleSet {
    let mut rules = FieldRuleSet::default();
    rules.contracts.insert(FieldKey::new(field), contract);
    rules
}

fn complete_ref(snippet_id: &str, host: &str) -> EvidenceRef {
    EvidenceRef {
        url: format!("https://{host}/page"),
        snippet_id: snippet_id.to_string(),
        quote: "quoted support".to_string(),
        source_id: "src-1".to_string(),
        snippet_hash: "abc123".to_string(),
        retrieved_at: "2026-07-01T00:00:00Z".to_string(),
        extraction_method: "dom".to_string(),
        host: host.to_string(),
    }
}

#[test]
fn numbers_normalize_with_unit_stripping() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "54 g".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("weight")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Number(54.0));
    assert!(report.failures.is_empty());
}

#[test]
fn uncoercible_values_fail_normalize() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "featherlight".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("weight")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Unknown);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, GateStage::Normalize);
    assert_eq!(report.changes.last().map(|change| change.after.as_str()), Some("unk"));
}

#[test]
fn out_of_range_values_fail_cross_validate() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "950".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("weight")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Unknown);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, GateStage::CrossValidate);
}

#[test]
fn closed_enums_reject_unknown_values() {
    let mut rules = rules_with(
        "connection",
        FieldContract {
            field_type: FieldType::Enum,
            shape: FieldShape::Scalar,
            unit: None,
            range: None,
            required_level: RequiredLevel::Expected,
            evidence: EvidenceContract::default(),
        },
    );
    rules.vocabularies.insert(
        FieldKey::new("connection"),
        EnumVocabulary {
            policy: EnumPolicy::Closed,
            canonical: vec!["wireless".to_string(), "wired".to_string()],
            aliases: BTreeMap::from([("2_4_ghz".to_string(), "wireless".to_string())]),
        },
    );
    let fields = BTreeMap::from([
        (FieldKey::new("connection"), "2.4 GHz".to_string()),
    ]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("connection")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(
        report.fields[&FieldKey::new("connection")],
        FieldValue::Text("wireless".to_string())
    );

    let fields = BTreeMap::from([(FieldKey::new("connection"), "telepathy".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("connection")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(report.fields[&FieldKey::new("connection")], FieldValue::Unknown);
    assert_eq!(report.failures[0].stage, GateStage::CrossValidate);
}

#[test]
fn list_fields_tokenize_and_deduplicate() {
    let rules = rules_with(
        "features",
        FieldContract {
            field_type: FieldType::List,
            shape: FieldShape::List,
            unit: None,
            range: None,
            required_level: RequiredLevel::Optional,
            evidence: EvidenceContract::default(),
        },
    );
    let fields =
        BTreeMap::from([(FieldKey::new("features"), "rgb; onboard memory | RGB".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("features")],
        false,
        &EvidencePack::new(),
    );
    assert_eq!(
        report.fields[&FieldKey::new("features")],
        FieldValue::Text("rgb, onboard memory".to_string())
    );
}

#[test]
fn enforced_evidence_with_empty_pack_zeroes_every_field() {
    let mut rules = rules_with("weight", number_contract(10.0, 200.0));
    rules.contracts.insert(FieldKey::new("sensor"), FieldContract::text(RequiredLevel::Expected));
    let fields = BTreeMap::from([
        (FieldKey::new("weight"), "54".to_string()),
        (FieldKey::new("sensor"), "Focus Pro 4K".to_string()),
    ]);
    let order = [FieldKey::new("weight"), FieldKey::new("sensor")];
    let report =
        run_gate(&rules, &fields, &BTreeMap::new(), &order, true, &EvidencePack::new());
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Unknown);
    assert_eq!(report.fields[&FieldKey::new("sensor")], FieldValue::Unknown);
    let evidence_failures: Vec<_> = report
        .failures
        .iter()
        .filter(|failure| failure.stage == GateStage::Evidence)
        .collect();
    assert_eq!(evidence_failures.len(), 2);
}

#[test]
fn mixed_evidence_keeps_supported_fields_only() {
    let mut rules = rules_with("weight", number_contract(10.0, 200.0));
    rules.contracts.insert(FieldKey::new("sensor"), FieldContract::text(RequiredLevel::Expected));
    let fields = BTreeMap::from([
        (FieldKey::new("weight"), "54".to_string()),
        (FieldKey::new("sensor"), "Focus Pro 4K".to_string()),
    ]);
    let mut pack = EvidencePack::new();
    pack.insert("snip-1", "example.com");
    let provenance = BTreeMap::from([(
        FieldKey::new("weight"),
        FieldProvenance {
            refs: vec![complete_ref("snip-1", "example.com")],
        },
    )]);
    let order = [FieldKey::new("weight"), FieldKey::new("sensor")];
    let report = run_gate(&rules, &fields, &provenance, &order, true, &pack);
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Number(54.0));
    assert_eq!(report.fields[&FieldKey::new("sensor")], FieldValue::Unknown);
    let evidence_failures: Vec<_> = report
        .failures
        .iter()
        .filter(|failure| failure.stage == GateStage::Evidence)
        .collect();
    assert_eq!(evidence_failures.len(), 1);
    assert_eq!(evidence_failures[0].field, FieldKey::new("sensor"));
}

#[test]
fn incomplete_provenance_fails_the_audit() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "54".to_string())]);
    let mut pack = EvidencePack::new();
    pack.insert("snip-1", "example.com");
    let mut reference = complete_ref("snip-1", "example.com");
    reference.quote = String::new();
    let provenance = BTreeMap::from([(
        FieldKey::new("weight"),
        FieldProvenance {
            refs: vec![reference],
        },
    )]);
    let report =
        run_gate(&rules, &fields, &provenance, &[FieldKey::new("weight")], true, &pack);
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Unknown);
}

#[test]
fn malformed_retrieval_timestamps_fail_the_audit() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "54".to_string())]);
    let mut pack = EvidencePack::new();
    pack.insert("snip-1", "example.com");
    let mut reference = complete_ref("snip-1", "example.com");
    reference.retrieved_at = "yesterday".to_string();
    let provenance = BTreeMap::from([(
        FieldKey::new("weight"),
        FieldProvenance {
            refs: vec![reference],
        },
    )]);
    let report =
        run_gate(&rules, &fields, &provenance, &[FieldKey::new("weight")], true, &pack);
    assert_eq!(report.fields[&FieldKey::new("weight")], FieldValue::Unknown);
}

#[test]
fn fields_zeroed_earlier_emit_no_second_evidence_failure() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    let fields = BTreeMap::from([(FieldKey::new("weight"), "featherlight".to_string())]);
    let report = run_gate(
        &rules,
        &fields,
        &BTreeMap::new(),
        &[FieldKey::new("weight")],
        true,
        &EvidencePack::new(),
    );
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].stage, GateStage::Normalize);
}

#[test]
fn unknown_placeholders_pass_without_failures() {
    let rules = rules_with("weight", number_contract(10.0, 200.0));
    for placeholder in ["", "unk", "n/a", "-", "TBD"] {
        let fields = BTreeMap::from([(FieldKey::new("weight"), placeholder.to_string())]);
        let report = run_gate(
            &rules,
            &fields,
            &BTreeMap::new(),
            &[FieldKey::new("weight")],
            true,
            &EvidencePack::new(),
        );
        assert_eq!(
            report.fields[&FieldKey::new("weight")],
            FieldValue::Unknown,
            "{placeholder}"
        );
        assert!(report.failures.is_empty(), "{placeholder}");
    }
}

#[test]
fn cross_rules_flag_violating_fields() {
    let mut rules = rules_with("min_dpi", number_contract(0.0, 100_000.0));
    rules
        .contracts
        .insert(FieldKey::new("max_dpi"), number_contract(0.0, 100_000.0));
    rules.cross_rules.push("min_dpi <= max_dpi".to_string());
    let fields = BTreeMap::from([
        (FieldKey::new("min_dpi"), "30000".to_string()),
        (FieldKey::new("max_dpi"), "26000".to_string()),
    ]);
    let order = [FieldKey::new("min_dpi"), FieldKey::new("max_dpi")];
    let report =
        run_gate(&rules, &fields, &BTreeMap::new(), &order, false, &EvidencePack::new());
    assert_eq!(report.fields[&FieldKey::new("min_dpi")], FieldValue::Unknown);
    assert!(
        report
            .failures
            .iter()
            .any(|failure| failure.stage == GateStage::CrossValidate)
    );
}

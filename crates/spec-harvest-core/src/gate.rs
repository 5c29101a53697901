// crates/spec-harvest-core/src/gate.rs
// ============================================================================
// Module: Runtime Validation Gate
// Description: Normalize, cross-validate, and evidence-audit a field batch.
// Purpose: Enforce field contracts on candidate values and zero out fields
//          whose support does not meet contract.
// Dependencies: crate::contract, crate::value, serde
// ============================================================================

//! ## Overview
//! The gate runs three stages per field, in caller-supplied order:
//! normalize (coerce to the contract type and shape), cross-validate
//! (numeric ranges, enum policy, global cross rules), and evidence audit
//! (verify provenance against the evidence pack). Every mutation appends an
//! ordered change entry; every stage failure appends a failure entry and
//! resets the field to the unknown sentinel. The gate never suspends and
//! never raises for per-field issues.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::constraints::ConstraintOutcome;
use crate::constraints::ConstraintScope;
use crate::constraints::evaluate_constraint;
use crate::contract::EnumPolicy;
use crate::contract::FieldRuleSet;
use crate::contract::FieldShape;
use crate::contract::FieldType;
use crate::identifiers::FieldKey;
use crate::value::FieldValue;
use crate::value::UNKNOWN_SENTINEL;
use crate::value::is_unknown_placeholder;
use crate::value::parse_lenient_number;
use crate::value::tokenize_list_value;

// ============================================================================
// SECTION: Gate Records
// ============================================================================

/// Pipeline stage that produced a change or failure.
///
/// # Invariants
/// - Variants are stable for persistence and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    /// Type/shape coercion.
    Normalize,
    /// Range, enum-policy, and cross-rule checks.
    CrossValidate,
    /// Provenance verification against the evidence pack.
    Evidence,
}

impl GateStage {
    /// Returns the stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::CrossValidate => "cross_validate",
            Self::Evidence => "evidence",
        }
    }
}

/// One recorded mutation of a field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateChange {
    /// Field that changed.
    pub field: FieldKey,
    /// Stage that applied the change.
    pub stage: GateStage,
    /// Rendered value before the change.
    pub before: String,
    /// Rendered value after the change.
    pub after: String,
    /// Human-readable cause.
    pub reason: String,
}

/// One recorded stage failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFailure {
    /// Field that failed.
    pub field: FieldKey,
    /// Stage that failed.
    pub stage: GateStage,
    /// Human-readable cause.
    pub reason: String,
}

/// Gate output: final values plus ordered failures and changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    /// Final per-field values after all stages.
    pub fields: BTreeMap<FieldKey, FieldValue>,
    /// One entry per stage failure.
    pub failures: Vec<GateFailure>,
    /// One entry per value mutation, in pipeline order.
    pub changes: Vec<GateChange>,
}

// ============================================================================
// SECTION: Evidence Inputs
// ============================================================================

/// One evidence reference claimed by a field's provenance.
///
/// # Invariants
/// - A reference is verifiable only when every member is non-empty and the
///   (snippet id, host) pair appears in the evidence pack.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Source page URL.
    pub url: String,
    /// Snippet identifier within the captured page.
    pub snippet_id: String,
    /// Quoted supporting text.
    pub quote: String,
    /// Source registry identifier.
    pub source_id: String,
    /// Hash of the snippet content.
    pub snippet_hash: String,
    /// RFC3339 retrieval timestamp.
    pub retrieved_at: String,
    /// Extraction method label.
    pub extraction_method: String,
    /// Host the snippet was captured from.
    pub host: String,
}

impl EvidenceRef {
    /// Returns true when every metadata member is populated and the
    /// retrieval timestamp parses as RFC3339.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !(self.url.is_empty()
            || self.snippet_id.is_empty()
            || self.quote.is_empty()
            || self.source_id.is_empty()
            || self.snippet_hash.is_empty()
            || self.extraction_method.is_empty()
            || self.host.is_empty())
            && OffsetDateTime::parse(&self.retrieved_at, &Rfc3339).is_ok()
    }
}

/// Provenance claimed for one field in the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProvenance {
    /// Evidence references supporting the field value.
    pub refs: Vec<EvidenceRef>,
}

/// Set of verifiable snippets available during the audit.
///
/// # Invariants
/// - Membership is keyed by the (snippet id, host) pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidencePack {
    /// Known (snippet id, host) pairs.
    snippets: BTreeSet<(String, String)>,
}

impl EvidencePack {
    /// Creates an empty pack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a snippet available for verification.
    pub fn insert(&mut self, snippet_id: impl Into<String>, host: impl Into<String>) {
        self.snippets.insert((snippet_id.into(), host.into()));
    }

    /// Returns true when the (snippet id, host) pair is known.
    #[must_use]
    pub fn contains(&self, snippet_id: &str, host: &str) -> bool {
        self.snippets.contains(&(snippet_id.to_string(), host.to_string()))
    }

    /// Returns true when no snippets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }
}

// ============================================================================
// SECTION: Gate Entry Point
// ============================================================================

/// Runs the three-stage gate over a raw field batch.
///
/// Fields are processed in `field_order`; fields present in `fields` but not
/// listed are processed afterwards in key order. The gate reads `rules` as
/// the per-field contract surface and never performs I/O.
#[must_use]
pub fn run_gate(
    rules: &FieldRuleSet,
    fields: &BTreeMap<FieldKey, String>,
    provenance: &BTreeMap<FieldKey, FieldProvenance>,
    field_order: &[FieldKey],
    enforce_evidence: bool,
    evidence_pack: &EvidencePack,
) -> GateReport {
    let mut report = GateReport::default();
    let mut order: Vec<FieldKey> =
        field_order.iter().filter(|field| fields.contains_key(*field)).cloned().collect();
    for field in fields.keys() {
        if !order.contains(field) {
            order.push(field.clone());
        }
    }

    for field in &order {
        let Some(raw) = fields.get(field) else {
            continue;
        };
        let mut value = normalize_field(rules, field, raw, &mut report);
        if !value.is_unknown() {
            value = cross_validate_field(rules, field, value, &mut report);
        }
        report.fields.insert(field.clone(), value);
    }

    apply_cross_rules(rules, &order, &mut report);

    for field in &order {
        let Some(current) = report.fields.get(field) else {
            continue;
        };
        if current.is_unknown() {
            continue;
        }
        let needs_audit = enforce_evidence
            || rules.contract(field).is_some_and(|contract| contract.evidence.required);
        if !needs_audit {
            continue;
        }
        if !audit_field_evidence(rules, field, provenance, evidence_pack) {
            let before = current.render();
            report.fields.insert(field.clone(), FieldValue::Unknown);
            report.changes.push(GateChange {
                field: field.clone(),
                stage: GateStage::Evidence,
                before,
                after: UNKNOWN_SENTINEL.to_string(),
                reason: "no verifiable evidence reference".to_string(),
            });
            report.failures.push(GateFailure {
                field: field.clone(),
                stage: GateStage::Evidence,
                reason: "no verifiable evidence reference".to_string(),
            });
        }
    }

    report
}

// ============================================================================
// SECTION: Stage 1: Normalize
// ============================================================================

/// Coerces a raw value to its contract type and shape.
fn normalize_field(
    rules: &FieldRuleSet,
    field: &FieldKey,
    raw: &str,
    report: &mut GateReport,
) -> FieldValue {
    let trimmed = raw.trim();
    if is_unknown_placeholder(trimmed) {
        return FieldValue::Unknown;
    }
    let Some(contract) = rules.contract(field) else {
        return FieldValue::Text(trimmed.to_string());
    };

    let coerced = match contract.field_type {
        FieldType::Number => parse_lenient_number(trimmed).map(FieldValue::Number),
        FieldType::Enum => {
            let resolved = rules
                .vocabulary(field)
                .and_then(|vocabulary| vocabulary.resolve(trimmed))
                .map(|canonical| FieldValue::Text(canonical.to_string()));
            Some(resolved.unwrap_or_else(|| FieldValue::Text(trimmed.to_string())))
        }
        FieldType::List => {
            let tokens = tokenize_list_value(trimmed);
            if tokens.is_empty() {
                None
            } else {
                Some(FieldValue::Text(tokens.join(", ")))
            }
        }
        FieldType::Text | FieldType::ComponentReference => {
            Some(FieldValue::Text(trimmed.to_string()))
        }
    };
    let coerced = match (coerced, contract.shape) {
        (Some(FieldValue::Text(text)), FieldShape::List)
            if contract.field_type != FieldType::List =>
        {
            let tokens = tokenize_list_value(&text);
            if tokens.is_empty() {
                None
            } else {
                Some(FieldValue::Text(tokens.join(", ")))
            }
        }
        (other, _) => other,
    };

    match coerced {
        Some(value) => {
            if value.render() != trimmed {
                report.changes.push(GateChange {
                    field: field.clone(),
                    stage: GateStage::Normalize,
                    before: trimmed.to_string(),
                    after: value.render(),
                    reason: "coerced to contract type".to_string(),
                });
            }
            value
        }
        None => {
            report.changes.push(GateChange {
                field: field.clone(),
                stage: GateStage::Normalize,
                before: trimmed.to_string(),
                after: UNKNOWN_SENTINEL.to_string(),
                reason: "value could not be coerced".to_string(),
            });
            report.failures.push(GateFailure {
                field: field.clone(),
                stage: GateStage::Normalize,
                reason: "value could not be coerced".to_string(),
            });
            FieldValue::Unknown
        }
    }
}

// ============================================================================
// SECTION: Stage 2: Cross-Validate
// ============================================================================

/// Applies range and enum-policy checks to a normalized value.
fn cross_validate_field(
    rules: &FieldRuleSet,
    field: &FieldKey,
    value: FieldValue,
    report: &mut GateReport,
) -> FieldValue {
    let Some(contract) = rules.contract(field) else {
        return value;
    };

    if contract.field_type == FieldType::Number
        && let Some(range) = &contract.range
        && let Some(number) = value.as_number()
        && !range.contains(number)
    {
        return fail_cross_validate(field, &value, "value outside contract range", report);
    }

    if contract.field_type == FieldType::Enum
        && let Some(vocabulary) = rules.vocabulary(field)
        && vocabulary.policy == EnumPolicy::Closed
        && vocabulary.resolve(&value.render()).is_none()
    {
        return fail_cross_validate(field, &value, "value not in closed vocabulary", report);
    }

    value
}

/// Records a cross-validation failure and zeroes the value.
fn fail_cross_validate(
    field: &FieldKey,
    value: &FieldValue,
    reason: &str,
    report: &mut GateReport,
) -> FieldValue {
    report.changes.push(GateChange {
        field: field.clone(),
        stage: GateStage::CrossValidate,
        before: value.render(),
        after: UNKNOWN_SENTINEL.to_string(),
        reason: reason.to_string(),
    });
    report.failures.push(GateFailure {
        field: field.clone(),
        stage: GateStage::CrossValidate,
        reason: reason.to_string(),
    });
    FieldValue::Unknown
}

/// Evaluates the global cross rules over the normalized field map.
///
/// A violated rule zeroes the first field it names and records one
/// cross-validate failure for it.
fn apply_cross_rules(rules: &FieldRuleSet, order: &[FieldKey], report: &mut GateReport) {
    if rules.cross_rules.is_empty() {
        return;
    }
    let mut scope = ConstraintScope::default();
    for (field, value) in &report.fields {
        scope.product_fields.insert(field.as_str().to_string(), value.render());
    }
    for rule in &rules.cross_rules {
        if evaluate_constraint(rule, &scope) != ConstraintOutcome::Violated {
            continue;
        }
        let Some(field) = order
            .iter()
            .find(|candidate| rule.contains(candidate.as_str()))
            .cloned()
        else {
            continue;
        };
        let before =
            report.fields.get(&field).map_or_else(String::new, FieldValue::render);
        report.fields.insert(field.clone(), FieldValue::Unknown);
        report.changes.push(GateChange {
            field: field.clone(),
            stage: GateStage::CrossValidate,
            before,
            after: UNKNOWN_SENTINEL.to_string(),
            reason: format!("cross rule failed: {rule}"),
        });
        report.failures.push(GateFailure {
            field,
            stage: GateStage::CrossValidate,
            reason: format!("cross rule failed: {rule}"),
        });
    }
}

// ============================================================================
// SECTION: Stage 3: Evidence Audit
// ============================================================================

/// Returns true when the field has enough verifiable evidence references.
fn audit_field_evidence(
    rules: &FieldRuleSet,
    field: &FieldKey,
    provenance: &BTreeMap<FieldKey, FieldProvenance>,
    evidence_pack: &EvidencePack,
) -> bool {
    let minimum = rules
        .contract(field)
        .map_or(1, |contract| contract.evidence.min_evidence_refs.max(1));
    let Some(claimed) = provenance.get(field) else {
        return false;
    };
    let verifiable = claimed
        .refs
        .iter()
        .filter(|reference| {
            reference.is_complete()
                && evidence_pack.contains(&reference.snippet_id, &reference.host)
        })
        .count();
    u64::try_from(verifiable).unwrap_or(u64::MAX) >= u64::from(minimum)
}

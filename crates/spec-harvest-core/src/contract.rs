// crates/spec-harvest-core/src/contract.rs
// ============================================================================
// Module: Field Contracts
// Description: Per-field typing, shape, range, and evidence requirements.
// Purpose: Describe what the runtime gate enforces for each field of a
//          category.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`FieldRuleSet`] is the engine surface handed to the runtime gate: one
//! [`FieldContract`] per field, enum vocabularies with alias resolution, and
//! an optional list of global cross-validation expressions. Rule sets are
//! loaded from category data by the caller; the gate treats them as
//! read-only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::FieldKey;
use crate::value::snake_case;

// ============================================================================
// SECTION: Contract Types
// ============================================================================

/// Declared type of a field value.
///
/// # Invariants
/// - Variants are stable for persistence in category data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Finite numeric value, optionally carrying a unit.
    Number,
    /// Free text.
    Text,
    /// Value drawn from a controlled vocabulary.
    Enum,
    /// Multi-valued field.
    List,
    /// Reference resolved against the component database.
    ComponentReference,
}

/// Declared shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldShape {
    /// Single value.
    Scalar,
    /// Delimited list of values.
    List,
}

/// Inclusive numeric bounds for a number field.
///
/// # Invariants
/// - When both bounds are present, `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    /// Inclusive lower bound.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
}

impl NumericRange {
    /// Returns true when `value` lies within the bounds.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// How strongly a field is required for a validated product record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredLevel {
    /// Nice to have.
    Optional,
    /// Expected on a complete record.
    Expected,
    /// A record without it cannot validate.
    Critical,
}

/// Evidence requirements for a field.
///
/// # Invariants
/// - `min_evidence_refs` of zero is treated as one when `required` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EvidenceContract {
    /// Whether the field always undergoes evidence audit.
    pub required: bool,
    /// Minimum verifiable evidence references.
    pub min_evidence_refs: u32,
}

/// Whether an enum vocabulary admits values outside its canonical set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumPolicy {
    /// Unknown values are accepted as-is.
    #[default]
    Open,
    /// Values must resolve to a known canonical.
    Closed,
}

/// Contract for one field.
///
/// # Invariants
/// - `range` is only meaningful for `Number` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldContract {
    /// Declared value type.
    pub field_type: FieldType,
    /// Declared value shape.
    pub shape: FieldShape,
    /// Unit label stripped during normalization.
    #[serde(default)]
    pub unit: Option<String>,
    /// Numeric bounds checked during cross-validation.
    #[serde(default)]
    pub range: Option<NumericRange>,
    /// Requirement strength.
    pub required_level: RequiredLevel,
    /// Evidence audit requirements.
    #[serde(default)]
    pub evidence: EvidenceContract,
}

impl FieldContract {
    /// Returns a text contract with the given requirement strength.
    #[must_use]
    pub const fn text(required_level: RequiredLevel) -> Self {
        Self {
            field_type: FieldType::Text,
            shape: FieldShape::Scalar,
            unit: None,
            range: None,
            required_level,
            evidence: EvidenceContract {
                required: false,
                min_evidence_refs: 0,
            },
        }
    }
}

// ============================================================================
// SECTION: Enum Vocabulary
// ============================================================================

/// Controlled vocabulary for one enum field.
///
/// # Invariants
/// - Alias keys are stored snake-cased for lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumVocabulary {
    /// Admission policy for values outside the canonical set.
    pub policy: EnumPolicy,
    /// Canonical values in presentation form.
    pub canonical: Vec<String>,
    /// Alias (snake-cased) to canonical-value mapping.
    pub aliases: BTreeMap<String, String>,
}

impl EnumVocabulary {
    /// Resolves raw text to a canonical value when known.
    ///
    /// Resolution order: exact canonical match, case-insensitive canonical
    /// match, then alias lookup on the snake-cased form.
    #[must_use]
    pub fn resolve(&self, raw: &str) -> Option<&str> {
        let trimmed = raw.trim();
        if let Some(found) = self.canonical.iter().find(|value| value.as_str() == trimmed) {
            return Some(found.as_str());
        }
        if let Some(found) =
            self.canonical.iter().find(|value| value.eq_ignore_ascii_case(trimmed))
        {
            return Some(found.as_str());
        }
        self.aliases.get(&snake_case(trimmed)).map(String::as_str)
    }
}

// ============================================================================
// SECTION: Rule Set
// ============================================================================

/// Read-only engine surface for the runtime gate.
///
/// # Invariants
/// - Fields without a contract pass through the gate untyped (text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRuleSet {
    /// Contract per field key.
    pub contracts: BTreeMap<FieldKey, FieldContract>,
    /// Enum vocabulary per enum field key.
    pub vocabularies: BTreeMap<FieldKey, EnumVocabulary>,
    /// Global cross-validation expressions over the field map.
    pub cross_rules: Vec<String>,
}

impl FieldRuleSet {
    /// Returns the contract for a field when declared.
    #[must_use]
    pub fn contract(&self, field: &FieldKey) -> Option<&FieldContract> {
        self.contracts.get(field)
    }

    /// Returns the vocabulary for a field when declared.
    #[must_use]
    pub fn vocabulary(&self, field: &FieldKey) -> Option<&EnumVocabulary> {
        self.vocabularies.get(field)
    }
}

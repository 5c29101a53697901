// crates/spec-harvest-core/src/constraints.rs
// ============================================================================
// Module: Constraint Expression Evaluator
// Description: Tiny comparison-expression evaluator for component
//              constraints.
// Purpose: Evaluate `lhs <op> rhs` expressions against component property
//          and product field maps.
// Dependencies: crate::value, serde
// ============================================================================

//! ## Overview
//! Constraint expressions are deliberately tiny: one comparison operator per
//! expression, no parentheses, no boolean connectives. Complex rules are
//! expressed as multiple independent expressions combined with AND semantics
//! by the caller. Free identifiers resolve first against the component
//! property map, then the product field map, in original and snake-case
//! forms. Unknown-value operands skip the expression.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::value::is_unknown_placeholder;
use crate::value::parse_lenient_number;
use crate::value::snake_case;

// ============================================================================
// SECTION: Operators
// ============================================================================

/// Comparison operator within a constraint expression.
///
/// # Invariants
/// - Exactly these six operators exist; the grammar must not grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOp {
    /// Less than or equal.
    Le,
    /// Greater than or equal.
    Ge,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
}

/// Operator spellings in scan order; two-character spellings first.
const OPERATOR_SPELLINGS: &[(&str, ConstraintOp)] = &[
    ("<=", ConstraintOp::Le),
    (">=", ConstraintOp::Ge),
    ("==", ConstraintOp::Eq),
    ("!=", ConstraintOp::Ne),
    ("<", ConstraintOp::Lt),
    (">", ConstraintOp::Gt),
];

// ============================================================================
// SECTION: Evaluation Outcome
// ============================================================================

/// Result of evaluating one constraint expression.
///
/// # Invariants
/// - `Skipped` covers unknown operands and unparseable expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintOutcome {
    /// Expression evaluated and held.
    Satisfied,
    /// Expression evaluated and failed.
    Violated,
    /// Expression could not be evaluated; treated as satisfied by default.
    Skipped,
}

/// Variable bindings for constraint evaluation.
///
/// Resolution order: component properties before product fields, each map
/// probed with the original identifier and its snake-case form.
#[derive(Debug, Clone, Default)]
pub struct ConstraintScope {
    /// Property values of the component under evaluation.
    pub component_properties: BTreeMap<String, String>,
    /// Field values of the linked product.
    pub product_fields: BTreeMap<String, String>,
}

impl ConstraintScope {
    /// Resolves a free identifier to its bound value text.
    #[must_use]
    fn resolve(&self, identifier: &str) -> Option<&str> {
        let normalized = snake_case(identifier);
        for map in [&self.component_properties, &self.product_fields] {
            if let Some(value) = map.get(identifier) {
                return Some(value.as_str());
            }
            if let Some(value) = map.get(&normalized) {
                return Some(value.as_str());
            }
        }
        None
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Evaluates one constraint expression against the given scope.
///
/// Operands are resolved as variables when bound, otherwise treated as
/// literals. Numeric comparison applies when both sides parse as numbers;
/// otherwise the comparison is case-insensitive on strings. An unknown
/// placeholder on either side skips the expression.
#[must_use]
pub fn evaluate_constraint(expression: &str, scope: &ConstraintScope) -> ConstraintOutcome {
    let Some((lhs_raw, op, rhs_raw)) = split_expression(expression) else {
        return ConstraintOutcome::Skipped;
    };
    let Some(lhs) = resolve_operand(lhs_raw, scope) else {
        return ConstraintOutcome::Skipped;
    };
    let Some(rhs) = resolve_operand(rhs_raw, scope) else {
        return ConstraintOutcome::Skipped;
    };
    let held = match (parse_lenient_number(&lhs), parse_lenient_number(&rhs)) {
        (Some(left), Some(right)) => compare_numbers(op, left, right),
        _ => compare_strings(op, &lhs, &rhs),
    };
    if held {
        ConstraintOutcome::Satisfied
    } else {
        ConstraintOutcome::Violated
    }
}

/// Evaluates a constraint list with AND semantics.
///
/// Returns `Violated` if any expression fails, `Skipped` if every expression
/// skipped, `Satisfied` otherwise.
#[must_use]
pub fn evaluate_constraints(
    expressions: &[String],
    scope: &ConstraintScope,
) -> ConstraintOutcome {
    let mut any_satisfied = false;
    for expression in expressions {
        match evaluate_constraint(expression, scope) {
            ConstraintOutcome::Violated => return ConstraintOutcome::Violated,
            ConstraintOutcome::Satisfied => any_satisfied = true,
            ConstraintOutcome::Skipped => {}
        }
    }
    if any_satisfied {
        ConstraintOutcome::Satisfied
    } else {
        ConstraintOutcome::Skipped
    }
}

/// Splits an expression into (lhs, operator, rhs) at the first operator.
fn split_expression(expression: &str) -> Option<(&str, ConstraintOp, &str)> {
    for (spelling, op) in OPERATOR_SPELLINGS {
        if let Some(position) = expression.find(spelling) {
            let lhs = expression[.. position].trim();
            let rhs = expression[position + spelling.len() ..].trim();
            if lhs.is_empty() || rhs.is_empty() {
                return None;
            }
            return Some((lhs, *op, rhs));
        }
    }
    None
}

/// Resolves an operand to value text; `None` means skip the expression.
fn resolve_operand(raw: &str, scope: &ConstraintScope) -> Option<String> {
    let resolved = scope.resolve(raw).map_or_else(|| raw.to_string(), ToString::to_string);
    if is_unknown_placeholder(&resolved) {
        return None;
    }
    Some(resolved)
}

/// Applies a comparison operator to two finite numbers.
fn compare_numbers(op: ConstraintOp, left: f64, right: f64) -> bool {
    match op {
        ConstraintOp::Le => left <= right,
        ConstraintOp::Ge => left >= right,
        ConstraintOp::Lt => left < right,
        ConstraintOp::Gt => left > right,
        ConstraintOp::Eq => (left - right).abs() < f64::EPSILON,
        ConstraintOp::Ne => (left - right).abs() >= f64::EPSILON,
    }
}

/// Applies a comparison operator to two strings, case-insensitively.
fn compare_strings(op: ConstraintOp, left: &str, right: &str) -> bool {
    let left = left.to_ascii_lowercase();
    let right = right.to_ascii_lowercase();
    match op {
        ConstraintOp::Le => left <= right,
        ConstraintOp::Ge => left >= right,
        ConstraintOp::Lt => left < right,
        ConstraintOp::Gt => left > right,
        ConstraintOp::Eq => left == right,
        ConstraintOp::Ne => left != right,
    }
}

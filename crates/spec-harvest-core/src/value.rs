// crates/spec-harvest-core/src/value.rs
// ============================================================================
// Module: Spec Harvest Value Model
// Description: Heterogeneous scalar field values and the unknown sentinel.
// Purpose: Provide one canonical value representation comparable across all
//          call sites, with lenient coercion helpers.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Component properties and product field values are heterogeneous scalars.
//! This module models them as a tagged sum with a single canonical unknown
//! sentinel (`"unk"`), plus the parsing helpers shared by the runtime gate,
//! the cascade engine, and the constraint evaluator: placeholder detection,
//! lenient numeric parsing, snake-case normalization, and multi-value
//! tokenization.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonical sentinel stored in place of a missing or failed value.
pub const UNKNOWN_SENTINEL: &str = "unk";

/// Placeholder spellings treated as unknown, compared case-insensitively.
const UNKNOWN_PLACEHOLDERS: &[&str] =
    &["", "unk", "unknown", "n/a", "na", "-", "--", "tbd", "tbc", "none"];

/// Delimiters splitting a multi-valued field into list tokens.
const LIST_DELIMITERS: &[char] = &[',', ';', '|', '/'];

// ============================================================================
// SECTION: Field Values
// ============================================================================

/// One heterogeneous scalar value for a field or component property.
///
/// # Invariants
/// - `Unknown` renders as the canonical sentinel [`UNKNOWN_SENTINEL`].
/// - `Number` never holds NaN or infinities; coercion rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Finite numeric value.
    Number(f64),
    /// Free-text value.
    Text(String),
    /// Boolean value.
    Bool(bool),
    /// Missing or failed value.
    Unknown,
}

impl FieldValue {
    /// Coerces raw text into a value, mapping placeholders to `Unknown`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_unknown_placeholder(trimmed) {
            return Self::Unknown;
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" => return Self::Bool(true),
            "false" | "no" => return Self::Bool(false),
            _ => {}
        }
        parse_lenient_number(trimmed)
            .map_or_else(|| Self::Text(trimmed.to_string()), Self::Number)
    }

    /// Converts a JSON scalar into a value; arrays and objects are unknown.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Unknown,
            Value::Bool(flag) => Self::Bool(*flag),
            Value::Number(number) => number
                .as_f64()
                .filter(|parsed| parsed.is_finite())
                .map_or(Self::Unknown, Self::Number),
            Value::String(text) => Self::from_raw(text),
            Value::Array(_) | Value::Object(_) => Self::Unknown,
        }
    }

    /// Returns true when the value is the unknown sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Returns the numeric form when the value parses as a finite number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(text) => parse_lenient_number(text),
            Self::Bool(_) | Self::Unknown => None,
        }
    }

    /// Renders the canonical storage text for the value.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Number(value) => render_number(*value),
            Self::Text(text) => text.clone(),
            Self::Bool(flag) => flag.to_string(),
            Self::Unknown => UNKNOWN_SENTINEL.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Renders a number without a trailing `.0` for integral values.
fn render_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Returns true when the trimmed text is a canonical unknown placeholder.
#[must_use]
pub fn is_unknown_placeholder(text: &str) -> bool {
    let trimmed = text.trim();
    UNKNOWN_PLACEHOLDERS.iter().any(|placeholder| trimmed.eq_ignore_ascii_case(placeholder))
}

/// Parses a number leniently: commas and whitespace are stripped, trailing
/// unit characters are ignored.
#[must_use]
pub fn parse_lenient_number(text: &str) -> Option<f64> {
    let cleaned: String =
        text.chars().filter(|ch| *ch != ',' && !ch.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }
    let numeric_len = cleaned
        .char_indices()
        .take_while(|(index, ch)| {
            ch.is_ascii_digit()
                || *ch == '.'
                || (*index == 0 && (*ch == '-' || *ch == '+'))
        })
        .map(|(index, ch)| index + ch.len_utf8())
        .last()?;
    let numeric = &cleaned[.. numeric_len];
    if !numeric.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }
    numeric.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Normalizes a key to snake case: lowercased, runs of non-alphanumerics
/// collapsed to single underscores.
#[must_use]
pub fn snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_separator = false;
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }
    out
}

/// Splits a multi-valued field into trimmed, de-duplicated tokens.
///
/// The delimiter set is fixed; unknown placeholders yield no tokens.
#[must_use]
pub fn tokenize_list_value(value: &str) -> Vec<String> {
    if is_unknown_placeholder(value) {
        return Vec::new();
    }
    let mut tokens = Vec::new();
    for raw_token in value.split(LIST_DELIMITERS) {
        let token = raw_token.trim();
        if token.is_empty() || is_unknown_placeholder(token) {
            continue;
        }
        if !tokens.iter().any(|existing: &String| existing.eq_ignore_ascii_case(token)) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

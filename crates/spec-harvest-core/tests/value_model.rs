// crates/spec-harvest-core/tests/value_model.rs
// ============================================================================
// Module: Value Model Unit Tests
// Description: Sentinel handling, lenient parsing, and tokenization tests.
// Purpose: Pin the coercion helpers shared across the engine.
// ============================================================================

//! Unit tests for the heterogeneous value model.

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

use spec_harvest_core::FieldValue;
use spec_harvest_core::UNKNOWN_SENTINEL;
use spec_harvest_core::is_unknown_placeholder;
use spec_harvest_core::parse_lenient_number;
use spec_harvest_core::snake_case;
use spec_harvest_core::tokenize_list_value;

#[test]
fn unknown_placeholders_are_detected() {
    for placeholder in ["", "  ", "unk", "UNK", "Unknown", "n/a", "NA", "-", "--", "tbd"] {
        assert!(is_unknown_placeholder(placeholder), "{placeholder:?}");
    }
    assert!(!is_unknown_placeholder("54"));
    assert!(!is_unknown_placeholder("none at all"));
}

#[test]
fn lenient_parse_strips_commas_whitespace_and_units() {
    assert_eq!(parse_lenient_number("1,200"), Some(1_200.0));
    assert_eq!(parse_lenient_number(" 54 g"), Some(54.0));
    assert_eq!(parse_lenient_number("26000dpi"), Some(26_000.0));
    assert_eq!(parse_lenient_number("-3.5"), Some(-3.5));
    assert_eq!(parse_lenient_number("+7"), Some(7.0));
}

#[test]
fn lenient_parse_rejects_non_numbers() {
    assert_eq!(parse_lenient_number("featherlight"), None);
    assert_eq!(parse_lenient_number(""), None);
    assert_eq!(parse_lenient_number("g54"), None);
    assert_eq!(parse_lenient_number("1.2.3"), None);
}

#[test]
fn from_raw_coerces_by_shape() {
    assert_eq!(FieldValue::from_raw("54"), FieldValue::Number(54.0));
    assert_eq!(FieldValue::from_raw("true"), FieldValue::Bool(true));
    assert_eq!(FieldValue::from_raw("No"), FieldValue::Bool(false));
    assert_eq!(FieldValue::from_raw("unk"), FieldValue::Unknown);
    assert_eq!(
        FieldValue::from_raw("PixArt PAW3395"),
        FieldValue::Text("PixArt PAW3395".to_string())
    );
}

#[test]
fn unknown_renders_the_sentinel() {
    assert_eq!(FieldValue::Unknown.render(), UNKNOWN_SENTINEL);
    assert_eq!(FieldValue::Number(54.0).render(), "54");
    assert_eq!(FieldValue::Number(3.5).render(), "3.5");
}

#[test]
fn snake_case_collapses_separators() {
    assert_eq!(snake_case("Max DPI"), "max_dpi");
    assert_eq!(snake_case("2.4 GHz"), "2_4_ghz");
    assert_eq!(snake_case("polling-rate"), "polling_rate");
    assert_eq!(snake_case("  weird   spacing "), "weird_spacing");
}

#[test]
fn tokenizer_splits_on_the_fixed_delimiter_set() {
    assert_eq!(
        tokenize_list_value("a, b; c | d / e"),
        vec!["a", "b", "c", "d", "e"]
    );
}

#[test]
fn tokenizer_deduplicates_case_insensitively() {
    assert_eq!(tokenize_list_value("RGB, rgb, Rgb"), vec!["RGB"]);
}

#[test]
fn tokenizer_drops_placeholders_and_blanks() {
    assert_eq!(tokenize_list_value("a,, unk, -, b"), vec!["a", "b"]);
    assert!(tokenize_list_value("n/a").is_empty());
    assert!(tokenize_list_value("").is_empty());
}

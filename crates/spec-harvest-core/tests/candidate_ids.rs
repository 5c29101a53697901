// crates/spec-harvest-core/tests/candidate_ids.rs
// ============================================================================
// Module: Candidate Identifier Unit Tests
// Description: Determinism and prefix tests for candidate-id constructors.
// Purpose: Pin the deterministic id scheme and origin-recoverable prefixes.
// ============================================================================

//! Unit tests for deterministic candidate-id construction.

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

use spec_harvest_core::Category;
use spec_harvest_core::ComponentType;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::PropertyKey;
use spec_harvest_core::identifiers;
use spec_harvest_core::identifiers::ScopedItemAttrs;

#[test]
fn synthetic_grid_item_is_deterministic() {
    let product = ProductId::new("mouse-logitech-g-pro-x-superlight-2");
    let sensor = FieldKey::new("sensor");
    let first = identifiers::synthetic_grid_item(&product, &sensor, "PixArt PAW3395");
    let second = identifiers::synthetic_grid_item(&product, &sensor, "PixArt PAW3395");
    assert_eq!(first, second);

    let dpi = FieldKey::new("dpi");
    let other = identifiers::synthetic_grid_item(&product, &dpi, "PixArt PAW3395");
    assert_ne!(first, other);

    assert!(first.as_str().starts_with("pl-grid_"));
    assert!(other.as_str().starts_with("pl-grid_"));
}

#[test]
fn every_constructor_carries_its_prefix() {
    let category = Category::new("mouse");
    let product = ProductId::new("p1");
    let field = FieldKey::new("weight");
    let component_type = ComponentType::new("sensor");
    let property = PropertyKey::new("max_dpi");

    assert!(
        identifiers::scoped_item(&product, &field, "raw-1").as_str().starts_with("item-source_")
    );
    assert!(
        identifiers::manual_override_item(&category, &product, &field, "54", "https://a", "q")
            .as_str()
            .starts_with("manual-item_")
    );
    assert!(
        identifiers::workbook_field_override_item(&product, &field, "54")
            .as_str()
            .starts_with("wb-item_")
    );
    assert!(
        identifiers::synthetic_grid_attribute(&product, &field, "unit", "g")
            .as_str()
            .starts_with("pl-grid-attr_")
    );
    assert!(
        identifiers::synthetic_component(&component_type, "PAW3395", &property, "26000")
            .as_str()
            .starts_with("pl-comp_")
    );
    assert!(identifiers::pipeline_enum(&field, "wireless").as_str().starts_with("pl-enum_"));
}

#[test]
fn changing_any_attribute_changes_the_id() {
    let category = Category::new("mouse");
    let product = ProductId::new("p1");
    let field = FieldKey::new("weight");
    let base =
        identifiers::manual_override_item(&category, &product, &field, "54", "https://a", "q");
    let changed_value =
        identifiers::manual_override_item(&category, &product, &field, "55", "https://a", "q");
    let changed_url =
        identifiers::manual_override_item(&category, &product, &field, "54", "https://b", "q");
    let changed_quote =
        identifiers::manual_override_item(&category, &product, &field, "54", "https://a", "r");
    assert_ne!(base, changed_value);
    assert_ne!(base, changed_url);
    assert_ne!(base, changed_quote);
}

#[test]
fn scoped_item_attrs_distinguish_index_and_run() {
    let product = ProductId::new("p1");
    let field = FieldKey::new("sensor");
    let base = ScopedItemAttrs {
        value: "PAW3395",
        source_host: "example.com",
        source_method: "dom",
        index: 0,
        run_id: "run-1",
    };
    let first = identifiers::scoped_item_from_attrs(&product, &field, &base);
    let second = identifiers::scoped_item_from_attrs(
        &product,
        &field,
        &ScopedItemAttrs {
            index: 1,
            ..base
        },
    );
    let third = identifiers::scoped_item_from_attrs(
        &product,
        &field,
        &ScopedItemAttrs {
            run_id: "run-2",
            ..base
        },
    );
    assert_ne!(first, second);
    assert_ne!(first, third);
    assert_ne!(second, third);
}

#[test]
fn separator_prevents_attribute_bleed() {
    let product = ProductId::new("p1");
    let field = FieldKey::new("f");
    let joined = identifiers::synthetic_grid_item(&product, &field, "ab");
    let product_longer = ProductId::new("p1f");
    let field_shorter = FieldKey::new("");
    let shifted = identifiers::synthetic_grid_item(&product_longer, &field_shorter, "ab");
    assert_ne!(joined, shifted);
}

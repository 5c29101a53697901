// crates/spec-harvest-core/src/identifiers.rs
// ============================================================================
// Module: Spec Harvest Identifiers
// Description: Canonical opaque identifiers for categories, products, fields,
//              and candidates.
// Purpose: Provide strongly typed, serializable identifiers with stable wire
//          forms plus deterministic candidate-id construction.
// Dependencies: serde, sha2
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Spec
//! Harvest. Identifiers are opaque and serialize as plain strings on the
//! wire. Candidate identifiers are deterministic: each constructor digests a
//! fixed attribute tuple, so identical attributes always produce the same id
//! and the origin of an id is recoverable from its prefix.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Declares an opaque string identifier newtype in the canonical form.
macro_rules! string_identifier {
    ($(#[$docs:meta])* $name:ident) => {
        $(#[$docs])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the given value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_identifier! {
    /// Category token scoping every persisted row (e.g. `"mouse"`).
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; cross-category lookups are never permitted.
    Category
}

string_identifier! {
    /// Product identifier unique within a category.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization is applied by this type.
    ProductId
}

string_identifier! {
    /// Field key naming one attribute of a product (e.g. `"sensor"`).
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; snake-case normalization happens at lookup
    ///   sites, never inside this type.
    FieldKey
}

string_identifier! {
    /// Candidate identifier for one observed value assertion.
    ///
    /// # Invariants
    /// - Deterministic: produced only by the constructors in this module or
    ///   carried through from seed artifacts.
    CandidateId
}

string_identifier! {
    /// Source registry identifier for one (product, host, run) capture.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization is applied by this type.
    SourceId
}

string_identifier! {
    /// Harvest run identifier.
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization is applied by this type.
    RunId
}

string_identifier! {
    /// Lowercased host name of a fetch target.
    ///
    /// # Invariants
    /// - Callers lowercase before construction; this type does not normalize.
    Host
}

string_identifier! {
    /// Component type token (e.g. `"sensor"`, `"switch"`).
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; no normalization is applied by this type.
    ComponentType
}

string_identifier! {
    /// Property key on a component (e.g. `"max_dpi"`).
    ///
    /// # Invariants
    /// - Opaque UTF-8 string; snake-case normalization happens at lookup
    ///   sites, never inside this type.
    PropertyKey
}

// ============================================================================
// SECTION: Candidate Id Constructors
// ============================================================================

/// Prefix for candidate ids scoped from raw extraction output.
pub const SCOPED_ITEM_PREFIX: &str = "item-source_";
/// Prefix for manual per-product override candidate ids.
pub const MANUAL_OVERRIDE_ITEM_PREFIX: &str = "manual-item_";
/// Prefix for workbook field-override candidate ids.
pub const WORKBOOK_FIELD_OVERRIDE_PREFIX: &str = "wb-item_";
/// Prefix for synthetic grid candidate ids.
pub const SYNTHETIC_GRID_ITEM_PREFIX: &str = "pl-grid_";
/// Prefix for synthetic grid-attribute candidate ids.
pub const SYNTHETIC_GRID_ATTRIBUTE_PREFIX: &str = "pl-grid-attr_";
/// Prefix for synthetic component-property candidate ids.
pub const SYNTHETIC_COMPONENT_PREFIX: &str = "pl-comp_";
/// Prefix for pipeline enum-suggestion candidate ids.
pub const PIPELINE_ENUM_PREFIX: &str = "pl-enum_";

/// Number of hex digest characters appended after a candidate-id prefix.
const CANDIDATE_DIGEST_CHARS: usize = 16;

/// Joins attribute parts with a non-printing separator and digests them.
fn digest_parts(prefix: &str, parts: &[&str]) -> CandidateId {
    let mut hasher = Sha256::new();
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            hasher.update([0x1f_u8]);
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let mut id = String::with_capacity(prefix.len() + CANDIDATE_DIGEST_CHARS);
    id.push_str(prefix);
    for byte in digest.iter().take(CANDIDATE_DIGEST_CHARS / 2) {
        id.push_str(&format!("{byte:02x}"));
    }
    CandidateId::new(id)
}

/// Raw provenance attributes used when an extractor did not assign an id.
///
/// # Invariants
/// - `index` is the candidate's position within its source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedItemAttrs<'a> {
    /// Observed value text.
    pub value: &'a str,
    /// Host the value was extracted from.
    pub source_host: &'a str,
    /// Extraction method label.
    pub source_method: &'a str,
    /// Candidate position within the source page.
    pub index: usize,
    /// Harvest run identifier.
    pub run_id: &'a str,
}

/// Builds a scoped item candidate id from a raw extractor-assigned id.
#[must_use]
pub fn scoped_item(product_id: &ProductId, field_key: &FieldKey, raw_id: &str) -> CandidateId {
    digest_parts(SCOPED_ITEM_PREFIX, &[product_id.as_str(), field_key.as_str(), raw_id])
}

/// Builds a scoped item candidate id when the extractor assigned no id.
#[must_use]
pub fn scoped_item_from_attrs(
    product_id: &ProductId,
    field_key: &FieldKey,
    attrs: &ScopedItemAttrs<'_>,
) -> CandidateId {
    let index = attrs.index.to_string();
    digest_parts(
        SCOPED_ITEM_PREFIX,
        &[
            product_id.as_str(),
            field_key.as_str(),
            attrs.value,
            attrs.source_host,
            attrs.source_method,
            index.as_str(),
            attrs.run_id,
        ],
    )
}

/// Builds a manual per-product override candidate id.
#[must_use]
pub fn manual_override_item(
    category: &Category,
    product_id: &ProductId,
    field_key: &FieldKey,
    value: &str,
    evidence_url: &str,
    evidence_quote: &str,
) -> CandidateId {
    digest_parts(
        MANUAL_OVERRIDE_ITEM_PREFIX,
        &[
            category.as_str(),
            product_id.as_str(),
            field_key.as_str(),
            value,
            evidence_url,
            evidence_quote,
        ],
    )
}

/// Builds a workbook field-override candidate id.
#[must_use]
pub fn workbook_field_override_item(
    product_id: &ProductId,
    field_key: &FieldKey,
    value: &str,
) -> CandidateId {
    digest_parts(
        WORKBOOK_FIELD_OVERRIDE_PREFIX,
        &[product_id.as_str(), field_key.as_str(), value],
    )
}

/// Builds a synthetic grid candidate id.
#[must_use]
pub fn synthetic_grid_item(
    product_id: &ProductId,
    field_key: &FieldKey,
    value: &str,
) -> CandidateId {
    digest_parts(SYNTHETIC_GRID_ITEM_PREFIX, &[product_id.as_str(), field_key.as_str(), value])
}

/// Builds a synthetic grid-attribute candidate id.
#[must_use]
pub fn synthetic_grid_attribute(
    product_id: &ProductId,
    field_key: &FieldKey,
    attribute_key: &str,
    value: &str,
) -> CandidateId {
    digest_parts(
        SYNTHETIC_GRID_ATTRIBUTE_PREFIX,
        &[product_id.as_str(), field_key.as_str(), attribute_key, value],
    )
}

/// Builds a synthetic component-property candidate id.
#[must_use]
pub fn synthetic_component(
    component_type: &ComponentType,
    component_name: &str,
    property_key: &PropertyKey,
    value: &str,
) -> CandidateId {
    digest_parts(
        SYNTHETIC_COMPONENT_PREFIX,
        &[component_type.as_str(), component_name, property_key.as_str(), value],
    )
}

/// Builds a pipeline enum-suggestion candidate id.
#[must_use]
pub fn pipeline_enum(field_key: &FieldKey, value: &str) -> CandidateId {
    digest_parts(PIPELINE_ENUM_PREFIX, &[field_key.as_str(), value])
}

// crates/spec-harvest-core/src/component.rs
// ============================================================================
// Module: Component Domain Types
// Description: Variance policies, review status ranks, and link match types.
// Purpose: Share component vocabulary between the store, the cascade engine,
//          and the seeder.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A component identity names one physical part model; its property values
//! carry a variance policy describing how far a linked product's field may
//! deviate. Review status ranks order collision resolution during identity
//! merges. Link match types record how a product field resolved to an
//! identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Variance Policy
// ============================================================================

/// How a linked product's field value may deviate from a component property.
///
/// # Invariants
/// - Variants are stable for persistence in seed artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariancePolicy {
    /// Linked products must match; the component value is pushed.
    #[default]
    Authoritative,
    /// Product values above the component value violate.
    UpperBound,
    /// Product values below the component value violate.
    LowerBound,
    /// Product values outside a 10% band around the component value violate.
    Range,
}

impl VariancePolicy {
    /// Returns the stable label for the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::UpperBound => "upper_bound",
            Self::LowerBound => "lower_bound",
            Self::Range => "range",
        }
    }

    /// Parses a stable label back into a policy.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentParseError`] when the label is unknown.
    pub fn parse(label: &str) -> Result<Self, ComponentParseError> {
        match label {
            "authoritative" => Ok(Self::Authoritative),
            "upper_bound" => Ok(Self::UpperBound),
            "lower_bound" => Ok(Self::LowerBound),
            "range" => Ok(Self::Range),
            other => Err(ComponentParseError::UnknownVariancePolicy(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Review Status
// ============================================================================

/// Review status of a component identity or property value.
///
/// # Invariants
/// - Ranking is `Confirmed > Accepted > Pending`; merges keep the higher
///   ranked side on property collisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Not yet reviewed.
    #[default]
    Pending,
    /// Accepted by an automated reviewer.
    Accepted,
    /// Confirmed by a human.
    Confirmed,
}

impl ReviewStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Confirmed => "confirmed",
        }
    }

    /// Parses a stable label back into a status.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentParseError`] when the label is unknown.
    pub fn parse(label: &str) -> Result<Self, ComponentParseError> {
        match label {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "confirmed" => Ok(Self::Confirmed),
            other => Err(ComponentParseError::UnknownReviewStatus(other.to_string())),
        }
    }

    /// Returns the collision-resolution rank; higher wins.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Accepted => 1,
            Self::Confirmed => 2,
        }
    }
}

// ============================================================================
// SECTION: Link Match Type
// ============================================================================

/// How a product field resolved to a component identity.
///
/// # Invariants
/// - Variants are stable for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMatchType {
    /// Canonical name matched exactly.
    Exact,
    /// An alias matched.
    Alias,
    /// A fuzzy match above threshold.
    Fuzzy,
    /// No identity resolved; link is provisional.
    Unresolved,
}

impl LinkMatchType {
    /// Returns the stable label for the match type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
            Self::Unresolved => "unresolved",
        }
    }

    /// Parses a stable label back into a match type.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentParseError`] when the label is unknown.
    pub fn parse(label: &str) -> Result<Self, ComponentParseError> {
        match label {
            "exact" => Ok(Self::Exact),
            "alias" => Ok(Self::Alias),
            "fuzzy" => Ok(Self::Fuzzy),
            "unresolved" => Ok(Self::Unresolved),
            other => Err(ComponentParseError::UnknownMatchType(other.to_string())),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors parsing persisted component vocabulary labels.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComponentParseError {
    /// Variance policy label was not recognized.
    #[error("unknown variance policy: {0}")]
    UnknownVariancePolicy(String),
    /// Review status label was not recognized.
    #[error("unknown review status: {0}")]
    UnknownReviewStatus(String),
    /// Link match type label was not recognized.
    #[error("unknown link match type: {0}")]
    UnknownMatchType(String),
}

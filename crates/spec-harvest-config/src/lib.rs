// crates/spec-harvest-config/src/lib.rs
// ============================================================================
// Module: Spec Harvest Config
// Description: Canonical configuration model with validation.
// Purpose: Resolve harvest options from defaults and TOML, including the
//          dynamic per-host fetch policy map.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Every option is optional with a documented default. Dynamic fetch
//! policies are keyed by host; a subdomain lookup falls back to the closest
//! registered parent domain, and a zero numeric override means "inherit the
//! global default for that field". Validation fails closed on nonsensical
//! values.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Configuration file failed to parse.
    #[error("config parse error: {0}")]
    Parse(String),
    /// A configured value failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Dynamic Fetch Policy
// ============================================================================

/// Per-host override of fetch pacing and timeout.
///
/// # Invariants
/// - A zero numeric field means "inherit the global default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFetchPolicy {
    /// Minimum milliseconds between fetch starts against the host.
    #[serde(default)]
    pub per_host_min_delay_ms: u64,
    /// Page navigation timeout in milliseconds.
    #[serde(default)]
    pub page_goto_timeout_ms: u64,
}

/// Fully-resolved pacing and timeout for one host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFetchPolicy {
    /// Minimum milliseconds between fetch starts against the host.
    pub per_host_min_delay_ms: u64,
    /// Page navigation timeout in milliseconds.
    pub page_goto_timeout_ms: u64,
}

// ============================================================================
// SECTION: Harvest Config
// ============================================================================

/// Canonical configuration for the harvesting engine.
///
/// # Invariants
/// - Global numeric fields are positive after validation.
/// - Dynamic policy keys are lowercased host names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Root for category seed data.
    pub helper_files_root: String,
    /// Root for per-product artifacts when storage is local.
    pub local_output_root: String,
    /// Whether queue mutations also write the JSON snapshot.
    pub queue_json_write: bool,
    /// Host cooldown base after a 429, in seconds.
    pub frontier_cooldown_429_base_seconds: u32,
    /// Host cooldown base after a 403, in seconds.
    pub frontier_cooldown_403_base_seconds: u32,
    /// Global minimum milliseconds between fetch starts per host.
    pub per_host_min_delay_ms: u64,
    /// Global page navigation timeout in milliseconds.
    pub page_goto_timeout_ms: u64,
    /// Per-host overrides of delay and timeout.
    pub dynamic_fetch_policy_map: BTreeMap<String, DynamicFetchPolicy>,
    /// Whether a missing constraint operand flags the product for review
    /// instead of skipping the expression.
    pub constraint_missing_operand_flags_review: bool,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            helper_files_root: "helper_files".to_string(),
            local_output_root: "out".to_string(),
            queue_json_write: false,
            frontier_cooldown_429_base_seconds: 60,
            frontier_cooldown_403_base_seconds: 60,
            per_host_min_delay_ms: 900,
            page_goto_timeout_ms: 30_000,
            dynamic_fetch_policy_map: BTreeMap::new(),
            constraint_missing_operand_flags_review: false,
        }
    }
}

impl HarvestConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw =
            std::fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        Self::from_toml_str(&raw)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(raw).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configured values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on empty roots or zero globals.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.helper_files_root.is_empty() {
            return Err(ConfigError::Invalid("helper_files_root must not be empty".to_string()));
        }
        if self.local_output_root.is_empty() {
            return Err(ConfigError::Invalid("local_output_root must not be empty".to_string()));
        }
        if self.frontier_cooldown_429_base_seconds == 0 {
            return Err(ConfigError::Invalid(
                "frontier_cooldown_429_base_seconds must be greater than zero".to_string(),
            ));
        }
        if self.frontier_cooldown_403_base_seconds == 0 {
            return Err(ConfigError::Invalid(
                "frontier_cooldown_403_base_seconds must be greater than zero".to_string(),
            ));
        }
        if self.per_host_min_delay_ms == 0 {
            return Err(ConfigError::Invalid(
                "per_host_min_delay_ms must be greater than zero".to_string(),
            ));
        }
        if self.page_goto_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "page_goto_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for key in self.dynamic_fetch_policy_map.keys() {
            if key.is_empty() {
                return Err(ConfigError::Invalid(
                    "dynamic_fetch_policy_map keys must not be empty".to_string(),
                ));
            }
            if *key != key.to_ascii_lowercase() {
                return Err(ConfigError::Invalid(format!(
                    "dynamic_fetch_policy_map key must be lowercase: {key}"
                )));
            }
        }
        Ok(())
    }

    /// Resolves the fetch policy for a host.
    ///
    /// Lookup tries the exact host, then each parent domain from closest to
    /// furthest. Zero override fields inherit the global defaults.
    #[must_use]
    pub fn resolve_fetch_policy(&self, host: &str) -> ResolvedFetchPolicy {
        let lowered = host.to_ascii_lowercase();
        let override_policy = self.lookup_policy(&lowered);
        let per_host_min_delay_ms = override_policy
            .map(|policy| policy.per_host_min_delay_ms)
            .filter(|value| *value > 0)
            .unwrap_or(self.per_host_min_delay_ms);
        let page_goto_timeout_ms = override_policy
            .map(|policy| policy.page_goto_timeout_ms)
            .filter(|value| *value > 0)
            .unwrap_or(self.page_goto_timeout_ms);
        ResolvedFetchPolicy {
            per_host_min_delay_ms,
            page_goto_timeout_ms,
        }
    }

    /// Finds the closest registered policy for a host or parent domain.
    fn lookup_policy(&self, host: &str) -> Option<DynamicFetchPolicy> {
        if let Some(policy) = self.dynamic_fetch_policy_map.get(host) {
            return Some(*policy);
        }
        let mut remainder = host;
        while let Some(dot) = remainder.find('.') {
            remainder = &remainder[dot + 1 ..];
            if !remainder.contains('.') {
                break;
            }
            if let Some(policy) = self.dynamic_fetch_policy_map.get(remainder) {
                return Some(*policy);
            }
        }
        None
    }
}

// crates/spec-harvest-seeder/src/component_stage.rs
// ============================================================================
// Module: Component Seeding
// Description: Load component databases and component overrides.
// Purpose: Populate identities, aliases, property values, and synthetic
//          component candidates from generated artifacts.
// Dependencies: spec-harvest-core, spec-harvest-store, crate
// ============================================================================

//! ## Overview
//! Component databases live at
//! `<helper_root>/<category>/_generated/component_db/<type>.json`; overrides
//! at `<helper_root>/<category>/_overrides/components/*.json`. Every entry
//! upserts its identity and aliases, one property value per property (with
//! variance policy and constraints), and one synthetic candidate per
//! property so component values stay traceable like extracted ones.
//! Synthetic component candidates scope their product column with a
//! `component:` prefix since they belong to no product.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use spec_harvest_core::ComponentType;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::PropertyKey;
use spec_harvest_core::ReviewStatus;
use spec_harvest_core::VariancePolicy;
use spec_harvest_core::identifiers::synthetic_component;
use spec_harvest_store::CandidateRecord;
use spec_harvest_store::ComponentKey;
use spec_harvest_store::ComponentValueUpsert;
use spec_harvest_store::SpecDb;

use crate::SeedError;
use crate::SeedReport;
use crate::Seeder;

// ============================================================================
// SECTION: Artifact Shapes
// ============================================================================

/// One generated component database file.
#[derive(Debug, Deserialize)]
struct ComponentDbFile {
    /// Component type token.
    component_type: String,
    /// Entries keyed by internal id.
    #[serde(default)]
    entries: BTreeMap<String, ComponentDbEntry>,
}

/// One component entry within a database file.
#[derive(Debug, Deserialize)]
struct ComponentDbEntry {
    /// Canonical part-model name.
    canonical_name: String,
    /// Maker name.
    #[serde(default)]
    maker: String,
    /// Free-text aliases resolving to the identity.
    #[serde(default)]
    aliases: Vec<String>,
    /// Property values keyed by property name.
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    /// Variance policy per property.
    #[serde(rename = "__variance_policies", default)]
    variance_policies: BTreeMap<String, String>,
    /// Constraint expressions per property.
    #[serde(rename = "__constraints", default)]
    constraints: BTreeMap<String, Vec<String>>,
}

/// One component override file.
#[derive(Debug, Deserialize)]
struct ComponentOverrideFile {
    /// Component type token.
    #[serde(rename = "componentType")]
    component_type: Option<String>,
    /// Canonical part-model name.
    name: Option<String>,
    /// Identity override block.
    #[serde(default)]
    identity: Option<ComponentOverrideIdentity>,
    /// Review status override.
    #[serde(default)]
    review_status: Option<String>,
    /// Property overrides keyed by property name.
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Identity override block within a component override file.
#[derive(Debug, Deserialize)]
struct ComponentOverrideIdentity {
    /// Maker override.
    #[serde(default)]
    maker: Option<String>,
    /// Replacement alias set.
    #[serde(default)]
    aliases: Vec<String>,
}

/// Renders a JSON scalar as property-value text.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Component Databases
// ============================================================================

impl Seeder<'_> {
    /// Seeds every generated component database file.
    pub(crate) fn seed_component_dbs(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let prefix = format!(
            "{}/{}/_generated/component_db",
            self.helper_root(),
            self.category().as_str()
        );
        let keys = self.storage().list_input_keys(&prefix)?;
        for key in keys {
            if !key.as_str().ends_with(".json") {
                continue;
            }
            let Some(value) = self.storage().read_json_or_null(&key)? else {
                continue;
            };
            let file: ComponentDbFile = match serde_json::from_value(value) {
                Ok(file) => file,
                Err(err) => {
                    report.issue(key.as_str(), err.to_string());
                    continue;
                }
            };
            self.seed_component_file(db, &file, report)?;
        }
        Ok(())
    }

    /// Seeds one component database file.
    fn seed_component_file(
        &self,
        db: &mut SpecDb,
        file: &ComponentDbFile,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let component_type = ComponentType::new(file.component_type.as_str());
        for (entry_id, entry) in &file.entries {
            let key = ComponentKey {
                category: self.category().clone(),
                component_type: component_type.clone(),
                canonical_name: entry.canonical_name.clone(),
                maker: entry.maker.clone(),
            };
            let identity_id =
                db.upsert_component_identity(&key, ReviewStatus::Pending, false)?;
            report.identities += 1;
            for alias in &entry.aliases {
                db.add_component_alias(identity_id, alias)?;
                report.aliases += 1;
            }
            for (property, value) in &entry.properties {
                let policy = entry
                    .variance_policies
                    .get(property)
                    .map(|label| VariancePolicy::parse(label))
                    .transpose();
                let policy = match policy {
                    Ok(policy) => policy.unwrap_or_default(),
                    Err(err) => {
                        report.issue(
                            format!("{entry_id}/{property}"),
                            err.to_string(),
                        );
                        VariancePolicy::Authoritative
                    }
                };
                let rendered = render_scalar(value);
                db.upsert_component_value(
                    &key,
                    &ComponentValueUpsert {
                        property_key: PropertyKey::new(property.as_str()),
                        value: rendered.clone(),
                        confidence: 1.0,
                        variance_policy: policy,
                        constraints: entry
                            .constraints
                            .get(property)
                            .cloned()
                            .unwrap_or_default(),
                        needs_review: false,
                        overridden: false,
                    },
                )?;
                report.component_values += 1;

                let candidate_id = synthetic_component(
                    &component_type,
                    &entry.canonical_name,
                    &PropertyKey::new(property.as_str()),
                    &rendered,
                );
                db.insert_candidate(&CandidateRecord {
                    candidate_id,
                    category: self.category().clone(),
                    product_id: ProductId::new(format!(
                        "component:{}:{}",
                        component_type.as_str(),
                        entry.canonical_name
                    )),
                    field_key: FieldKey::new(property.as_str()),
                    value: rendered,
                    score: 1.0,
                    rank: 0,
                    source_method: "component_db".to_string(),
                    is_component_field: true,
                    ..CandidateRecord::default()
                })?;
                report.component_candidates += 1;
            }
        }
        Ok(())
    }

    /// Applies every component override file.
    pub(crate) fn seed_component_overrides(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let prefix = format!(
            "{}/{}/_overrides/components",
            self.helper_root(),
            self.category().as_str()
        );
        let keys = self.storage().list_input_keys(&prefix)?;
        for key in keys {
            if !key.as_str().ends_with(".json") {
                continue;
            }
            let Some(value) = self.storage().read_json_or_null(&key)? else {
                continue;
            };
            let file: ComponentOverrideFile = match serde_json::from_value(value) {
                Ok(file) => file,
                Err(err) => {
                    report.issue(key.as_str(), err.to_string());
                    continue;
                }
            };
            if let Err(message) = self.apply_component_override(db, &file, report) {
                report.issue(key.as_str(), message);
            }
        }
        Ok(())
    }

    /// Applies one component override; returns a message on per-item issues.
    fn apply_component_override(
        &self,
        db: &mut SpecDb,
        file: &ComponentOverrideFile,
        report: &mut SeedReport,
    ) -> Result<(), String> {
        let Some(component_type) = file.component_type.as_deref() else {
            return Err("override missing componentType".to_string());
        };
        let Some(name) = file.name.as_deref() else {
            return Err("override missing name".to_string());
        };
        let component_type = ComponentType::new(component_type);
        let identity_id = db
            .find_component_by_alias(self.category(), &component_type, name)
            .map_err(|err| err.to_string())?;
        let Some(identity_id) = identity_id else {
            return Err(format!("override target not found: {name}"));
        };
        let existing = db
            .component_identity(identity_id)
            .map_err(|err| err.to_string())?
            .ok_or_else(|| format!("override target vanished: {name}"))?;

        let review_status = match file.review_status.as_deref() {
            Some(label) => ReviewStatus::parse(label).map_err(|err| err.to_string())?,
            None => existing.review_status,
        };
        let maker = file
            .identity
            .as_ref()
            .and_then(|identity| identity.maker.clone())
            .unwrap_or(existing.maker);
        let key = ComponentKey {
            category: self.category().clone(),
            component_type: existing.component_type,
            canonical_name: existing.canonical_name,
            maker,
        };
        db.upsert_component_identity(&key, review_status, existing.aliases_overridden)
            .map_err(|err| err.to_string())?;

        if let Some(identity) = &file.identity
            && !identity.aliases.is_empty()
        {
            db.override_component_aliases(identity_id, &identity.aliases)
                .map_err(|err| err.to_string())?;
        }
        for (property, value) in &file.properties {
            db.upsert_component_value(
                &key,
                &ComponentValueUpsert {
                    property_key: PropertyKey::new(property.as_str()),
                    value: render_scalar(value),
                    confidence: 1.0,
                    variance_policy: VariancePolicy::Authoritative,
                    constraints: Vec::new(),
                    needs_review: false,
                    overridden: true,
                },
            )
            .map_err(|err| err.to_string())?;
        }
        report.component_overrides += 1;
        Ok(())
    }
}

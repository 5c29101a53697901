// crates/spec-harvest-seeder/src/enum_stage.rs
// ============================================================================
// Module: Enum Seeding
// Description: Load known enum vocabularies and pipeline suggestions.
// Purpose: Populate enum lists and values, and record suggested values as
//          pipeline candidates pending review.
// Dependencies: spec-harvest-core, spec-harvest-store, crate
// ============================================================================

//! ## Overview
//! Known values live at `<helper_root>/<category>/_generated/
//! known_values.json` under an `enums` map of field to policy + values.
//! Suggestions at `<helper_root>/<category>/_suggestions/enums.json` become
//! `pl-enum_` candidates, not vocabulary rows; review promotes them later.
//! Suggestion candidates scope their product column with an `enum:` prefix
//! since they belong to no product.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::identifiers::pipeline_enum;
use spec_harvest_store::CandidateRecord;
use spec_harvest_store::SpecDb;

use crate::SeedError;
use crate::SeedReport;
use crate::Seeder;

// ============================================================================
// SECTION: Artifact Shapes
// ============================================================================

/// The generated known-values artifact.
#[derive(Debug, Deserialize)]
struct KnownValuesFile {
    /// Vocabulary per enum field.
    #[serde(default)]
    enums: BTreeMap<String, KnownEnum>,
}

/// One field's known vocabulary.
#[derive(Debug, Deserialize)]
struct KnownEnum {
    /// Admission policy label (`open` or `closed`).
    #[serde(default = "default_policy")]
    policy: String,
    /// Canonical values.
    #[serde(default)]
    values: Vec<String>,
}

/// Default enum policy label.
fn default_policy() -> String {
    "open".to_string()
}

// ============================================================================
// SECTION: Stages
// ============================================================================

impl Seeder<'_> {
    /// Seeds the known enum vocabularies.
    pub(crate) fn seed_known_enum_values(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let key = spec_harvest_storage::Key::join(&[
            self.helper_root(),
            self.category().as_str(),
            "_generated",
            "known_values.json",
        ])?;
        let Some(value) = self.storage().read_json_or_null(&key)? else {
            return Ok(());
        };
        let file: KnownValuesFile = match serde_json::from_value(value) {
            Ok(file) => file,
            Err(err) => {
                report.issue(key.as_str(), err.to_string());
                return Ok(());
            }
        };
        for (field, vocabulary) in file.enums {
            let field_key = FieldKey::new(field);
            db.ensure_enum_list(self.category(), &field_key)?;
            report.enum_lists += 1;
            for value in &vocabulary.values {
                db.upsert_list_value(self.category(), &field_key, value, &vocabulary.policy)?;
                report.enum_values += 1;
            }
        }
        Ok(())
    }

    /// Seeds pipeline enum suggestions as candidates.
    pub(crate) fn seed_enum_suggestions(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let key = spec_harvest_storage::Key::join(&[
            self.helper_root(),
            self.category().as_str(),
            "_suggestions",
            "enums.json",
        ])?;
        let Some(value) = self.storage().read_json_or_null(&key)? else {
            return Ok(());
        };
        let suggestions = match parse_suggestions(&value) {
            Ok(map) => map,
            Err(message) => {
                report.issue(key.as_str(), message);
                return Ok(());
            }
        };
        for (field, values) in suggestions {
            let field_key = FieldKey::new(field.as_str());
            for suggested in values {
                let candidate_id = pipeline_enum(&field_key, &suggested);
                db.insert_candidate(&CandidateRecord {
                    candidate_id,
                    category: self.category().clone(),
                    product_id: ProductId::new(format!("enum:{field}")),
                    field_key: field_key.clone(),
                    value: suggested,
                    score: 0.5,
                    rank: 0,
                    source_method: "pipeline_suggestion".to_string(),
                    is_list_field: true,
                    ..CandidateRecord::default()
                })?;
                report.enum_candidates += 1;
            }
        }
        Ok(())
    }
}

/// Parses the suggestions artifact, accepting wrapped and bare maps.
fn parse_suggestions(value: &Value) -> Result<BTreeMap<String, Vec<String>>, String> {
    let map = value.get("enums").unwrap_or(value);
    let Value::Object(entries) = map else {
        return Err("suggestions artifact is not an object".to_string());
    };
    let mut suggestions = BTreeMap::new();
    for (field, entry) in entries {
        let values: Vec<String> = match entry {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(ToString::to_string))
                .collect(),
            Value::Object(object) => object
                .get("values")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| item.as_str().map(ToString::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            _ => Vec::new(),
        };
        suggestions.insert(field.clone(), values);
    }
    Ok(suggestions)
}

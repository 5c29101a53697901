// crates/spec-harvest-seeder/src/product_stage.rs
// ============================================================================
// Module: Product Seeding
// Description: Load per-product candidates and per-product overrides.
// Purpose: Populate candidate rows from merged and per-run artifacts, and
//          apply manual field overrides with evidence lineage.
// Dependencies: spec-harvest-core, spec-harvest-store, crate
// ============================================================================

//! ## Overview
//! Merged candidates live at
//! `<output_root>/<category>/<product_id>/latest/candidates.json`, keyed by
//! field; per-run captures under
//! `runs/<run_id>/extracted/<source_dir>/candidates.json`. A reseed deletes
//! the product's candidate set and rewrites it. Overrides at
//! `<helper_root>/<category>/_overrides/<product_id>.overrides.json` create
//! manual candidates and pin the field state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;
use spec_harvest_core::Category;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::identifiers::ScopedItemAttrs;
use spec_harvest_core::identifiers::manual_override_item;
use spec_harvest_core::identifiers::scoped_item;
use spec_harvest_core::identifiers::scoped_item_from_attrs;
use spec_harvest_store::CandidateRecord;
use spec_harvest_store::ItemFieldStateUpsert;
use spec_harvest_store::SpecDb;

use crate::SeedError;
use crate::SeedReport;
use crate::Seeder;

// ============================================================================
// SECTION: Artifact Shapes
// ============================================================================

/// One raw candidate entry within a candidates artifact.
#[derive(Debug, Default, Deserialize)]
struct RawCandidate {
    /// Extractor-assigned candidate id, when present.
    #[serde(default)]
    candidate_id: Option<String>,
    /// Observed value.
    #[serde(default)]
    value: Value,
    /// Extraction score.
    #[serde(default)]
    score: f64,
    /// Rank among the field's candidates.
    #[serde(default)]
    rank: i64,
    /// Source page URL.
    #[serde(default, alias = "source_url")]
    url: String,
    /// Source host.
    #[serde(default, alias = "source_host")]
    host: String,
    /// Source tier label.
    #[serde(default)]
    tier: String,
    /// Extraction method label.
    #[serde(default, alias = "source_method")]
    method: String,
    /// Snippet identifier.
    #[serde(default)]
    snippet_id: String,
    /// Snippet content hash.
    #[serde(default)]
    snippet_hash: String,
    /// Quoted supporting text.
    #[serde(default)]
    quote: String,
    /// RFC3339 retrieval timestamp.
    #[serde(default)]
    retrieved_at: String,
    /// Harvest run identifier.
    #[serde(default)]
    run_id: String,
    /// Whether the field resolves against the component database.
    #[serde(default)]
    is_component_field: bool,
    /// Whether the field is multi-valued.
    #[serde(default)]
    is_list_field: bool,
}

/// One per-product overrides artifact.
#[derive(Debug, Deserialize)]
struct OverridesFile {
    /// Field overrides keyed by field.
    #[serde(default)]
    overrides: BTreeMap<String, FieldOverride>,
}

/// One field override entry.
#[derive(Debug, Default, Deserialize)]
struct FieldOverride {
    /// Override value.
    #[serde(default)]
    value: Option<Value>,
    /// Alternate override-value spelling.
    #[serde(default)]
    override_value: Option<Value>,
    /// Pre-assigned candidate id, when present.
    #[serde(default)]
    candidate_id: Option<String>,
    /// Source label.
    #[serde(default)]
    source: Option<String>,
    /// Evidence block for the override.
    #[serde(default)]
    override_provenance: Option<OverrideProvenance>,
}

/// Evidence block within a field override.
#[derive(Debug, Default, Deserialize)]
struct OverrideProvenance {
    /// Evidence page URL.
    #[serde(default)]
    url: String,
    /// Quoted supporting text.
    #[serde(default)]
    quote: String,
}

/// Renders a JSON scalar as candidate-value text.
fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Product Candidates
// ============================================================================

impl Seeder<'_> {
    /// Seeds candidates for every product found under the output root.
    pub(crate) fn seed_product_candidates(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let prefix = format!("{}/{}", self.output_root(), self.category().as_str());
        let keys = self.storage().list_input_keys(&prefix)?;
        let mut products: BTreeSet<ProductId> = BTreeSet::new();
        for key in &keys {
            let segments: Vec<&str> = key.segments().collect();
            // <output_root>/<category>/<product_id>/...
            let root_segments = prefix.split('/').count();
            if segments.len() > root_segments {
                products.insert(ProductId::new(segments[root_segments]));
            }
        }
        for product_id in products {
            self.seed_one_product(db, &product_id, &keys, report)?;
        }
        Ok(())
    }

    /// Seeds one product's candidate set from its artifacts.
    fn seed_one_product(
        &self,
        db: &mut SpecDb,
        product_id: &ProductId,
        keys: &[spec_harvest_storage::Key],
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let product_prefix = format!(
            "{}/{}/{}",
            self.output_root(),
            self.category().as_str(),
            product_id.as_str()
        );
        let mut batch: Vec<CandidateRecord> = Vec::new();
        for key in keys {
            if !key.as_str().starts_with(&product_prefix)
                || !key.as_str().ends_with("candidates.json")
            {
                continue;
            }
            let in_latest = key.as_str() == format!("{product_prefix}/latest/candidates.json");
            let in_run = key.as_str().contains("/extracted/");
            if !in_latest && !in_run {
                continue;
            }
            let Some(value) = self.storage().read_json_or_null(key)? else {
                continue;
            };
            let by_field: BTreeMap<String, Vec<RawCandidate>> =
                match serde_json::from_value(value) {
                    Ok(map) => map,
                    Err(err) => {
                        report.issue(key.as_str(), err.to_string());
                        continue;
                    }
                };
            for (field, raw_candidates) in by_field {
                let field_key = FieldKey::new(field);
                for (index, raw) in raw_candidates.into_iter().enumerate() {
                    batch.push(build_candidate(
                        self.category(),
                        product_id,
                        &field_key,
                        index,
                        raw,
                    ));
                }
            }
        }
        if batch.is_empty() {
            return Ok(());
        }
        db.upsert_product(&spec_harvest_store::ProductRecord {
            category: self.category().clone(),
            product_id: product_id.clone(),
            brand: None,
            model: None,
            variant: None,
            seed_urls: Vec::new(),
            status: "active".to_string(),
        })?;
        report.products += 1;
        db.delete_product_candidates(self.category(), product_id)?;
        report.candidates += u64::try_from(batch.len()).unwrap_or(u64::MAX);
        db.insert_candidates(&batch)?;
        Ok(())
    }

    /// Applies per-product field overrides.
    pub(crate) fn seed_product_overrides(
        &self,
        db: &mut SpecDb,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let prefix =
            format!("{}/{}/_overrides", self.helper_root(), self.category().as_str());
        let keys = self.storage().list_input_keys(&prefix)?;
        for key in keys {
            let Some(file_name) = key.segments().last() else {
                continue;
            };
            let Some(product_raw) = file_name.strip_suffix(".overrides.json") else {
                continue;
            };
            let product_id = ProductId::new(product_raw);
            let Some(value) = self.storage().read_json_or_null(&key)? else {
                continue;
            };
            let file: OverridesFile = match serde_json::from_value(value) {
                Ok(file) => file,
                Err(err) => {
                    report.issue(key.as_str(), err.to_string());
                    continue;
                }
            };
            for (field, entry) in file.overrides {
                let field_key = FieldKey::new(field);
                self.apply_field_override(db, &product_id, &field_key, &entry, report)?;
            }
        }
        Ok(())
    }

    /// Applies one manual field override with its candidate lineage.
    fn apply_field_override(
        &self,
        db: &mut SpecDb,
        product_id: &ProductId,
        field_key: &FieldKey,
        entry: &FieldOverride,
        report: &mut SeedReport,
    ) -> Result<(), SeedError> {
        let raw_value = entry.value.as_ref().or(entry.override_value.as_ref());
        let Some(raw_value) = raw_value else {
            report.issue(
                format!("{}/{}", product_id.as_str(), field_key.as_str()),
                "override carries no value",
            );
            return Ok(());
        };
        let value = render_scalar(raw_value);
        let provenance = entry.override_provenance.as_ref();
        let evidence_url = provenance.map(|block| block.url.as_str()).unwrap_or_default();
        let evidence_quote =
            provenance.map(|block| block.quote.as_str()).unwrap_or_default();
        let candidate_id = entry.candidate_id.as_ref().map_or_else(
            || {
                manual_override_item(
                    self.category(),
                    product_id,
                    field_key,
                    &value,
                    evidence_url,
                    evidence_quote,
                )
            },
            |raw| spec_harvest_core::CandidateId::new(raw.as_str()),
        );
        db.insert_candidate(&CandidateRecord {
            candidate_id: candidate_id.clone(),
            category: self.category().clone(),
            product_id: product_id.clone(),
            field_key: field_key.clone(),
            value: value.clone(),
            score: 1.0,
            rank: 0,
            source_url: evidence_url.to_string(),
            quote: evidence_quote.to_string(),
            source_method: entry.source.clone().unwrap_or_else(|| "manual".to_string()),
            ..CandidateRecord::default()
        })?;
        db.upsert_item_field_state(
            self.category(),
            product_id,
            field_key,
            &ItemFieldStateUpsert {
                value,
                confidence: 1.0,
                source: "override".to_string(),
                accepted_candidate_id: Some(candidate_id),
                overridden: true,
                needs_ai_review: false,
                ai_review_complete: false,
            },
        )?;
        report.field_overrides += 1;
        Ok(())
    }
}

// ============================================================================
// SECTION: Candidate Construction
// ============================================================================

/// Builds one candidate row from a raw artifact entry.
fn build_candidate(
    category: &Category,
    product_id: &ProductId,
    field_key: &FieldKey,
    index: usize,
    raw: RawCandidate,
) -> CandidateRecord {
    let value = render_scalar(&raw.value);
    let candidate_id = raw.candidate_id.as_ref().map_or_else(
        || {
            scoped_item_from_attrs(
                product_id,
                field_key,
                &ScopedItemAttrs {
                    value: &value,
                    source_host: &raw.host,
                    source_method: &raw.method,
                    index,
                    run_id: &raw.run_id,
                },
            )
        },
        |raw_id| scoped_item(product_id, field_key, raw_id),
    );
    CandidateRecord {
        candidate_id,
        category: category.clone(),
        product_id: product_id.clone(),
        field_key: field_key.clone(),
        value,
        score: raw.score,
        rank: raw.rank,
        source_url: raw.url,
        source_host: raw.host,
        source_tier: raw.tier,
        source_method: raw.method,
        snippet_id: raw.snippet_id,
        snippet_hash: raw.snippet_hash,
        quote: raw.quote,
        retrieved_at: raw.retrieved_at,
        run_id: raw.run_id,
        is_component_field: raw.is_component_field,
        is_list_field: raw.is_list_field,
    }
}

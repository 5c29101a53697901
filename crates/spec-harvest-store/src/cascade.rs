// crates/spec-harvest-store/src/cascade.rs
// ============================================================================
// Module: Component Cascade Engine
// Description: Propagate authoritative component-property changes to linked
//              products.
// Purpose: Push authoritative values, evaluate variance policies, and
//          evaluate constraint expressions across every linked product.
// Dependencies: rusqlite, spec-harvest-core, crate::db
// ============================================================================

//! ## Overview
//! When a component property changes, every product linked to the component
//! identity is revisited. An `authoritative` policy pushes the new value
//! into each linked product's field state in one transaction. Bound policies
//! (`upper_bound`, `lower_bound`, `range`) compare the product's current
//! value numerically and flag violators for AI review; unknown or
//! unparseable values count as compliant. Constraint expressions evaluate
//! through the core evaluator with component properties shadowing product
//! fields; like the bound policies, their verdict lands on the product's
//! field state for the cascaded property.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_core::ConstraintOutcome;
use spec_harvest_core::ConstraintScope;
use spec_harvest_core::FieldKey;
use spec_harvest_core::ProductId;
use spec_harvest_core::PropertyKey;
use spec_harvest_core::VariancePolicy;
use spec_harvest_core::evaluate_constraints;
use spec_harvest_core::is_unknown_placeholder;
use spec_harvest_core::parse_lenient_number;

use crate::components::ComponentKey;
use crate::db::SpecDb;
use crate::db::unix_millis;
use crate::error::SpecDbError;
use crate::error::db_err;
use crate::ids::IdentityRowId;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Relative tolerance band for the `range` variance policy.
const RANGE_TOLERANCE: f64 = 0.10;

/// Source label written by authoritative pushes.
const COMPONENT_DB_SOURCE: &str = "component_db";

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Per-cascade partition of linked products.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOutcome {
    /// Products whose field value violates the policy or constraints.
    pub violations: Vec<ProductId>,
    /// Products whose field value complies.
    pub compliant: Vec<ProductId>,
}

// ============================================================================
// SECTION: Cascade Operations
// ============================================================================

impl SpecDb {
    /// Cascades one component-property change to all linked products.
    ///
    /// Dispatches on the stored variance policy, then evaluates constraint
    /// expressions when the value carries any.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError::MissingRow`] when the identity or property is
    /// absent and engine errors otherwise.
    pub fn cascade_component_property(
        &mut self,
        key: &ComponentKey,
        property_key: &PropertyKey,
    ) -> Result<CascadeOutcome, SpecDbError> {
        let identity_id = self.component_identity_id(key)?.ok_or_else(|| {
            SpecDbError::MissingRow(format!(
                "component identity not found for cascade: {}",
                key.canonical_name
            ))
        })?;
        let value = self
            .component_values(identity_id)?
            .into_iter()
            .find(|record| record.property_key == *property_key)
            .ok_or_else(|| {
                SpecDbError::MissingRow(format!(
                    "component property not found for cascade: {property_key}"
                ))
            })?;

        let mut outcome = match value.variance_policy {
            VariancePolicy::Authoritative => self.push_authoritative_value(
                &key.category,
                identity_id,
                property_key,
                &value.value,
            )?,
            VariancePolicy::UpperBound | VariancePolicy::LowerBound | VariancePolicy::Range => {
                self.evaluate_variance_policy(
                    &key.category,
                    identity_id,
                    property_key,
                    &value.value,
                    value.variance_policy,
                )?
            }
        };

        if !value.constraints.is_empty() {
            let constraint_outcome = self.evaluate_component_constraints(
                &key.category,
                identity_id,
                property_key,
                &value.constraints,
            )?;
            for product in constraint_outcome.violations {
                outcome.compliant.retain(|candidate| *candidate != product);
                if !outcome.violations.contains(&product) {
                    outcome.violations.push(product);
                }
            }
            // The constraint pass wrote flags from its own verdict alone;
            // re-assert the union so a bound-policy violation survives a
            // passing constraint list.
            let field_key = FieldKey::new(property_key.as_str());
            for product in &outcome.violations {
                if let Some(state) =
                    self.item_field_state(&key.category, product, &field_key)?
                {
                    self.set_needs_ai_review(state.id.get(), true)?;
                }
            }
        }
        Ok(outcome)
    }

    /// Pushes an authoritative value into every linked product's field
    /// state.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on write failure; no change persists on
    /// error.
    pub fn push_authoritative_value(
        &mut self,
        category: &Category,
        identity_id: IdentityRowId,
        property_key: &PropertyKey,
        new_value: &str,
    ) -> Result<CascadeOutcome, SpecDbError> {
        let products = self.linked_products(category, identity_id)?;
        let field_key = FieldKey::new(property_key.as_str());
        let now = unix_millis();
        let tx = self.conn_mut().transaction().map_err(db_err)?;
        for product in &products {
            tx.execute(
                "INSERT INTO item_field_states
                 (category, product_id, field_key, value, confidence, source,
                  accepted_candidate_id, overridden, needs_ai_review, ai_review_complete,
                  updated_at)
                 VALUES (?1, ?2, ?3, ?4, 1.0, ?5, NULL, 0, 0, 0, ?6)
                 ON CONFLICT (category, product_id, field_key) DO UPDATE SET
                   value = excluded.value,
                   confidence = excluded.confidence,
                   source = excluded.source,
                   accepted_candidate_id = NULL,
                   overridden = 0,
                   needs_ai_review = 0,
                   updated_at = excluded.updated_at",
                params![
                    category.as_str(),
                    product.as_str(),
                    field_key.as_str(),
                    new_value,
                    COMPONENT_DB_SOURCE,
                    now
                ],
            )
            .map_err(db_err)?;
        }
        tx.commit().map_err(db_err)?;
        Ok(CascadeOutcome {
            violations: Vec::new(),
            compliant: products,
        })
    }

    /// Evaluates a bound variance policy over every linked product.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read or write failure.
    pub fn evaluate_variance_policy(
        &mut self,
        category: &Category,
        identity_id: IdentityRowId,
        property_key: &PropertyKey,
        component_value: &str,
        policy: VariancePolicy,
    ) -> Result<CascadeOutcome, SpecDbError> {
        let products = self.linked_products(category, identity_id)?;
        let field_key = FieldKey::new(property_key.as_str());
        let mut outcome = CascadeOutcome::default();
        for product in products {
            let current = self.item_field_state(category, &product, &field_key)?;
            let violates = current.as_ref().is_some_and(|state| {
                variance_violates(policy, &state.value, component_value)
            });
            if let Some(state) = current {
                self.set_needs_ai_review(state.id.get(), violates)?;
            }
            if violates {
                outcome.violations.push(product);
            } else {
                outcome.compliant.push(product);
            }
        }
        Ok(outcome)
    }

    /// Evaluates constraint expressions for every linked product.
    ///
    /// Variables resolve first from the component's property map, then from
    /// the product's field map. Any failing expression flags the product's
    /// field state for the cascaded property; a passing list clears it.
    ///
    /// # Errors
    ///
    /// Returns [`SpecDbError`] on read or write failure.
    pub fn evaluate_component_constraints(
        &mut self,
        category: &Category,
        identity_id: IdentityRowId,
        property_key: &PropertyKey,
        constraints: &[String],
    ) -> Result<CascadeOutcome, SpecDbError> {
        let products = self.linked_products(category, identity_id)?;
        let field_key = FieldKey::new(property_key.as_str());
        let component_properties: BTreeMap<String, String> = self
            .component_values(identity_id)?
            .into_iter()
            .map(|record| (record.property_key.as_str().to_string(), record.value))
            .collect();
        let mut outcome = CascadeOutcome::default();
        for product in products {
            let mut scope = ConstraintScope {
                component_properties: component_properties.clone(),
                product_fields: BTreeMap::new(),
            };
            for state in self.item_field_states(category, &product)? {
                scope
                    .product_fields
                    .insert(state.field_key.as_str().to_string(), state.value);
            }
            let violated =
                evaluate_constraints(constraints, &scope) == ConstraintOutcome::Violated;
            if let Some(state) = self.item_field_state(category, &product, &field_key)? {
                self.set_needs_ai_review(state.id.get(), violated)?;
            }
            if violated {
                outcome.violations.push(product);
            } else {
                outcome.compliant.push(product);
            }
        }
        Ok(outcome)
    }

    /// Lists product ids linked to an identity, ascending.
    fn linked_products(
        &self,
        category: &Category,
        identity_id: IdentityRowId,
    ) -> Result<Vec<ProductId>, SpecDbError> {
        let mut stmt = self
            .conn()
            .prepare_cached(
                "SELECT DISTINCT product_id FROM item_component_links
                 WHERE category = ?1 AND identity_id = ?2 ORDER BY product_id",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map(params![category.as_str(), identity_id.get()], |row| {
                row.get::<_, String>(0)
            })
            .map_err(db_err)?;
        let mut products = Vec::new();
        for row in rows {
            products.push(ProductId::new(row.map_err(db_err)?));
        }
        Ok(products)
    }

    /// Sets or clears the AI-review flag on one field state.
    fn set_needs_ai_review(&self, state_id: i64, needs: bool) -> Result<(), SpecDbError> {
        self.conn()
            .execute(
                "UPDATE item_field_states SET needs_ai_review = ?2, updated_at = ?3
                 WHERE id = ?1",
                params![state_id, i64::from(needs), unix_millis()],
            )
            .map_err(db_err)?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Variance Rules
// ============================================================================

/// Returns true when a product value violates the bound policy.
///
/// Unknown placeholders and unparseable numbers are compliant by contract.
fn variance_violates(policy: VariancePolicy, current: &str, component: &str) -> bool {
    if is_unknown_placeholder(current) || is_unknown_placeholder(component) {
        return false;
    }
    let (Some(current), Some(component)) =
        (parse_lenient_number(current), parse_lenient_number(component))
    else {
        return false;
    };
    match policy {
        VariancePolicy::Authoritative => false,
        VariancePolicy::UpperBound => current > component,
        VariancePolicy::LowerBound => current < component,
        VariancePolicy::Range => (current - component).abs() > RANGE_TOLERANCE * component.abs(),
    }
}

// crates/spec-harvest-queue/src/snapshot.rs
// ============================================================================
// Module: Queue Snapshot
// Description: JSON snapshot mirroring of the product queue.
// Purpose: Write the queue state to object storage and read it back with a
//          legacy-path fallback.
// Dependencies: spec-harvest-core, spec-harvest-store, spec-harvest-storage
// ============================================================================

//! ## Overview
//! The snapshot mirrors every queue row of a category as one JSON object:
//! `{category, updated_at, products: {product_id: row}}`. Writes always
//! target the modern `_queue/<category>/state.json` key; reads prefer the
//! modern key and fall back to the legacy helper-root location.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use spec_harvest_core::Category;
use spec_harvest_core::ProductQueueRow;
use spec_harvest_storage::Key;
use spec_harvest_storage::ObjectStore;
use spec_harvest_store::SpecDb;

use crate::keeper::QueueError;

// ============================================================================
// SECTION: Snapshot Shape
// ============================================================================

/// Serialized queue snapshot for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Category the snapshot covers.
    pub category: Category,
    /// Unix-millisecond write timestamp.
    pub updated_at: i64,
    /// Queue rows keyed by product id.
    pub products: BTreeMap<String, ProductQueueRow>,
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Returns the modern snapshot key for a category.
///
/// # Errors
///
/// Returns [`spec_harvest_storage::StorageError`] when the category cannot
/// form a valid key.
pub fn modern_snapshot_key(
    category: &Category,
) -> Result<Key, spec_harvest_storage::StorageError> {
    Key::join(&["_queue", category.as_str(), "state.json"])
}

/// Returns the legacy helper-root snapshot key for a category.
///
/// # Errors
///
/// Returns [`spec_harvest_storage::StorageError`] when the paths cannot form
/// a valid key.
pub fn legacy_snapshot_key(
    helper_root: &str,
    category: &Category,
) -> Result<Key, spec_harvest_storage::StorageError> {
    Key::join(&[helper_root, category.as_str(), "_queue", "state.json"])
}

// ============================================================================
// SECTION: Read / Write
// ============================================================================

/// Writes the current queue state as the modern snapshot.
///
/// # Errors
///
/// Returns [`QueueError`] on store read, serialization, or storage failure.
pub fn write_snapshot(
    db: &SpecDb,
    store: &dyn ObjectStore,
    category: &Category,
) -> Result<(), QueueError> {
    let rows = db.queue_rows(category)?;
    let mut products = BTreeMap::new();
    let mut updated_at = 0_i64;
    for row in rows {
        if let Some(summary) = &row.last_summary {
            updated_at = updated_at.max(summary.recorded_at);
        }
        products.insert(row.product_id.as_str().to_string(), row);
    }
    let snapshot = QueueSnapshot {
        category: category.clone(),
        updated_at,
        products,
    };
    let bytes = serde_json::to_vec_pretty(&snapshot)
        .map_err(|err| QueueError::Encode(err.to_string()))?;
    let key = modern_snapshot_key(category)?;
    store.write_object(&key, &bytes, "application/json")?;
    Ok(())
}

/// Reads the snapshot, preferring the modern key over the legacy one.
///
/// # Errors
///
/// Returns [`QueueError`] on storage or decode failure; a missing snapshot
/// at both locations yields `Ok(None)`.
pub fn read_snapshot(
    store: &dyn ObjectStore,
    helper_root: &str,
    category: &Category,
) -> Result<Option<QueueSnapshot>, QueueError> {
    let modern = modern_snapshot_key(category)?;
    let value = match store.read_json_or_null(&modern)? {
        Some(value) => Some(value),
        None => {
            let legacy = legacy_snapshot_key(helper_root, category)?;
            store.read_json_or_null(&legacy)?
        }
    };
    let Some(value) = value else {
        return Ok(None);
    };
    let snapshot: QueueSnapshot =
        serde_json::from_value(value).map_err(|err| QueueError::Encode(err.to_string()))?;
    Ok(Some(snapshot))
}

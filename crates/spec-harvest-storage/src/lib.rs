// crates/spec-harvest-storage/src/lib.rs
// ============================================================================
// Module: Spec Harvest Storage
// Description: Object store abstraction over `/`-joined keys.
// Purpose: Let the seeder and queue keeper read and write artifacts without
//          knowing whether the backing store is local disk or remote.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The core consumes and emits artifacts through [`ObjectStore`]: JSON and
//! text reads that distinguish "missing" from "unreadable", byte writes with
//! a content type, and key listing per category. Keys are `/`-joined path
//! strings; the local backend maps them under a root directory. Remote
//! backends are out of scope here and plug in behind the same trait.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod key;
pub mod local;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use thiserror::Error;

pub use key::Key;
pub use local::LocalObjectStore;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Object store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Missing` is reserved for reads that require presence.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backing store I/O failure.
    #[error("storage io error for {key}: {message}")]
    Io {
        /// Key the operation targeted.
        key: String,
        /// Underlying failure description.
        message: String,
    },
    /// Required object was not found.
    #[error("storage object missing: {0}")]
    Missing(String),
    /// Object exists but is not valid JSON.
    #[error("storage json parse error for {key}: {message}")]
    JsonParse {
        /// Key the operation targeted.
        key: String,
        /// Underlying parse failure description.
        message: String,
    },
    /// Key failed validation.
    #[error("storage key invalid: {0}")]
    InvalidKey(String),
}

// ============================================================================
// SECTION: Object Store Trait
// ============================================================================

/// Backend-agnostic artifact storage.
///
/// # Invariants
/// - `read_*_or_null` methods return `Ok(None)` for missing objects and
///   reserve `Err` for genuine failures.
/// - `write_object` replaces any existing object at the key.
pub trait ObjectStore {
    /// Joins path parts into a canonical output key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] when a part is empty or contains
    /// a path separator.
    fn resolve_output_key(&self, parts: &[&str]) -> Result<Key, StorageError>;

    /// Reads a JSON object, returning `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on I/O or parse failure.
    fn read_json_or_null(&self, key: &Key) -> Result<Option<Value>, StorageError>;

    /// Reads a JSON object, failing when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Missing`] when absent, otherwise I/O or parse
    /// failures.
    fn read_json(&self, key: &Key) -> Result<Value, StorageError> {
        self.read_json_or_null(key)?
            .ok_or_else(|| StorageError::Missing(key.as_str().to_string()))
    }

    /// Reads raw text, returning `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on I/O failure.
    fn read_text_or_null(&self, key: &Key) -> Result<Option<String>, StorageError>;

    /// Writes bytes at the key with the given content type.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on I/O failure.
    fn write_object(
        &self,
        key: &Key,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Lists input keys available for a category.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on I/O failure.
    fn list_input_keys(&self, category: &str) -> Result<Vec<Key>, StorageError>;
}

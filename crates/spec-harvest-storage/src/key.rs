// crates/spec-harvest-storage/src/key.rs
// ============================================================================
// Module: Storage Keys
// Description: Canonical `/`-joined object keys.
// Purpose: Provide a validated key newtype shared by all storage backends.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Key`] is a `/`-joined relative path string. Construction rejects empty
//! parts, absolute paths, and parent-directory traversal so a local backend
//! can map keys directly under its root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::StorageError;

// ============================================================================
// SECTION: Key Type
// ============================================================================

/// Canonical object key.
///
/// # Invariants
/// - Never empty, never absolute, never contains `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    /// Builds a key by joining path parts with `/`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] when no parts are given, a part
    /// is empty, or a part contains a separator or traversal component.
    pub fn join(parts: &[&str]) -> Result<Self, StorageError> {
        if parts.is_empty() {
            return Err(StorageError::InvalidKey("key requires at least one part".to_string()));
        }
        let mut segments = Vec::with_capacity(parts.len());
        for part in parts {
            for segment in part.split('/') {
                if segment.is_empty() {
                    return Err(StorageError::InvalidKey(format!(
                        "key part contains an empty segment: {part}"
                    )));
                }
                if segment == "." || segment == ".." {
                    return Err(StorageError::InvalidKey(format!(
                        "key part contains a traversal segment: {part}"
                    )));
                }
                if segment.contains('\\') {
                    return Err(StorageError::InvalidKey(format!(
                        "key part contains a backslash: {part}"
                    )));
                }
                segments.push(segment);
            }
        }
        Ok(Self(segments.join("/")))
    }

    /// Parses an already-joined key string.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] under the same rules as
    /// [`Key::join`].
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        Self::join(&[raw])
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key's `/`-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// crates/spec-harvest-storage/src/local.rs
// ============================================================================
// Module: Local Object Store
// Description: Filesystem-backed object store.
// Purpose: Map `/`-joined keys to files under a root directory.
// Dependencies: crate::key, serde_json
// ============================================================================

//! ## Overview
//! [`LocalObjectStore`] maps every key to `<root>/<key>`. Writes create
//! parent directories on demand; the content type is accepted for interface
//! parity and ignored by the filesystem backend. Missing files surface as
//! `Ok(None)` from the `_or_null` reads.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;

use crate::Key;
use crate::ObjectStore;
use crate::StorageError;

// ============================================================================
// SECTION: Local Backend
// ============================================================================

/// Filesystem-backed object store rooted at a directory.
///
/// # Invariants
/// - Every key resolves strictly below `root` (guaranteed by [`Key`]).
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Root directory all keys resolve under.
    root: PathBuf,
}

impl LocalObjectStore {
    /// Creates a store rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a key to its backing file path.
    fn path_for(&self, key: &Key) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.segments() {
            path.push(segment);
        }
        path
    }

    /// Reads file bytes, mapping "not found" to `None`.
    fn read_bytes_or_null(&self, key: &Key) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io {
                key: key.as_str().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

impl ObjectStore for LocalObjectStore {
    fn resolve_output_key(&self, parts: &[&str]) -> Result<Key, StorageError> {
        Key::join(parts)
    }

    fn read_json_or_null(&self, key: &Key) -> Result<Option<Value>, StorageError> {
        let Some(bytes) = self.read_bytes_or_null(key)? else {
            return Ok(None);
        };
        let value = serde_json::from_slice(&bytes).map_err(|err| StorageError::JsonParse {
            key: key.as_str().to_string(),
            message: err.to_string(),
        })?;
        Ok(Some(value))
    }

    fn read_text_or_null(&self, key: &Key) -> Result<Option<String>, StorageError> {
        let Some(bytes) = self.read_bytes_or_null(key)? else {
            return Ok(None);
        };
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|err| StorageError::Io {
                key: key.as_str().to_string(),
                message: err.to_string(),
            })
    }

    fn write_object(
        &self,
        key: &Key,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| StorageError::Io {
                key: key.as_str().to_string(),
                message: err.to_string(),
            })?;
        }
        fs::write(&path, bytes).map_err(|err| StorageError::Io {
            key: key.as_str().to_string(),
            message: err.to_string(),
        })
    }

    fn list_input_keys(&self, category: &str) -> Result<Vec<Key>, StorageError> {
        let base = Key::parse(category)?;
        let root = self.path_for(&base);
        if !root.exists() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        let mut pending = vec![root];
        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|err| StorageError::Io {
                key: category.to_string(),
                message: err.to_string(),
            })?;
            for entry in entries {
                let entry = entry.map_err(|err| StorageError::Io {
                    key: category.to_string(),
                    message: err.to_string(),
                })?;
                let path = entry.path();
                if path.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let joined = relative
                        .components()
                        .map(|component| component.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(Key::parse(&joined)?);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

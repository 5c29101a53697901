// crates/spec-harvest-storage/tests/local_store.rs
// ============================================================================
// Module: Local Object Store Unit Tests
// Description: Key validation, null-vs-error reads, writes, and listing.
// Purpose: Pin the object store contract the seeder and queue rely on.
// ============================================================================

//! Unit tests for key construction and the local-disk backend.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use serde_json::json;
use spec_harvest_storage::Key;
use spec_harvest_storage::LocalObjectStore;
use spec_harvest_storage::ObjectStore;
use spec_harvest_storage::StorageError;
use tempfile::TempDir;

#[test]
fn keys_join_parts_with_slashes() {
    let key = Key::join(&["out", "mouse", "p1", "latest", "candidates.json"]).expect("key");
    assert_eq!(key.as_str(), "out/mouse/p1/latest/candidates.json");
    let nested = Key::join(&["out/mouse", "p1"]).expect("pre-joined part");
    assert_eq!(nested.as_str(), "out/mouse/p1");
}

#[test]
fn traversal_and_empty_segments_are_rejected() {
    assert!(matches!(Key::join(&[]), Err(StorageError::InvalidKey(_))));
    assert!(matches!(Key::join(&[""]), Err(StorageError::InvalidKey(_))));
    assert!(matches!(Key::join(&["a", "../b"]), Err(StorageError::InvalidKey(_))));
    assert!(matches!(Key::join(&["a//b"]), Err(StorageError::InvalidKey(_))));
    assert!(matches!(Key::join(&["a", "."]), Err(StorageError::InvalidKey(_))));
    assert!(matches!(Key::join(&["a\\b"]), Err(StorageError::InvalidKey(_))));
}

#[test]
fn missing_objects_read_as_null_not_error() {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    let key = Key::parse("mouse/absent.json").expect("key");
    assert!(store.read_json_or_null(&key).expect("read").is_none());
    assert!(store.read_text_or_null(&key).expect("read").is_none());
    assert!(matches!(store.read_json(&key), Err(StorageError::Missing(_))));
}

#[test]
fn writes_round_trip_through_json_reads() {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    let key = store
        .resolve_output_key(&["mouse", "p1", "latest", "candidates.json"])
        .expect("key");
    let body = json!({"weight": [{"value": "54"}]});
    store
        .write_object(&key, &serde_json::to_vec(&body).expect("encode"), "application/json")
        .expect("write");
    let read_back = store.read_json(&key).expect("read");
    assert_eq!(read_back, body);
}

#[test]
fn malformed_json_is_a_parse_error_not_null() {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    let key = Key::parse("mouse/broken.json").expect("key");
    store.write_object(&key, b"{not json", "application/json").expect("write");
    assert!(matches!(
        store.read_json_or_null(&key),
        Err(StorageError::JsonParse { .. })
    ));
}

#[test]
fn listing_walks_the_category_subtree_sorted() {
    let dir = TempDir::new().expect("tempdir");
    let store = LocalObjectStore::new(dir.path());
    for path in [
        "mouse/p1/latest/candidates.json",
        "mouse/p2/latest/candidates.json",
        "keyboard/k1/latest/candidates.json",
    ] {
        let key = Key::parse(path).expect("key");
        store.write_object(&key, b"{}", "application/json").expect("write");
    }
    let keys = store.list_input_keys("mouse").expect("list");
    let listed: Vec<&str> = keys.iter().map(Key::as_str).collect();
    assert_eq!(
        listed,
        vec!["mouse/p1/latest/candidates.json", "mouse/p2/latest/candidates.json"]
    );
    assert!(store.list_input_keys("absent").expect("empty").is_empty());
}

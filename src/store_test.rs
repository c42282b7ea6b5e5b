use serde_json::json;
use uuid::Uuid;

use super::*;

fn temp_store() -> FileStore {
    let dir = std::env::temp_dir().join(format!("atelier-store-{}", Uuid::new_v4()));
    FileStore::open(dir).unwrap()
}

// =============================================================
// memory store
// =============================================================

#[test]
fn memory_save_load_roundtrip() {
    let mut store = MemoryStore::new();
    store.save("key", &json!({ "a": 1 })).unwrap();
    assert_eq!(store.load("key").unwrap().unwrap(), json!({ "a": 1 }));
}

#[test]
fn memory_load_missing_is_none() {
    let store = MemoryStore::new();
    assert!(store.load("missing").unwrap().is_none());
}

#[test]
fn memory_save_overwrites() {
    let mut store = MemoryStore::new();
    store.save("key", &json!(1)).unwrap();
    store.save("key", &json!(2)).unwrap();
    assert_eq!(store.load("key").unwrap().unwrap(), json!(2));
}

#[test]
fn memory_list_is_sorted() {
    let mut store = MemoryStore::new();
    store.save("zeta", &json!(1)).unwrap();
    store.save("alpha", &json!(2)).unwrap();
    assert_eq!(store.list().unwrap(), vec!["alpha".to_owned(), "zeta".to_owned()]);
}

#[test]
fn memory_remove_is_idempotent() {
    let mut store = MemoryStore::new();
    store.save("key", &json!(1)).unwrap();
    store.remove("key").unwrap();
    store.remove("key").unwrap();
    assert!(store.load("key").unwrap().is_none());
}

// =============================================================
// remote stubs
// =============================================================

#[test]
fn upload_stub_acknowledges() {
    let mut store = MemoryStore::new();
    let ack = store.upload("key", &json!({ "x": 1 })).unwrap();
    assert_eq!(ack.key, "key");
    assert!(ack.accepted);
    assert!(ack.ts > 0);
}

#[test]
fn download_stub_finds_nothing() {
    let mut store = MemoryStore::new();
    store.save("key", &json!(1)).unwrap();
    // The stub is not wired to local state.
    assert!(store.download("key").unwrap().is_none());
}

// =============================================================
// file store
// =============================================================

#[test]
fn file_save_load_roundtrip() {
    let mut store = temp_store();
    store.save("project:demo", &json!({ "objects": [] })).unwrap();
    assert_eq!(store.load("project:demo").unwrap().unwrap(), json!({ "objects": [] }));
}

#[test]
fn file_load_missing_is_none() {
    let store = temp_store();
    assert!(store.load("absent").unwrap().is_none());
}

#[test]
fn file_list_restores_namespaced_keys() {
    let mut store = temp_store();
    store.save("recording:abc", &json!(1)).unwrap();
    store.save("components", &json!([])).unwrap();
    let keys = store.list().unwrap();
    assert_eq!(keys, vec!["components".to_owned(), "recording:abc".to_owned()]);
}

#[test]
fn file_keys_with_underscores_list_back_verbatim() {
    // `_` is the on-disk escape character; a key containing `__` must not
    // collide with the `:` encoding when listed back.
    let mut store = temp_store();
    store.save("project:a__b", &json!(1)).unwrap();
    store.save("plain_key", &json!(2)).unwrap();
    let keys = store.list().unwrap();
    assert_eq!(keys, vec!["plain_key".to_owned(), "project:a__b".to_owned()]);
    assert_eq!(store.load("project:a__b").unwrap().unwrap(), json!(1));
}

#[test]
fn file_distinct_keys_never_share_a_file() {
    let mut store = temp_store();
    store.save("a:b", &json!("colon")).unwrap();
    store.save("a__b", &json!("underscores")).unwrap();
    assert_eq!(store.load("a:b").unwrap().unwrap(), json!("colon"));
    assert_eq!(store.load("a__b").unwrap().unwrap(), json!("underscores"));
}

#[test]
fn file_listing_skips_foreign_files() {
    let dir = std::env::temp_dir().join(format!("atelier-store-{}", Uuid::new_v4()));
    let mut store = FileStore::open(&dir).unwrap();
    store.save("mine", &json!(1)).unwrap();
    std::fs::write(dir.join("stray_x.json"), b"{}").unwrap();
    assert_eq!(store.list().unwrap(), vec!["mine".to_owned()]);
}

#[test]
fn file_remove_is_idempotent() {
    let mut store = temp_store();
    store.save("key", &json!(1)).unwrap();
    store.remove("key").unwrap();
    store.remove("key").unwrap();
    assert!(store.load("key").unwrap().is_none());
}

#[test]
fn file_rejects_invalid_keys() {
    let mut store = temp_store();
    for key in ["", "has space", "dot.dot", "../escape", "slash/key"] {
        let err = store.save(key, &json!(1)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)), "key {key:?} should be rejected");
    }
}

#[test]
fn file_store_persists_across_reopen() {
    let dir = std::env::temp_dir().join(format!("atelier-store-{}", Uuid::new_v4()));
    {
        let mut store = FileStore::open(&dir).unwrap();
        store.save("durable", &json!({ "v": 7 })).unwrap();
    }
    let store = FileStore::open(&dir).unwrap();
    assert_eq!(store.load("durable").unwrap().unwrap(), json!({ "v": 7 }));
}

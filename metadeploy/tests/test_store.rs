//! Key/value store tests

use tempfile::TempDir;

use metadeploy::filesys::dir::Dir;
use metadeploy::storage::fs::FileStore;
use metadeploy::storage::memory::MemoryStore;
use metadeploy::storage::KeyValueStore;

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryStore::new();
    assert!(store.supports_large_objects());
    assert_eq!(store.get("history:index").await.unwrap(), None);

    store.set("history:index", b"[]").await.unwrap();
    assert_eq!(store.get("history:index").await.unwrap(), Some(b"[]".to_vec()));
    assert!(store.contains("history:index"));

    store.remove("history:index").await.unwrap();
    store.remove("history:index").await.unwrap();
    assert!(store.is_empty());

    assert!(!MemoryStore::with_large_objects(false).supports_large_objects());
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let tmp = TempDir::new().unwrap();
    let store = FileStore::new(Dir::new(tmp.path().join("store")));
    store.setup().await.unwrap();
    assert!(store.dir().exists().await);

    let key = "history:file:00D1:package-upload:1700000000123";
    assert_eq!(store.get(key).await.unwrap(), None);

    store.set(key, b"zip bytes").await.unwrap();
    assert_eq!(store.get(key).await.unwrap(), Some(b"zip bytes".to_vec()));

    store.set(key, b"new bytes").await.unwrap();
    assert_eq!(store.get(key).await.unwrap(), Some(b"new bytes".to_vec()));

    // one file per key, no temp files left behind
    let files = store.dir().list_files().await.unwrap();
    assert_eq!(files.len(), 1);
    assert!(files[0].to_string_lossy().ends_with(".bin"));

    store.remove(key).await.unwrap();
    assert_eq!(store.get(key).await.unwrap(), None);
    store.remove(key).await.unwrap();
}

#[tokio::test]
async fn test_file_store_keys_do_not_collide() {
    let tmp = TempDir::new().unwrap();
    let store = FileStore::new(Dir::new(tmp.path()));

    store.set("a/b", b"slash").await.unwrap();
    store.set("a:b", b"colon").await.unwrap();

    assert_eq!(store.get("a/b").await.unwrap(), Some(b"slash".to_vec()));
    assert_eq!(store.get("a:b").await.unwrap(), Some(b"colon".to_vec()));
}

//! File-backed cache behaviour across simulated restarts.

use std::sync::Arc;
use std::time::Duration;

use matricache_core::cache::CacheMap;
use matricache_core::{
    CacheStore, FetchError, FileStorage, ManualClock, Resource, Snapshot, SyncContext,
};
use serde_json::{json, Value};

fn open(dir: &std::path::Path, clock: &ManualClock) -> CacheStore {
    CacheStore::init(FileStorage::new(dir).unwrap(), Arc::new(clock.clone()))
}

fn never_resolves() -> impl matricache_core::Fetcher {
    || futures::future::pending::<anyhow::Result<Value>>()
}

#[test]
fn test_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_700_000_000_000);

    let store = open(dir.path(), &clock);
    store.set("alunos", json!([{"id": 1, "nome": "Ana"}]));
    store.set("cursos", json!({"count": 2, "results": ["Matemática", "Física"]}));
    drop(store);

    let reopened = open(dir.path(), &clock);
    assert_eq!(reopened.get("alunos"), Some(json!([{"id": 1, "nome": "Ana"}])));
    assert_eq!(reopened.keys(), vec!["alunos".to_string(), "cursos".to_string()]);
    assert_eq!(reopened.entry("alunos").unwrap().timestamp, 1_700_000_000_000);
}

#[test]
fn test_persisted_blob_format() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(42);
    let store = open(dir.path(), &clock);
    store.set("vagas", json!([3]));

    let blob = std::fs::read_to_string(dir.path().join("app_cache.json")).unwrap();
    let parsed: Value = serde_json::from_str(&blob).unwrap();
    assert_eq!(parsed, json!({"vagas": {"data": [3], "timestamp": 42}}));

    let map: CacheMap = serde_json::from_value(parsed).unwrap();
    assert_eq!(map.len(), 1);
}

#[test]
fn test_corrupt_file_is_tolerated() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("app_cache.json"), "{\"alunos\": {\"data\": [1]").unwrap();

    let store = open(dir.path(), &ManualClock::new(0));
    assert!(store.is_empty());

    // The next write replaces the corrupt blob
    store.set("alunos", json!([2]));
    let reopened = open(dir.path(), &ManualClock::new(0));
    assert_eq!(reopened.get("alunos"), Some(json!([2])));
}

#[test]
fn test_freshness_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(1_000_000);
    open(dir.path(), &clock).set("alunos", json!([]));

    let reopened = open(dir.path(), &clock);
    assert!(reopened.is_valid("alunos", Duration::from_millis(300_000)));

    clock.advance(Duration::from_millis(300_001));
    assert!(!reopened.is_valid("alunos", Duration::from_millis(300_000)));
}

#[test]
fn test_quota_exceeded_keeps_session_data() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let storage = FileStorage::new(dir.path()).unwrap().with_quota(128);
    let store = CacheStore::init(storage, Arc::new(clock.clone()));

    store.set("salas", json!([1]));
    let big: Vec<String> = (0..50).map(|i| format!("sala-{}", i)).collect();
    store.set("turmas", json!(big));
    assert_eq!(store.get("turmas"), Some(json!(big)));

    // Only the last write that fit made it to disk
    let reopened = open(dir.path(), &clock);
    assert_eq!(reopened.get("salas"), Some(json!([1])));
    assert!(reopened.get("turmas").is_none());
}

#[test]
fn test_clear_all_deletes_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(dir.path(), &ManualClock::new(0));
    store.set("alunos", json!([1]));
    store.clear_all();

    assert!(!dir.path().join("app_cache.json").exists());
    assert!(open(dir.path(), &ManualClock::new(0)).is_empty());
}

#[tokio::test]
async fn test_binder_starts_warm_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(0);
    let key = Resource::Turmas.key();

    {
        let ctx = SyncContext::new(open(dir.path(), &clock));
        let fetcher = || async { Ok::<_, anyhow::Error>(json!({"data": {"results": [{"id": 5}]}})) };
        let binder = ctx.bind(key, fetcher, false);
        binder.refresh(false).await;
        assert!(binder.update(5, json!({"vagas": 0})));
    }

    let ctx = SyncContext::new(open(dir.path(), &clock));
    let binder = ctx.bind(key, never_resolves(), true);
    let snap: Snapshot = binder.snapshot();
    assert_eq!(snap.data.as_deref(), Some(&json!([{"id": 5, "vagas": 0}])));
    assert!(!snap.loading);
}

#[tokio::test]
async fn test_two_binders_share_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = SyncContext::new(open(dir.path(), &ManualClock::new(0)));
    ctx.store().set("alunos", json!([{"id": 1}, {"id": 2}]));

    let list_page = ctx.bind("alunos", never_resolves(), false);
    assert!(list_page.remove(1));

    // A page bound later sees the optimistic edit
    let detail_page = ctx.bind("alunos", never_resolves(), false);
    assert_eq!(detail_page.data().as_deref(), Some(&json!([{"id": 2}])));
}

#[tokio::test]
async fn test_cold_start_error_is_typed() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = SyncContext::new(open(dir.path(), &ManualClock::new(0)));
    let binder = ctx.bind("vagas", || async { Ok::<_, anyhow::Error>(Value::Null) }, false);

    binder.refresh(false).await;
    assert_eq!(binder.error(), Some(FetchError::Malformed));
    assert!(ctx.store().get("vagas").is_none());
}

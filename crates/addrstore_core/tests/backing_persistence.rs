mod common;

use addrstore_core::{
    BackingStore, BackingStoreError, JsonFileBackingStore, Notify, Provider, RawRecord,
    SqliteBackingStore, Store, StoreConfig, StoreError,
};
use common::{Mode, Preference, Window};
use rusqlite::Connection;
use std::path::Path;

fn sqlite_store(path: &Path) -> Store {
    let config = StoreConfig::default();
    let mut store = Store::new();
    store
        .register_provider(
            "ui",
            Provider::<Window, _>::open(SqliteBackingStore::new(path, "ui", &config).unwrap())
                .unwrap(),
        )
        .unwrap();
    store
        .register_provider(
            "prefs",
            Provider::<Preference, _>::open(
                SqliteBackingStore::new(path, "prefs", &config).unwrap(),
            )
            .unwrap(),
        )
        .unwrap();
    store
}

#[test]
fn sqlite_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let mut store = sqlite_store(&path);
    let mut window: Window = store.create("ui.main", Notify::Emit).unwrap();
    window.title = "persisted".to_string();
    window.visible = true;
    window.width = 640;
    window.mode = Mode::Fullscreen;
    store.update("ui.main", window.clone(), Notify::Emit).unwrap();
    let mut preference: Preference = store.create("prefs.sound", Notify::Emit).unwrap();
    preference.label = "Sound".to_string();
    store.update("prefs.sound", preference, Notify::Emit).unwrap();
    store.close().unwrap();

    let mut reopened = sqlite_store(&path);
    assert!(!reopened.is_cached("ui.main").unwrap());
    assert!(reopened.is_cached("prefs.sound").unwrap());

    let loaded: Window = reopened.read("ui.main").unwrap();
    assert_eq!(loaded.title, "persisted");
    assert!(loaded.visible);
    assert_eq!(loaded.width, 640);
    assert_eq!(loaded.mode, Mode::Fullscreen);

    let sound: Preference = reopened.read("prefs.sound").unwrap();
    assert_eq!(sound.label, "Sound");
    assert!(sound.enabled);
    assert!(!reopened.contains("prefs.main").unwrap());
    reopened.close().unwrap();
}

#[test]
fn sqlite_delete_is_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let mut store = sqlite_store(&path);
    store.create::<Window>("ui.main", Notify::Emit).unwrap();
    store.create::<Window>("ui.aux", Notify::Emit).unwrap();
    store.delete("ui.main", Notify::Emit).unwrap();
    store.close().unwrap();

    let mut reopened = sqlite_store(&path);
    let all = reopened.read_all::<Window>("ui").unwrap();
    assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["aux"]);
}

#[test]
fn same_sqlite_container_cannot_back_two_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let config = StoreConfig::default();

    let mut store = Store::new();
    store
        .register_provider(
            "ui",
            Provider::<Window, _>::open(SqliteBackingStore::new(&path, "ui", &config).unwrap())
                .unwrap(),
        )
        .unwrap();
    let err = store
        .register_provider(
            "ui2",
            Provider::<Window, _>::open(SqliteBackingStore::new(&path, "ui", &config).unwrap())
                .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn sqlite_lock_wait_beyond_budget_is_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");
    let config = StoreConfig {
        backing_timeout_ms: 100,
        ..StoreConfig::default()
    };
    let mut backing = SqliteBackingStore::new(&path, "ui", &config).unwrap();
    backing.load().unwrap();
    backing.create_record("main", &["title"]).unwrap();

    let locker = Connection::open(&path).unwrap();
    locker.execute_batch("BEGIN EXCLUSIVE;").unwrap();

    let mut values = RawRecord::new();
    values.insert("title".to_string(), "blocked".to_string());
    assert!(matches!(
        backing.write_record("main", &values),
        Err(BackingStoreError::Timeout(_))
    ));

    locker.execute_batch("ROLLBACK;").unwrap();
    backing.write_record("main", &values).unwrap();
    backing.unload().unwrap();
}

#[test]
fn differently_spelled_sqlite_paths_cannot_back_two_namespaces() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    let direct = dir.path().join("store.db");
    let detour = dir.path().join("nested").join("..").join("store.db");
    let config = StoreConfig::default();

    let mut store = Store::new();
    store
        .register_provider(
            "ui",
            Provider::<Window, _>::open(SqliteBackingStore::new(&direct, "ui", &config).unwrap())
                .unwrap(),
        )
        .unwrap();
    let err = store
        .register_provider(
            "ui2",
            Provider::<Window, _>::open(SqliteBackingStore::new(&detour, "ui", &config).unwrap())
                .unwrap(),
        )
        .unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[test]
fn json_create_that_fails_to_save_leaves_no_record_behind() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("state");
    let path = parent.join("windows.json");

    let mut provider =
        Provider::<Window, _>::open(JsonFileBackingStore::new(&path).unwrap()).unwrap();
    std::fs::write(&parent, "not a directory").unwrap();
    assert!(matches!(
        provider.create("main"),
        Err(StoreError::BackingStore(BackingStoreError::Io { .. }))
    ));
    assert!(!provider.contains("main").unwrap());

    std::fs::remove_file(&parent).unwrap();
    provider.create("main").unwrap();
    provider.close().unwrap();

    let reopened =
        Provider::<Window, _>::open(JsonFileBackingStore::new(&path).unwrap()).unwrap();
    assert_eq!(reopened.local_addresses(), vec!["main"]);
}

#[test]
fn json_file_records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("windows.json");

    let mut store = Store::new();
    store
        .register_provider(
            "ui",
            Provider::<Window, _>::open(JsonFileBackingStore::new(&path).unwrap()).unwrap(),
        )
        .unwrap();
    let mut window: Window = store.create("ui.main", Notify::Emit).unwrap();
    window.title = "from json".to_string();
    store.update("ui.main", window, Notify::Emit).unwrap();
    store.close().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let document: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(document["records"]["main"]["title"], "from json");

    let mut provider = Provider::<Window, _>::open(JsonFileBackingStore::new(&path).unwrap())
        .unwrap();
    assert_eq!(provider.read("main").unwrap().title, "from json");
}

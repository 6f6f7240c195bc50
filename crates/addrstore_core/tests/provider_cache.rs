mod common;

use addrstore_core::{
    BackingCall, BackingStoreError, CachePolicy, FieldDescriptorTable, FieldType, FieldValue,
    MemoryBackingStore, Provider, Record, SchemaError, StoreError,
};
use common::{raw, Mode, Preference, Window};
use once_cell::sync::Lazy;

#[derive(Debug, Clone, Default)]
struct Unpoliced;

static UNPOLICED_SCHEMA: Lazy<FieldDescriptorTable> = Lazy::new(|| {
    FieldDescriptorTable::builder("unpoliced")
        .field("name", FieldType::Text)
        .build()
        .unwrap()
});

impl Record for Unpoliced {
    fn schema() -> &'static FieldDescriptorTable {
        &UNPOLICED_SCHEMA
    }

    fn get_field(&self, _name: &str) -> Option<FieldValue> {
        None
    }

    fn set_field(&mut self, _name: &str, _value: FieldValue) -> bool {
        false
    }
}

fn seeded_windows() -> MemoryBackingStore {
    MemoryBackingStore::with_records([
        (
            "main",
            raw(&[
                ("title", "editor"),
                ("visible", "TRUE"),
                ("width", "800"),
                ("mode", "1"),
            ]),
        ),
        ("aux", raw(&[("title", "aux")])),
    ])
}

#[test]
fn lazy_policy_defers_reads_until_first_access() {
    let backing = seeded_windows();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();

    assert_eq!(provider.cache_policy(), CachePolicy::Lazy);
    assert_eq!(provider.local_addresses(), vec!["aux", "main"]);
    assert!(!provider.is_cached("main").unwrap());
    assert_eq!(backing.counts().read, 0);

    let main = provider.read("main").unwrap();
    assert_eq!(main.title, "editor");
    assert!(main.visible);
    assert_eq!(main.width, 800);
    assert_eq!(main.mode, Mode::Fullscreen);
    assert!(provider.is_cached("main").unwrap());

    provider.read("main").unwrap();
    assert_eq!(backing.counts().read, 1);
}

#[test]
fn eager_policy_reads_everything_on_load() {
    let backing = MemoryBackingStore::with_records([
        ("sound", raw(&[("label", "Sound"), ("enabled", "false")])),
        ("music", raw(&[("label", "Music")])),
    ]);
    let mut provider = Provider::<Preference, _>::open(backing.clone()).unwrap();

    assert_eq!(backing.counts().read, 2);
    assert!(provider.is_cached("sound").unwrap());
    assert!(provider.is_cached("music").unwrap());

    let sound = provider.read("sound").unwrap();
    assert_eq!(sound.label, "Sound");
    assert!(!sound.enabled);
    assert_eq!(backing.counts().read, 2);
}

#[test]
fn missing_and_blank_stored_values_keep_current_value() {
    let backing = MemoryBackingStore::with_records([(
        "main",
        raw(&[("title", ""), ("visible", ""), ("width", "  ")]),
    )]);
    let mut provider = Provider::<Window, _>::open(backing).unwrap();

    let main = provider.read("main").unwrap();
    assert_eq!(main.title, "", "blank text is a real value");
    assert!(!main.visible);
    assert_eq!(main.width, 0);
    assert_eq!(main.mode, Mode::Windowed);
}

#[test]
fn undecodable_stored_value_is_reported() {
    let backing = seeded_windows();
    backing.put_raw("main", "visible", "maybe");
    let mut provider = Provider::<Window, _>::open(backing).unwrap();

    match provider.read("main").unwrap_err() {
        StoreError::BackingStore(BackingStoreError::InvalidValue { field, raw, .. }) => {
            assert_eq!(field, "visible");
            assert_eq!(raw, "maybe");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!provider.is_cached("main").unwrap());
}

#[test]
fn update_overwrites_undecodable_stored_value() {
    let backing = seeded_windows();
    backing.put_raw("main", "visible", "maybe");
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();

    let repaired = Window {
        title: "editor".to_string(),
        visible: false,
        width: 800,
        mode: Mode::Fullscreen,
        ..Window::default()
    };
    provider.update("main", repaired.clone()).unwrap();

    assert_eq!(backing.counts().write, 1);
    assert_eq!(backing.snapshot("main").unwrap()["visible"], "false");
    assert!(provider.is_cached("main").unwrap());
    assert_eq!(provider.read("main").unwrap(), repaired);
}

#[test]
fn identical_update_skips_backing_write() {
    let backing = MemoryBackingStore::new();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    let window = provider.create("main").unwrap();
    assert_eq!(backing.counts().write, 1);

    provider.update("main", window.clone()).unwrap();
    assert_eq!(backing.counts().write, 1);
    assert!(provider.is_cached("main").unwrap());
    assert_eq!(provider.read("main").unwrap(), window);
}

#[test]
fn change_outside_schema_is_kept_without_write() {
    let backing = MemoryBackingStore::new();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    let mut window = provider.create("main").unwrap();

    window.scratch = "draft".to_string();
    provider.update("main", window).unwrap();

    assert_eq!(backing.counts().write, 1);
    assert_eq!(provider.read("main").unwrap().scratch, "draft");
}

#[test]
fn unsupported_field_change_writes_only_supported_fields() {
    let backing = MemoryBackingStore::new();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    let mut window = provider.create("main").unwrap();

    window.layout = vec!["left".to_string(), "right".to_string()];
    provider.update("main", window).unwrap();

    assert_eq!(backing.counts().write, 2);
    assert!(!backing.snapshot("main").unwrap().contains_key("layout"));
}

#[test]
fn update_of_lazy_record_compares_against_stored_values() {
    let backing = seeded_windows();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();

    let same_as_stored = Window {
        title: "editor".to_string(),
        visible: true,
        width: 800,
        mode: Mode::Fullscreen,
        ..Window::default()
    };
    provider.update("main", same_as_stored).unwrap();

    assert_eq!(backing.counts().read, 1);
    assert_eq!(backing.counts().write, 0);
    assert!(provider.is_cached("main").unwrap());
}

#[test]
fn failed_write_leaves_container_uncached() {
    let backing = MemoryBackingStore::new();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    let mut window = provider.create("main").unwrap();

    backing.fail_next(BackingCall::Write);
    window.title = "lost".to_string();
    let err = provider.update("main", window).unwrap_err();
    assert!(matches!(
        err,
        StoreError::BackingStore(BackingStoreError::Injected(BackingCall::Write))
    ));
    assert!(!provider.is_cached("main").unwrap());

    assert_eq!(provider.read("main").unwrap().title, "untitled");
    assert!(provider.is_cached("main").unwrap());
}

#[test]
fn failed_initial_write_rolls_back_create() {
    let backing = MemoryBackingStore::new();
    let mut provider = Provider::<Window, _>::open(backing.clone()).unwrap();

    backing.fail_next(BackingCall::Write);
    assert!(provider.create("main").is_err());
    assert!(!provider.contains("main").unwrap());
    assert!(backing.snapshot("main").is_none());

    provider.create("main").unwrap();
}

#[test]
fn load_failure_unloads_backing_store() {
    let backing = MemoryBackingStore::with_records([("sound", raw(&[("label", "Sound")]))]);
    backing.fail_next(BackingCall::Read);

    let result = Provider::<Preference, _>::open(backing.clone());
    assert!(matches!(
        result,
        Err(StoreError::BackingStore(BackingStoreError::Injected(
            BackingCall::Read
        )))
    ));
    assert_eq!(backing.counts().load, 1);
    assert_eq!(backing.counts().unload, 1);
    assert!(!backing.is_loaded());
}

#[test]
fn schema_without_cache_policy_is_rejected_before_load() {
    let backing = MemoryBackingStore::new();
    let result = Provider::<Unpoliced, _>::open(backing.clone());

    assert!(matches!(
        result,
        Err(StoreError::Schema(SchemaError::MissingCachePolicy("unpoliced")))
    ));
    assert_eq!(backing.counts().load, 0);
}

#[test]
fn dropping_provider_unloads_once() {
    let backing = MemoryBackingStore::new();
    let provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    drop(provider);
    assert_eq!(backing.counts().unload, 1);

    let provider = Provider::<Window, _>::open(backing.clone()).unwrap();
    provider.close().unwrap();
    assert_eq!(backing.counts().unload, 2);
}

#[test]
fn failed_close_is_not_retried_on_drop() {
    let backing = MemoryBackingStore::new();
    let provider = Provider::<Window, _>::open(backing.clone()).unwrap();

    backing.fail_next(BackingCall::Unload);
    assert!(matches!(
        provider.close(),
        Err(StoreError::BackingStore(BackingStoreError::Injected(
            BackingCall::Unload
        )))
    ));
    assert_eq!(backing.counts().unload, 1);
}

#[test]
fn operations_on_unknown_local_address_fail_with_resolution() {
    let mut provider = Provider::<Window, _>::open(MemoryBackingStore::new()).unwrap();

    assert!(matches!(provider.read("ghost"), Err(StoreError::Resolution(_))));
    assert!(matches!(
        provider.update("ghost", Window::default()),
        Err(StoreError::Resolution(_))
    ));
    assert!(matches!(provider.delete("ghost"), Err(StoreError::Resolution(_))));
    assert!(matches!(provider.is_cached("ghost"), Err(StoreError::Resolution(_))));
}

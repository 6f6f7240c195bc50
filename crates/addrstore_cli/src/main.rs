//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise `addrstore_core` end to end against a SQLite backing file.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage: `addrstore_cli <db-path> [config.json]`

use addrstore_core::{
    init_logging_from_config, CachePolicy, FieldDescriptorTable, FieldType, FieldValue, Notify,
    Provider, Record, SqliteBackingStore, Store, StoreConfig, StoreUpdate, Subscriber,
};
use log::info;
use once_cell::sync::Lazy;
use std::process::ExitCode;

const NAMESPACE: &str = "settings";
const ADDRESS: &str = "settings.editor.main";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    fn ordinal(self) -> i64 {
        match self {
            Self::Light => 0,
            Self::Dark => 1,
        }
    }

    fn from_ordinal(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Light),
            1 => Some(Self::Dark),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct EditorSettings {
    font: String,
    word_wrap: bool,
    tab_width: i64,
    theme: Theme,
}

static EDITOR_SCHEMA: Lazy<FieldDescriptorTable> = Lazy::new(|| {
    FieldDescriptorTable::builder("editor_settings")
        .cache_policy(CachePolicy::Lazy)
        .field_with_default("font", FieldType::Text, FieldValue::Text("mono".into()))
        .field("word_wrap", FieldType::Boolean)
        .field_with_default("tab_width", FieldType::Integer, FieldValue::Integer(4))
        .field("theme", FieldType::Ordinal)
        .build()
        .expect("editor settings schema is valid")
});

impl Record for EditorSettings {
    fn schema() -> &'static FieldDescriptorTable {
        &EDITOR_SCHEMA
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "font" => Some(FieldValue::Text(self.font.clone())),
            "word_wrap" => Some(FieldValue::Boolean(self.word_wrap)),
            "tab_width" => Some(FieldValue::Integer(self.tab_width)),
            "theme" => Some(FieldValue::Ordinal(self.theme.ordinal())),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("font", FieldValue::Text(font)) => self.font = font,
            ("word_wrap", FieldValue::Boolean(flag)) => self.word_wrap = flag,
            ("tab_width", FieldValue::Integer(width)) => self.tab_width = width,
            ("theme", FieldValue::Ordinal(ordinal)) => match Theme::from_ordinal(ordinal) {
                Some(theme) => self.theme = theme,
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("addrstore_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .ok_or_else(|| "usage: addrstore_cli <db-path> [config.json]".to_string())?;
    let config = match args.next() {
        Some(path) => StoreConfig::from_json_file(&path).map_err(|err| err.to_string())?,
        None => StoreConfig::default(),
    };
    init_logging_from_config(&config)?;

    let backing =
        SqliteBackingStore::new(&db_path, NAMESPACE, &config).map_err(|err| err.to_string())?;
    let provider: Provider<EditorSettings, _> =
        Provider::open(backing).map_err(|err| err.to_string())?;

    let mut store = Store::new();
    store
        .register_provider(NAMESPACE, provider)
        .map_err(|err| err.to_string())?;
    store
        .subscribe(
            ADDRESS,
            &Subscriber::new(|update: &StoreUpdate| {
                println!("notify {} {}", update.kind.as_str(), update.address);
            }),
        )
        .map_err(|err| err.to_string())?;

    let mut settings = if store.contains(ADDRESS).map_err(|err| err.to_string())? {
        store
            .read::<EditorSettings>(ADDRESS)
            .map_err(|err| err.to_string())?
    } else {
        store
            .create::<EditorSettings>(ADDRESS, Notify::Emit)
            .map_err(|err| err.to_string())?
    };
    println!("before {settings:?}");

    settings.word_wrap = !settings.word_wrap;
    settings.theme = match settings.theme {
        Theme::Light => Theme::Dark,
        Theme::Dark => Theme::Light,
    };
    store
        .update(ADDRESS, settings, Notify::Emit)
        .map_err(|err| err.to_string())?;

    let stored = store
        .read::<EditorSettings>(ADDRESS)
        .map_err(|err| err.to_string())?;
    println!("after {stored:?}");
    info!(
        "event=cli_run module=cli status=ok version={}",
        addrstore_core::core_version()
    );

    store.close().map_err(|err| err.to_string())
}

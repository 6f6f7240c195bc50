#![allow(dead_code)]

use addrstore_core::{
    CachePolicy, FieldDescriptorTable, FieldType, FieldValue, RawRecord, Record, StoreUpdate,
    Subscriber,
};
use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Windowed,
    Fullscreen,
}

/// Lazy-policy record covering every supported field type, a default with
/// the wrong type, an unsupported field and a field outside the schema.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
    pub title: String,
    pub visible: bool,
    pub width: i64,
    pub mode: Mode,
    pub layout: Vec<String>,
    pub scratch: String,
}

static WINDOW_SCHEMA: Lazy<FieldDescriptorTable> = Lazy::new(|| {
    FieldDescriptorTable::builder("window")
        .cache_policy(CachePolicy::Lazy)
        .field_with_default("title", FieldType::Text, FieldValue::Text("untitled".into()))
        .field("visible", FieldType::Boolean)
        .field_with_default("width", FieldType::Integer, FieldValue::Text("wide".into()))
        .field("mode", FieldType::Ordinal)
        .field("layout", FieldType::Unsupported("layout_tree"))
        .build()
        .unwrap()
});

impl Record for Window {
    fn schema() -> &'static FieldDescriptorTable {
        &WINDOW_SCHEMA
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "title" => Some(FieldValue::Text(self.title.clone())),
            "visible" => Some(FieldValue::Boolean(self.visible)),
            "width" => Some(FieldValue::Integer(self.width)),
            "mode" => Some(FieldValue::Ordinal(match self.mode {
                Mode::Windowed => 0,
                Mode::Fullscreen => 1,
            })),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("title", FieldValue::Text(title)) => self.title = title,
            ("visible", FieldValue::Boolean(visible)) => self.visible = visible,
            ("width", FieldValue::Integer(width)) => self.width = width,
            ("mode", FieldValue::Ordinal(0)) => self.mode = Mode::Windowed,
            ("mode", FieldValue::Ordinal(1)) => self.mode = Mode::Fullscreen,
            _ => return false,
        }
        true
    }

    fn field_eq(&self, other: &Self, name: &str) -> bool {
        match name {
            "layout" => self.layout == other.layout,
            _ => self.get_field(name) == other.get_field(name),
        }
    }
}

/// Eager-policy record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preference {
    pub label: String,
    pub enabled: bool,
}

static PREFERENCE_SCHEMA: Lazy<FieldDescriptorTable> = Lazy::new(|| {
    FieldDescriptorTable::builder("preference")
        .cache_policy(CachePolicy::Eager)
        .field("label", FieldType::Text)
        .field_with_default("enabled", FieldType::Boolean, FieldValue::Boolean(true))
        .build()
        .unwrap()
});

impl Record for Preference {
    fn schema() -> &'static FieldDescriptorTable {
        &PREFERENCE_SCHEMA
    }

    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "label" => Some(FieldValue::Text(self.label.clone())),
            "enabled" => Some(FieldValue::Boolean(self.enabled)),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, value: FieldValue) -> bool {
        match (name, value) {
            ("label", FieldValue::Text(label)) => self.label = label,
            ("enabled", FieldValue::Boolean(enabled)) => self.enabled = enabled,
            _ => return false,
        }
        true
    }
}

pub fn raw(pairs: &[(&str, &str)]) -> RawRecord {
    pairs
        .iter()
        .map(|(field, value)| ((*field).to_string(), (*value).to_string()))
        .collect()
}

/// Subscriber that appends `label:address:kind` to `log`.
pub fn recorder(log: &Arc<Mutex<Vec<String>>>, label: &'static str) -> Subscriber {
    let log = Arc::clone(log);
    Subscriber::new(move |update: &StoreUpdate| {
        log.lock()
            .unwrap()
            .push(format!("{label}:{}:{}", update.address, update.kind.as_str()));
    })
}

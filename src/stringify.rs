use serde::Serialize;

use crate::boxes::Mp4Box;
use crate::error::Result;
use crate::field::{CustomFieldObject, FieldConfig};

/// One field's value as collected by the stringifier walk.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Uint { value: u64, hex: bool },
    Int(i64),
    Bool(bool),
    Text(String),
    Bytes { data: Vec<u8>, text: bool },
    List(Vec<FieldValue>),
    Record(Vec<FieldEntry>),
    /// Pre-rendered text, from `stringify_field` or special-cased fields.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldEntry {
    pub name: &'static str,
    pub value: FieldValue,
}

/// Collects the present, non-const fields of a box value in wire order.
pub struct Stringifier {
    version: u8,
    flags: u32,
    entries: Vec<FieldEntry>,
}

impl Stringifier {
    pub(crate) fn new(version: u8, flags: u32) -> Self {
        Self {
            version,
            flags,
            entries: Vec::new(),
        }
    }

    /// Fresh collector for an embedded record, sharing the box version and
    /// flags for presence evaluation.
    pub fn nested(&self) -> Stringifier {
        Stringifier::new(self.version, self.flags)
    }

    pub fn into_entries(self) -> Vec<FieldEntry> {
        self.entries
    }

    pub fn push(&mut self, name: &'static str, value: FieldValue) {
        self.entries.push(FieldEntry { name, value });
    }

    pub fn field_enabled(&self, cfg: &FieldConfig, cfo: &dyn CustomFieldObject) -> bool {
        cfg.enabled(self.version, self.flags, cfo)
    }
}

/// Render a box value as a one-line `name=value` summary.
pub fn stringify<B: Mp4Box + ?Sized>(src: &B) -> Result<String> {
    let mut s = Stringifier::new(src.get_version(), src.get_flags());
    src.stringify_fields(&mut s)?;
    Ok(render_entries(&s.entries))
}

fn render_entries(entries: &[FieldEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}={}", e.name, render_value(&e.value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Uint { value, hex: true } => format!("0x{value:x}"),
        FieldValue::Uint { value, hex: false } => value.to_string(),
        FieldValue::Int(v) => v.to_string(),
        FieldValue::Bool(v) => v.to_string(),
        FieldValue::Text(s) => format!("\"{s}\""),
        FieldValue::Bytes { data, text: true } => {
            format!("\"{}\"", String::from_utf8_lossy(data))
        }
        FieldValue::Bytes { data, text: false } => {
            let hex: String = data.iter().map(|b| format!("{b:02x}")).collect();
            format!("0x{hex}")
        }
        FieldValue::List(items) => {
            let inner: Vec<String> = items.iter().map(render_value).collect();
            format!("[{}]", inner.join(", "))
        }
        FieldValue::Record(entries) => format!("{{{}}}", render_entries(entries)),
        FieldValue::Custom(s) => s.clone(),
    }
}

/// JSON-ready form of one box value, in wire order.
#[derive(Debug, Serialize)]
pub struct BoxDump {
    pub typ: String,
    pub fields: Vec<FieldDump>,
}

#[derive(Debug, Serialize)]
pub struct FieldDump {
    pub name: String,
    pub value: serde_json::Value,
}

/// Render a box value as serializable structured data.
pub fn dump<B: Mp4Box + ?Sized>(src: &B) -> Result<BoxDump> {
    let mut s = Stringifier::new(src.get_version(), src.get_flags());
    src.stringify_fields(&mut s)?;
    Ok(BoxDump {
        typ: src.get_type().to_string(),
        fields: s.entries.iter().map(entry_to_dump).collect(),
    })
}

fn entry_to_dump(entry: &FieldEntry) -> FieldDump {
    FieldDump {
        name: entry.name.to_string(),
        value: value_to_json(&entry.value),
    }
}

fn value_to_json(value: &FieldValue) -> serde_json::Value {
    use serde_json::json;
    match value {
        FieldValue::Uint { value, hex: true } => json!(format!("0x{value:x}")),
        FieldValue::Uint { value, hex: false } => json!(value),
        FieldValue::Int(v) => json!(v),
        FieldValue::Bool(v) => json!(v),
        FieldValue::Text(s) => json!(s),
        FieldValue::Bytes { data, text: true } => json!(String::from_utf8_lossy(data)),
        FieldValue::Bytes { data, text: false } => {
            json!(data.iter().map(|b| format!("{b:02x}")).collect::<String>())
        }
        FieldValue::List(items) => {
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
        }
        FieldValue::Record(entries) => serde_json::Value::Array(
            entries
                .iter()
                .map(|e| json!({ "name": e.name, "value": value_to_json(&e.value) }))
                .collect(),
        ),
        FieldValue::Custom(s) => json!(s),
    }
}

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Number, Value};

/// Typed value of one mapped field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Number(Number),
    Text(String),
    DateTime(DateTime<Utc>),
    Image(ImageRef),
    /// Unconverted HTML of a `richtext` field.
    RichText(String),
    /// Converted rich text.
    Markdown(String),
    Object(Value),
    /// A source value copied through without validation.
    Raw(Value),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) | FieldValue::RichText(text) | FieldValue::Markdown(text) => {
                Some(text)
            }
            _ => None,
        }
    }

    /// JSON rendering used for front matter.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Bool(b) => Value::Bool(*b),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Text(s) | FieldValue::RichText(s) | FieldValue::Markdown(s) => {
                Value::String(s.clone())
            }
            FieldValue::DateTime(at) => Value::String(format_timestamp(at)),
            FieldValue::Image(image) => image.to_json(),
            FieldValue::Object(value) | FieldValue::Raw(value) => value.clone(),
        }
    }
}

/// An image reference; `src` is replaced by a local path once materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub src: String,
    pub remote_url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageRef {
    pub fn remote(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            src: url.clone(),
            remote_url: url,
            width: None,
            height: None,
        }
    }

    fn to_json(&self) -> Value {
        match (self.width, self.height) {
            (Some(width), Some(height)) => json!({
                "src": self.src,
                "width": width,
                "height": height,
            }),
            _ => Value::String(self.src.clone()),
        }
    }
}

/// RFC 3339 with millisecond precision, `Z` suffix.
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Normalized output of the field-mapping engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    fields: Vec<(String, FieldValue)>,
}

impl MappedRecord {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at,
            updated_at,
            fields: Vec::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets `name`, keeping its position if already present.
    pub fn set(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        let index = self.fields.iter().position(|(key, _)| key == name)?;
        Some(self.fields.remove(index).1)
    }

    /// Destination fields in mapping order, passthrough fields last.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

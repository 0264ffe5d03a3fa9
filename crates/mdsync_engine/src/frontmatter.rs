use mdsync_core::{FieldValue, MappedRecord, MappingSpec, CREATED_AT, ID, UPDATED_AT};
use serde_json::Value;

/// What goes into a serialized document besides the mapped fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentLayout {
    /// Emit `createdAt`/`updatedAt`.
    pub base_fields: bool,
    /// Front-matter key of the sequence position.
    pub position_field: Option<String>,
    /// Field rendered as the document body.
    pub body: Option<String>,
}

impl DocumentLayout {
    pub fn from_spec(spec: &MappingSpec) -> Self {
        Self {
            base_fields: spec.base_fields,
            position_field: spec.position.field.clone(),
            body: spec.body.clone(),
        }
    }
}

/// Renders `record` as a Markdown document with `---` front matter.
///
/// Every value is written as JSON, which YAML reads back unchanged: strings
/// are quoted, objects and arrays become flow collections.
pub fn build_markdown_document(
    record: &MappedRecord,
    position: Option<i64>,
    layout: &DocumentLayout,
) -> String {
    let mut doc = String::from("---\n");
    push_entry(&mut doc, ID, &Value::String(record.id.clone()));
    if layout.base_fields {
        push_entry(&mut doc, CREATED_AT, &FieldValue::DateTime(record.created_at).to_json());
        push_entry(&mut doc, UPDATED_AT, &FieldValue::DateTime(record.updated_at).to_json());
    }
    if let (Some(field), Some(position)) = (layout.position_field.as_deref(), position) {
        push_entry(&mut doc, field, &Value::from(position));
    }

    let body_field = layout.body.as_deref();
    for (name, value) in record.fields() {
        if Some(name) != body_field {
            push_entry(&mut doc, name, &value.to_json());
        }
    }
    doc.push_str("---\n");

    let body = body_field
        .and_then(|name| record.get(name))
        .and_then(FieldValue::as_text)
        .filter(|body| !body.trim().is_empty());
    if let Some(body) = body {
        doc.push('\n');
        doc.push_str(body);
        if !body.ends_with('\n') {
            doc.push('\n');
        }
    }
    doc
}

fn push_entry(doc: &mut String, key: &str, value: &Value) {
    doc.push_str(key);
    doc.push_str(": ");
    doc.push_str(&value.to_string());
    doc.push('\n');
}

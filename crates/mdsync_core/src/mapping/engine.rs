use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{describe, MappingError};
use crate::mapping::datetime::parse_datetime;
use crate::mapping::record::{FieldValue, ImageRef, MappedRecord};
use crate::mapping::spec::{CompiledField, CompiledMapping, FieldKind};
use crate::mapping::{is_valid_identifier, CREATED_AT, ID, UPDATED_AT};

/// Per-run inputs shared by every record of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapContext {
    /// Fallback for records without lifecycle timestamps. Fixed per run so
    /// mapping stays deterministic.
    pub now: DateTime<Utc>,
}

impl MapContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now() -> Self {
        Self::new(Utc::now())
    }
}

/// Maps one raw record through a compiled mapping.
///
/// Fails on the first field whose value does not fit its kind; no partially
/// mapped record is ever returned.
pub fn map_record(
    raw: &Value,
    mapping: &CompiledMapping,
    ctx: &MapContext,
) -> Result<MappedRecord, MappingError> {
    let source = raw.as_object().ok_or_else(|| MappingError::NotAnObject {
        value: describe(raw),
    })?;
    let mut remaining = source.clone();
    let base = &mapping.spec().base;

    let id = match remaining.remove(&base.id) {
        None | Some(Value::Null) => fallback_id(raw),
        Some(value) => coerce_id(&base.id, ID, "id", &value)?,
    };
    let created_at = take_timestamp(&mut remaining, &base.created_at, CREATED_AT)?;
    let updated_at = take_timestamp(&mut remaining, &base.updated_at, UPDATED_AT)?;
    let created_at = created_at.or(updated_at).unwrap_or(ctx.now);
    let updated_at = updated_at.unwrap_or(created_at);

    let mut record = MappedRecord::new(id, created_at, updated_at);
    for field in mapping.fields() {
        let Some(value) = source.get(&field.spec.source) else {
            continue;
        };
        let value = match &field.transform {
            Some(expr) => expr
                .evaluate(value)
                .map_err(|source| MappingError::Transform {
                    source_field: field.spec.source.clone(),
                    destination: field.destination.clone(),
                    source,
                })?,
            None => value.clone(),
        };
        remaining.remove(&field.spec.source);
        if value.is_null() {
            continue;
        }
        let mapped = convert_field(field, value)?;
        record.set(field.destination.clone(), mapped);
    }

    if mapping.spec().passthru_unmapped {
        let position = mapping.position().field.as_deref();
        for (key, value) in remaining {
            let reserved = matches!(key.as_str(), ID | CREATED_AT | UPDATED_AT)
                || position == Some(key.as_str());
            if !reserved && !record.contains(&key) {
                record.set(key, FieldValue::Raw(value));
            }
        }
    }

    Ok(record)
}

fn convert_field(field: &CompiledField, value: Value) -> Result<FieldValue, MappingError> {
    let kind = &field.spec.kind;
    let mismatch = |expected: &'static str, found: &Value| MappingError::TypeMismatch {
        source_field: field.spec.source.clone(),
        destination: field.destination.clone(),
        kind: kind.name(),
        expected,
        found: describe(found),
    };

    match kind {
        FieldKind::Id => {
            coerce_id(&field.spec.source, &field.destination, kind.name(), &value).map(FieldValue::Text)
        }
        FieldKind::Boolean => match &value {
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::String(s) if s == "true" => Ok(FieldValue::Bool(true)),
            Value::String(s) if s == "false" => Ok(FieldValue::Bool(false)),
            other => Err(mismatch("a boolean", other)),
        },
        FieldKind::Number => match value {
            Value::Number(n) => Ok(FieldValue::Number(n)),
            other => Err(mismatch("a number", &other)),
        },
        FieldKind::String => Ok(FieldValue::Text(coerce_string(value))),
        FieldKind::Image { .. } => Ok(FieldValue::Image(ImageRef::remote(coerce_string(value)))),
        FieldKind::Datetime => parse_datetime(&value)
            .map(FieldValue::DateTime)
            .ok_or_else(|| mismatch("a date", &value)),
        FieldKind::Enum { .. } => {
            let text = coerce_string(value);
            let rewritten = field
                .rules
                .iter()
                .find(|(pattern, _)| pattern.is_match(&text))
                .map(|(pattern, replacement)| pattern.replace(&text, replacement.as_str()).into_owned());
            Ok(FieldValue::Text(rewritten.unwrap_or(text)))
        }
        FieldKind::Object => Ok(FieldValue::Object(value)),
        FieldKind::Richtext { .. } => match value {
            Value::String(html) => Ok(FieldValue::RichText(html)),
            other => Err(mismatch("an HTML string", &other)),
        },
    }
}

fn coerce_id(
    source_field: &str,
    destination: &str,
    kind: &'static str,
    value: &Value,
) -> Result<String, MappingError> {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => {
            return Err(MappingError::TypeMismatch {
                source_field: source_field.to_string(),
                destination: destination.to_string(),
                kind,
                expected: "a string or number",
                found: describe(other),
            })
        }
    };
    if !is_valid_identifier(&text) {
        return Err(MappingError::InvalidIdentifier {
            source_field: source_field.to_string(),
            destination: destination.to_string(),
            kind,
            value: text,
        });
    }
    Ok(text)
}

fn coerce_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

fn take_timestamp(
    remaining: &mut Map<String, Value>,
    source_field: &str,
    destination: &str,
) -> Result<Option<DateTime<Utc>>, MappingError> {
    match remaining.remove(source_field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_datetime(&value)
            .map(Some)
            .ok_or_else(|| MappingError::TypeMismatch {
                source_field: source_field.to_string(),
                destination: destination.to_string(),
                kind: "datetime",
                expected: "a date",
                found: describe(&value),
            }),
    }
}

/// Stable identifier for records the source gives no id: the leading bytes of
/// a SHA-256 over the record's canonical JSON.
fn fallback_id(raw: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.to_string().as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

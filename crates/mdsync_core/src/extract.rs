use serde_json::Value;

use crate::error::{describe, TransformError};
use crate::expr::Expr;

/// Locates the record array inside a page payload.
///
/// Sources that wrap their records in an envelope (`{"data": {"items": [...]}}`)
/// are reduced with an optional expression, then narrowed further with an
/// optional dot-separated array path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordExtractor {
    pub expr: Option<Expr>,
    pub array_path: Option<String>,
}

impl RecordExtractor {
    pub fn new(expr: Option<Expr>, array_path: Option<String>) -> Self {
        Self { expr, array_path }
    }

    pub fn extract(&self, payload: &Value) -> Result<Vec<Value>, TransformError> {
        extract_records(payload, self.expr.as_ref(), self.array_path.as_deref())
    }
}

/// Applies `expr` (or the identity) to `payload`, walks `array_path`, and
/// returns the array found there.
///
/// Fails if a path segment does not exist or the resolved value is not an
/// array.
pub fn extract_records(
    payload: &Value,
    expr: Option<&Expr>,
    array_path: Option<&str>,
) -> Result<Vec<Value>, TransformError> {
    let evaluated;
    let mut current = match expr {
        Some(expr) => {
            evaluated = expr.evaluate(payload)?;
            &evaluated
        }
        None => payload,
    };

    if let Some(path) = array_path {
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let next = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            };
            current = next.ok_or_else(|| TransformError::MissingSegment {
                segment: segment.to_string(),
                value: describe(current),
            })?;
        }
    }

    match current {
        Value::Array(items) => Ok(items.clone()),
        other => Err(TransformError::NotAnArray {
            value: describe(other),
        }),
    }
}

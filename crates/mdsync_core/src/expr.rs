//! A small path-and-filter expression language over JSON values.
//!
//! An expression is a source (a path into the input, or a literal) followed
//! by any number of `|`-separated filters:
//!
//! ```text
//! fields.title | trim | lower
//! items[*].name | compact | join(", ")
//! $ | default("untitled")
//! ```
//!
//! Navigation is total: a missing key or an index past the end yields `null`.
//! Filters are strict: applying one to a value of the wrong type is an
//! evaluation error carrying the offending value.

use std::fmt;

use serde_json::{Number, Value};
use thiserror::Error;

use crate::error::{describe, TransformError};

/// A compiled expression. Cheap to clone, read-only once parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    text: String,
    head: Head,
    filters: Vec<Filter>,
}

#[derive(Debug, Clone, PartialEq)]
enum Head {
    Path(Vec<Step>),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Key(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Lower,
    Upper,
    Trim,
    ToString,
    ToNumber,
    Length,
    First,
    Last,
    Keys,
    Join(String),
    Split(String),
    Default(Value),
    Replace(String, String),
    Slug,
    Compact,
}

/// Syntax error in an expression.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid expression `{expression}` at offset {offset}: {message}")]
pub struct ParseError {
    pub expression: String,
    pub offset: usize,
    pub message: String,
}

impl Expr {
    /// Parses `text` into an expression.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parser = Parser::new(text);
        let head = parser.head()?;
        let mut filters = Vec::new();
        loop {
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some('|') => {
                    parser.bump();
                    filters.push(parser.filter()?);
                }
                Some(other) => return Err(parser.error(format!("unexpected `{other}`"))),
            }
        }
        Ok(Self {
            text: text.to_string(),
            head,
            filters,
        })
    }

    /// Source text the expression was parsed from.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Evaluates the expression against `input`.
    pub fn evaluate(&self, input: &Value) -> Result<Value, TransformError> {
        let mut value = match &self.head {
            Head::Path(steps) => self.walk(input, steps)?,
            Head::Literal(literal) => literal.clone(),
        };
        for filter in &self.filters {
            value = self.apply(filter, value)?;
        }
        Ok(value)
    }

    fn walk(&self, value: &Value, steps: &[Step]) -> Result<Value, TransformError> {
        let Some((step, rest)) = steps.split_first() else {
            return Ok(value.clone());
        };
        match step {
            Step::Key(key) => match value.as_object().and_then(|map| map.get(key)) {
                Some(next) => self.walk(next, rest),
                None => Ok(Value::Null),
            },
            Step::Index(index) => {
                let next = value.as_array().and_then(|items| {
                    let len = items.len() as i64;
                    let resolved = if *index < 0 { len + index } else { *index };
                    usize::try_from(resolved).ok().and_then(|i| items.get(i))
                });
                match next {
                    Some(next) => self.walk(next, rest),
                    None => Ok(Value::Null),
                }
            }
            Step::Wildcard => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.walk(item, rest))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Err(self.error(other, "`[*]` applied to a non-array value")),
            },
        }
    }

    fn apply(&self, filter: &Filter, value: Value) -> Result<Value, TransformError> {
        match filter {
            Filter::Lower => self.map_str(value, "lower", |s| s.to_lowercase()),
            Filter::Upper => self.map_str(value, "upper", |s| s.to_uppercase()),
            Filter::Trim => self.map_str(value, "trim", |s| s.trim().to_string()),
            Filter::Slug => self.map_str(value, "slug", slugify),
            Filter::Replace(from, to) => self.map_str(value, "replace", |s| s.replace(from, to)),
            Filter::ToString => Ok(Value::String(scalar_text(&value))),
            Filter::ToNumber => match value {
                Value::Number(_) => Ok(value),
                Value::String(ref s) => parse_number(s.trim())
                    .map(Value::Number)
                    .ok_or_else(|| self.error(&value, "`number` could not parse the string")),
                other => Err(self.error(&other, "`number` expects a string or number")),
            },
            Filter::Length => match &value {
                Value::String(s) => Ok(Value::from(s.chars().count())),
                Value::Array(items) => Ok(Value::from(items.len())),
                Value::Object(map) => Ok(Value::from(map.len())),
                other => Err(self.error(other, "`length` expects a string, array or object")),
            },
            Filter::First | Filter::Last => {
                let first = matches!(filter, Filter::First);
                match value {
                    Value::Array(mut items) => {
                        let picked = if first {
                            (!items.is_empty()).then(|| items.swap_remove(0))
                        } else {
                            items.pop()
                        };
                        Ok(picked.unwrap_or(Value::Null))
                    }
                    Value::String(s) => {
                        let picked = if first {
                            s.chars().next()
                        } else {
                            s.chars().last()
                        };
                        Ok(picked.map_or(Value::Null, |c| Value::String(c.to_string())))
                    }
                    other => Err(self.error(&other, "`first`/`last` expect an array or string")),
                }
            }
            Filter::Keys => match value {
                Value::Object(map) => Ok(Value::Array(
                    map.into_iter().map(|(key, _)| Value::String(key)).collect(),
                )),
                other => Err(self.error(&other, "`keys` expects an object")),
            },
            Filter::Join(sep) => match value {
                Value::Array(items) => {
                    let mut parts = Vec::with_capacity(items.len());
                    for item in &items {
                        match item {
                            Value::Null => {}
                            Value::Array(_) | Value::Object(_) => {
                                return Err(self.error(item, "`join` expects scalar elements"));
                            }
                            scalar => parts.push(scalar_text(scalar)),
                        }
                    }
                    Ok(Value::String(parts.join(sep)))
                }
                other => Err(self.error(&other, "`join` expects an array")),
            },
            Filter::Split(sep) => match value {
                Value::String(s) => Ok(Value::Array(
                    s.split(sep.as_str())
                        .map(|part| Value::String(part.to_string()))
                        .collect(),
                )),
                other => Err(self.error(&other, "`split` expects a string")),
            },
            Filter::Default(fallback) => match &value {
                Value::Null => Ok(fallback.clone()),
                Value::String(s) if s.is_empty() => Ok(fallback.clone()),
                _ => Ok(value),
            },
            Filter::Compact => match value {
                Value::Array(items) => Ok(Value::Array(
                    items
                        .into_iter()
                        .filter(|item| match item {
                            Value::Null => false,
                            Value::String(s) => !s.is_empty(),
                            _ => true,
                        })
                        .collect(),
                )),
                other => Err(self.error(&other, "`compact` expects an array")),
            },
        }
    }

    fn map_str(
        &self,
        value: Value,
        name: &str,
        f: impl FnOnce(&str) -> String,
    ) -> Result<Value, TransformError> {
        match value {
            Value::String(s) => Ok(Value::String(f(&s))),
            Value::Null => Ok(Value::Null),
            other => Err(self.error(&other, format!("`{name}` expects a string"))),
        }
    }

    fn error(&self, value: &Value, message: impl Into<String>) -> TransformError {
        TransformError::Evaluation {
            expression: self.text.clone(),
            value: describe(value),
            message: message.into(),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn parse_number(text: &str) -> Option<Number> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Number::from(int));
    }
    text.parse::<f64>().ok().and_then(Number::from_f64)
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            chars: text.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.text.len(), |(offset, _)| *offset)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), ParseError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected `{wanted}`, found `{c}`")))
            }
            None => Err(self.error(format!("expected `{wanted}`, found end of input"))),
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            expression: self.text.to_string(),
            offset: self.offset(),
            message: message.into(),
        }
    }

    fn head(&mut self) -> Result<Head, ParseError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("empty expression")),
            Some('"') => Ok(Head::Literal(Value::String(self.string()?))),
            Some(c) if c == '-' || c.is_ascii_digit() => Ok(Head::Literal(self.number()?)),
            Some('$') | Some('@') => {
                self.bump();
                self.path_tail(Vec::new()).map(Head::Path)
            }
            Some('[') => self.path_tail(Vec::new()).map(Head::Path),
            Some(_) => {
                let word = self.identifier()?;
                let literal = match word.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" => Some(Value::Null),
                    _ => None,
                };
                match literal {
                    Some(value) if !matches!(self.peek(), Some('.') | Some('[')) => {
                        Ok(Head::Literal(value))
                    }
                    _ => self.path_tail(vec![Step::Key(word)]).map(Head::Path),
                }
            }
        }
    }

    fn path_tail(&mut self, mut steps: Vec<Step>) -> Result<Vec<Step>, ParseError> {
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    let key = if self.peek() == Some('"') {
                        self.string()?
                    } else {
                        self.identifier()?
                    };
                    steps.push(Step::Key(key));
                }
                Some('[') => {
                    self.bump();
                    self.skip_ws();
                    let step = match self.peek() {
                        Some('*') => {
                            self.bump();
                            Step::Wildcard
                        }
                        Some('"') => Step::Key(self.string()?),
                        _ => match self.number()? {
                            Value::Number(n) if n.is_i64() => {
                                Step::Index(n.as_i64().unwrap_or_default())
                            }
                            _ => return Err(self.error("index must be an integer")),
                        },
                    };
                    self.expect(']')?;
                    steps.push(step);
                }
                _ => return Ok(steps),
            }
        }
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(self.error("expected a field name"));
        }
        Ok(ident)
    }

    fn string(&mut self) -> Result<String, ParseError> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('"' | '\\')) => out.push(c),
                    Some(c) => return Err(self.error(format!("unknown escape `\\{c}`"))),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        let start = self.pos;
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            let sign_ok = (c == '-' || c == '+') && self.pos == start;
            if c.is_ascii_digit() || c == '.' || sign_ok {
                raw.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        parse_number(&raw)
            .map(Value::Number)
            .ok_or_else(|| self.error(format!("invalid number `{raw}`")))
    }

    fn literal(&mut self) -> Result<Value, ParseError> {
        self.skip_ws();
        match self.peek() {
            Some('"') => self.string().map(Value::String),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            _ => match self.identifier()?.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                "null" => Ok(Value::Null),
                other => Err(self.error(format!("expected a literal, found `{other}`"))),
            },
        }
    }

    fn filter(&mut self) -> Result<Filter, ParseError> {
        self.skip_ws();
        let name = self.identifier()?;
        self.skip_ws();
        let mut args = Vec::new();
        if self.peek() == Some('(') {
            self.bump();
            self.skip_ws();
            if self.peek() == Some(')') {
                self.bump();
            } else {
                loop {
                    args.push(self.literal()?);
                    self.skip_ws();
                    match self.bump() {
                        Some(',') => continue,
                        Some(')') => break,
                        _ => return Err(self.error("expected `,` or `)`")),
                    }
                }
            }
        }
        let arg_count = args.len();
        let filter = match (name.as_str(), args.as_mut_slice()) {
            ("lower", []) => Filter::Lower,
            ("upper", []) => Filter::Upper,
            ("trim", []) => Filter::Trim,
            ("string", []) => Filter::ToString,
            ("number", []) => Filter::ToNumber,
            ("length", []) => Filter::Length,
            ("first", []) => Filter::First,
            ("last", []) => Filter::Last,
            ("keys", []) => Filter::Keys,
            ("slug", []) => Filter::Slug,
            ("compact", []) => Filter::Compact,
            ("join", [Value::String(sep)]) => Filter::Join(std::mem::take(sep)),
            ("split", [Value::String(sep)]) => Filter::Split(std::mem::take(sep)),
            ("default", [fallback]) => Filter::Default(fallback.take()),
            ("replace", [Value::String(from), Value::String(to)]) => {
                Filter::Replace(std::mem::take(from), std::mem::take(to))
            }
            _ => {
                return Err(self.error(format!(
                    "unknown filter `{name}` with {arg_count} argument(s)"
                )))
            }
        };
        Ok(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::slugify;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Hello, World -- Again! "), "hello-world-again");
        assert_eq!(slugify("Rust 2024: Edition"), "rust-2024-edition");
    }
}

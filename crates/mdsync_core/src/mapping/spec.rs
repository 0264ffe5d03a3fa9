use std::collections::{HashMap, HashSet};
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::expr::Expr;
use crate::extract::RecordExtractor;
use crate::mapping::{is_valid_identifier, CREATED_AT, ID, UPDATED_AT};

/// Declarative mapping from raw source records to mapped records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSpec {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    /// Copy source keys no field consumed into the output verbatim.
    #[serde(default)]
    pub passthru_unmapped: bool,
    /// Emit `createdAt`/`updatedAt` in serialized documents.
    #[serde(default = "default_true")]
    pub base_fields: bool,
    #[serde(default)]
    pub base: BaseFieldNames,
    /// Expression locating the record array inside a page payload.
    #[serde(default)]
    pub extract: Option<String>,
    /// Dot-separated path narrowing the extracted value to the record array.
    #[serde(default)]
    pub array_path: Option<String>,
    #[serde(default)]
    pub position: PositionOptions,
    /// Destination field rendered as the document body instead of front matter.
    #[serde(default)]
    pub body: Option<String>,
}

impl Default for MappingSpec {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            passthru_unmapped: false,
            base_fields: true,
            base: BaseFieldNames::default(),
            extract: None,
            array_path: None,
            position: PositionOptions::default(),
            body: None,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Source-side names of the lifecycle fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseFieldNames {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Default for BaseFieldNames {
    fn default() -> Self {
        Self {
            id: ID.to_string(),
            created_at: CREATED_AT.to_string(),
            updated_at: UPDATED_AT.to_string(),
        }
    }
}

/// Per-run sequence numbering. `field: None` disables it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    pub field: Option<String>,
    pub start: i64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            field: Some("position".to_string()),
            start: 0,
        }
    }
}

/// One destination field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub source: String,
    /// Defaults to the source name.
    #[serde(default)]
    pub destination: Option<String>,
    /// Expression applied to the raw value before type dispatch.
    #[serde(default)]
    pub transform: Option<String>,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(source: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            source: source.into(),
            destination: None,
            transform: None,
            kind,
        }
    }

    pub fn to(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_transform(mut self, transform: impl Into<String>) -> Self {
        self.transform = Some(transform.into());
        self
    }

    pub fn destination(&self) -> &str {
        self.destination.as_deref().unwrap_or(&self.source)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Id,
    Boolean,
    Number,
    String,
    Datetime,
    Image {
        /// Download the image next to the documents and reference it locally.
        #[serde(default)]
        download: bool,
        /// Mapped field whose value names the downloaded file.
        #[serde(default)]
        file_name_field: Option<String>,
        /// Record the image's pixel dimensions.
        #[serde(default)]
        probe_size: bool,
    },
    Enum {
        rules: Vec<EnumRule>,
    },
    Object,
    Richtext {
        #[serde(default)]
        mode: RichTextMode,
        #[serde(default)]
        embed_images: Vec<ImageEmbedRule>,
    },
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Id => "id",
            FieldKind::Boolean => "boolean",
            FieldKind::Number => "number",
            FieldKind::String => "string",
            FieldKind::Datetime => "datetime",
            FieldKind::Image { .. } => "image",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Object => "object",
            FieldKind::Richtext { .. } => "richtext",
        }
    }

    /// Rich-text conversion options, for `richtext` fields.
    pub fn rich_text_options(&self) -> Option<RichTextOptions> {
        match self {
            FieldKind::Richtext { mode, embed_images } => Some(RichTextOptions {
                mode: *mode,
                embed_images: embed_images.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rewrites an enum value: the first rule whose pattern matches replaces the
/// matched text with `replacement` (`$1`-style group references allowed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumRule {
    pub pattern: String,
    pub replacement: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RichTextMode {
    /// Convert to Markdown.
    #[default]
    Markdown,
    /// Keep sanitized HTML.
    Html,
}

/// How embedded image attributes are preserved in Markdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStyle {
    /// `![alt|width=100|height=50](src)`
    #[default]
    Alt,
    /// `![alt](src)` followed by a `{: width="100" height="50"}` line.
    Block,
}

/// Preserves attributes of inline images whose `src` starts with `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEmbedRule {
    pub base_url: String,
    pub attributes: Vec<String>,
    #[serde(default)]
    pub style: EmbedStyle,
}

/// Options for converting one rich-text field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichTextOptions {
    pub mode: RichTextMode,
    pub embed_images: Vec<ImageEmbedRule>,
}

/// A field spec with its expression and patterns compiled.
#[derive(Debug, Clone)]
pub struct CompiledField {
    pub spec: FieldSpec,
    pub destination: String,
    pub transform: Option<Expr>,
    pub(crate) rules: Vec<(Regex, String)>,
}

/// A validated mapping specification, ready to map records.
#[derive(Debug, Clone)]
pub struct CompiledMapping {
    spec: MappingSpec,
    fields: Vec<CompiledField>,
    extract: Option<Expr>,
}

impl MappingSpec {
    /// Validates the specification and compiles its expressions and patterns.
    pub fn compile(&self) -> Result<CompiledMapping, ConfigError> {
        if self.fields.is_empty() && !self.passthru_unmapped {
            return Err(ConfigError::EmptyMapping);
        }

        let mut reserved: HashSet<&str> = [ID, CREATED_AT, UPDATED_AT].into_iter().collect();
        if let Some(field) = self.position.field.as_deref() {
            if !is_valid_identifier(field) || !reserved.insert(field) {
                return Err(ConfigError::ReservedDestination(field.to_string()));
            }
        }

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(self.fields.len());
        for spec in &self.fields {
            let destination = spec.destination();
            if !is_valid_identifier(destination) {
                return Err(ConfigError::InvalidDestination {
                    source_field: spec.source.clone(),
                    destination: destination.to_string(),
                });
            }
            if reserved.contains(destination) {
                return Err(ConfigError::ReservedDestination(destination.to_string()));
            }
            if !seen.insert(destination.to_string()) {
                return Err(ConfigError::DuplicateDestination(destination.to_string()));
            }

            let transform = spec
                .transform
                .as_deref()
                .map(Expr::parse)
                .transpose()
                .map_err(|source| ConfigError::InvalidExpression {
                    context: format!("field `{}` transform", spec.source),
                    source,
                })?;

            let mut rules = Vec::new();
            match &spec.kind {
                FieldKind::Enum { rules: enum_rules } => {
                    for rule in enum_rules {
                        let regex = Regex::new(&rule.pattern).map_err(|source| {
                            ConfigError::InvalidPattern {
                                source_field: spec.source.clone(),
                                pattern: rule.pattern.clone(),
                                source,
                            }
                        })?;
                        rules.push((regex, rule.replacement.clone()));
                    }
                }
                FieldKind::Richtext { embed_images, .. } => {
                    if embed_images.iter().any(|rule| rule.base_url.trim().is_empty()) {
                        return Err(ConfigError::EmptyEmbedBase(destination.to_string()));
                    }
                }
                _ => {}
            }

            fields.push(CompiledField {
                spec: spec.clone(),
                destination: destination.to_string(),
                transform,
                rules,
            });
        }

        // Downloaded images named after the same field would overwrite each other.
        let mut file_names: HashMap<&str, &str> = HashMap::new();
        for field in &fields {
            if let FieldKind::Image {
                file_name_field: Some(name),
                download,
                ..
            } = &field.spec.kind
            {
                if name != ID && !seen.contains(name) {
                    return Err(ConfigError::UnknownFileNameField {
                        field: field.destination.clone(),
                        name: name.clone(),
                    });
                }
                if *download {
                    if let Some(first) = file_names.insert(name.as_str(), field.destination.as_str()) {
                        return Err(ConfigError::SharedFileNameField {
                            first: first.to_string(),
                            second: field.destination.clone(),
                            name: name.clone(),
                        });
                    }
                }
            }
        }

        if let Some(body) = self.body.as_deref() {
            let valid = fields.iter().any(|field| {
                field.destination == body
                    && matches!(field.spec.kind, FieldKind::String | FieldKind::Richtext { .. })
            });
            if !valid {
                return Err(ConfigError::InvalidBody(body.to_string()));
            }
        }

        let extract = self
            .extract
            .as_deref()
            .map(Expr::parse)
            .transpose()
            .map_err(|source| ConfigError::InvalidExpression {
                context: "record extraction".to_string(),
                source,
            })?;

        Ok(CompiledMapping {
            spec: self.clone(),
            fields,
            extract,
        })
    }
}

impl CompiledMapping {
    pub fn spec(&self) -> &MappingSpec {
        &self.spec
    }

    pub fn fields(&self) -> &[CompiledField] {
        &self.fields
    }

    pub fn field(&self, destination: &str) -> Option<&CompiledField> {
        self.fields.iter().find(|f| f.destination == destination)
    }

    pub fn position(&self) -> &PositionOptions {
        &self.spec.position
    }

    /// Extractor for page payloads, built from `extract` and `array_path`.
    pub fn extractor(&self) -> RecordExtractor {
        RecordExtractor::new(self.extract.clone(), self.spec.array_path.clone())
    }
}

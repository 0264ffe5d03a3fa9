//! Field mapping: raw source records to typed, validated records.
mod datetime;
mod engine;
mod record;
mod spec;

pub use datetime::parse_datetime;
pub use engine::{map_record, MapContext};
pub use record::{FieldValue, ImageRef, MappedRecord};
pub use spec::{
    BaseFieldNames, CompiledField, CompiledMapping, EmbedStyle, EnumRule, FieldKind, FieldSpec,
    ImageEmbedRule, MappingSpec, PositionOptions, RichTextMode, RichTextOptions,
};

/// Output name of the lifecycle identifier.
pub const ID: &str = "id";
/// Output name of the creation timestamp.
pub const CREATED_AT: &str = "createdAt";
/// Output name of the last-update timestamp.
pub const UPDATED_AT: &str = "updatedAt";

/// Identifiers become file names: letters, digits, `-` and `_` only.
pub fn is_valid_identifier(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

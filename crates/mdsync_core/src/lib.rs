//! mdsync core: pure record pipeline logic.
//!
//! Everything here is synchronous and free of I/O: the transform expression
//! evaluator, the page cursor that drives pagination, bulk record extraction
//! and the field-mapping engine.
mod error;
mod expr;
mod extract;
mod mapping;
mod pagination;

pub use error::{ConfigError, MappingError, TransformError};
pub use expr::{Expr, ParseError};
pub use extract::{extract_records, RecordExtractor};
pub use mapping::{
    is_valid_identifier, map_record, parse_datetime, BaseFieldNames, CompiledField,
    CompiledMapping, EmbedStyle, EnumRule, FieldKind, FieldSpec, FieldValue, ImageEmbedRule,
    ImageRef, MapContext, MappedRecord, MappingSpec, PositionOptions, RichTextMode,
    RichTextOptions, CREATED_AT, ID, UPDATED_AT,
};
pub use pagination::{FetchedPage, PageCursor, PagePlan, PageRequest};

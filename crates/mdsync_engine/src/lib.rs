//! mdsync engine: sources, pagination, rich-text rewriting and the sync driver.
mod document;
mod driver;
mod error;
mod fetch;
mod filename;
mod frontmatter;
mod images;
mod paginate;
mod persist;
pub mod richtext;
mod source;
mod types;

pub use document::{DocumentSink, MarkdownFileWriter};
pub use driver::{DriverSettings, SyncDriver, SyncReport, DEFAULT_MAX_PAGES};
pub use error::{MaterializationError, RewriteError, SyncError};
pub use fetch::{FetchSettings, ReqwestFetcher};
pub use filename::{document_filename, image_filename};
pub use frontmatter::{build_markdown_document, DocumentLayout};
pub use images::{
    probe_size, ContentMeta, HttpImageMaterializer, ImageMaterializer, ImageRequest, ImageSize,
    MaterializedImage,
};
pub use paginate::paginate;
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use richtext::RichTextConverter;
pub use source::{HttpJsonConfig, HttpJsonSource, JsonFileConfig, JsonFileSource, Source, SourceConfig};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};

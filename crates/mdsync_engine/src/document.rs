use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mdsync_core::{MappedRecord, MappingSpec};

use crate::error::MaterializationError;
use crate::filename::document_filename;
use crate::frontmatter::{build_markdown_document, DocumentLayout};
use crate::persist::AtomicFileWriter;

/// Serializes finished records.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn write(
        &self,
        record: &MappedRecord,
        position: Option<i64>,
    ) -> Result<PathBuf, MaterializationError>;
}

/// Writes each record to `{dir}/{id}.md`.
#[derive(Debug, Clone)]
pub struct MarkdownFileWriter {
    writer: AtomicFileWriter,
    layout: DocumentLayout,
}

impl MarkdownFileWriter {
    pub fn new(dir: impl Into<PathBuf>, layout: DocumentLayout) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
            layout,
        }
    }

    pub fn for_spec(dir: impl Into<PathBuf>, spec: &MappingSpec) -> Self {
        Self::new(dir, DocumentLayout::from_spec(spec))
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }
}

#[async_trait]
impl DocumentSink for MarkdownFileWriter {
    async fn write(
        &self,
        record: &MappedRecord,
        position: Option<i64>,
    ) -> Result<PathBuf, MaterializationError> {
        let content = build_markdown_document(record, position, &self.layout);
        self.writer
            .write(&document_filename(&record.id), &content)
            .map_err(|source| MaterializationError::Document {
                id: record.id.clone(),
                source,
            })
    }
}

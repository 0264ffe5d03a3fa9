use std::collections::HashMap;
use std::path::PathBuf;

use futures_util::TryStreamExt;
use mdsync_core::{
    map_record, CompiledField, CompiledMapping, FieldKind, FieldValue, ImageRef, MapContext,
    MappedRecord, PagePlan, RichTextMode, ID,
};
use serde_json::Value;
use sync_logging::{sync_debug, sync_info, sync_warn};

use crate::document::DocumentSink;
use crate::error::SyncError;
use crate::images::{ImageMaterializer, ImageRequest};
use crate::paginate::paginate;
use crate::richtext::RichTextConverter;
use crate::source::Source;

pub const DEFAULT_MAX_PAGES: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverSettings {
    pub plan: PagePlan,
    /// Upper bound on fetched pages; reaching it ends the run successfully.
    pub max_pages: u64,
    /// Map and convert, but skip image downloads and document writes.
    pub dry_run: bool,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            plan: PagePlan::default(),
            max_pages: DEFAULT_MAX_PAGES,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub pages: u64,
    pub records: u64,
    pub written: Vec<PathBuf>,
    /// The run ended on the page bound or a stalled source rather than on the
    /// source's total.
    pub truncated: bool,
}

/// Runs one sync: pages, maps, materializes, converts and writes records
/// strictly in source order, stopping at the first error.
pub struct SyncDriver {
    source: Box<dyn Source>,
    mapping: CompiledMapping,
    images: Box<dyn ImageMaterializer>,
    sink: Box<dyn DocumentSink>,
    settings: DriverSettings,
    context: MapContext,
    converters: HashMap<String, RichTextConverter>,
}

impl SyncDriver {
    pub fn new(
        source: Box<dyn Source>,
        mapping: CompiledMapping,
        images: Box<dyn ImageMaterializer>,
        sink: Box<dyn DocumentSink>,
        settings: DriverSettings,
    ) -> Self {
        let converters = mapping
            .fields()
            .iter()
            .filter_map(|field| {
                field
                    .spec
                    .kind
                    .rich_text_options()
                    .map(|options| (field.destination.clone(), RichTextConverter::new(options)))
            })
            .collect();
        Self {
            source,
            mapping,
            images,
            sink,
            settings,
            context: MapContext::now(),
            converters,
        }
    }

    /// Replaces the per-run mapping context, e.g. to pin the fallback clock.
    pub fn with_context(mut self, context: MapContext) -> Self {
        self.context = context;
        self
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let numbering = self.mapping.position();
        let numbered = numbering.field.is_some();
        let mut next_position = numbering.start;

        let mut pages = std::pin::pin!(paginate(self.source.as_ref(), self.settings.plan));
        while let Some(page) = pages.try_next().await? {
            report.pages += 1;
            sync_debug!(
                "page {}: {} records (total {})",
                report.pages,
                page.records.len(),
                page.total
            );
            if page.records.is_empty() {
                // Only a stall when the source claims records beyond this offset.
                let requested = self.settings.plan.skip + report.records;
                if page.total > requested {
                    sync_warn!(
                        "{} returned an empty page after {} records; stopping",
                        self.source.name(),
                        report.records
                    );
                    report.truncated = true;
                }
                break;
            }

            for raw in &page.records {
                let position = numbered.then_some(next_position);
                let record = self.process(raw).await?;
                report.records += 1;
                next_position += 1;

                if self.settings.dry_run {
                    sync_info!("dry run: would write {}", record.id);
                    continue;
                }
                let path = self.sink.write(&record, position).await?;
                sync_info!("wrote {}", path.display());
                report.written.push(path);
            }

            if report.pages >= self.settings.max_pages {
                sync_warn!(
                    "stopping after {} pages; the source may disagree about its total",
                    report.pages
                );
                report.truncated = true;
                break;
            }
        }
        Ok(report)
    }

    async fn process(&self, raw: &Value) -> Result<MappedRecord, SyncError> {
        let mut record = map_record(raw, &self.mapping, &self.context)?;
        for field in self.mapping.fields() {
            match &field.spec.kind {
                FieldKind::Image { .. } => self.materialize_image(field, &mut record).await?,
                FieldKind::Richtext { mode, .. } => self.convert_rich_text(field, *mode, &mut record)?,
                _ => {}
            }
        }
        Ok(record)
    }

    async fn materialize_image(
        &self,
        field: &CompiledField,
        record: &mut MappedRecord,
    ) -> Result<(), SyncError> {
        let FieldKind::Image {
            download,
            file_name_field,
            probe_size,
        } = &field.spec.kind
        else {
            return Ok(());
        };
        if !(*download || *probe_size) || self.settings.dry_run {
            return Ok(());
        }
        let Some(FieldValue::Image(image)) = record.get(&field.destination) else {
            return Ok(());
        };
        let request = ImageRequest {
            url: image.remote_url.clone(),
            file_stem: file_name_field
                .as_deref()
                .and_then(|name| field_text(record, name)),
            download: *download,
            probe_size: *probe_size,
        };

        let materialized = self.images.materialize(&request).await?;
        let image = ImageRef {
            src: materialized.url,
            remote_url: request.url,
            width: materialized.size.map(|size| size.width),
            height: materialized.size.map(|size| size.height),
        };
        record.set(field.destination.clone(), FieldValue::Image(image));
        Ok(())
    }

    fn convert_rich_text(
        &self,
        field: &CompiledField,
        mode: RichTextMode,
        record: &mut MappedRecord,
    ) -> Result<(), SyncError> {
        let (Some(converter), Some(FieldValue::RichText(html))) = (
            self.converters.get(&field.destination),
            record.get(&field.destination),
        ) else {
            return Ok(());
        };
        let converted = converter
            .to_markdown(html)
            .map_err(|source| SyncError::Rewrite {
                id: record.id.clone(),
                field: field.destination.clone(),
                source,
            })?;
        let value = match mode {
            RichTextMode::Markdown => FieldValue::Markdown(converted),
            RichTextMode::Html => FieldValue::Text(converted),
        };
        record.set(field.destination.clone(), value);
        Ok(())
    }
}

/// Text of a mapped field, for naming files after it.
fn field_text(record: &MappedRecord, name: &str) -> Option<String> {
    if name == ID {
        return Some(record.id.clone());
    }
    match record.get(name)?.to_json() {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

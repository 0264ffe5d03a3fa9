use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use sync_logging::sync_debug;
use url::Url;

use crate::error::MaterializationError;
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::filename::image_filename;
use crate::persist::AtomicFileWriter;
use crate::types::{FailureKind, FetchError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentMeta {
    pub content_type: Option<String>,
    pub byte_len: u64,
    /// Local file, when the image was downloaded.
    pub file: Option<PathBuf>,
}

/// Result of resolving one image: where documents should point, plus what
/// was learned about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedImage {
    pub url: String,
    pub size: Option<ImageSize>,
    pub meta: ContentMeta,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub url: String,
    /// Preferred file stem for a downloaded copy.
    pub file_stem: Option<String>,
    pub download: bool,
    pub probe_size: bool,
}

#[async_trait]
pub trait ImageMaterializer: Send + Sync {
    async fn materialize(
        &self,
        request: &ImageRequest,
    ) -> Result<MaterializedImage, MaterializationError>;
}

/// Downloads images over HTTP into a local directory.
#[derive(Debug, Clone)]
pub struct HttpImageMaterializer {
    fetcher: ReqwestFetcher,
    writer: AtomicFileWriter,
    link_prefix: String,
}

impl HttpImageMaterializer {
    /// Stores images in `dir`; documents link to them as `{link_prefix}/{file}`.
    pub fn new(
        settings: FetchSettings,
        dir: impl Into<PathBuf>,
        link_prefix: impl Into<String>,
    ) -> Result<Self, FetchError> {
        Ok(Self {
            fetcher: ReqwestFetcher::new(settings)?,
            writer: AtomicFileWriter::new(dir),
            link_prefix: link_prefix.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ImageMaterializer for HttpImageMaterializer {
    async fn materialize(
        &self,
        request: &ImageRequest,
    ) -> Result<MaterializedImage, MaterializationError> {
        let fetch_error = |source| MaterializationError::Fetch {
            url: request.url.clone(),
            source,
        };
        let url = Url::parse(&request.url)
            .map_err(|err| fetch_error(FetchError::new(FailureKind::InvalidUrl, err.to_string())))?;
        let output = self
            .fetcher
            .get(url, &BTreeMap::new())
            .await
            .map_err(fetch_error)?;

        let size = if request.probe_size {
            probe_size(&output.bytes)
        } else {
            None
        };
        let mut meta = ContentMeta {
            content_type: output.metadata.content_type,
            byte_len: output.metadata.byte_len,
            file: None,
        };

        let mut link = request.url.clone();
        if request.download {
            let filename = image_filename(&request.url, request.file_stem.as_deref());
            let path = self
                .writer
                .write_bytes(&filename, &output.bytes)
                .map_err(|source| MaterializationError::Persist {
                    url: request.url.clone(),
                    source,
                })?;
            sync_debug!("stored {} as {}", request.url, path.display());
            link = if self.link_prefix.is_empty() {
                filename
            } else {
                format!("{}/{filename}", self.link_prefix)
            };
            meta.file = Some(path);
        }

        Ok(MaterializedImage {
            url: link,
            size,
            meta,
        })
    }
}

/// Reads pixel dimensions from PNG, GIF or JPEG headers.
pub fn probe_size(bytes: &[u8]) -> Option<ImageSize> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.starts_with(PNG_SIGNATURE) && bytes.get(12..16) == Some(&b"IHDR"[..]) {
        return Some(ImageSize {
            width: be_u32(bytes.get(16..20)?),
            height: be_u32(bytes.get(20..24)?),
        });
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        let header = bytes.get(6..10)?;
        return Some(ImageSize {
            width: u32::from(u16::from_le_bytes([header[0], header[1]])),
            height: u32::from(u16::from_le_bytes([header[2], header[3]])),
        });
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return probe_jpeg(bytes);
    }
    None
}

fn probe_jpeg(bytes: &[u8]) -> Option<ImageSize> {
    let mut offset = 2;
    loop {
        while bytes.get(offset)? != &0xFF {
            offset += 1;
        }
        while bytes.get(offset)? == &0xFF {
            offset += 1;
        }
        let marker = *bytes.get(offset)?;
        offset += 1;
        if matches!(marker, 0xD0..=0xD9 | 0x01) {
            continue;
        }
        let length = usize::from(u16::from_be_bytes([*bytes.get(offset)?, *bytes.get(offset + 1)?]));
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let frame = bytes.get(offset + 3..offset + 7)?;
            return Some(ImageSize {
                height: u32::from(u16::from_be_bytes([frame[0], frame[1]])),
                width: u32::from(u16::from_be_bytes([frame[2], frame[3]])),
            });
        }
        offset += length;
    }
}

fn be_u32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0, |acc, b| (acc << 8) | u32::from(*b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_gif_dimensions() {
        let gif = b"GIF89a\x10\x00\x20\x00rest";
        assert_eq!(
            probe_size(gif),
            Some(ImageSize {
                width: 16,
                height: 32
            })
        );
    }

    #[test]
    fn probes_jpeg_frame_header() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00];
        jpeg.extend([0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x30, 0x00, 0x40]);
        assert_eq!(
            probe_size(&jpeg),
            Some(ImageSize {
                width: 64,
                height: 48
            })
        );
    }

    #[test]
    fn unknown_formats_have_no_size() {
        assert_eq!(probe_size(b"not an image"), None);
        assert_eq!(probe_size(&[0xFF, 0xD8, 0xFF]), None);
    }
}

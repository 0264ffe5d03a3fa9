//! Run configuration, read from a `.ron` or `.json` file.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mdsync_core::{ConfigError, MappingSpec, PagePlan};
use mdsync_engine::{FetchSettings, SourceConfig, DEFAULT_MAX_PAGES};
use serde::{Deserialize, Serialize};
use sync_logging::sync_info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub fetch: FetchOptions,
    pub mapping: MappingSpec,
    pub output: OutputOptions,
    #[serde(default)]
    pub http: HttpOptions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchOptions {
    pub skip: u64,
    pub limit: Option<u64>,
    pub page_size: Option<u64>,
    pub max_pages: u64,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: None,
            page_size: Some(100),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl FetchOptions {
    pub fn plan(&self) -> PagePlan {
        PagePlan {
            skip: self.skip,
            limit: self.limit,
            page_size: self.page_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    pub dir: PathBuf,
    /// Downloaded images land here, relative to `dir`.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
}

fn default_images_dir() -> String {
    "images".to_string()
}

impl OutputOptions {
    pub fn images_path(&self) -> PathBuf {
        self.dir.join(&self.images_dir)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpOptions {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_response_bytes: u64,
    pub max_image_bytes: u64,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            max_response_bytes: 5 * 1024 * 1024,
            max_image_bytes: 20 * 1024 * 1024,
        }
    }
}

impl HttpOptions {
    pub fn json_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_response_bytes,
            ..FetchSettings::for_json()
        }
    }

    pub fn image_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_image_bytes,
            ..FetchSettings::for_images()
        }
    }
}

/// Reads and parses the configuration at `path`; the format follows the
/// file extension.
pub fn load_config(path: &Path) -> Result<SyncConfig, ConfigError> {
    let display = path.display().to_string();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let parse: fn(&str) -> Result<SyncConfig, String> = match extension.as_deref() {
        Some("ron") => |text| ron::from_str(text).map_err(|e| e.to_string()),
        Some("json") => |text| serde_json::from_str(text).map_err(|e| e.to_string()),
        _ => return Err(ConfigError::UnsupportedFormat(display)),
    };

    let text = fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: display.clone(),
        message: e.to_string(),
    })?;
    let config = parse(&text).map_err(|message| ConfigError::Parse {
        path: display.clone(),
        message,
    })?;
    sync_info!("Loaded configuration from {}", display);
    Ok(config)
}

//! Source adapters: the single-page fetch primitive behind pagination.
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use mdsync_core::{ConfigError, Expr, FetchedPage, PageRequest, RecordExtractor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::SyncError;
use crate::fetch::{FetchSettings, ReqwestFetcher};
use crate::types::{FailureKind, FetchError};

/// Fetches one page of raw records.
///
/// Implementations never return more records than `request.page_size` and
/// report transport failures and empty replies as errors, never as an empty
/// page.
#[async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchError>;
}

/// Which adapter to build, selected by its tag in the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceConfig {
    HttpJson(HttpJsonConfig),
    JsonFile(JsonFileConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpJsonConfig {
    pub url: String,
    #[serde(default = "default_skip_param")]
    pub skip_param: String,
    #[serde(default = "default_page_size_param")]
    pub page_size_param: String,
    /// Extra query pairs sent with every request.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Expression reading the total record count from a page payload.
    #[serde(default = "default_total")]
    pub total: String,
}

fn default_skip_param() -> String {
    "skip".to_string()
}

fn default_page_size_param() -> String {
    "limit".to_string()
}

fn default_total() -> String {
    "total".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonFileConfig {
    pub path: PathBuf,
}

impl SourceConfig {
    /// Builds the configured adapter. Record extraction comes from the
    /// mapping specification.
    pub fn build(
        &self,
        settings: FetchSettings,
        extractor: RecordExtractor,
    ) -> Result<Box<dyn Source>, SyncError> {
        match self {
            SourceConfig::HttpJson(config) => Ok(Box::new(HttpJsonSource::new(
                config.clone(),
                settings,
                extractor,
            )?)),
            SourceConfig::JsonFile(config) => {
                Ok(Box::new(JsonFileSource::open(config, &extractor)?))
            }
        }
    }
}

/// Pages through a JSON HTTP endpoint with skip/size query parameters.
#[derive(Debug)]
pub struct HttpJsonSource {
    config: HttpJsonConfig,
    base_url: Url,
    total: Expr,
    extractor: RecordExtractor,
    fetcher: ReqwestFetcher,
}

impl HttpJsonSource {
    pub fn new(
        config: HttpJsonConfig,
        settings: FetchSettings,
        extractor: RecordExtractor,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, format!("{}: {err}", config.url)))?;
        let total = Expr::parse(&config.total).map_err(|source| ConfigError::InvalidExpression {
            context: "source total".to_string(),
            source,
        })?;
        let fetcher = ReqwestFetcher::new(settings)?;
        Ok(Self {
            config,
            base_url,
            total,
            extractor,
            fetcher,
        })
    }

    fn page_url(&self, request: PageRequest) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.config.query {
                pairs.append_pair(key, value);
            }
            pairs.append_pair(&self.config.skip_param, &request.skip.to_string());
            if let Some(size) = request.page_size {
                pairs.append_pair(&self.config.page_size_param, &size.to_string());
            }
        }
        url
    }

    /// `Ok(None)` when the payload carries no total; anything else that is
    /// not a non-negative count is an extraction failure.
    fn reported_total(&self, payload: &Value) -> Result<Option<u64>, FetchError> {
        let value = self
            .total
            .evaluate(payload)
            .map_err(|err| FetchError::new(FailureKind::Extraction, format!("total: {err}")))?;
        let total = match &value {
            Value::Null => return Ok(None),
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        total.map(Some).ok_or_else(|| {
            FetchError::new(
                FailureKind::Extraction,
                format!("total `{}` evaluated to {value}, expected a count", self.config.total),
            )
        })
    }
}

#[async_trait]
impl Source for HttpJsonSource {
    fn name(&self) -> &str {
        &self.config.url
    }

    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchError> {
        let url = self.page_url(request);
        let output = self.fetcher.get(url, &self.config.headers).await?;
        if output.bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(FetchError::new(
                FailureKind::EmptyResponse,
                format!("no payload from {}", output.metadata.final_url),
            ));
        }
        let payload: Value = serde_json::from_slice(&output.bytes)
            .map_err(|err| FetchError::new(FailureKind::InvalidPayload, err.to_string()))?;
        let mut records = self
            .extractor
            .extract(&payload)
            .map_err(|err| FetchError::new(FailureKind::Extraction, err.to_string()))?;

        let full = request
            .page_size
            .is_some_and(|size| records.len() as u64 >= size);
        if let Some(size) = request.page_size {
            records.truncate(size as usize);
        }
        // Without a reported total, a full page implies more may follow.
        let total = self.reported_total(&payload)?.unwrap_or_else(|| {
            request.skip + records.len() as u64 + u64::from(full)
        });
        Ok(FetchedPage::new(records, total))
    }
}

/// Serves pages out of a local JSON document read once at startup.
#[derive(Debug)]
pub struct JsonFileSource {
    name: String,
    records: Vec<Value>,
}

impl JsonFileSource {
    pub fn open(config: &JsonFileConfig, extractor: &RecordExtractor) -> Result<Self, FetchError> {
        let name = config.path.display().to_string();
        let bytes = fs::read(&config.path)
            .map_err(|err| FetchError::new(FailureKind::Io, format!("{name}: {err}")))?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|err| FetchError::new(FailureKind::InvalidPayload, format!("{name}: {err}")))?;
        let records = extractor
            .extract(&payload)
            .map_err(|err| FetchError::new(FailureKind::Extraction, format!("{name}: {err}")))?;
        Ok(Self::from_records(name, records))
    }

    pub fn from_records(name: impl Into<String>, records: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            records,
        }
    }
}

#[async_trait]
impl Source for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, request: PageRequest) -> Result<FetchedPage, FetchError> {
        let total = self.records.len();
        let start = usize::try_from(request.skip).unwrap_or(usize::MAX).min(total);
        let end = match request.page_size {
            Some(size) => start.saturating_add(usize::try_from(size).unwrap_or(usize::MAX)).min(total),
            None => total,
        };
        Ok(FetchedPage::new(
            self.records[start..end].to_vec(),
            total as u64,
        ))
    }
}

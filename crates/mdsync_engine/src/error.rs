use mdsync_core::{ConfigError, MappingError};
use thiserror::Error;

use crate::persist::PersistError;
use crate::types::FetchError;

/// The rich-text pipeline could not process a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("document nests deeper than {limit} levels")]
    TooDeep { limit: usize },
}

/// An image could not be fetched or stored, or a document could not be written.
#[derive(Debug, Error)]
pub enum MaterializationError {
    #[error("image {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("image {url}: {source}")]
    Persist {
        url: String,
        #[source]
        source: PersistError,
    },
    #[error("document {id}: {source}")]
    Document {
        id: String,
        #[source]
        source: PersistError,
    },
}

/// First error of a sync run. The run stops as soon as one occurs.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("mapping failed: {0}")]
    Mapping(#[from] MappingError),
    #[error("record {id}, field `{field}`: {source}")]
    Rewrite {
        id: String,
        field: String,
        #[source]
        source: RewriteError,
    },
    #[error("materialization failed: {0}")]
    Materialization(#[from] MaterializationError),
}

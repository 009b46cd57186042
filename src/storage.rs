//! Object-storage collaborator interface and storage-URI handling

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;
use std::pin::Pin;
use url::Url;

use crate::error::{Error, Result};

/// Byte stream returned by an object fetch.
///
/// Chunks arrive as the underlying transport delivers them; errors mid-stream
/// surface as `std::io::Error` items so the stream can feed straight into
/// `tokio_util::io::StreamReader`.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Handle to the object-storage service holding CSV result exports
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's byte stream.
    ///
    /// Fails if the object is absent; an object that exists but has an empty
    /// body is reported by the stream yielding no bytes, and is rejected by
    /// the batch processor before any batch is produced.
    async fn fetch_object(&self, bucket: &str, key: &str) -> Result<ByteStream>;
}

/// Bucket and key prefix where a query's result exports live
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLocation {
    /// Bucket name
    pub bucket: String,
    /// Key prefix; the execution id plus `.csv` is appended per query
    pub prefix: String,
}

impl StorageLocation {
    /// Build a location from explicit bucket and prefix
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Parse a `scheme://bucket/key...` URI into bucket and key prefix.
    ///
    /// The bucket is the authority; the prefix is the path with its leading
    /// slash stripped (possibly empty). The scheme itself is not validated —
    /// the store implementation decides what transports it speaks.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| Error::Storage(format!("invalid storage URI '{}': {}", uri, e)))?;

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Storage(format!("storage URI '{}' has no bucket", uri)))?
            .to_string();

        let prefix = url.path().trim_start_matches('/').to_string();

        Ok(Self { bucket, prefix })
    }

    /// Object key for one execution's CSV export
    pub fn result_key(&self, execution_id: &crate::types::ExecutionId) -> String {
        if self.prefix.is_empty() {
            format!("{}.csv", execution_id)
        } else {
            format!("{}/{}.csv", self.prefix.trim_end_matches('/'), execution_id)
        }
    }
}

//! Streaming batch processor — turns a CSV result export into bounded
//! batches delivered to a sink.
//!
//! The byte stream from object storage is bridged onto a blocking thread
//! where the synchronous CSV reader decodes records; a bounded channel
//! carries them back to the async side, which buffers up to one batch and
//! hands each full batch to the sink before reading further. Memory stays
//! bounded at one batch plus the channel buffer regardless of result-set
//! size.

use std::io::BufRead;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio_util::io::{StreamReader, SyncIoBridge};
use tracing::{debug, info};

use crate::config::{CsvOptions, MAX_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::storage::{ObjectStore, StorageLocation};
use crate::types::{Event, ExecutionId};

/// Records buffered between the blocking decoder and the async consumer.
/// Keeps the decoder from running unboundedly ahead of a slow sink.
const RECORD_CHANNEL_BUFFER: usize = 64;

/// Consumer of one batch of decoded CSV records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Handle one batch. Every batch except possibly the last holds exactly
    /// the configured batch size; a failure here aborts the whole stream.
    async fn handle_batch(&self, batch: Vec<csv::StringRecord>) -> Result<()>;
}

/// Construction options for [`BatchProcessor`]
#[derive(Clone, Debug)]
pub struct BatchOptions {
    /// Records per batch, `1..=999` (default 999, the service page limit)
    pub batch_size: usize,
    /// CSV parse options for the result export
    pub csv: CsvOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            csv: CsvOptions::default(),
        }
    }
}

/// Streams a query's CSV export from object storage into sink batches
pub struct BatchProcessor {
    store: Arc<dyn ObjectStore>,
    location: StorageLocation,
    sink: Arc<dyn RecordSink>,
    batch_size: usize,
    csv: CsvOptions,
    on_complete: Option<Box<dyn Fn() + Send + Sync>>,
    event_tx: Option<broadcast::Sender<Event>>,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("location", &self.location)
            .field("batch_size", &self.batch_size)
            .field("csv", &self.csv)
            .finish_non_exhaustive()
    }
}

impl BatchProcessor {
    /// Create a processor.
    ///
    /// Fails with a validation error if `batch_size` is zero or exceeds the
    /// service's page limit of 999 — checked here, before any I/O happens.
    pub fn new(
        store: Arc<dyn ObjectStore>,
        location: StorageLocation,
        sink: Arc<dyn RecordSink>,
        options: BatchOptions,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::Validation("batch size must be at least 1".into()));
        }
        if options.batch_size > MAX_BATCH_SIZE {
            return Err(Error::Validation(format!(
                "batch size {} exceeds limit {}",
                options.batch_size, MAX_BATCH_SIZE
            )));
        }

        Ok(Self {
            store,
            location,
            sink,
            batch_size: options.batch_size,
            csv: options.csv,
            on_complete: None,
            event_tx: None,
        })
    }

    /// Attach a callback invoked once after the final flush, on success only
    pub fn with_completion(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    /// Attach an event channel for batch notifications
    pub fn with_events(mut self, event_tx: broadcast::Sender<Event>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.event_tx {
            tx.send(event).ok();
        }
    }

    /// Fetch, decode, and batch-process one execution's CSV export.
    ///
    /// Batches reach the sink strictly in decode order. Any fetch, decode,
    /// or sink failure aborts processing; there is no partial-batch retry.
    pub async fn process_results(&self, id: &ExecutionId) -> Result<()> {
        let key = self.location.result_key(id);
        debug!(execution_id = %id, bucket = %self.location.bucket, key = %key, "Fetching result export");

        let stream = self
            .store
            .fetch_object(&self.location.bucket, &key)
            .await?;

        let (record_tx, mut record_rx) = mpsc::channel::<csv::StringRecord>(RECORD_CHANNEL_BUFFER);

        // Decode on a blocking thread so the CSV reader's synchronous reads
        // don't tie up async workers. Decode errors end the task; the closed
        // channel then hands control back to the consumer below.
        let bridge = SyncIoBridge::new(StreamReader::new(stream));
        let csv_opts = self.csv.clone();
        let decode_task = tokio::task::spawn_blocking(move || -> Result<()> {
            let mut reader = std::io::BufReader::new(bridge);

            // An export object with an empty body means the result never
            // materialized; reject before producing any batch.
            if reader.fill_buf()?.is_empty() {
                return Err(Error::Storage("empty object body".into()));
            }

            let mut csv_reader = csv::ReaderBuilder::new()
                .delimiter(csv_opts.delimiter)
                .has_headers(csv_opts.has_headers)
                .flexible(csv_opts.flexible)
                .from_reader(reader);

            for result in csv_reader.into_records() {
                let record = result?;
                if record_tx.blocking_send(record).is_err() {
                    // Consumer dropped (sink failure); stop decoding
                    break;
                }
            }
            Ok(())
        });

        let mut buffer: Vec<csv::StringRecord> = Vec::with_capacity(self.batch_size);
        let mut batches = 0usize;
        let mut total_records = 0usize;

        while let Some(record) = record_rx.recv().await {
            buffer.push(record);
            if buffer.len() == self.batch_size {
                self.flush_batch(id, &mut buffer, &mut batches, &mut total_records)
                    .await?;
            }
        }

        // Channel closed: surface any decode-side failure before flushing
        // the remainder
        decode_task
            .await
            .map_err(|e| Error::Storage(format!("decode task panicked: {}", e)))??;

        if !buffer.is_empty() {
            self.flush_batch(id, &mut buffer, &mut batches, &mut total_records)
                .await?;
        }

        if let Some(callback) = &self.on_complete {
            callback();
        }

        info!(
            execution_id = %id,
            batches = batches,
            records = total_records,
            "Result stream complete"
        );
        self.emit(Event::StreamComplete {
            id: id.clone(),
            batches,
            records: total_records,
        });

        Ok(())
    }

    async fn flush_batch(
        &self,
        id: &ExecutionId,
        buffer: &mut Vec<csv::StringRecord>,
        batches: &mut usize,
        total_records: &mut usize,
    ) -> Result<()> {
        let batch = std::mem::replace(buffer, Vec::with_capacity(self.batch_size));
        let len = batch.len();

        self.sink
            .handle_batch(batch)
            .await
            .map_err(|e| Error::Sink(e.to_string()))?;

        *batches += 1;
        *total_records += len;

        debug!(execution_id = %id, records = len, "Batch flushed to sink");
        self.emit(Event::BatchFlushed {
            id: id.clone(),
            records: len,
        });

        Ok(())
    }
}

//! Append-only JSON array file sink.
//!
//! Batches are appended to a single file as they arrive, so a multi-batch
//! result never has to be held in memory at once. The file is a JSON array
//! built incrementally: an opening bracket on the first write, one line per
//! item with comma separators, and a closing bracket written by `close`.
//! Until `close` runs the file is deliberately unterminated; a crash leaves
//! a recognizably incomplete file rather than a silently truncated array.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::Result;

const ARRAY_OPEN: &[u8] = b"[\n";
const ARRAY_CLOSE: &[u8] = b"\n]";
const ITEM_SEPARATOR: &[u8] = b",\n";

/// Incremental writer for a JSON array file
pub struct JsonArrayWriter {
    dir: PathBuf,
    path: PathBuf,
    /// Opening bracket written (this run or a previous one)
    started: bool,
    /// At least one item is in the file, so the next item needs a separator
    has_items: bool,
}

impl JsonArrayWriter {
    /// Target a file inside `dir`; nothing is created until the first write
    pub fn new(dir: impl AsRef<Path>, file_name: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(file_name.as_ref());
        Self {
            dir,
            path,
            started: false,
            has_items: false,
        }
    }

    /// Path of the target file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a batch of items to the array.
    ///
    /// Creates the directory and the file (with its opening bracket) on the
    /// first call. If the file already exists with content from an earlier,
    /// unterminated run, new items are appended after a separator instead of
    /// restarting the array. An empty batch is a no-op.
    pub async fn flush<T: Serialize>(&mut self, items: &[T]) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }

        self.ensure_started().await?;

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        let mut buf = Vec::new();
        for item in items {
            if self.has_items {
                buf.extend_from_slice(ITEM_SEPARATOR);
            }
            serde_json::to_writer(&mut buf, item)?;
            self.has_items = true;
        }
        file.write_all(&buf).await?;
        file.flush().await?;

        debug!(path = %self.path.display(), items = items.len(), "Appended batch");
        Ok(())
    }

    /// Terminate the array and consume the writer.
    ///
    /// If nothing was ever flushed, the file is still created so the output
    /// parses as an empty JSON array.
    pub async fn close(mut self) -> Result<()> {
        self.ensure_started().await?;

        let mut file = OpenOptions::new().append(true).open(&self.path).await?;
        file.write_all(ARRAY_CLOSE).await?;
        file.flush().await?;

        info!(path = %self.path.display(), "Closed JSON array file");
        Ok(())
    }

    /// Make sure the directory exists and the file holds its opening bracket
    async fn ensure_started(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        tokio::fs::create_dir_all(&self.dir).await?;

        let existing_len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        if existing_len == 0 {
            tokio::fs::write(&self.path, ARRAY_OPEN).await?;
            self.has_items = false;
        } else {
            // Picking up an unterminated file from a previous run; anything
            // past the opening bracket means items are already present.
            self.has_items = existing_len > ARRAY_OPEN.len() as u64;
        }
        self.started = true;
        Ok(())
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn read_array(path: &Path) -> Value {
        let text = tokio::fs::read_to_string(path).await.unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn single_flush_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonArrayWriter::new(dir.path(), "out.json");
        let path = writer.path().to_path_buf();

        writer.flush(&[json!({"a": 1})]).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(read_array(&path).await, json!([{"a": 1}]));
    }

    #[tokio::test]
    async fn batches_across_flushes_form_one_array() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonArrayWriter::new(dir.path(), "out.json");
        let path = writer.path().to_path_buf();

        writer
            .flush(&[json!({"id": 1}), json!({"id": 2})])
            .await
            .unwrap();
        writer.flush(&[json!({"id": 3})]).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(
            read_array(&path).await,
            json!([{"id": 1}, {"id": 2}, {"id": 3}])
        );
    }

    #[tokio::test]
    async fn close_without_flush_writes_an_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonArrayWriter::new(dir.path(), "out.json");
        let path = writer.path().to_path_buf();

        writer.close().await.unwrap();

        assert_eq!(read_array(&path).await, json!([]));
    }

    #[tokio::test]
    async fn empty_flush_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonArrayWriter::new(dir.path(), "out.json");
        let path = writer.path().to_path_buf();

        writer.flush::<Value>(&[]).await.unwrap();
        assert!(
            tokio::fs::metadata(&path).await.is_err(),
            "no file until something is written"
        );

        writer.close().await.unwrap();
        assert_eq!(read_array(&path).await, json!([]));
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut writer = JsonArrayWriter::new(&nested, "out.json");
        let path = writer.path().to_path_buf();

        writer.flush(&[json!(1)]).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(read_array(&path).await, json!([1]));
    }

    #[tokio::test]
    async fn resumes_an_unterminated_file_from_a_previous_run() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = JsonArrayWriter::new(dir.path(), "out.json");
        let path = first.path().to_path_buf();
        first.flush(&[json!({"run": 1})]).await.unwrap();
        drop(first); // no close: file left without its closing bracket

        let mut second = JsonArrayWriter::new(dir.path(), "out.json");
        second.flush(&[json!({"run": 2})]).await.unwrap();
        second.close().await.unwrap();

        assert_eq!(read_array(&path).await, json!([{"run": 1}, {"run": 2}]));
    }

    #[tokio::test]
    async fn serializes_record_maps() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = JsonArrayWriter::new(dir.path(), "out.json");
        let path = writer.path().to_path_buf();

        let mut record = crate::types::Record::new();
        record.insert("name".to_string(), "Alice".to_string());
        writer.flush(&[record]).await.unwrap();
        writer.close().await.unwrap();

        assert_eq!(read_array(&path).await, json!([{"name": "Alice"}]));
    }
}

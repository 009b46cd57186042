//! Configuration types for query-stream

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Hard ceiling on batch and page sizes — the query service's own page-size
/// limit. Requesting more than this is rejected at construction time.
pub const MAX_BATCH_SIZE: usize = 999;

/// Interval between status polls while a query is QUEUED or RUNNING
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Execution context sent alongside the SQL text on submission
///
/// All fields have working defaults; a zero-configuration context submits to
/// the `"primary"` workgroup with hour-long result reuse enabled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryContext {
    /// Catalog to resolve unqualified table names against
    #[serde(default)]
    pub catalog: Option<String>,

    /// Database to resolve unqualified table names against
    #[serde(default)]
    pub database: Option<String>,

    /// Workgroup the query runs under (default: "primary")
    #[serde(default = "default_workgroup")]
    pub workgroup: String,

    /// Output-location URI for the service to write results to
    #[serde(default)]
    pub output_location: Option<String>,

    /// Result-reuse policy (default: reuse results up to 60 minutes old)
    #[serde(default)]
    pub result_reuse: ResultReusePolicy,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self {
            catalog: None,
            database: None,
            workgroup: default_workgroup(),
            output_location: None,
            result_reuse: ResultReusePolicy::default(),
        }
    }
}

/// Whether and how long the service may serve cached results for an
/// identical query
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResultReusePolicy {
    /// Allow the service to reuse prior results (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum age of reusable results (default: 60 minutes)
    #[serde(default = "default_max_age", with = "duration_minutes")]
    pub max_age: Duration,
}

impl Default for ResultReusePolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age: default_max_age(),
        }
    }
}

/// Parse options passed to the CSV decoder on the streaming result path
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter (default: `,`)
    #[serde(default = "default_delimiter")]
    pub delimiter: u8,

    /// Treat the first record as a header row and skip it (default: true)
    #[serde(default = "default_true")]
    pub has_headers: bool,

    /// Accept records with varying field counts instead of erroring
    /// (default: false — malformed rows abort the stream)
    #[serde(default)]
    pub flexible: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            has_headers: true,
            flexible: false,
        }
    }
}

fn default_workgroup() -> String {
    "primary".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_age() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_delimiter() -> u8 {
    b','
}

/// Serialize `Duration` as whole minutes; the service API takes the reuse
/// age in minutes.
mod duration_minutes {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs() / 60)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let minutes = u64::deserialize(d)?;
        Ok(Duration::from_secs(minutes * 60))
    }
}

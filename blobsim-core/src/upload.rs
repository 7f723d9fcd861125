//! Concurrent upload driver.
//!
//! Pushes synthetic streams into an [`UploadSink`] with a bounded number of
//! uploads in flight. Each upload builds and owns its own stream on a blocking
//! worker thread; workers share nothing but the sink.

use std::io::{self, Read};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::StreamConfig;
use crate::schedule::blob_name;
use crate::stream::{StreamError, SyntheticByteStream};
use crate::{BlobsimError, Result};

/// Errors that can occur while uploading a single stream.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// Reading the body or writing to the sink failed
    #[error("I/O error during upload: {0}")]
    Io(#[from] io::Error),

    /// Stream settings for the upload were rejected
    #[error("Invalid stream configuration: {0}")]
    Stream(#[from] StreamError),

    /// Sink stopped before consuming the whole body
    #[error("Short upload for {name}: expected {expected} bytes, sink consumed {actual}")]
    ShortUpload {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// Worker thread panicked or was cancelled
    #[error("Upload worker failed: {reason}")]
    WorkerFailed { reason: String },
}

/// Destination for upload bodies.
///
/// Called on a blocking worker thread; implementations may block freely.
pub trait UploadSink: Send + Sync {
    /// Consumes `body` under `name` and returns the number of bytes taken.
    ///
    /// # Errors
    ///
    /// - `UploadError::Io` - If reading the body or writing to the destination fails
    fn upload(&self, name: &str, body: &mut dyn Read) -> std::result::Result<u64, UploadError>;
}

/// Sink that reads bodies to the end and throws the bytes away.
#[derive(Debug, Clone, Copy)]
pub struct DiscardSink {
    buffer_size: usize,
}

impl Default for DiscardSink {
    fn default() -> Self {
        Self::new(64 * 1024)
    }
}

impl DiscardSink {
    /// Creates a discard sink reading `buffer_size` bytes at a time.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }
}

impl UploadSink for DiscardSink {
    fn upload(&self, _name: &str, body: &mut dyn Read) -> std::result::Result<u64, UploadError> {
        let mut buffer = vec![0u8; self.buffer_size];
        let mut consumed = 0u64;
        loop {
            match body.read(&mut buffer) {
                Ok(0) => return Ok(consumed),
                Ok(n) => consumed += n as u64,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// One upload: a name and the stream that forms its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadJob {
    pub name: String,
    pub stream: StreamConfig,
}

/// Ordered set of uploads to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPlan {
    pub jobs: Vec<UploadJob>,
}

impl UploadPlan {
    /// Creates `count` identical uploads named `test0`, `test1`, ...
    pub fn uniform(count: usize, stream: &StreamConfig) -> Self {
        let jobs = (0..count)
            .map(|index| UploadJob {
                name: format!("test{index}"),
                stream: stream.clone(),
            })
            .collect();
        Self { jobs }
    }

    /// Creates one upload per size, named after the size.
    pub fn from_sizes(sizes: &[u64], template: &StreamConfig) -> Self {
        let jobs = sizes
            .iter()
            .map(|&size| UploadJob {
                name: blob_name(size),
                stream: StreamConfig {
                    total_size: size,
                    ..template.clone()
                },
            })
            .collect();
        Self { jobs }
    }

    /// Returns the sum of all upload sizes.
    pub fn total_bytes(&self) -> u64 {
        self.jobs.iter().map(|job| job.stream.total_size).sum()
    }
}

/// Result of one completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub index: usize,
    pub name: String,
    pub bytes: u64,
    pub elapsed_secs: f64,
}

/// Summary of an upload run.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub started_at: DateTime<Utc>,
    pub max_workers: usize,
    pub outcomes: Vec<UploadOutcome>,
    pub total_bytes: u64,
    pub elapsed_secs: f64,
    pub throughput_bps: f64,
}

impl UploadReport {
    /// Renders the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// - `BlobsimError::Serialization` - If the report cannot be encoded
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs every upload in `plan`, at most `max_workers` at a time.
///
/// Outcomes in the report are ordered by job index. All uploads run to
/// completion even when some fail; the first failure is then returned.
///
/// # Errors
///
/// - `BlobsimError::Configuration` - If `max_workers` is zero
/// - `BlobsimError::Upload` - If any upload fails, comes up short, or its worker panics
pub async fn run_uploads(
    plan: UploadPlan,
    sink: Arc<dyn UploadSink>,
    max_workers: usize,
) -> Result<UploadReport> {
    if max_workers == 0 {
        return Err(BlobsimError::Configuration {
            reason: "max_workers must be greater than zero".to_string(),
        });
    }

    let started_at = Utc::now();
    let start = Instant::now();
    let semaphore = Arc::new(Semaphore::new(max_workers));

    info!(
        uploads = plan.jobs.len(),
        total_bytes = plan.total_bytes(),
        max_workers,
        "Starting upload run"
    );

    let mut tasks = Vec::with_capacity(plan.jobs.len());
    for (index, job) in plan.jobs.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| UploadError::WorkerFailed {
                reason: e.to_string(),
            })?;
        let sink = Arc::clone(&sink);

        tasks.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            upload_one(index, job, sink.as_ref())
        }));
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    for task in futures::future::join_all(tasks).await {
        let result = task.unwrap_or_else(|e| {
            Err(UploadError::WorkerFailed {
                reason: e.to_string(),
            })
        });
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                warn!("Upload failed: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e.into());
    }

    outcomes.sort_by_key(|outcome| outcome.index);
    let elapsed = start.elapsed();
    let total_bytes = outcomes.iter().map(|outcome| outcome.bytes).sum();
    let report = UploadReport {
        started_at,
        max_workers,
        outcomes,
        total_bytes,
        elapsed_secs: elapsed.as_secs_f64(),
        throughput_bps: throughput(total_bytes, elapsed),
    };

    info!(
        total_bytes = report.total_bytes,
        elapsed_secs = report.elapsed_secs,
        throughput_bps = report.throughput_bps,
        "Upload run finished"
    );
    Ok(report)
}

/// Uploads a single stream and checks that the sink consumed all of it.
///
/// # Errors
///
/// - `UploadError::Stream` - If the stream configuration is invalid
/// - `UploadError::Io` - If the sink fails
/// - `UploadError::ShortUpload` - If the sink consumed fewer bytes than the stream holds
pub fn upload_stream(
    name: &str,
    stream: &mut SyntheticByteStream,
    sink: &dyn UploadSink,
) -> std::result::Result<u64, UploadError> {
    let expected = stream.remaining();
    let actual = sink.upload(name, stream)?;
    if actual != expected {
        return Err(UploadError::ShortUpload {
            name: name.to_string(),
            expected,
            actual,
        });
    }
    Ok(actual)
}

fn upload_one(
    index: usize,
    job: UploadJob,
    sink: &dyn UploadSink,
) -> std::result::Result<UploadOutcome, UploadError> {
    debug!(index, name = %job.name, size = job.stream.total_size, "Starting upload");
    let start = Instant::now();

    let mut stream = SyntheticByteStream::from_config(&job.stream)?;
    let bytes = upload_stream(&job.name, &mut stream, sink)?;

    let elapsed = start.elapsed();
    debug!(
        index,
        name = %job.name,
        bytes,
        elapsed_ms = elapsed.as_millis() as u64,
        "Finished upload"
    );
    Ok(UploadOutcome {
        index,
        name: job.name,
        bytes,
        elapsed_secs: elapsed.as_secs_f64(),
    })
}

/// Returns bytes per second, or zero for an instantaneous run.
pub fn throughput(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { bytes as f64 / secs } else { 0.0 }
}

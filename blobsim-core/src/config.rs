//! Centralized configuration for blobsim.
//!
//! Defaults mirror the sizes used by the upload experiments: 1 MiB advisory
//! chunks, a nominal terabyte stream, and 64 concurrent 20 MiB uploads spread
//! over 8 workers.

use serde::{Deserialize, Serialize};

use crate::content::ContentMode;
use crate::pacing::{PacingStrategy, RateLimit};
use crate::stream::{DEFAULT_CHUNK_SIZE, StreamBuilder};

/// Central configuration for all blobsim components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobsimConfig {
    pub stream: StreamConfig,
    pub upload: UploadConfig,
}

/// Settings for a single synthetic stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Advisory read granularity in bytes
    pub chunk_size: usize,
    /// Logical stream length in bytes
    pub total_size: u64,
    /// Read throughput cap in bytes per second (None = unlimited)
    pub rate_limit: Option<u64>,
    /// How the rate limit is enforced
    #[serde(default)]
    pub pacing: PacingStrategy,
    /// Content produced by reads
    pub content: ContentMode,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            total_size: 1_000_000_000_000, // 1 TB
            rate_limit: None,
            pacing: PacingStrategy::CallGranular,
            content: ContentMode::Zeroed,
        }
    }
}

impl StreamConfig {
    /// Creates a zeroed, unlimited stream configuration of `total_size` bytes.
    pub fn with_size(total_size: u64) -> Self {
        Self {
            total_size,
            ..Default::default()
        }
    }

    /// Returns a builder seeded with these settings.
    pub fn to_builder(&self) -> StreamBuilder {
        let rate_limit = self
            .rate_limit
            .map(|rate| RateLimit::new(rate).with_strategy(self.pacing));

        StreamBuilder::new(self.total_size)
            .chunk_size(self.chunk_size)
            .rate_limit_config(rate_limit)
            .content(self.content)
    }
}

/// Settings for concurrent upload runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Maximum uploads in flight at once
    pub max_workers: usize,
    /// Number of uploads in a uniform run
    pub upload_count: usize,
    /// Size of each upload in a uniform run
    pub file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_workers: 8,
            upload_count: 64,
            file_size: 20 * 1024 * 1024, // 20 MiB
        }
    }
}

impl BlobsimConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Unparseable values are ignored and the default is kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration with overrides resolved through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(size) = parse_var(&lookup, "BLOBSIM_CHUNK_SIZE") {
            config.stream.chunk_size = size;
        }

        if let Some(size) = parse_var(&lookup, "BLOBSIM_TOTAL_SIZE") {
            config.stream.total_size = size;
        }

        if let Some(rate) = parse_var(&lookup, "BLOBSIM_RATE_LIMIT") {
            config.stream.rate_limit = Some(rate);
        }

        if let Some(seed) = parse_var(&lookup, "BLOBSIM_RANDOM_SEED") {
            config.stream.content = ContentMode::Pseudorandom { seed };
        }

        if let Some(workers) = parse_var(&lookup, "BLOBSIM_MAX_WORKERS") {
            config.upload.max_workers = workers;
        }

        if let Some(count) = parse_var(&lookup, "BLOBSIM_UPLOAD_COUNT") {
            config.upload.upload_count = count;
        }

        if let Some(size) = parse_var(&lookup, "BLOBSIM_FILE_SIZE") {
            config.upload.file_size = size;
        }

        config
    }

    /// Creates a configuration sized for fast tests.
    pub fn for_testing() -> Self {
        Self {
            stream: StreamConfig {
                chunk_size: 1024,
                total_size: 64 * 1024,
                ..Default::default()
            },
            upload: UploadConfig {
                max_workers: 2,
                upload_count: 4,
                file_size: 16 * 1024,
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

//! CLI command implementations

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use blobsim_core::config::{BlobsimConfig, StreamConfig};
use blobsim_core::content::ContentMode;
use blobsim_core::schedule::{blob_name, exponential_file_sizes, group_digits, skip_existing};
use blobsim_core::upload::{DiscardSink, UploadPlan, run_uploads, throughput, upload_stream};
use blobsim_core::{BlobsimError, Result, SyntheticByteStream};
use clap::Subcommand;
use tracing::info;

/// Available CLI commands
///
/// Unset options fall back to `BLOBSIM_*` environment overrides, then to
/// built-in defaults.
#[derive(Subcommand)]
pub enum Commands {
    /// Read a single synthetic stream to the end and report throughput
    Drain {
        /// Stream size in bytes
        #[arg(short, long)]
        size: Option<u64>,
        /// Read size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Throughput cap in bytes per second
        #[arg(short, long)]
        rate_limit: Option<u64>,
        /// Produce seeded pseudorandom bytes instead of zeros
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Run many uploads concurrently into a discard sink
    Uploads {
        /// Number of uploads
        #[arg(short, long)]
        count: Option<usize>,
        /// Size of each upload in bytes
        #[arg(short, long)]
        file_size: Option<u64>,
        /// Maximum uploads in flight
        #[arg(short, long)]
        workers: Option<usize>,
        /// Per-stream throughput cap in bytes per second
        #[arg(short, long)]
        rate_limit: Option<u64>,
        /// Produce seeded pseudorandom bytes instead of zeros
        #[arg(long)]
        seed: Option<u64>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the exponential file-size schedule, optionally uploading it
    Schedule {
        /// Number of files
        #[arg(short, long, default_value = "100")]
        count: usize,
        /// Largest size is roughly 10^max_exponent bytes
        #[arg(short, long, default_value = "10")]
        max_exponent: u32,
        /// Sizes to treat as already uploaded
        #[arg(long, value_delimiter = ',')]
        existing: Vec<u64>,
        /// Upload the remaining schedule into a discard sink
        #[arg(long)]
        run: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
///
/// - `BlobsimError::Stream` - Invalid stream settings
/// - `BlobsimError::Upload` - An upload failed or came up short
/// - `BlobsimError::Configuration` - Invalid worker count
pub async fn handle_command(command: Commands) -> Result<()> {
    let config = BlobsimConfig::from_env();

    match command {
        Commands::Drain {
            size,
            chunk_size,
            rate_limit,
            seed,
        } => {
            let stream = stream_config(&config, size, chunk_size, rate_limit, seed);
            drain(stream).await
        }
        Commands::Uploads {
            count,
            file_size,
            workers,
            rate_limit,
            seed,
            json,
        } => {
            let file_size = file_size.unwrap_or(config.upload.file_size);
            let stream = stream_config(&config, Some(file_size), None, rate_limit, seed);
            let plan = UploadPlan::uniform(count.unwrap_or(config.upload.upload_count), &stream);
            uploads(plan, workers.unwrap_or(config.upload.max_workers), json).await
        }
        Commands::Schedule {
            count,
            max_exponent,
            existing,
            run,
        } => schedule(&config, count, max_exponent, existing, run).await,
    }
}

fn stream_config(
    config: &BlobsimConfig,
    size: Option<u64>,
    chunk_size: Option<usize>,
    rate_limit: Option<u64>,
    seed: Option<u64>,
) -> StreamConfig {
    let mut stream = config.stream.clone();
    if let Some(size) = size {
        stream.total_size = size;
    }
    if let Some(chunk_size) = chunk_size {
        stream.chunk_size = chunk_size;
    }
    if rate_limit.is_some() {
        stream.rate_limit = rate_limit;
    }
    if let Some(seed) = seed {
        stream.content = ContentMode::Pseudorandom { seed };
    }
    stream
}

/// Drain one stream through a discard sink
///
/// # Errors
///
/// - `BlobsimError::Stream` - Invalid stream settings
/// - `BlobsimError::Upload` - The sink failed or came up short
pub async fn drain(config: StreamConfig) -> Result<()> {
    println!(
        "Draining {} bytes in {} byte reads",
        group_digits(config.total_size),
        group_digits(config.chunk_size as u64)
    );

    let sink = DiscardSink::new(config.chunk_size);
    let start = Instant::now();
    let bytes = tokio::task::spawn_blocking(move || -> Result<u64> {
        let mut stream = SyntheticByteStream::from_config(&config)?;
        Ok(upload_stream("drain", &mut stream, &sink)?)
    })
    .await
    .map_err(|e| BlobsimError::Configuration {
        reason: format!("drain worker failed: {e}"),
    })??;

    let elapsed = start.elapsed();
    info!(bytes, elapsed_ms = elapsed.as_millis() as u64, "Drain finished");
    println!(
        "Read {} bytes in {:.3}s ({:.1} MiB/s)",
        group_digits(bytes),
        elapsed.as_secs_f64(),
        throughput(bytes, elapsed) / (1024.0 * 1024.0)
    );
    Ok(())
}

/// Run a plan of uploads and print the report
///
/// # Errors
///
/// - `BlobsimError::Configuration` - Zero workers
/// - `BlobsimError::Upload` - An upload failed
/// - `BlobsimError::Serialization` - JSON output could not be produced
pub async fn uploads(plan: UploadPlan, workers: usize, json: bool) -> Result<()> {
    if !json {
        println!(
            "Uploading {} streams ({} bytes) with {workers} workers",
            plan.jobs.len(),
            group_digits(plan.total_bytes())
        );
    }

    let report = run_uploads(plan, Arc::new(DiscardSink::default()), workers).await?;

    if json {
        println!("{}", report.to_json()?);
        return Ok(());
    }

    for outcome in &report.outcomes {
        println!(
            "  {:<24} {:>20} bytes  {:.3}s",
            outcome.name,
            group_digits(outcome.bytes),
            outcome.elapsed_secs
        );
    }
    println!(
        "Uploaded {} bytes in {:.3}s ({:.1} MiB/s)",
        group_digits(report.total_bytes),
        report.elapsed_secs,
        report.throughput_bps / (1024.0 * 1024.0)
    );
    Ok(())
}

/// Print the file-size schedule and optionally upload it
///
/// # Errors
///
/// - `BlobsimError::Upload` - An upload failed
/// - `BlobsimError::Configuration` - Zero workers
pub async fn schedule(
    config: &BlobsimConfig,
    count: usize,
    max_exponent: u32,
    existing: Vec<u64>,
    run: bool,
) -> Result<()> {
    let sizes = exponential_file_sizes(count, max_exponent);
    let existing: HashSet<u64> = existing.into_iter().collect();

    for (index, size) in sizes.iter().enumerate() {
        let marker = if existing.contains(size) { "skip" } else { "" };
        println!("{index:>4}  {:>20}  {}  {marker}", group_digits(*size), blob_name(*size));
    }

    if !run {
        return Ok(());
    }

    let plan = pending_plan(&config.stream, &sizes, &existing);
    uploads(plan, config.upload.max_workers, false).await
}

fn pending_plan(stream: &StreamConfig, sizes: &[u64], existing: &HashSet<u64>) -> UploadPlan {
    UploadPlan::from_sizes(&skip_existing(sizes, existing), stream)
}

//! Synthetic byte streams for large upload bodies.
//!
//! A [`SyntheticByteStream`] behaves like a seekable binary file of an
//! arbitrary length but fabricates its content on each read, so a terabyte
//! body costs no more memory than the chunk currently being read. Reads may
//! be paced to emulate a bandwidth-limited link.

use std::io;

use bytes::Bytes;
use tracing::{debug, trace};

use crate::clock::{Clock, SystemClock};
use crate::config::StreamConfig;
use crate::content::{ContentMode, ContentSource};
use crate::pacing::{Pacer, PacingStrategy, RateLimit};

/// Default advisory read granularity (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Errors raised by stream positioning and construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    /// Unrecognised seek mode, negative seek target or unusable setting
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Description of the rejected argument
        reason: String,
    },
}

impl From<StreamError> for io::Error {
    fn from(error: StreamError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, error)
    }
}

/// Reference point for [`SyntheticByteStream::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Offset from the start of the stream
    Start,
    /// Offset from the current position
    Current,
    /// Offset from the logical end of the stream
    End,
}

impl TryFrom<i32> for Whence {
    type Error = StreamError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Whence::Start),
            1 => Ok(Whence::Current),
            2 => Ok(Whence::End),
            other => Err(StreamError::InvalidArgument {
                reason: format!("Invalid whence: {other}"),
            }),
        }
    }
}

/// Builder for [`SyntheticByteStream`].
#[derive(Debug, Clone)]
pub struct StreamBuilder {
    total_size: u64,
    chunk_size: usize,
    bytes_per_second: Option<u64>,
    strategy: PacingStrategy,
    content: ContentMode,
}

impl StreamBuilder {
    /// Starts a builder for a stream of `total_size` bytes.
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            chunk_size: DEFAULT_CHUNK_SIZE,
            bytes_per_second: None,
            strategy: PacingStrategy::default(),
            content: ContentMode::Zeroed,
        }
    }

    /// Sets the advisory chunk size.
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Caps read throughput at `bytes_per_second`.
    pub fn rate_limit(mut self, bytes_per_second: u64) -> Self {
        self.bytes_per_second = Some(bytes_per_second);
        self
    }

    /// Sets how the rate limit is enforced. Has no effect on unlimited streams.
    pub fn pacing(mut self, strategy: PacingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replaces both the rate and the pacing strategy.
    pub fn rate_limit_config(mut self, rate_limit: Option<RateLimit>) -> Self {
        self.bytes_per_second = rate_limit.map(|limit| limit.bytes_per_second);
        if let Some(limit) = rate_limit {
            self.strategy = limit.strategy;
        }
        self
    }

    /// Sets what content the stream yields.
    pub fn content(mut self, content: ContentMode) -> Self {
        self.content = content;
        self
    }

    /// Builds a stream paced by the system clock.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If chunk size, rate or burst capacity is zero
    pub fn build(self) -> Result<SyntheticByteStream, StreamError> {
        self.build_with_clock(SystemClock)
    }

    /// Builds a stream paced by `clock`.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If chunk size, rate or burst capacity is zero
    pub fn build_with_clock<C: Clock>(
        self,
        clock: C,
    ) -> Result<SyntheticByteStream<C>, StreamError> {
        if self.chunk_size == 0 {
            return Err(StreamError::InvalidArgument {
                reason: "chunk size must be greater than zero".to_string(),
            });
        }
        let rate_limit = self
            .bytes_per_second
            .map(|rate| RateLimit::new(rate).with_strategy(self.strategy));
        if let Some(limit) = &rate_limit {
            limit.validate()?;
        }

        let pacer = Pacer::new(rate_limit, clock.now());
        Ok(SyntheticByteStream {
            chunk_size: self.chunk_size,
            total_size: self.total_size,
            position: 0,
            rate_limit,
            content_mode: self.content,
            content: ContentSource::new(self.content),
            pacer,
            clock,
        })
    }
}

/// Seekable, readable stream of synthesized bytes.
///
/// Invariant: `position <= total_size`. Reading past the end returns an empty
/// chunk; seeking before the start fails while seeking past the end clamps.
#[derive(Debug)]
pub struct SyntheticByteStream<C: Clock = SystemClock> {
    chunk_size: usize,
    total_size: u64,
    position: u64,
    rate_limit: Option<RateLimit>,
    content_mode: ContentMode,
    content: ContentSource,
    pacer: Pacer,
    clock: C,
}

impl SyntheticByteStream {
    /// Creates an unpaced stream of `total_size` zero bytes.
    pub fn new(total_size: u64) -> Self {
        let now = SystemClock.now();
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            total_size,
            position: 0,
            rate_limit: None,
            content_mode: ContentMode::Zeroed,
            content: ContentSource::Zeroed,
            pacer: Pacer::new(None, now),
            clock: SystemClock,
        }
    }

    /// Starts a [`StreamBuilder`].
    pub fn builder(total_size: u64) -> StreamBuilder {
        StreamBuilder::new(total_size)
    }

    /// Creates a stream from configuration.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If the configuration has a zero chunk size or rate
    pub fn from_config(config: &StreamConfig) -> Result<Self, StreamError> {
        config.to_builder().build()
    }
}

impl<C: Clock> SyntheticByteStream<C> {
    /// Reads up to `requested_size` bytes; negative means all remaining.
    ///
    /// Returns fewer bytes than requested only at the end of the stream, and
    /// an empty chunk once the end is reached.
    pub fn read(&mut self, requested_size: i64) -> Bytes {
        let remaining = self.remaining();
        if remaining == 0 {
            return Bytes::new();
        }

        let n = if requested_size < 0 {
            remaining
        } else {
            remaining.min(requested_size as u64)
        };
        if n == 0 {
            return Bytes::new();
        }

        let len = usize::try_from(n).unwrap_or(usize::MAX);
        self.pace(len as u64);
        let chunk = self.content.bytes(self.position, len);
        self.position += len as u64;
        chunk
    }

    /// Reads everything from the current position to the end.
    pub fn read_remaining(&mut self) -> Bytes {
        self.read(-1)
    }

    /// Returns the current position.
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Moves the cursor and returns the new position.
    ///
    /// Targets past the end are clamped to the total size.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If the target position is negative
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, StreamError> {
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => i128::from(self.position),
            Whence::End => i128::from(self.total_size),
        };
        let target = base + i128::from(offset);

        if target < 0 {
            return Err(StreamError::InvalidArgument {
                reason: format!("Negative seek position: {target}"),
            });
        }

        Ok(self.move_to(target))
    }

    /// Seeks using a raw whence code (0 = start, 1 = current, 2 = end).
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If `whence` is unrecognised or the target is negative
    pub fn seek_raw(&mut self, offset: i64, whence: i32) -> Result<u64, StreamError> {
        self.seek(offset, Whence::try_from(whence)?)
    }

    /// Returns an iterator of `chunk_size` reads until the end of the stream.
    pub fn chunks(&mut self) -> Chunks<'_, C> {
        Chunks { stream: self }
    }

    /// Returns the advisory chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the logical stream length.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Returns the number of bytes left to read.
    pub fn remaining(&self) -> u64 {
        self.total_size - self.position
    }

    /// Returns the configured rate limit.
    pub fn rate_limit(&self) -> Option<RateLimit> {
        self.rate_limit
    }

    /// Returns the configured content mode.
    pub fn content_mode(&self) -> ContentMode {
        self.content_mode
    }

    /// Moves the cursor to a non-negative `target`, clamped to the end.
    fn move_to(&mut self, target: i128) -> u64 {
        self.position = self.clamp_position(target);
        debug!(
            requested = %target,
            position = self.position,
            total_size = self.total_size,
            "Seeked synthetic stream"
        );
        self.position
    }

    fn clamp_position(&self, target: i128) -> u64 {
        if target > i128::from(self.total_size) {
            trace!(requested = %target, total_size = self.total_size, "Clamped seek past end");
            self.total_size
        } else {
            target as u64
        }
    }

    fn pace(&mut self, bytes: u64) {
        if self.rate_limit.is_none() {
            return;
        }

        let delay = self.pacer.delay_for(bytes, self.clock.now());
        if !delay.is_zero() {
            trace!(bytes, delay_ms = delay.as_millis() as u64, "Pacing read");
            self.clock.sleep(delay);
        }
        self.pacer.record_read(self.clock.now());
    }
}

impl<C: Clock> io::Read for SyntheticByteStream<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        let n = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        if n == 0 {
            return Ok(0);
        }

        self.pace(n as u64);
        self.content.fill(self.position, &mut buf[..n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl<C: Clock> io::Seek for SyntheticByteStream<C> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        match pos {
            // Unsigned targets never fail, so skip the i64 conversion
            io::SeekFrom::Start(target) => Ok(self.move_to(i128::from(target))),
            io::SeekFrom::Current(offset) => Ok(Self::seek(self, offset, Whence::Current)?),
            io::SeekFrom::End(offset) => Ok(Self::seek(self, offset, Whence::End)?),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.position)
    }
}

/// Iterator over successive `chunk_size` reads of a stream.
#[derive(Debug)]
pub struct Chunks<'a, C: Clock> {
    stream: &'a mut SyntheticByteStream<C>,
}

impl<C: Clock> Iterator for Chunks<'_, C> {
    type Item = Bytes;

    fn next(&mut self) -> Option<Self::Item> {
        let size = i64::try_from(self.stream.chunk_size).unwrap_or(i64::MAX);
        let chunk = self.stream.read(size);
        if chunk.is_empty() { None } else { Some(chunk) }
    }
}

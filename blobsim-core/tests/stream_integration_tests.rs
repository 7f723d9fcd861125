//! Integration tests for synthetic streams.
//!
//! Exercises the public stream API the way upload code consumes it: through
//! chunked reads, `std::io` adapters, seeks, and paced reads driven by a
//! manual clock.

use std::io::{self, Read, Seek, SeekFrom};
use std::time::Duration;

use blobsim_core::{
    ContentMode, ManualClock, PacingStrategy, StreamConfig, StreamError, SyntheticByteStream,
    Whence,
};
use proptest::prelude::*;

/// Reads `chunk` bytes at a time until the stream reports end of stream.
fn drain_in_chunks(stream: &mut SyntheticByteStream, chunk: i64) -> u64 {
    let mut total = 0u64;
    loop {
        let bytes = stream.read(chunk);
        if bytes.is_empty() {
            return total;
        }
        total += bytes.len() as u64;
    }
}

proptest! {
    #[test]
    fn prop_chunked_reads_sum_to_total_size(total_size in 0u64..200_000, chunk in 1i64..70_000) {
        let mut stream = SyntheticByteStream::new(total_size);
        prop_assert_eq!(drain_in_chunks(&mut stream, chunk), total_size);
        prop_assert_eq!(stream.tell(), total_size);
    }

    #[test]
    fn prop_position_stays_within_bounds(
        total_size in 0u64..10_000,
        ops in prop::collection::vec((0u8..4, -20_000i64..20_000), 1..40),
    ) {
        let mut stream = SyntheticByteStream::new(total_size);
        for (op, value) in ops {
            match op {
                0 => { stream.read(value); }
                1 => { let _ = stream.seek(value, Whence::Start); }
                2 => { let _ = stream.seek(value, Whence::Current); }
                _ => { let _ = stream.seek(value, Whence::End); }
            }
            prop_assert!(stream.tell() <= total_size);
        }
    }

    #[test]
    fn prop_read_advances_by_min_of_request_and_remaining(
        total_size in 0u64..10_000,
        start in 0i64..12_000,
        request in 0i64..12_000,
    ) {
        let mut stream = SyntheticByteStream::new(total_size);
        let position = stream.seek(start, Whence::Start).unwrap();
        let expected = (request as u64).min(total_size - position);

        prop_assert_eq!(stream.read(request).len() as u64, expected);
        prop_assert_eq!(stream.tell(), position + expected);
    }
}

#[test]
fn test_ten_byte_stream_in_chunks_of_four() {
    let mut stream = SyntheticByteStream::new(10);

    let mut observed = Vec::new();
    for _ in 0..4 {
        let len = stream.read(4).len();
        observed.push((len, stream.tell()));
    }

    assert_eq!(observed, vec![(4, 4), (4, 8), (2, 10), (0, 10)]);
}

#[test]
fn test_tell_tracks_reads() {
    let mut stream = SyntheticByteStream::new(100);
    assert_eq!(stream.tell(), 0);

    stream.read(30);
    assert_eq!(stream.tell(), 30);

    stream.read(1000);
    assert_eq!(stream.tell(), 100);
}

#[test]
fn test_seek_to_start_after_reads() {
    let mut stream = SyntheticByteStream::new(100);
    stream.read(60);

    assert_eq!(stream.seek(0, Whence::Start), Ok(0));
    assert_eq!(stream.tell(), 0);
}

#[test]
fn test_seek_before_start_is_invalid_argument() {
    let mut stream = SyntheticByteStream::new(100);
    assert!(matches!(
        stream.seek(-1, Whence::Start),
        Err(StreamError::InvalidArgument { .. })
    ));
}

#[test]
fn test_seek_to_end_then_read_is_empty() {
    let mut stream = SyntheticByteStream::new(100);

    assert_eq!(stream.seek(0, Whence::End), Ok(100));
    assert!(stream.read(10).is_empty());
    assert!(stream.read(-1).is_empty());
}

#[test]
fn test_seek_past_end_clamps_to_total_size() {
    let total_size = 100;
    let mut stream = SyntheticByteStream::new(total_size);

    assert_eq!(
        stream.seek(total_size as i64 + 1000, Whence::Start),
        Ok(total_size)
    );
    assert_eq!(stream.tell(), total_size);
}

#[test]
fn test_unknown_whence_is_invalid_argument() {
    let mut stream = SyntheticByteStream::new(100);
    assert!(matches!(
        stream.seek_raw(0, 7),
        Err(StreamError::InvalidArgument { .. })
    ));
    assert_eq!(stream.tell(), 0);
}

#[test]
fn test_back_to_back_reads_respect_rate_limit() {
    let clock = ManualClock::new();
    let rate = 4096;
    let chunk = 1024;
    let mut stream = SyntheticByteStream::builder(1 << 20)
        .rate_limit(rate)
        .build_with_clock(clock.clone())
        .unwrap();

    stream.read(chunk);
    let first_done = clock.elapsed();
    stream.read(chunk);
    let second_done = clock.elapsed();

    let per_read = Duration::from_secs_f64(chunk as f64 / rate as f64);
    assert!(second_done - first_done >= per_read);
    assert_eq!(clock.total_slept(), per_read * 2);
}

#[test]
fn test_average_throughput_bounded_by_rate_limit() {
    let clock = ManualClock::new();
    let rate = 10_000u64;
    let total = 100_000u64;
    let mut stream = SyntheticByteStream::builder(total)
        .rate_limit(rate)
        .build_with_clock(clock.clone())
        .unwrap();

    let mut read = 0u64;
    for request in [1, 5000, 123, 40_000, 7, 60_000] {
        read += stream.read(request).len() as u64;
    }
    assert_eq!(read, total);

    let elapsed = clock.elapsed().as_secs_f64();
    assert!(read as f64 / elapsed <= rate as f64 * 1.000_001);
}

#[test]
fn test_token_bucket_throughput_bounded_after_burst() {
    let clock = ManualClock::new();
    let mut stream = SyntheticByteStream::builder(100_000)
        .rate_limit(10_000)
        .pacing(PacingStrategy::TokenBucket { burst_bytes: 10_000 })
        .build_with_clock(clock.clone())
        .unwrap();

    let read = stream.read_remaining().len() as u64;
    assert_eq!(read, 100_000);

    // First 10_000 bytes come from the burst, the rest at 10_000 B/s
    assert_eq!(clock.total_slept(), Duration::from_secs(9));
}

#[test]
fn test_io_copy_consumes_exact_length() {
    let mut stream = SyntheticByteStream::builder(1_000_003)
        .chunk_size(4096)
        .build()
        .unwrap();

    let copied = io::copy(&mut stream, &mut io::sink()).unwrap();
    assert_eq!(copied, 1_000_003);
    assert_eq!(Read::read(&mut stream, &mut [0u8; 16]).unwrap(), 0);
}

#[test]
fn test_io_seek_then_read_pseudorandom_content() {
    let content = ContentMode::Pseudorandom { seed: 2024 };
    let mut reference = SyntheticByteStream::builder(4096)
        .content(content)
        .build()
        .unwrap();
    let whole = reference.read_remaining();

    let mut stream = SyntheticByteStream::builder(4096)
        .content(content)
        .build()
        .unwrap();
    Seek::seek(&mut stream, SeekFrom::End(-100)).unwrap();
    let mut tail = Vec::new();
    stream.read_to_end(&mut tail).unwrap();

    assert_eq!(&tail[..], &whole[4096 - 100..]);
}

#[test]
fn test_huge_nominal_size_is_cheap() {
    let mut stream = SyntheticByteStream::from_config(&StreamConfig::default()).unwrap();
    assert_eq!(stream.total_size(), 1_000_000_000_000);

    assert_eq!(stream.seek(-10, Whence::End), Ok(999_999_999_990));
    assert_eq!(stream.read(1 << 20).len(), 10);
}

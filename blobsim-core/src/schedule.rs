//! File-size schedules for upload runs.
//!
//! The exponential schedule spreads `count` uploads from a single byte up to
//! roughly `10^max_exponent` bytes. Adding the file index to each size keeps
//! every size unique, so a size doubles as an idempotency key when a run is
//! resumed against uploads that already exist.

use std::collections::HashSet;

/// Returns `count` strictly increasing sizes, `floor(10^(max_exponent * i / count)) + i`.
pub fn exponential_file_sizes(count: usize, max_exponent: u32) -> Vec<u64> {
    (0..count)
        .map(|index| {
            let exponent = f64::from(max_exponent) * index as f64 / count as f64;
            (10f64.powf(exponent) + index as f64) as u64
        })
        .collect()
}

/// Drops sizes that already have an upload.
pub fn skip_existing(sizes: &[u64], existing: &HashSet<u64>) -> Vec<u64> {
    sizes
        .iter()
        .copied()
        .filter(|size| !existing.contains(size))
        .collect()
}

/// Formats the upload name for a blob of `size` bytes, e.g. `blob-1_000_000.blob`.
pub fn blob_name(size: u64) -> String {
    format!("blob-{}.blob", group_digits(size))
}

/// Formats `value` with `_` between groups of three digits.
pub fn group_digits(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('_');
        }
        grouped.push(digit);
    }
    grouped
}

//! Security validation constants and helpers
//!
//! Limits and checked arithmetic that keep a malformed or hostile image from
//! driving the reader into huge allocations or unbounded traversal.

use crate::Error;

/// Smallest logical block size ISO 9660 permits
pub const MIN_LOGICAL_BLOCK_SIZE: u32 = 512;

/// Largest logical block size we accept (one logical sector)
pub const MAX_LOGICAL_BLOCK_SIZE: u32 = 2048;

/// Maximum directory records decoded from a single directory extent
pub const MAX_DIRECTORY_ENTRIES: usize = 65_536;

/// Maximum file size to extract into memory (1 GB)
pub const MAX_FILE_EXTRACT_SIZE: u64 = 1024 * 1024 * 1024;

/// Maximum number of path segments resolved in one lookup
pub const MAX_PATH_DEPTH: usize = 255;

/// Maximum number of descriptor sectors scanned before giving up
pub const DEFAULT_DESCRIPTOR_SCAN_LIMIT: u32 = 64;

/// Maximum file size for memory mapping (16 GB - practical limit for most systems)
pub const MAX_MMAP_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Validate that a size is within allocation limits
///
/// # Security
/// Prevents memory exhaustion from extents with absurd lengths
pub fn validate_allocation_size(size: u64, limit: u64, context: &str) -> crate::Result<usize> {
    if size > limit {
        return Err(Error::format(format!(
            "{} size {} exceeds limit {}",
            context, size, limit
        )));
    }

    u64_to_usize(size, context)
}

/// Safely multiply two u64 values with overflow checking
pub fn checked_multiply_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_mul(b)
        .ok_or_else(|| Error::format(format!("{}: multiplication overflow", context)))
}

/// Safely add two u64 values with overflow checking
pub fn checked_add_u64(a: u64, b: u64, context: &str) -> crate::Result<u64> {
    a.checked_add(b)
        .ok_or_else(|| Error::format(format!("{}: addition overflow", context)))
}

/// Safely convert u64 to usize with platform checking
///
/// # Security
/// Prevents truncation on 32-bit platforms
pub fn u64_to_usize(value: u64, context: &str) -> crate::Result<usize> {
    value.try_into().map_err(|_| {
        Error::format(format!(
            "{}: value {} exceeds platform usize limit",
            context, value
        ))
    })
}

/// Validate a logical block size read from a volume descriptor
pub fn validate_logical_block_size(block_size: u32) -> crate::Result<()> {
    if !(MIN_LOGICAL_BLOCK_SIZE..=MAX_LOGICAL_BLOCK_SIZE).contains(&block_size) {
        return Err(Error::format(format!(
            "Invalid logical block size: {} (must be {}-{})",
            block_size, MIN_LOGICAL_BLOCK_SIZE, MAX_LOGICAL_BLOCK_SIZE
        )));
    }

    if !block_size.is_power_of_two() {
        return Err(Error::format(format!(
            "Logical block size {} is not a power of 2",
            block_size
        )));
    }

    Ok(())
}

/// Sanitize a filename extracted from an image
///
/// # Security
/// Prevents malicious names from causing path traversal when written to the host
pub fn sanitize_extracted_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|&c| c != '/' && c != '\\')
        .filter(|&c| !c.is_control())
        .take(255)
        .collect::<String>()
        .trim_start_matches(|c| c == '.' || c == ' ')
        .trim_end_matches(|c| c == '.' || c == ' ')
        .to_string()
}

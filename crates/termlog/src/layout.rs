//! On-disk layout of the log file and the arithmetic shared by appenders,
//! readers, and the rotation state machine.
//!
//! A log file is `P` term buffers, then `P` term metadata blocks, then one
//! log metadata block:
//!
//! ```text
//! +-----------------------------+
//! |          Term 0             |
//! +-----------------------------+
//! |          Term 1             |
//! +-----------------------------+
//! |          Term 2             |
//! +-----------------------------+
//! |      Term 0 Metadata        |
//! +-----------------------------+
//! |      Term 1 Metadata        |
//! +-----------------------------+
//! |      Term 2 Metadata        |
//! +-----------------------------+
//! |        Log Metadata         |
//! +-----------------------------+
//! ```
//!
//! Term metadata carries the 64-bit raw tail counter, packed as
//! `(term_id << 32) | tail_offset`, and the partition status word. Log
//! metadata carries the active partition index, the initial term id, and the
//! default frame header template. Each mutable field sits on its own
//! 128-byte line so producers hammering the tail never share a line with the
//! status word or the active index.

use crate::error::LogError;

/// Number of rotating term partitions.
pub const PARTITION_COUNT: usize = 3;

/// Smallest acceptable term length.
pub const TERM_MIN_LENGTH: usize = 4 * 1024;

/// Largest acceptable term length.
pub const TERM_MAX_LENGTH: usize = 1 << 30;

/// Ceiling on the whole file: everything must fit one 32-bit-indexable mapping.
pub const MAX_LOG_LENGTH: usize = i32::MAX as usize;

// ---------------------------------------------------------------------
// TERM METADATA FIELDS
// ---------------------------------------------------------------------

/// Offset of the raw tail counter within a term metadata block.
pub const TERM_TAIL_COUNTER_OFFSET: usize = 0;

/// Offset of the partition status word within a term metadata block.
pub const TERM_STATUS_OFFSET: usize = 128;

/// Partition is zero-filled and ready to become active.
pub const CLEAN: i32 = 0;
/// Partition was retired two rotations ago and awaits the cleaner.
pub const NEEDS_CLEANING: i32 = 1;
/// Partition is the active append target (or was, until its trip).
pub const IN_USE: i32 = 2;

// ---------------------------------------------------------------------
// LOG METADATA FIELDS
// ---------------------------------------------------------------------

/// Offset of `active_partition_index : i32` within the log metadata block.
pub const LOG_ACTIVE_PARTITION_INDEX_OFFSET: usize = 0;

/// Offset of `initial_term_id : i32` within the log metadata block.
pub const LOG_INITIAL_TERM_ID_OFFSET: usize = 128;

/// Offset of the 32-byte default frame header template.
pub const LOG_DEFAULT_FRAME_HEADER_OFFSET: usize = 256;

/// Queries the OS page size, with a 4 KiB floor.
///
/// Metadata blocks are sized to whole pages so the hot tail counters of
/// adjacent partitions never share a page with each other or with the
/// term buffers.
pub fn page_size() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf with a valid name has no preconditions.
        let sz = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if sz > 0 {
            return (sz as usize).max(4096);
        }
    }
    4096
}

/// Length of one term metadata block: a single page.
pub fn term_meta_length() -> usize {
    page_size()
}

/// Length of the log metadata block: a single page.
pub fn log_meta_length() -> usize {
    page_size()
}

/// Total file length for a given term length: `P * (T + M) + L`.
pub fn log_length(term_length: usize) -> usize {
    PARTITION_COUNT * (term_length + term_meta_length()) + log_meta_length()
}

/// Validates a requested term length.
///
/// Accepts powers of two within `[TERM_MIN_LENGTH, TERM_MAX_LENGTH]` whose
/// full log layout still fits a single 32-bit-indexable mapping. There is no
/// multi-segment fallback for larger logs.
pub fn check_term_length(term_length: usize) -> Result<(), LogError> {
    if !term_length.is_power_of_two()
        || term_length < TERM_MIN_LENGTH
        || term_length > TERM_MAX_LENGTH
        || log_length(term_length) > MAX_LOG_LENGTH
    {
        return Err(LogError::InvalidTermLength {
            requested: term_length,
            min: TERM_MIN_LENGTH,
            max: TERM_MAX_LENGTH,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------
// RAW TAIL PACKING
// ---------------------------------------------------------------------

/// Packs a term id and tail offset into a raw tail value.
#[inline]
pub const fn pack_tail(term_id: i32, tail_offset: i32) -> i64 {
    ((term_id as i64) << 32) | (tail_offset as i64 & 0xFFFF_FFFF)
}

/// Extracts the term id from a raw tail value.
#[inline]
pub const fn term_id(raw_tail: i64) -> i32 {
    (raw_tail >> 32) as i32
}

/// Extracts the tail offset from a raw tail value.
///
/// After a trip the offset field can run past the term length; callers that
/// need a byte coordinate inside the term cap it with
/// [`tail_offset_in_term`].
#[inline]
pub const fn tail_offset(raw_tail: i64) -> i32 {
    (raw_tail & 0xFFFF_FFFF) as i32
}

/// Tail offset capped to the term length.
#[inline]
pub fn tail_offset_in_term(raw_tail: i64, term_length: usize) -> i32 {
    tail_offset(raw_tail).min(term_length as i32)
}

// ---------------------------------------------------------------------
// POSITION ARITHMETIC
// ---------------------------------------------------------------------

/// Number of bits a term id is shifted by when composing a stream position.
#[inline]
pub fn position_bits_to_shift(term_length: usize) -> u32 {
    debug_assert!(term_length.is_power_of_two());
    term_length.trailing_zeros()
}

/// Composes the 64-bit stream position for `(term_id, term_offset)`.
#[inline]
pub fn compute_position(
    term_id: i32,
    term_offset: i32,
    position_bits_to_shift: u32,
    initial_term_id: i32,
) -> i64 {
    let term_count = i64::from(term_id) - i64::from(initial_term_id);
    (term_count << position_bits_to_shift) + i64::from(term_offset)
}

/// Partition index addressed by a stream position.
#[inline]
pub fn index_by_position(position: i64, position_bits_to_shift: u32) -> usize {
    ((position >> position_bits_to_shift) as usize) % PARTITION_COUNT
}

/// Byte offset within a term addressed by a stream position.
#[inline]
pub fn term_offset_by_position(position: i64, term_length: usize) -> usize {
    (position as usize) & (term_length - 1)
}

/// Index of the partition after `index` in rotation order.
#[inline]
pub const fn next_partition_index(index: usize) -> usize {
    (index + 1) % PARTITION_COUNT
}

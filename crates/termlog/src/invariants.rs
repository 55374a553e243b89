//! Debug assertion macros for the log's structural invariants.
//!
//! Only active in debug builds (`#[cfg(debug_assertions)]`), so there is
//! zero overhead in release builds. Used by the appender, the reader, and
//! the rotation state machine.

// =============================================================================
// Frame alignment: every frame starts on a 32-byte boundary
// =============================================================================

/// Assert that a frame offset sits on a frame alignment boundary.
///
/// Used in: `TermAppender::claim`, `reader::read`, `scanner::scan_for_gap`
macro_rules! debug_assert_frame_aligned {
    ($offset:expr) => {
        debug_assert!(
            $offset % $crate::frame::FRAME_ALIGNMENT == 0,
            "frame offset {} is not {}-byte aligned",
            $offset,
            $crate::frame::FRAME_ALIGNMENT
        )
    };
}

// =============================================================================
// Slot bounds: a reserved slot lies entirely inside its term
// =============================================================================

/// Assert that `[offset, offset + length)` fits inside a term buffer.
///
/// Used in: `TermAppender::claim` before handing out a claim
macro_rules! debug_assert_slot_in_bounds {
    ($offset:expr, $length:expr, $capacity:expr) => {
        debug_assert!(
            $offset + $length <= $capacity,
            "slot [{}, {}) runs past term end {}",
            $offset,
            $offset + $length,
            $capacity
        )
    };
}

// =============================================================================
// Tail monotonicity: within one term id the tail offset never decreases
// =============================================================================

/// Assert that a raw tail update never moves the offset backwards while the
/// term id is unchanged.
///
/// Used in: `TermAppender::claim` after winning a slot
macro_rules! debug_assert_tail_monotonic {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $crate::layout::term_id($new) != $crate::layout::term_id($old)
                || $crate::layout::tail_offset($new) >= $crate::layout::tail_offset($old),
            "raw tail moved backwards within term {}: {} -> {}",
            $crate::layout::term_id($old),
            $crate::layout::tail_offset($old),
            $crate::layout::tail_offset($new)
        )
    };
}

// =============================================================================
// Partition index: always one of the three ring slots
// =============================================================================

/// Assert that a partition index is in range.
macro_rules! debug_assert_partition_index {
    ($index:expr) => {
        debug_assert!(
            $index < $crate::layout::PARTITION_COUNT,
            "partition index {} out of range",
            $index
        )
    };
}

// =============================================================================
// Re-exports for crate-internal use
// =============================================================================

pub(crate) use debug_assert_frame_aligned;
pub(crate) use debug_assert_partition_index;
pub(crate) use debug_assert_slot_in_bounds;
pub(crate) use debug_assert_tail_monotonic;

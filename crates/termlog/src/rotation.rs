//! Log rotation and term cleaning.
//!
//! Terms cycle through four states: active → dirty (after rotation) →
//! needs-cleaning (marked by the rotator one rotation later) → clean (after
//! the background zero-fill) → active again. With three partitions the
//! cleaner has two full term lifetimes to finish before the active cursor
//! wraps back onto a partition it zeroed.

use crate::invariants::debug_assert_partition_index;
use crate::layout;
use crate::log_buffers::LogBuffers;

/// Advances the active partition after a trip of `active_term_id` in
/// partition `active_index`.
///
/// Seeds the next partition's tail to `(active_term_id + 1) << 32`, marks the
/// partition after that as needing cleaning, and publishes the new active
/// index. Any number of trip observers may race here; exactly one wins the
/// index CAS. The tail seed only fires while the partition still carries its
/// term id from one full cycle ago, so neither a racing rotator nor a stale
/// one that slept through rotations can reset a tail producers already
/// append under. Returns `true` for the winner.
pub fn rotate_log(buffers: &LogBuffers, active_index: usize, active_term_id: i32) -> bool {
    debug_assert_partition_index!(active_index);

    if buffers.active_partition_index() != active_index {
        // the trip this call observed was already rotated away
        return false;
    }

    let next_index = layout::next_partition_index(active_index);
    let next_next_index = layout::next_partition_index(next_index);
    let next_term_id = active_term_id + 1;
    // the term this partition carried one cycle ago (seeded at bootstrap
    // for partitions that were never active)
    let expected_term_id = next_term_id - layout::PARTITION_COUNT as i32;

    let next_meta = buffers.term_metadata(next_index);
    loop {
        let observed = next_meta.get_i64_volatile(layout::TERM_TAIL_COUNTER_OFFSET);
        if layout::term_id(observed) != expected_term_id {
            break; // another rotator already seeded it
        }
        if next_meta.compare_and_set_i64(
            layout::TERM_TAIL_COUNTER_OFFSET,
            observed,
            layout::pack_tail(next_term_id, 0),
        ) {
            break;
        }
    }
    next_meta.put_i32_ordered(layout::TERM_STATUS_OFFSET, layout::IN_USE);

    buffers
        .term_metadata(next_next_index)
        .put_i32_ordered(layout::TERM_STATUS_OFFSET, layout::NEEDS_CLEANING);

    buffers.log_metadata().compare_and_set_i32(
        layout::LOG_ACTIVE_PARTITION_INDEX_OFFSET,
        active_index as i32,
        next_index as i32,
    )
}

/// Zero-fills every partition marked as needing cleaning and marks it clean.
///
/// Returns the number of partitions cleaned. Must only run on the background
/// cleaner: the status acquire/release pair with the rotator guarantees no
/// producer holds a claim in a partition observed as `NEEDS_CLEANING`.
pub fn clean_dirty_partitions(buffers: &LogBuffers) -> usize {
    let mut cleaned = 0;

    for index in 0..layout::PARTITION_COUNT {
        let meta = buffers.term_metadata(index);
        if meta.get_i32_volatile(layout::TERM_STATUS_OFFSET) == layout::NEEDS_CLEANING {
            let term = buffers.term_buffer(index);
            term.set_memory(0, term.capacity(), 0);
            meta.put_i32_ordered(layout::TERM_STATUS_OFFSET, layout::CLEAN);
            cleaned += 1;
        }
    }

    cleaned
}

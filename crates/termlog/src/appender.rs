use std::sync::Arc;

use crate::backoff::Backoff;
use crate::buffer::AtomicBuffer;
use crate::claim::BufferClaim;
use crate::frame;
use crate::header::HeaderWriter;
use crate::invariants::{
    debug_assert_frame_aligned, debug_assert_slot_in_bounds, debug_assert_tail_monotonic,
};
use crate::layout;
use crate::metrics::Metrics;

// =============================================================================
// CLAIM PROTOCOL
// =============================================================================
//
// The raw tail in term metadata is the single shared coordinate, but it is
// not the allocation point. Allocation is a 32-bit CAS on the length word of
// the slot the tail currently points at:
//
// 1. Acquire-load the raw tail; unpack (term_id, term_offset).
// 2. term_offset >= term_length: the term already tripped - report it.
// 3. term_offset + aligned > term_length: end of term. CAS the remainder
//    slot's length word 0 -> -slack, plain-write the tail past the term end
//    (so every later observer trips), publish a padding frame over the
//    remainder with Release, report the trip.
// 4. Otherwise CAS the slot's length word 0 -> -frame_length. The winner
//    plain-writes the bumped tail (the CAS is the fence), stamps the header,
//    and hands out the claim. Commit later release-writes +frame_length.
// 5. A losing CAS spins with backoff and re-reads the tail.
// 6. If the tail stays frozen across `spin_limit_before_unblock` retries,
//    the reserving producer died between its slot CAS and its tail write;
//    the retrier restores the slot's negative length word to zero so the
//    next CAS can win it.
//
// Because only the frontier slot's owner ever writes the tail, and every
// competitor needs that same slot, the frontier is serialized without any
// producer ever waiting on a lock.
//
// =============================================================================

/// Sentinel tail offset reporting that the term tripped.
pub const TRIPPED: i32 = -1;

/// Sentinel tail offset reporting that the frame can never fit a term.
pub const FAILED: i32 = -2;

/// Packs a claim outcome the way the raw tail packs its fields:
/// term id in the high 32 bits, offset or sentinel in the low 32.
#[inline]
pub const fn pack_result(term_id: i32, offset_or_code: i32) -> i64 {
    layout::pack_tail(term_id, offset_or_code)
}

/// Outcome of a [`TermAppender::claim`].
#[derive(Debug)]
pub enum ClaimResult<'a> {
    /// The slot was reserved; write the payload through the claim and commit.
    Claimed {
        /// The reserved byte range.
        claim: BufferClaim<'a>,
        /// Term the frame landed in.
        term_id: i32,
        /// Tail offset after this frame.
        new_offset: i32,
    },
    /// The claim ran off the end of the term; rotate and retry.
    Tripped {
        /// Term that tripped.
        term_id: i32,
    },
    /// The frame can never fit in a term of this length.
    Failed,
}

impl ClaimResult<'_> {
    /// The packed 64-bit form of this outcome.
    pub fn as_raw(&self) -> i64 {
        match self {
            Self::Claimed {
                term_id, new_offset, ..
            } => pack_result(*term_id, *new_offset),
            Self::Tripped { term_id } => pack_result(*term_id, TRIPPED),
            Self::Failed => pack_result(0, FAILED),
        }
    }
}

/// Multi-producer appender over one `(term_buffer, term_metadata)` pair.
///
/// Any number of threads may call [`claim`](Self::claim) concurrently; the
/// slot-CAS protocol above keeps non-conflicting reservations wait-free and
/// self-heals when a reserving producer stalls.
pub struct TermAppender {
    term_buffer: AtomicBuffer,
    metadata: AtomicBuffer,
    term_length: usize,
    spin_limit_before_unblock: u32,
    claim_spin_cap: u32,
    metrics: Arc<Metrics>,
    enable_metrics: bool,
}

impl TermAppender {
    /// Binds an appender to a partition's buffers.
    pub fn new(
        term_buffer: AtomicBuffer,
        metadata: AtomicBuffer,
        spin_limit_before_unblock: u32,
        metrics: Arc<Metrics>,
        enable_metrics: bool,
    ) -> Self {
        let term_length = term_buffer.capacity();
        debug_assert!(term_length.is_power_of_two());
        // Each retry's PAUSE burst stays short relative to the unblock
        // budget: a frozen tail has to be noticed within the budgeted
        // retry count, not after minutes of exponential spinning.
        let claim_spin_cap = spin_limit_before_unblock
            .max(2)
            .ilog2()
            .min(Backoff::DEFAULT_SPIN_LIMIT);
        Self {
            term_buffer,
            metadata,
            term_length,
            spin_limit_before_unblock,
            claim_spin_cap,
            metrics,
            enable_metrics,
        }
    }

    /// Current raw tail of this partition (acquire).
    #[inline]
    pub fn raw_tail(&self) -> i64 {
        self.metadata
            .get_i64_volatile(layout::TERM_TAIL_COUNTER_OFFSET)
    }

    /// Term length this appender writes into.
    #[inline]
    pub fn term_length(&self) -> usize {
        self.term_length
    }

    /// Reserves `length` payload bytes in this term.
    ///
    /// Blocks with bounded spin-wait under contention; does not yield
    /// cooperatively. See the protocol notes at the top of this module.
    pub fn claim(&self, header: &HeaderWriter, length: usize) -> ClaimResult<'_> {
        let frame_length = length + frame::HEADER_LENGTH;
        let aligned = frame::align(frame_length);

        let mut observed_tail = self.raw_tail();
        if aligned > self.term_length {
            return ClaimResult::Failed;
        }

        // claim only ever spins (no snooze): it must not yield cooperatively
        let mut backoff = Backoff::with_limits(self.claim_spin_cap, self.claim_spin_cap);
        let mut frozen_retries: u32 = 0;

        loop {
            let term_id = layout::term_id(observed_tail);
            let term_offset = layout::tail_offset(observed_tail) as usize;

            if term_offset >= self.term_length {
                // Term already tripped; the padding frame (if any slack
                // existed) is the first tripper's responsibility.
                return ClaimResult::Tripped { term_id };
            }
            debug_assert_frame_aligned!(term_offset);

            let resulting_offset = term_offset + aligned;
            if resulting_offset > self.term_length {
                if self.trip(header, observed_tail, term_offset, aligned, term_id) {
                    return ClaimResult::Tripped { term_id };
                }
            } else if self
                .term_buffer
                .compare_and_set_i32(term_offset, 0, -(frame_length as i32))
            {
                let new_tail = observed_tail + aligned as i64;
                debug_assert_tail_monotonic!(observed_tail, new_tail);
                debug_assert_slot_in_bounds!(term_offset, aligned, self.term_length);

                // Plain store: the winning CAS above is the fence, and no
                // other producer can write the tail until commit of this
                // frontier is visible through it.
                self.metadata
                    .put_i64(layout::TERM_TAIL_COUNTER_OFFSET, new_tail);

                header.write(&self.term_buffer, term_offset, frame_length, term_id);

                if self.enable_metrics {
                    self.metrics.add_frames_appended(1);
                    self.metrics.add_bytes_appended(aligned as u64);
                }

                return ClaimResult::Claimed {
                    claim: BufferClaim::new(self.term_buffer, term_offset, frame_length),
                    term_id,
                    new_offset: resulting_offset as i32,
                };
            }

            // Contention: another producer holds the frontier slot. Spin,
            // re-read the tail, and watch for a reservation that never
            // completes.
            backoff.spin();
            if self.enable_metrics {
                self.metrics.add_claim_retries(1);
            }

            let reloaded = self.raw_tail();
            if reloaded == observed_tail {
                frozen_retries += 1;
                if frozen_retries > self.spin_limit_before_unblock {
                    self.unblock_slot(term_offset);
                    frozen_retries = 0;
                }
            } else {
                observed_tail = reloaded;
                frozen_retries = 0;
            }
        }
    }

    /// End-of-term: win the remainder slot, push the tail past the end, and
    /// publish the padding frame. Returns `false` if the slot was contended.
    fn trip(
        &self,
        header: &HeaderWriter,
        observed_tail: i64,
        term_offset: usize,
        aligned: usize,
        term_id: i32,
    ) -> bool {
        let slack = self.term_length - term_offset;
        if !self
            .term_buffer
            .compare_and_set_i32(term_offset, 0, -(slack as i32))
        {
            return false;
        }

        self.metadata
            .put_i64(layout::TERM_TAIL_COUNTER_OFFSET, observed_tail + aligned as i64);

        header.write(&self.term_buffer, term_offset, slack, term_id);
        frame::put_frame_type(&self.term_buffer, term_offset, frame::HDR_TYPE_PAD);
        frame::put_length_ordered(&self.term_buffer, term_offset, slack as i32);

        if self.enable_metrics {
            self.metrics.add_padding_frames(1);
        }
        true
    }

    /// Restores a stalled reservation so the frontier can move again.
    ///
    /// Only a still-negative length word is touched: a positive word means
    /// the frame committed, and the missing tail bump will be reconciled by
    /// the owner or has simply not become visible yet.
    fn unblock_slot(&self, term_offset: usize) {
        let observed = self.term_buffer.get_i32_volatile(term_offset);
        if observed >= 0 {
            return;
        }
        if self.term_buffer.compare_and_set_i32(term_offset, observed, 0) && self.enable_metrics {
            self.metrics.add_stall_unblocks(1);
        }
    }
}

use crate::buffer::AtomicBuffer;
use crate::frame;
use crate::invariants::debug_assert_frame_aligned;

/// A hole in a term: reserved-but-never-committed territory between
/// committed frames and the high-water mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Term the gap was found in.
    pub term_id: i32,
    /// Offset of the first missing byte.
    pub offset: usize,
    /// Length of the hole in bytes.
    pub length: usize,
}

/// Diagnostic scan for a gap between `rebuild_offset` and `hwm`.
///
/// Walks contiguous committed frames from `rebuild_offset`; at the first
/// zero length word it measures how far the hole extends (in frame-alignment
/// steps) before the next committed frame or the high-water mark. Returns
/// `None` when the committed prefix already reaches `hwm`.
pub fn scan_for_gap(
    term_buffer: &AtomicBuffer,
    term_id: i32,
    rebuild_offset: usize,
    hwm: usize,
) -> Option<Gap> {
    debug_assert_frame_aligned!(rebuild_offset);

    let limit = hwm.min(term_buffer.capacity());
    let mut offset = rebuild_offset;

    while offset < limit {
        let frame_length = frame::length_volatile(term_buffer, offset);
        if frame_length <= 0 {
            break;
        }
        offset += frame::align(frame_length as usize);
    }

    if offset >= limit {
        return None;
    }
    if frame::length_volatile(term_buffer, offset) < 0 {
        // reservation in flight, not a hole
        return None;
    }

    let gap_begin = offset;
    let mut gap_end = gap_begin;
    while gap_end < limit && frame::length_volatile(term_buffer, gap_end) == 0 {
        gap_end += frame::FRAME_ALIGNMENT;
    }

    Some(Gap {
        term_id,
        offset: gap_begin,
        length: gap_end.min(limit) - gap_begin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::test_support::HeapBuffer;
    use crate::frame::{HDR_TYPE_DATA, HEADER_LENGTH};

    const TERM_LENGTH: usize = 4096;

    fn commit_frame(buf: &AtomicBuffer, offset: usize, payload_len: usize) {
        frame::put_frame_type(buf, offset, HDR_TYPE_DATA);
        frame::put_length_ordered(buf, offset, (HEADER_LENGTH + payload_len) as i32);
    }

    #[test]
    fn test_no_gap_in_contiguous_frames() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, 32);
        commit_frame(&buf, 64, 32);

        assert_eq!(scan_for_gap(&buf, 7, 0, 128), None);
    }

    #[test]
    fn test_gap_between_committed_frames() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, 32);
        // hole at [64, 192): nothing committed
        commit_frame(&buf, 192, 32);

        let gap = scan_for_gap(&buf, 7, 0, 256).unwrap();
        assert_eq!(
            gap,
            Gap {
                term_id: 7,
                offset: 64,
                length: 128
            }
        );
    }

    #[test]
    fn test_gap_bounded_by_hwm() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, 32);
        // nothing beyond offset 64; hwm says reservations reached 256

        let gap = scan_for_gap(&buf, 9, 0, 256).unwrap();
        assert_eq!(gap.offset, 64);
        assert_eq!(gap.length, 192);
    }

    #[test]
    fn test_in_flight_reservation_is_not_a_gap() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, 32);
        buf.put_i32(64, -96);

        // negative length stops the committed-prefix walk, but an occupied
        // slot is not a hole
        assert_eq!(scan_for_gap(&buf, 7, 0, 256), None);
    }
}

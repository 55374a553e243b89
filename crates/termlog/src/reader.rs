use crate::buffer::AtomicBuffer;
use crate::frame;
use crate::invariants::debug_assert_frame_aligned;

/// Result of one scan over a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Offset one past the last consumed frame. The difference from the
    /// starting offset is the number of bytes the subscriber advances by.
    pub offset: usize,
    /// Number of data frames delivered to the handler.
    pub fragments: usize,
}

/// Scans committed frames in one term, starting at `term_offset`.
///
/// Reads each frame's length word with acquire ordering and stops at the
/// first `length <= 0`: zero is untouched territory and a negative value is
/// a reservation still in flight, which stalls the scan and preserves
/// in-term order. Padding frames are stepped over without a handler call and
/// without counting against `fragment_limit`. Data frames are delivered as a
/// borrowed payload slice valid only for the duration of the call.
///
/// Single-consumer: exactly one thread may scan a given log.
pub fn read<F>(
    term_buffer: &AtomicBuffer,
    term_offset: usize,
    fragment_limit: usize,
    mut on_frame: F,
) -> ReadOutcome
where
    F: FnMut(&[u8]),
{
    debug_assert_frame_aligned!(term_offset);

    let capacity = term_buffer.capacity();
    let mut offset = term_offset;
    let mut fragments = 0;

    while fragments < fragment_limit && offset < capacity {
        let frame_length = frame::length_volatile(term_buffer, offset);
        if frame_length <= 0 {
            break;
        }

        let aligned = frame::align(frame_length as usize);
        debug_assert!(offset + aligned <= capacity, "frame runs past term end");

        if !frame::is_padding(term_buffer, offset) {
            let payload_length = frame_length as usize - frame::HEADER_LENGTH;
            on_frame(term_buffer.as_slice(offset + frame::HEADER_LENGTH, payload_length));
            fragments += 1;
        }

        offset += aligned;
    }

    ReadOutcome { offset, fragments }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::test_support::HeapBuffer;
    use crate::frame::{HDR_TYPE_DATA, HDR_TYPE_PAD, HEADER_LENGTH};

    const TERM_LENGTH: usize = 4096;

    fn commit_frame(buf: &AtomicBuffer, offset: usize, payload: &[u8], frame_type: i16) {
        frame::put_frame_type(buf, offset, frame_type);
        buf.put_bytes(offset + HEADER_LENGTH, payload);
        frame::put_length_ordered(buf, offset, (HEADER_LENGTH + payload.len()) as i32);
    }

    #[test]
    fn test_empty_term_yields_nothing() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        let outcome = read(&buf, 0, 10, |_| panic!("no frames expected"));
        assert_eq!(outcome, ReadOutcome { offset: 0, fragments: 0 });
    }

    #[test]
    fn test_reads_committed_frames_in_order() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, b"first", HDR_TYPE_DATA);
        commit_frame(&buf, 64, b"second", HDR_TYPE_DATA);

        let mut seen = Vec::new();
        let outcome = read(&buf, 0, 10, |payload| seen.push(payload.to_vec()));

        assert_eq!(outcome.fragments, 2);
        assert_eq!(outcome.offset, 128);
        assert_eq!(seen, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn test_stops_at_reservation_in_flight() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, b"ok", HDR_TYPE_DATA);
        // in-flight reservation at the frontier
        buf.put_i32(64, -128);

        let mut count = 0;
        let outcome = read(&buf, 0, 10, |_| count += 1);
        assert_eq!(count, 1);
        assert_eq!(outcome.offset, 64);
    }

    #[test]
    fn test_padding_is_skipped_but_traversed() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        commit_frame(&buf, 0, b"data", HDR_TYPE_DATA);
        // 96-byte padding frame, then more data
        frame::put_frame_type(&buf, 64, HDR_TYPE_PAD);
        frame::put_length_ordered(&buf, 64, 96);
        commit_frame(&buf, 160, b"more", HDR_TYPE_DATA);

        let mut seen = Vec::new();
        let outcome = read(&buf, 0, 10, |payload| seen.push(payload.to_vec()));

        assert_eq!(seen, vec![b"data".to_vec(), b"more".to_vec()]);
        assert_eq!(outcome.fragments, 2);
        assert_eq!(outcome.offset, 224);
    }

    #[test]
    fn test_fragment_limit_bounds_one_scan() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        for i in 0..8 {
            commit_frame(&buf, i * 64, b"x", HDR_TYPE_DATA);
        }

        let outcome = read(&buf, 0, 3, |_| {});
        assert_eq!(outcome.fragments, 3);
        assert_eq!(outcome.offset, 192);

        // resume where the last scan stopped
        let outcome = read(&buf, outcome.offset, 10, |_| {});
        assert_eq!(outcome.fragments, 5);
        assert_eq!(outcome.offset, 512);
    }

    #[test]
    fn test_scan_stops_at_term_end() {
        let mut heap = HeapBuffer::new(TERM_LENGTH);
        let buf = heap.view();

        // terminal padding frame covering the whole tail of the term
        frame::put_frame_type(&buf, 4032, HDR_TYPE_PAD);
        frame::put_length_ordered(&buf, 4032, 64);

        let outcome = read(&buf, 4032, 10, |_| panic!("padding is not delivered"));
        assert_eq!(outcome.offset, TERM_LENGTH);
        assert_eq!(outcome.fragments, 0);
    }
}

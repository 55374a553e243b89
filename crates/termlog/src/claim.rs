use std::marker::PhantomData;

use crate::buffer::AtomicBuffer;
use crate::frame;

/// A reserved, not-yet-committed byte range in a term.
///
/// The producer obtains a claim, writes its payload into
/// [`as_mut_slice`](Self::as_mut_slice), then calls [`commit`](Self::commit)
/// to make the frame visible to the reader. [`abort`](Self::abort) turns the
/// slot into a padding frame so the reader skips it. Either call consumes the
/// claim; the payload view cannot outlive it.
///
/// Dropping an unresolved claim aborts it, so a claim abandoned on an error
/// path can never stall the reader.
pub struct BufferClaim<'a> {
    buffer: AtomicBuffer,
    frame_offset: usize,
    frame_length: usize,
    resolved: bool,
    _appender: PhantomData<&'a ()>,
}

impl<'a> BufferClaim<'a> {
    pub(crate) fn new(buffer: AtomicBuffer, frame_offset: usize, frame_length: usize) -> Self {
        Self {
            buffer,
            frame_offset,
            frame_length,
            resolved: false,
            _appender: PhantomData,
        }
    }

    /// Length of the claimed payload in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.frame_length - frame::HEADER_LENGTH
    }

    /// Returns `true` if the claimed payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the frame within its term.
    #[inline]
    pub fn frame_offset(&self) -> usize {
        self.frame_offset
    }

    /// Mutable view of exactly the claimed payload bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buffer
            .as_mut_slice(self.frame_offset + frame::HEADER_LENGTH, self.len())
    }

    /// Publishes the frame by release-writing its positive length.
    pub fn commit(mut self) {
        frame::put_length_ordered(&self.buffer, self.frame_offset, self.frame_length as i32);
        self.resolved = true;
    }

    /// Discards the claim: rewrites the type to padding, then publishes the
    /// length so the reader steps over the slot.
    pub fn abort(mut self) {
        self.abort_in_place();
        self.resolved = true;
    }

    fn abort_in_place(&self) {
        frame::put_frame_type(&self.buffer, self.frame_offset, frame::HDR_TYPE_PAD);
        frame::put_length_ordered(&self.buffer, self.frame_offset, self.frame_length as i32);
    }
}

impl Drop for BufferClaim<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.abort_in_place();
        }
    }
}

impl std::fmt::Debug for BufferClaim<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferClaim")
            .field("frame_offset", &self.frame_offset)
            .field("frame_length", &self.frame_length)
            .field("resolved", &self.resolved)
            .finish()
    }
}

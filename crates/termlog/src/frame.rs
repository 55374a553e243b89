//! Frame protocol: fixed header layout, field offsets, type constants, and
//! the ordered accessors for the length word.
//!
//! Every record in a term is a header-prefixed, 32-byte-aligned frame:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                         Frame Length                          |
//! +---------------+---------------+-------------------------------+
//! |    Version    |     Flags     |             Type              |
//! +---------------+---------------+-------------------------------+
//! |                          Term Offset                          |
//! +---------------------------------------------------------------+
//! |                          Session ID                           |
//! +---------------------------------------------------------------+
//! |                          Stream ID                            |
//! +---------------------------------------------------------------+
//! |                           Term ID                             |
//! +---------------------------------------------------------------+
//! |                        Reserved Value                         |
//! |                                                               |
//! +---------------------------------------------------------------+
//! |                        Encoded Message                       ...
//!...                                                              |
//! +---------------------------------------------------------------+
//! ```
//!
//! The length word is the publication point: it is negative while a slot is
//! reserved, positive once committed, and zero in untouched territory. It is
//! always written last with release ordering and read with acquire ordering,
//! so a reader that observes a positive length also observes every other
//! header field and all payload bytes of that frame.

use crate::buffer::AtomicBuffer;

/// Length of the fixed frame header in bytes.
pub const HEADER_LENGTH: usize = 32;

/// Every frame starts at and occupies a multiple of this many bytes.
pub const FRAME_ALIGNMENT: usize = 32;

/// Offset of the `frame_length : i32` field.
pub const LENGTH_OFFSET: usize = 0;
/// Offset of the `version : u8` field.
pub const VERSION_OFFSET: usize = 4;
/// Offset of the `flags : u8` field.
pub const FLAGS_OFFSET: usize = 5;
/// Offset of the `type : i16` field.
pub const TYPE_OFFSET: usize = 6;
/// Offset of the `term_offset : i32` field.
pub const TERM_OFFSET_FIELD_OFFSET: usize = 8;
/// Offset of the `session_id : i32` field.
pub const SESSION_ID_OFFSET: usize = 12;
/// Offset of the `stream_id : i32` field.
pub const STREAM_ID_OFFSET: usize = 16;
/// Offset of the `term_id : i32` field.
pub const TERM_ID_OFFSET: usize = 20;
/// Offset of the `reserved_value : i64` field.
pub const RESERVED_VALUE_OFFSET: usize = 24;

/// Padding frame: fills unused space at the end of a term; carries no payload.
pub const HDR_TYPE_PAD: i16 = 0x00;
/// Data frame.
pub const HDR_TYPE_DATA: i16 = 0x01;
/// Status message. Reserved for flow control; nothing emits these today.
pub const HDR_TYPE_SM: i16 = 0x03;

/// Protocol version stamped into every header.
pub const CURRENT_VERSION: u8 = 0;

/// Default flags byte for freshly written frames.
pub const DEFAULT_FLAGS: u8 = 0;

/// Rounds `length` up to the next frame alignment boundary.
#[inline]
pub const fn align(length: usize) -> usize {
    (length + FRAME_ALIGNMENT - 1) & !(FRAME_ALIGNMENT - 1)
}

/// Acquire-read of a frame's length word.
///
/// `<= 0` means the frame is not visible: zero is untouched territory and a
/// negative value is a reservation in progress.
#[inline]
pub fn length_volatile(buffer: &AtomicBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32_volatile(frame_offset + LENGTH_OFFSET)
}

/// Release-write of a frame's length word. This is the commit.
#[inline]
pub fn put_length_ordered(buffer: &AtomicBuffer, frame_offset: usize, length: i32) {
    buffer.put_i32_ordered(frame_offset + LENGTH_OFFSET, length);
}

/// Reads the frame type.
#[inline]
pub fn frame_type(buffer: &AtomicBuffer, frame_offset: usize) -> i16 {
    buffer.get_i16(frame_offset + TYPE_OFFSET)
}

/// Writes the frame type.
#[inline]
pub fn put_frame_type(buffer: &AtomicBuffer, frame_offset: usize, frame_type: i16) {
    buffer.put_i16(frame_offset + TYPE_OFFSET, frame_type);
}

/// Returns `true` if the frame at `frame_offset` is a padding frame.
#[inline]
pub fn is_padding(buffer: &AtomicBuffer, frame_offset: usize) -> bool {
    frame_type(buffer, frame_offset) == HDR_TYPE_PAD
}

/// Reads the protocol version byte.
#[inline]
pub fn version(buffer: &AtomicBuffer, frame_offset: usize) -> u8 {
    buffer.get_u8(frame_offset + VERSION_OFFSET)
}

/// Reads the term offset stamped into the header.
#[inline]
pub fn term_offset(buffer: &AtomicBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32(frame_offset + TERM_OFFSET_FIELD_OFFSET)
}

/// Reads the session id stamped into the header.
#[inline]
pub fn session_id(buffer: &AtomicBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32(frame_offset + SESSION_ID_OFFSET)
}

/// Reads the stream id stamped into the header.
#[inline]
pub fn stream_id(buffer: &AtomicBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32(frame_offset + STREAM_ID_OFFSET)
}

/// Reads the term id stamped into the header.
#[inline]
pub fn term_id(buffer: &AtomicBuffer, frame_offset: usize) -> i32 {
    buffer.get_i32(frame_offset + TERM_ID_OFFSET)
}

/// Reads the reserved value.
#[inline]
pub fn reserved_value(buffer: &AtomicBuffer, frame_offset: usize) -> i64 {
    buffer.get_i64(frame_offset + RESERVED_VALUE_OFFSET)
}

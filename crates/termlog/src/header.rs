use crate::buffer::AtomicBuffer;
use crate::frame;
use crate::layout;

/// Stateless helper that stamps default header fields into reserved slots.
///
/// The template (version, flags, type, session, stream) is fixed per log
/// instance; `term_offset` and `term_id` vary per frame. The length word is
/// deliberately not written here: the reserving CAS already holds the
/// negative length, and the commit publishes the positive one.
#[derive(Debug, Clone, Copy)]
pub struct HeaderWriter {
    version: u8,
    flags: u8,
    frame_type: i16,
    session_id: i32,
    stream_id: i32,
}

impl HeaderWriter {
    /// Creates a writer for data frames of the given session and stream.
    pub fn new(session_id: i32, stream_id: i32) -> Self {
        Self {
            version: frame::CURRENT_VERSION,
            flags: frame::DEFAULT_FLAGS,
            frame_type: frame::HDR_TYPE_DATA,
            session_id,
            stream_id,
        }
    }

    /// Reconstructs a writer from the default header template in the log
    /// metadata block.
    pub fn from_metadata(log_metadata: &AtomicBuffer) -> Self {
        let hdr = layout::LOG_DEFAULT_FRAME_HEADER_OFFSET;
        Self {
            version: log_metadata.get_u8(hdr + frame::VERSION_OFFSET),
            flags: log_metadata.get_u8(hdr + frame::FLAGS_OFFSET),
            frame_type: log_metadata.get_i16(hdr + frame::TYPE_OFFSET),
            session_id: log_metadata.get_i32(hdr + frame::SESSION_ID_OFFSET),
            stream_id: log_metadata.get_i32(hdr + frame::STREAM_ID_OFFSET),
        }
    }

    /// Persists this writer's fields as the log's default header template.
    pub fn store_default_header(&self, log_metadata: &AtomicBuffer) {
        let hdr = layout::LOG_DEFAULT_FRAME_HEADER_OFFSET;
        log_metadata.put_u8(hdr + frame::VERSION_OFFSET, self.version);
        log_metadata.put_u8(hdr + frame::FLAGS_OFFSET, self.flags);
        log_metadata.put_i16(hdr + frame::TYPE_OFFSET, self.frame_type);
        log_metadata.put_i32(hdr + frame::SESSION_ID_OFFSET, self.session_id);
        log_metadata.put_i32_ordered(hdr + frame::STREAM_ID_OFFSET, self.stream_id);
    }

    /// Session id stamped into frames.
    #[inline]
    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    /// Stream id stamped into frames.
    #[inline]
    pub fn stream_id(&self) -> i32 {
        self.stream_id
    }

    /// Stamps every header field except the length word at `offset`.
    ///
    /// The slot must already be reserved: its length word holds `-length`.
    pub fn write(&self, term_buffer: &AtomicBuffer, offset: usize, length: usize, term_id: i32) {
        debug_assert_eq!(
            term_buffer.get_i32(offset + frame::LENGTH_OFFSET),
            -(length as i32),
            "header written into a slot that is not reserved"
        );

        term_buffer.put_u8(offset + frame::VERSION_OFFSET, self.version);
        term_buffer.put_u8(offset + frame::FLAGS_OFFSET, self.flags);
        term_buffer.put_i16(offset + frame::TYPE_OFFSET, self.frame_type);
        term_buffer.put_i32(offset + frame::TERM_OFFSET_FIELD_OFFSET, offset as i32);
        term_buffer.put_i32(offset + frame::SESSION_ID_OFFSET, self.session_id);
        term_buffer.put_i32(offset + frame::STREAM_ID_OFFSET, self.stream_id);
        term_buffer.put_i32(offset + frame::TERM_ID_OFFSET, term_id);
        term_buffer.put_i64(offset + frame::RESERVED_VALUE_OFFSET, 0);
    }
}

use std::fs::OpenOptions;
use std::path::Path;

use memmap2::MmapMut;

use crate::buffer::AtomicBuffer;
use crate::error::LogError;
use crate::frame;
use crate::invariants::debug_assert_partition_index;
use crate::layout;

/// The memory-mapped log file, carved into three term buffers, three term
/// metadata blocks, and one log metadata block.
///
/// `LogBuffers` owns the mapping and outlives every appender and reader view
/// into it; dropping it releases the mapping. Views handed out by
/// [`term_buffer`](Self::term_buffer) and friends are plain `(ptr, len)`
/// pairs and must not be used after the owning `LogBuffers` is dropped.
///
/// Two processes sharing a log file must agree on the term length; the file
/// size records it implicitly, and a mismatch fails the open.
pub struct LogBuffers {
    mmap: MmapMut,
    term_length: usize,
    term_meta_length: usize,
}

impl LogBuffers {
    /// Creates or opens a log file at `path` with the given term length.
    ///
    /// A new file is sized to `P * (T + M) + L`, mapped, and seeded with its
    /// initial metadata (initial term id 0, partition 0 active). An existing
    /// file is mapped as-is and its metadata is preserved.
    pub fn open(path: impl AsRef<Path>, term_length: usize) -> Result<Self, LogError> {
        Self::open_with_initial_term_id(path, term_length, 0)
    }

    /// Like [`open`](Self::open), but seeds a caller-chosen initial term id
    /// when the file is first created. Ignored on reopen.
    pub fn open_with_initial_term_id(
        path: impl AsRef<Path>,
        term_length: usize,
        initial_term_id: i32,
    ) -> Result<Self, LogError> {
        layout::check_term_length(term_length)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;

        let expected_len = layout::log_length(term_length) as u64;
        let existing_len = file.metadata()?.len();
        let fresh = existing_len == 0;

        if fresh {
            file.set_len(expected_len)?;
        } else if existing_len != expected_len {
            return Err(LogError::TermLengthMismatch {
                requested: term_length,
                expected: expected_len,
                actual: existing_len,
            });
        }

        // SAFETY: the mapping is private to cooperating log processes; all
        // concurrent access goes through the AtomicBuffer ordering protocol.
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let buffers = Self {
            mmap,
            term_length,
            term_meta_length: layout::term_meta_length(),
        };

        if fresh {
            buffers.bootstrap(initial_term_id);
        }

        Ok(buffers)
    }

    /// Seeds the metadata of a freshly created (all-zero) log.
    fn bootstrap(&self, initial_term_id: i32) {
        let log_meta = self.log_metadata();
        log_meta.put_i32(layout::LOG_INITIAL_TERM_ID_OFFSET, initial_term_id);

        // Default frame header template: length stays zero, ids are stamped
        // by whoever publishes to this log.
        let hdr = layout::LOG_DEFAULT_FRAME_HEADER_OFFSET;
        log_meta.put_u8(hdr + frame::VERSION_OFFSET, frame::CURRENT_VERSION);
        log_meta.put_u8(hdr + frame::FLAGS_OFFSET, frame::DEFAULT_FLAGS);
        log_meta.put_i16(hdr + frame::TYPE_OFFSET, frame::HDR_TYPE_DATA);

        let meta0 = self.term_metadata(0);
        meta0.put_i64(
            layout::TERM_TAIL_COUNTER_OFFSET,
            layout::pack_tail(initial_term_id, 0),
        );
        meta0.put_i32(layout::TERM_STATUS_OFFSET, layout::IN_USE);

        // Inactive partitions carry the term id they would have held one
        // cycle ago; rotation only reseeds a tail whose term id matches
        // that expectation, so a stale rotator can never reset a live one.
        for index in 1..layout::PARTITION_COUNT {
            let stale_term_id = initial_term_id + index as i32 - layout::PARTITION_COUNT as i32;
            self.term_metadata(index).put_i64(
                layout::TERM_TAIL_COUNTER_OFFSET,
                layout::pack_tail(stale_term_id, 0),
            );
        }

        // Partitions 1 and 2 are zero-filled by construction: status CLEAN.
        log_meta.put_i32_ordered(layout::LOG_ACTIVE_PARTITION_INDEX_OFFSET, 0);
    }

    /// Returns the configured term length in bytes.
    #[inline]
    pub fn term_length(&self) -> usize {
        self.term_length
    }

    /// Reads the initial term id recorded at creation.
    pub fn initial_term_id(&self) -> i32 {
        self.log_metadata().get_i32(layout::LOG_INITIAL_TERM_ID_OFFSET)
    }

    /// View over term buffer `index`.
    pub fn term_buffer(&self, index: usize) -> AtomicBuffer {
        debug_assert_partition_index!(index);
        let offset = index * self.term_length;
        // SAFETY: the slice lies inside the mapping, which lives as long as
        // self; term buffers start at multiples of the page-aligned mapping
        // base, so 8-byte alignment holds.
        unsafe { AtomicBuffer::new(self.mmap.as_ptr().cast_mut().add(offset), self.term_length) }
    }

    /// View over the metadata block of partition `index`.
    pub fn term_metadata(&self, index: usize) -> AtomicBuffer {
        debug_assert_partition_index!(index);
        let offset =
            layout::PARTITION_COUNT * self.term_length + index * self.term_meta_length;
        // SAFETY: as for term_buffer; metadata blocks are page-sized and
        // page-aligned within the mapping.
        unsafe {
            AtomicBuffer::new(
                self.mmap.as_ptr().cast_mut().add(offset),
                self.term_meta_length,
            )
        }
    }

    /// View over the log metadata block.
    pub fn log_metadata(&self) -> AtomicBuffer {
        let offset = layout::PARTITION_COUNT * (self.term_length + self.term_meta_length);
        // SAFETY: as for term_buffer; the log metadata block is the mapping's
        // page-aligned tail.
        unsafe {
            AtomicBuffer::new(
                self.mmap.as_ptr().cast_mut().add(offset),
                layout::log_meta_length(),
            )
        }
    }

    /// Reads the active partition index with acquire ordering.
    pub fn active_partition_index(&self) -> usize {
        self.log_metadata()
            .get_i32_volatile(layout::LOG_ACTIVE_PARTITION_INDEX_OFFSET) as usize
    }
}

impl std::fmt::Debug for LogBuffers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBuffers")
            .field("term_length", &self.term_length)
            .field("term_meta_length", &self.term_meta_length)
            .field("active_partition_index", &self.active_partition_index())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{
        LOG_ACTIVE_PARTITION_INDEX_OFFSET, TERM_STATUS_OFFSET, TERM_TAIL_COUNTER_OFFSET,
    };

    fn temp_log_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("test.log")
    }

    #[test]
    fn test_open_creates_and_seeds() {
        let dir = tempfile::tempdir().unwrap();
        let buffers =
            LogBuffers::open_with_initial_term_id(temp_log_path(&dir), 4096, 7).unwrap();

        assert_eq!(buffers.term_length(), 4096);
        assert_eq!(buffers.initial_term_id(), 7);
        assert_eq!(buffers.active_partition_index(), 0);

        let meta0 = buffers.term_metadata(0);
        let raw = meta0.get_i64_volatile(TERM_TAIL_COUNTER_OFFSET);
        assert_eq!(layout::term_id(raw), 7);
        assert_eq!(layout::tail_offset(raw), 0);
        assert_eq!(meta0.get_i32(TERM_STATUS_OFFSET), layout::IN_USE);

        // inactive partitions are pre-seeded with their previous-cycle ids
        for i in 1..layout::PARTITION_COUNT {
            let meta = buffers.term_metadata(i);
            let raw = meta.get_i64_volatile(TERM_TAIL_COUNTER_OFFSET);
            assert_eq!(layout::term_id(raw), 7 + i as i32 - 3);
            assert_eq!(layout::tail_offset(raw), 0);
            assert_eq!(meta.get_i32(TERM_STATUS_OFFSET), layout::CLEAN);
        }
    }

    #[test]
    fn test_reopen_preserves_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_log_path(&dir);

        {
            let buffers =
                LogBuffers::open_with_initial_term_id(&path, 4096, 42).unwrap();
            buffers
                .log_metadata()
                .put_i32_ordered(LOG_ACTIVE_PARTITION_INDEX_OFFSET, 2);
        }

        // Reopen with a different initial term id: the stored one wins.
        let buffers = LogBuffers::open_with_initial_term_id(&path, 4096, 0).unwrap();
        assert_eq!(buffers.initial_term_id(), 42);
        assert_eq!(buffers.active_partition_index(), 2);
    }

    #[test]
    fn test_term_length_must_match_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = temp_log_path(&dir);

        LogBuffers::open(&path, 4096).unwrap();
        let err = LogBuffers::open(&path, 8192).unwrap_err();
        assert!(matches!(err, LogError::TermLengthMismatch { .. }));
    }

    #[test]
    fn test_invalid_term_length_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = LogBuffers::open(temp_log_path(&dir), 5000).unwrap_err();
        assert!(matches!(err, LogError::InvalidTermLength { .. }));
    }

    #[test]
    fn test_views_are_disjoint() {
        let dir = tempfile::tempdir().unwrap();
        let buffers = LogBuffers::open(temp_log_path(&dir), 4096).unwrap();

        let t0 = buffers.term_buffer(0);
        let t1 = buffers.term_buffer(1);
        t0.put_bytes(0, b"zero");
        t1.put_bytes(0, b"one!");

        assert_eq!(t0.as_slice(0, 4), b"zero");
        assert_eq!(t1.as_slice(0, 4), b"one!");
        assert_eq!(t0.capacity(), 4096);
        assert_eq!(buffers.log_metadata().capacity(), layout::log_meta_length());
    }
}

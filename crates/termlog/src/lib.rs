//! termlog - Multi-Producer Single-Consumer Shared-Memory Append Log
//!
//! A memory-mapped file, partitioned into three rotating *terms*, serves as
//! a lock-free ring: publishers claim bounded byte ranges, fill them, and
//! commit them; a single reader scans committed frames in order.
//!
//! # Key Features
//!
//! - Wait-free happy path: allocation is a CAS on the claimed slot itself,
//!   not on the shared tail, so non-conflicting reservations never contend
//! - Self-healing: a producer that dies mid-reservation is unblocked by the
//!   next producer after a bounded spin budget
//! - Torn-read-free: commits release-publish the frame length, which readers
//!   acquire-load before touching any payload byte
//! - Term rotation with background zero-fill, so a partition is always clean
//!   before the active cursor wraps back onto it
//!
//! # Example
//!
//! ```no_run
//! use termlog::{HeaderWriter, LogBuffers, Metrics, TermAppender, ClaimResult, reader};
//! use std::sync::Arc;
//!
//! let buffers = LogBuffers::open("/dev/shm/example.log", 64 * 1024).unwrap();
//! let header = HeaderWriter::new(1, 1);
//! let appender = TermAppender::new(
//!     buffers.term_buffer(0),
//!     buffers.term_metadata(0),
//!     100,
//!     Arc::new(Metrics::new()),
//!     false,
//! );
//!
//! // Publish one message
//! if let ClaimResult::Claimed { mut claim, .. } = appender.claim(&header, 5) {
//!     claim.as_mut_slice().copy_from_slice(b"hello");
//!     claim.commit();
//! }
//!
//! // Consume it
//! let term = buffers.term_buffer(0);
//! reader::read(&term, 0, 10, |payload| {
//!     assert_eq!(payload, b"hello");
//! });
//! ```
//!
//! Higher-level plumbing - the poller thread, rotation-on-trip, the cleaner
//! worker, and callbacks - lives in the `appendlog` crate.

#[cfg(target_endian = "big")]
compile_error!("the log file format is little-endian; big-endian hosts are not supported");

mod backoff;
mod buffer;
mod claim;
mod error;
mod header;
mod invariants;
mod log_buffers;
mod metrics;

pub mod appender;
pub mod frame;
pub mod layout;
pub mod reader;
pub mod rotation;
pub mod scanner;

pub use appender::{ClaimResult, TermAppender};
pub use backoff::Backoff;
pub use buffer::AtomicBuffer;
pub use claim::BufferClaim;
pub use error::LogError;
pub use header::HeaderWriter;
pub use log_buffers::LogBuffers;
pub use metrics::{Metrics, MetricsSnapshot};
pub use scanner::Gap;

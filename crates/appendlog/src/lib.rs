//! Append-log facade over the `termlog` substrate.
//!
//! Binds one mapped log, three term appenders, a poller thread, and a
//! background term cleaner into a `claim / commit / on_append` API:
//!
//! - **Producers** (any number of threads) call [`AppendLog::claim`], write
//!   into the returned [`BufferClaim`], and commit. End-of-term trips rotate
//!   the log transparently.
//! - **Consumer** (exactly one) registers [`AppendLog::on_append`] and
//!   starts [`AppendLog::start_polling`]; the poller delivers every
//!   committed payload in order and advances the subscriber position.
//! - **Cleaner** zero-fills retired terms in the background; its failure
//!   halts the process, since a dirty term reused as active would tear
//!   reads.
//!
//! Flow-control status frames have a reserved type in the frame protocol but
//! nothing emits them; the log is purely an in-host transport.
//!
//! # Example
//!
//! ```no_run
//! use appendlog::{AppendLog, Config};
//!
//! let mut log = AppendLog::with_config(
//!     "/dev/shm/events.log",
//!     Config::default().with_buffer_size(64 * 1024 * 1024),
//! ).unwrap();
//!
//! log.on_append(|payload| println!("got {} bytes", payload.len())).unwrap();
//! log.on_error(|err| eprintln!("handler failed: {err}")).unwrap();
//! log.start_polling().unwrap();
//!
//! let mut claim = log.claim(5).unwrap();
//! claim.as_mut_slice().copy_from_slice(b"hello");
//! claim.commit();
//! ```

mod append_log;
mod cleaner;
mod config;
mod error;
mod invariants;
mod poller;

pub use append_log::{AppendHandler, AppendLog, ErrorHandler};
pub use config::Config;
pub use error::{AppendError, PollerError};

// Re-export the substrate types that appear in this crate's API.
pub use termlog::{BufferClaim, LogError, MetricsSnapshot};

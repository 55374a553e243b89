use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

use crossbeam_utils::CachePadded;
use termlog::{
    frame, layout, rotation, BufferClaim, ClaimResult, HeaderWriter, LogBuffers, LogError,
    Metrics, MetricsSnapshot, TermAppender,
};

use crate::cleaner;
use crate::config::Config;
use crate::error::{AppendError, PollerError};
use crate::poller;

/// Callback invoked by the poller for every visible data frame. The payload
/// view is only valid for the duration of the call.
pub type AppendHandler = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Callback invoked when the append handler fails; the poll loop continues.
pub type ErrorHandler = Box<dyn FnMut(&PollerError) + Send + 'static>;

/// State shared between the facade, the poller thread, and the cleaner.
pub(crate) struct Shared {
    pub(crate) buffers: LogBuffers,
    pub(crate) appenders: Vec<TermAppender>,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) subscriber_position: CachePadded<AtomicI64>,
    pub(crate) running: AtomicBool,
    pub(crate) poll_fragment_limit: usize,
    pub(crate) position_bits: u32,
    pub(crate) initial_term_id: i32,
    pub(crate) enable_metrics: bool,
}

/// Multi-producer, single-consumer append log over a shared memory mapping.
///
/// Producers call [`claim`](Self::claim), fill the returned
/// [`BufferClaim`], and commit it. One poller thread, started with
/// [`start_polling`](Self::start_polling), scans committed frames in order
/// and hands each payload to the registered append handler. A background
/// worker zero-fills retired terms so a partition is always clean before the
/// active cursor wraps back onto it.
///
/// Dropping the log stops the poller and the cleaner and releases the
/// mapping.
pub struct AppendLog {
    shared: Arc<Shared>,
    header: HeaderWriter,
    session_id: i64,
    // handler slots are only written through &mut self before polling
    // starts; the mutexes exist so producers can share &self across threads
    on_append: Mutex<Option<AppendHandler>>,
    on_error: Mutex<Option<ErrorHandler>>,
    poller: Option<JoinHandle<()>>,
    cleaner: Option<JoinHandle<()>>,
    clean_tx: Option<mpsc::Sender<()>>,
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AppendLog {
    /// Creates or opens an append log sized from a total buffer budget.
    pub fn new(path: impl AsRef<Path>, buffer_size_bytes: usize) -> Result<Self, AppendError> {
        Self::with_config(path, Config::default().with_buffer_size(buffer_size_bytes))
    }

    /// Creates or opens an append log with explicit configuration.
    pub fn with_config(path: impl AsRef<Path>, config: Config) -> Result<Self, AppendError> {
        let buffers = LogBuffers::open_with_initial_term_id(
            path,
            config.term_length,
            config.initial_term_id,
        )?;

        let session_id = generate_session_id();
        let log_metadata = buffers.log_metadata();
        let template_session = log_metadata.get_i32(
            layout::LOG_DEFAULT_FRAME_HEADER_OFFSET + frame::SESSION_ID_OFFSET,
        );
        let header = if template_session == 0 {
            // first publisher stamps the log's identity
            let header = HeaderWriter::new(fold_session_id(session_id), config.stream_id);
            header.store_default_header(&log_metadata);
            header
        } else {
            HeaderWriter::from_metadata(&log_metadata)
        };

        let metrics = Arc::new(Metrics::new());
        let appenders = (0..layout::PARTITION_COUNT)
            .map(|i| {
                TermAppender::new(
                    buffers.term_buffer(i),
                    buffers.term_metadata(i),
                    config.spin_limit_before_unblock,
                    Arc::clone(&metrics),
                    config.enable_metrics,
                )
            })
            .collect();

        let position_bits = layout::position_bits_to_shift(config.term_length);
        let initial_term_id = buffers.initial_term_id();

        let shared = Arc::new(Shared {
            buffers,
            appenders,
            metrics,
            subscriber_position: CachePadded::new(AtomicI64::new(0)),
            running: AtomicBool::new(false),
            poll_fragment_limit: config.poll_fragment_limit,
            position_bits,
            initial_term_id,
            enable_metrics: config.enable_metrics,
        });

        let (clean_tx, clean_rx) = mpsc::channel();
        let cleaner_shared = Arc::clone(&shared);
        let cleaner = std::thread::Builder::new()
            .name("appendlog-cleaner".to_string())
            .spawn(move || cleaner::run(&cleaner_shared, &clean_rx))
            .map_err(LogError::Io)?;

        Ok(Self {
            shared,
            header,
            session_id,
            on_append: Mutex::new(None),
            on_error: Mutex::new(None),
            poller: None,
            cleaner: Some(cleaner),
            clean_tx: Some(clean_tx),
        })
    }

    /// Reserves `length` payload bytes in the active term.
    ///
    /// On a trip this rotates the log, wakes the cleaner, and retries in the
    /// fresh term, so a successful claim is the only outcome callers see.
    /// Fill the claim and [`commit`](BufferClaim::commit) it; an aborted or
    /// dropped claim becomes padding the reader steps over.
    pub fn claim(&self, length: u32) -> Result<BufferClaim<'_>, AppendError> {
        let length = length as usize;
        let term_length = self.shared.buffers.term_length();
        if frame::align(length + frame::HEADER_LENGTH) > term_length {
            return Err(AppendError::Log(LogError::InvalidFrameLength {
                length,
                max: term_length - frame::HEADER_LENGTH,
            }));
        }

        loop {
            let active = self.shared.buffers.active_partition_index();
            match self.shared.appenders[active].claim(&self.header, length) {
                ClaimResult::Claimed { claim, .. } => return Ok(claim),
                ClaimResult::Tripped { term_id } => {
                    if rotation::rotate_log(&self.shared.buffers, active, term_id) {
                        log::debug!(
                            "rotated log: term {term_id} tripped in partition {active}"
                        );
                        if self.shared.enable_metrics {
                            self.shared.metrics.add_rotations(1);
                        }
                    }
                    if let Some(tx) = &self.clean_tx {
                        let _ = tx.send(());
                    }
                }
                ClaimResult::Failed => {
                    return Err(AppendError::Log(LogError::InvalidFrameLength {
                        length,
                        max: term_length - frame::HEADER_LENGTH,
                    }));
                }
            }
        }
    }

    /// Registers the handler invoked for each appended payload.
    ///
    /// Must be called before [`start_polling`](Self::start_polling).
    pub fn on_append(
        &mut self,
        handler: impl FnMut(&[u8]) + Send + 'static,
    ) -> Result<(), AppendError> {
        if self.poller.is_some() {
            return Err(AppendError::PollerActive);
        }
        *lock_ignore_poison(&self.on_append) = Some(Box::new(handler));
        Ok(())
    }

    /// Registers the handler invoked when the append handler fails.
    ///
    /// Must be called before [`start_polling`](Self::start_polling).
    pub fn on_error(
        &mut self,
        handler: impl FnMut(&PollerError) + Send + 'static,
    ) -> Result<(), AppendError> {
        if self.poller.is_some() {
            return Err(AppendError::PollerActive);
        }
        *lock_ignore_poison(&self.on_error) = Some(Box::new(handler));
        Ok(())
    }

    /// Spawns the long-running poller thread.
    ///
    /// The poller scans the term at the subscriber position, delivers each
    /// visible data frame to the append handler, and backs off with a
    /// spin-then-sleep cadence when idle. Handler failures are caught,
    /// surfaced through the error handler, and never escape the loop.
    pub fn start_polling(&mut self) -> Result<(), AppendError> {
        if self.poller.is_some() {
            return Err(AppendError::PollerActive);
        }

        let on_append = lock_ignore_poison(&self.on_append)
            .take()
            .unwrap_or_else(|| Box::new(|_| {}));
        let on_error = lock_ignore_poison(&self.on_error).take();

        self.shared.running.store(true, Ordering::Release);
        let shared = Arc::clone(&self.shared);
        let handle = std::thread::Builder::new()
            .name("appendlog-poller".to_string())
            .spawn(move || poller::run(&shared, on_append, on_error))
            .map_err(LogError::Io)?;
        self.poller = Some(handle);
        Ok(())
    }

    /// Stops the poller and the cleaner. Idempotent.
    ///
    /// The poll loop exits at its next length-read boundary; the cleaner
    /// exits once its wake channel drains.
    pub fn stop(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.poller.take() {
            let _ = handle.join();
        }
        // dropping the sender wakes the cleaner for its final drain
        self.clean_tx = None;
        if let Some(handle) = self.cleaner.take() {
            let _ = handle.join();
        }
    }

    /// Producer-side position: the high-water coordinate of the active term.
    pub fn position(&self) -> i64 {
        let term_length = self.shared.buffers.term_length();
        let active = self.shared.buffers.active_partition_index();
        let raw = self.shared.appenders[active].raw_tail();
        layout::compute_position(
            layout::term_id(raw),
            layout::tail_offset_in_term(raw, term_length),
            self.shared.position_bits,
            self.shared.initial_term_id,
        )
    }

    /// Consumer-side position: everything below it has been delivered.
    pub fn subscriber_position(&self) -> i64 {
        self.shared.subscriber_position.load(Ordering::Acquire)
    }

    /// Per-instance session id: `(pid << 32) | start_epoch_seconds`.
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Stream id stamped into frame headers.
    pub fn stream_id(&self) -> i32 {
        self.header.stream_id()
    }

    /// Snapshot of activity counters (zeros unless metrics are enabled).
    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

impl Drop for AppendLog {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for AppendLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendLog")
            .field("session_id", &self.session_id)
            .field("position", &self.position())
            .field("subscriber_position", &self.subscriber_position())
            .field("polling", &self.poller.is_some())
            .finish()
    }
}

/// Packs the process id and start time into a per-instance session id.
fn generate_session_id() -> i64 {
    let pid = i64::from(std::process::id());
    let start_seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default();
    (pid << 32) | (start_seconds & 0xFFFF_FFFF)
}

/// Folds a 64-bit session id into the 32-bit frame header field.
///
/// Xor of both halves keeps the pid and start-time contributions: a plain
/// truncating cast would drop the pid entirely, and two instances started
/// within the same second would stamp identical frames.
fn fold_session_id(session_id: i64) -> i32 {
    ((session_id >> 32) as i32) ^ (session_id as i32)
}

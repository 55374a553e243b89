//! The long-running poll loop.
//!
//! One iteration is `Idle -> Polling -> Idle`: derive the subscriber's term
//! and offset from its position, scan up to the fragment limit, republish the
//! position, and back off when nothing was visible. The loop only exits when
//! the running flag drops; a failing handler is caught and surfaced, never
//! propagated.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use termlog::{layout, reader, Backoff};

use crate::append_log::{AppendHandler, ErrorHandler, Shared};
use crate::error::PollerError;
use crate::invariants::{debug_assert_advance_aligned, debug_assert_position_monotonic};

/// Sleep taken once spinning and yielding are exhausted on an idle log.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

pub(crate) fn run(shared: &Shared, mut on_append: AppendHandler, mut on_error: Option<ErrorHandler>) {
    let term_length = shared.buffers.term_length();
    let mut backoff = Backoff::new();

    while shared.running.load(Ordering::Acquire) {
        let position = shared.subscriber_position.load(Ordering::Relaxed);
        let index = layout::index_by_position(position, shared.position_bits);
        let offset = layout::term_offset_by_position(position, term_length);
        let term = shared.buffers.term_buffer(index);

        let outcome = reader::read(&term, offset, shared.poll_fragment_limit, |payload| {
            deliver(&mut on_append, &mut on_error, payload);
        });

        let advanced = outcome.offset - offset;
        if advanced > 0 {
            let new_position = position + advanced as i64;
            debug_assert_advance_aligned!(advanced);
            debug_assert_position_monotonic!("subscriber", position, new_position);
            shared
                .subscriber_position
                .store(new_position, Ordering::Release);
            if shared.enable_metrics {
                shared.metrics.add_frames_polled(outcome.fragments as u64);
            }
            backoff.reset();
        } else if backoff.is_completed() {
            thread::sleep(IDLE_SLEEP);
            backoff.reset();
        } else {
            backoff.snooze();
        }
    }
}

/// Invokes the append handler, containing any panic it raises.
///
/// The frame is still consumed: the subscriber position advances past it, so
/// a poisoned message cannot wedge the stream.
fn deliver(on_append: &mut AppendHandler, on_error: &mut Option<ErrorHandler>, payload: &[u8]) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| on_append(payload)));
    if let Err(panic_payload) = outcome {
        let error = PollerError::from_panic(panic_payload.as_ref());
        log::error!("append handler failed: {error}");

        if let Some(handler) = on_error.as_mut() {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&error))).is_err() {
                log::error!("error handler panicked; error dropped");
            }
        }
    }
}

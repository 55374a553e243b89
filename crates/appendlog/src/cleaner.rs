//! Background term cleaning.
//!
//! Rotation marks the partition two ahead of the trip as needing cleaning
//! and wakes this worker; zero-filling must finish before the active cursor
//! wraps back, which leaves the cleaner two full term lifetimes of margin.
//!
//! A cleaner failure is unrecoverable: a partition that is reused dirty
//! produces torn reads, so the process halts rather than limp on.

use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::sync::mpsc::Receiver;

use termlog::rotation;

use crate::append_log::Shared;

pub(crate) fn run(shared: &Shared, wake_rx: &Receiver<()>) {
    while wake_rx.recv().is_ok() {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            rotation::clean_dirty_partitions(&shared.buffers)
        }));

        match outcome {
            Ok(cleaned) if cleaned > 0 => {
                log::debug!("cleaned {cleaned} retired partition(s)");
                if shared.enable_metrics {
                    shared.metrics.add_partitions_cleaned(cleaned as u64);
                }
            }
            Ok(_) => {}
            Err(_) => {
                log::error!("term cleaner failed; halting: a dirty term reused as active would tear reads");
                process::abort();
            }
        }
    }
}

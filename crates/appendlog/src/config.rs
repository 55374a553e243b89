//! Configuration for the append-log facade.

use termlog::layout;

/// Configuration for an [`AppendLog`](crate::AppendLog).
#[derive(Debug, Clone)]
pub struct Config {
    /// Term length in bytes: a power of two, validated at open.
    ///
    /// Default: 16 MiB.
    pub term_length: usize,

    /// Term id the log starts counting from when the file is first created.
    pub initial_term_id: i32,

    /// Stream id stamped into every frame header.
    pub stream_id: i32,

    /// Claim retries with a frozen tail before a stalled reservation is
    /// reclaimed.
    ///
    /// Default: 100.
    pub spin_limit_before_unblock: u32,

    /// Data frames delivered per poll iteration before the subscriber
    /// position is republished.
    ///
    /// Default: 10.
    pub poll_fragment_limit: usize,

    /// Enable activity counters (slight overhead on the claim path).
    pub enable_metrics: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            term_length: 16 * 1024 * 1024,
            initial_term_id: 0,
            stream_id: 1,
            spin_limit_before_unblock: 100,
            poll_fragment_limit: 10,
            enable_metrics: false,
        }
    }
}

impl Config {
    /// Sets the term length directly.
    pub fn with_term_length(mut self, term_length: usize) -> Self {
        self.term_length = term_length;
        self
    }

    /// Sizes the log from a total buffer budget in bytes.
    ///
    /// The budget is rounded up to the next power of two and split across
    /// the three partitions; the per-partition share is rounded down to a
    /// power of two and clamped to the valid term range.
    pub fn with_buffer_size(mut self, buffer_size_bytes: usize) -> Self {
        self.term_length = term_length_for_buffer_size(buffer_size_bytes);
        self
    }

    /// Sets the initial term id used when the file is first created.
    pub fn with_initial_term_id(mut self, initial_term_id: i32) -> Self {
        self.initial_term_id = initial_term_id;
        self
    }

    /// Sets the stream id stamped into frame headers.
    pub fn with_stream_id(mut self, stream_id: i32) -> Self {
        self.stream_id = stream_id;
        self
    }

    /// Sets the stall-unblock spin budget.
    pub fn with_spin_limit_before_unblock(mut self, limit: u32) -> Self {
        self.spin_limit_before_unblock = limit;
        self
    }

    /// Sets the per-iteration poll fragment limit.
    pub fn with_poll_fragment_limit(mut self, limit: usize) -> Self {
        self.poll_fragment_limit = limit;
        self
    }

    /// Enables activity counters.
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Small terms and tight polling for latency-sensitive flows.
    pub fn low_latency() -> Self {
        Self::default()
            .with_term_length(1024 * 1024)
            .with_poll_fragment_limit(4)
    }

    /// Large terms and big poll batches for bulk throughput.
    pub fn high_throughput() -> Self {
        Self::default()
            .with_term_length(64 * 1024 * 1024)
            .with_poll_fragment_limit(256)
    }
}

/// Derives a term length from a total buffer budget.
fn term_length_for_buffer_size(buffer_size_bytes: usize) -> usize {
    let total = buffer_size_bytes
        .max(layout::TERM_MIN_LENGTH * layout::PARTITION_COUNT)
        .next_power_of_two();
    let per_term = total / layout::PARTITION_COUNT;

    // round down to a power of two, then shrink until the full layout fits
    let mut term_length = if per_term.is_power_of_two() {
        per_term
    } else {
        usize::pow(2, per_term.ilog2())
    };
    term_length = term_length.max(layout::TERM_MIN_LENGTH);
    while term_length > layout::TERM_MIN_LENGTH && layout::check_term_length(term_length).is_err() {
        term_length >>= 1;
    }
    term_length
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.term_length, 16 * 1024 * 1024);
        assert_eq!(config.spin_limit_before_unblock, 100);
        assert_eq!(config.poll_fragment_limit, 10);
        assert!(!config.enable_metrics);
    }

    #[test]
    fn test_buffer_size_rounds_to_valid_term() {
        // 64 MiB budget: next pow2 is 64 MiB, a third is ~21 MiB, rounded
        // down to 16 MiB
        let config = Config::default().with_buffer_size(64 * 1024 * 1024);
        assert_eq!(config.term_length, 16 * 1024 * 1024);
        assert!(layout::check_term_length(config.term_length).is_ok());

        // tiny budgets are floored at the minimum term length
        let config = Config::default().with_buffer_size(1);
        assert_eq!(config.term_length, layout::TERM_MIN_LENGTH);

        // a 48 KiB budget rounds up to 64 KiB, a third is ~21 KiB -> 16 KiB
        let config = Config::default().with_buffer_size(48 * 1024);
        assert_eq!(config.term_length, 16 * 1024);
    }

    #[test]
    fn test_presets() {
        assert_eq!(Config::low_latency().term_length, 1024 * 1024);
        assert_eq!(Config::high_throughput().poll_fragment_limit, 256);
    }
}

//! Processor feature flags

use bitflags::bitflags;

bitflags! {
    /// Optional capabilities a processor type declares
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ProcFeatures: u32 {
        /// Frames can be received from the output queue
        const READABLE = 0b0000_0001;
        /// Frames can be sent to the input queue
        const WRITABLE = 0b0000_0010;
        /// Track input/output bitrate
        const IO_STATS = 0b0000_0100;
        /// Record input timestamps for latency matching
        const INPUT_TS_STATS = 0b0000_1000;
        /// Track processing latency
        const LATENCY_STATS = 0b0001_0000;
    }
}

impl ProcFeatures {
    /// Flags that require the statistics thread
    pub const STATS_MASK: ProcFeatures = ProcFeatures::IO_STATS
        .union(ProcFeatures::INPUT_TS_STATS)
        .union(ProcFeatures::LATENCY_STATS);

    /// Whether a statistics thread must run for these features
    pub fn needs_stats_thread(&self) -> bool {
        self.intersects(Self::STATS_MASK)
    }

    /// Whether input timestamps are recorded in the latency ring
    pub fn records_input_timestamps(&self) -> bool {
        self.contains(ProcFeatures::INPUT_TS_STATS | ProcFeatures::LATENCY_STATS)
    }
}

impl Default for ProcFeatures {
    fn default() -> Self {
        ProcFeatures::READABLE | ProcFeatures::WRITABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_thread_gate() {
        assert!(!ProcFeatures::default().needs_stats_thread());
        assert!(ProcFeatures::IO_STATS.needs_stats_thread());
        assert!((ProcFeatures::WRITABLE | ProcFeatures::LATENCY_STATS).needs_stats_thread());
    }

    #[test]
    fn test_input_timestamps_need_both_flags() {
        assert!(!ProcFeatures::INPUT_TS_STATS.records_input_timestamps());
        assert!(!ProcFeatures::LATENCY_STATS.records_input_timestamps());
        assert!((ProcFeatures::INPUT_TS_STATS | ProcFeatures::LATENCY_STATS)
            .records_input_timestamps());
    }
}

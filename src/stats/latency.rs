//! Input timestamp ring used for latency matching
//!
//! Each frame entering an instance stores `(pts, now)` in a fixed ring.
//! When a frame leaves, its pts is searched for by value starting at the
//! write position. Matched entries are not consumed, so two in-flight frames
//! sharing a pts are attributed to whichever entry the scan meets first.

use std::time::Instant;

/// Number of entries in the ring
pub const LATENCY_RING_LEN: usize = 128;

#[derive(Debug, Clone, Copy)]
struct TsEntry {
    pts: i64,
    at: Instant,
}

/// Fixed-size ring of recent input timestamps
#[derive(Debug)]
pub struct TimestampRing {
    entries: [Option<TsEntry>; LATENCY_RING_LEN],
    index: usize,
}

impl TimestampRing {
    /// Empty ring
    pub fn new() -> Self {
        Self {
            entries: [None; LATENCY_RING_LEN],
            index: 0,
        }
    }

    /// Record that a frame with `pts` entered at `at`
    pub fn record(&mut self, pts: i64, at: Instant) {
        self.entries[self.index] = Some(TsEntry { pts, at });
        self.index = (self.index + 1) % LATENCY_RING_LEN;
    }

    /// Entry time of the first frame recorded with `pts`, scanning from the
    /// write position
    pub fn find(&self, pts: i64) -> Option<Instant> {
        (0..LATENCY_RING_LEN)
            .map(|i| (self.index + i) % LATENCY_RING_LEN)
            .filter_map(|i| self.entries[i])
            .find(|entry| entry.pts == pts)
            .map(|entry| entry.at)
    }
}

impl Default for TimestampRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_find_recorded() {
        let mut ring = TimestampRing::new();
        let t0 = Instant::now();
        ring.record(100, t0);
        ring.record(200, t0 + Duration::from_millis(5));
        assert_eq!(ring.find(100), Some(t0));
        assert_eq!(ring.find(200), Some(t0 + Duration::from_millis(5)));
        assert_eq!(ring.find(300), None);
    }

    #[test]
    fn test_match_is_not_consumed() {
        let mut ring = TimestampRing::new();
        let t0 = Instant::now();
        ring.record(7, t0);
        assert_eq!(ring.find(7), Some(t0));
        assert_eq!(ring.find(7), Some(t0));
    }

    #[test]
    fn test_oldest_duplicate_wins() {
        let mut ring = TimestampRing::new();
        let t0 = Instant::now();
        let t1 = t0 + Duration::from_millis(1);
        ring.record(5, t0);
        ring.record(5, t1);
        // Scan starts at the write position, i.e. the oldest entry
        assert_eq!(ring.find(5), Some(t0));
    }

    #[test]
    fn test_wraparound_overwrites() {
        let mut ring = TimestampRing::new();
        let t0 = Instant::now();
        for pts in 0..(LATENCY_RING_LEN as i64 + 1) {
            ring.record(pts, t0);
        }
        assert_eq!(ring.find(0), None);
        assert!(ring.find(LATENCY_RING_LEN as i64).is_some());
    }
}

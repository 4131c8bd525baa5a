//! Bitrate and latency accounting for processor instances
//!
//! Producers and consumers feed the counters on every frame; the statistics
//! thread folds them into per-interval figures with [`IoStats::tick`]. Each
//! counter has its own mutex so bookkeeping never serializes with the queue
//! locks or the instance API lock.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::media::Frame;
use crate::processor::ProcFeatures;

use super::latency::TimestampRing;

/// Point-in-time statistics of one instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcStats {
    /// Input bitrate over the last interval (bits/sec)
    pub bitrate_in: u64,
    /// Output bitrate over the last interval (bits/sec)
    pub bitrate_out: u64,
    /// Lowest per-interval average latency seen (usec)
    pub latency_min_usec: i64,
    /// Average latency over the last interval with samples (usec)
    pub latency_avg_usec: i64,
    /// Highest per-interval average latency seen (usec)
    pub latency_max_usec: i64,
}

#[derive(Debug, Default)]
struct BitCounter {
    acc_bits: u64,
    bitrate: u64,
}

impl BitCounter {
    fn tick(&mut self, interval: Duration) {
        let nanos = interval.as_nanos().max(1);
        self.bitrate = (u128::from(self.acc_bits) * 1_000_000_000 / nanos) as u64;
        self.acc_bits = 0;
    }
}

#[derive(Debug, Default)]
struct LatencyAcc {
    sum_ns: u64,
    count: u64,
    avg_usec: i64,
    min_usec: Option<i64>,
    max_usec: i64,
}

impl LatencyAcc {
    fn tick(&mut self) {
        if self.count == 0 {
            return;
        }
        let avg = (self.sum_ns / self.count / 1000) as i64;
        self.sum_ns = 0;
        self.count = 0;
        self.avg_usec = avg;
        self.min_usec = Some(self.min_usec.map_or(avg, |min| min.min(avg)));
        self.max_usec = self.max_usec.max(avg);
    }
}

/// I/O statistics of one processor instance
#[derive(Debug)]
pub struct IoStats {
    features: ProcFeatures,
    input: Mutex<BitCounter>,
    output: Mutex<BitCounter>,
    ring: Mutex<TimestampRing>,
    latency: Mutex<LatencyAcc>,
}

impl IoStats {
    /// Create counters gated by `features`
    pub fn new(features: ProcFeatures) -> Self {
        Self {
            features,
            input: Mutex::new(BitCounter::default()),
            output: Mutex::new(BitCounter::default()),
            ring: Mutex::new(TimestampRing::new()),
            latency: Mutex::new(LatencyAcc::default()),
        }
    }

    /// Account a frame entering the instance
    pub fn record_input(&self, frame: &Frame) {
        if self.features.records_input_timestamps() {
            self.ring.lock().record(frame.pts, Instant::now());
        }
        if self.features.contains(ProcFeatures::IO_STATS) {
            self.input.lock().acc_bits += frame.bit_count();
        }
    }

    /// Account a frame leaving the instance
    pub fn record_output(&self, frame: &Frame) {
        if self.features.contains(ProcFeatures::IO_STATS) {
            self.output.lock().acc_bits += frame.bit_count();
        }
    }

    /// Attribute latency to an output carrying timestamp `pts`
    ///
    /// Returns the measured latency when a matching input was found.
    pub fn register_output_latency(&self, pts: i64) -> Option<Duration> {
        if !self.features.contains(ProcFeatures::LATENCY_STATS) {
            return None;
        }
        let recorded_at = self.ring.lock().find(pts)?;
        let elapsed = recorded_at.elapsed();

        let mut latency = self.latency.lock();
        latency.sum_ns += elapsed.as_nanos() as u64;
        latency.count += 1;
        Some(elapsed)
    }

    /// Fold the counters accumulated over `interval`
    pub fn tick(&self, interval: Duration) {
        self.input.lock().tick(interval);
        self.output.lock().tick(interval);
        if self.features.contains(ProcFeatures::LATENCY_STATS) {
            self.latency.lock().tick();
        }
    }

    /// Average latency over the last interval (usec)
    pub fn latency_avg_usec(&self) -> i64 {
        self.latency.lock().avg_usec
    }

    /// Snapshot of all figures
    pub fn snapshot(&self) -> ProcStats {
        let latency = self.latency.lock();
        ProcStats {
            bitrate_in: self.input.lock().bitrate,
            bitrate_out: self.output.lock().bitrate,
            latency_min_usec: latency.min_usec.unwrap_or(0),
            latency_avg_usec: latency.avg_usec,
            latency_max_usec: latency.max_usec,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::media::SampleFormat;

    fn all_features() -> ProcFeatures {
        ProcFeatures::READABLE
            | ProcFeatures::WRITABLE
            | ProcFeatures::IO_STATS
            | ProcFeatures::INPUT_TS_STATS
            | ProcFeatures::LATENCY_STATS
    }

    fn frame(pts: i64, len: usize) -> Frame {
        let mut frame = Frame::from_bytes(SampleFormat::Bytes, &vec![0u8; len]).unwrap();
        frame.pts = pts;
        frame
    }

    #[test]
    fn test_bitrate_tick() {
        let stats = IoStats::new(all_features());
        stats.record_input(&frame(0, 1000));
        stats.record_input(&frame(1, 1000));
        stats.record_output(&frame(0, 500));

        stats.tick(Duration::from_secs(1));
        let snap = stats.snapshot();
        assert_eq!(snap.bitrate_in, 16_000);
        assert_eq!(snap.bitrate_out, 4_000);

        // Counters reset each tick
        stats.tick(Duration::from_secs(1));
        assert_eq!(stats.snapshot().bitrate_in, 0);
    }

    #[test]
    fn test_bitrate_scaled_to_interval() {
        let stats = IoStats::new(all_features());
        stats.record_input(&frame(0, 100));
        stats.tick(Duration::from_millis(100));
        assert_eq!(stats.snapshot().bitrate_in, 8_000);
    }

    #[test]
    fn test_no_io_stats_without_feature() {
        let stats = IoStats::new(ProcFeatures::default());
        stats.record_input(&frame(0, 1000));
        stats.tick(Duration::from_secs(1));
        assert_eq!(stats.snapshot().bitrate_in, 0);
        assert!(stats.register_output_latency(0).is_none());
    }

    #[test]
    fn test_latency_average() {
        let stats = IoStats::new(all_features());
        stats.record_input(&frame(10, 1));
        thread::sleep(Duration::from_millis(20));
        let measured = stats.register_output_latency(10).unwrap();
        assert!(measured >= Duration::from_millis(20));

        stats.tick(Duration::from_secs(1));
        let snap = stats.snapshot();
        assert!(snap.latency_avg_usec >= 20_000);
        assert_eq!(snap.latency_min_usec, snap.latency_avg_usec);
        assert_eq!(snap.latency_max_usec, snap.latency_avg_usec);
    }

    #[test]
    fn test_latency_unknown_timestamp() {
        let stats = IoStats::new(all_features());
        stats.record_input(&frame(1, 1));
        assert!(stats.register_output_latency(2).is_none());
    }

    #[test]
    fn test_latency_kept_without_samples() {
        let stats = IoStats::new(all_features());
        stats.record_input(&frame(5, 1));
        stats.register_output_latency(5).unwrap();
        stats.tick(Duration::from_secs(1));
        let avg = stats.latency_avg_usec();

        stats.tick(Duration::from_secs(1));
        assert_eq!(stats.latency_avg_usec(), avg);
    }
}

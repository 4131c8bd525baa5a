//! Statistics for processor instances

pub mod latency;
pub mod metrics;

pub use latency::{TimestampRing, LATENCY_RING_LEN};
pub use metrics::{IoStats, ProcStats};

//! Bounded queues connecting producers, processing threads and consumers

pub mod fifo;

pub use fifo::{DupFn, Fifo};

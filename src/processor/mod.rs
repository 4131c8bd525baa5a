//! Processor types and the instance engine
//!
//! - [`ProcIf`]: descriptor of a processor type (name, category, features, factory)
//! - [`Processor`]: per-instance callbacks implemented by each type
//! - [`ProcInstance`]: a running instance with its queues and threads

pub mod engine;
pub mod features;
pub mod opt;
pub mod proc_if;

pub use engine::{ProcContext, ProcInstance, LATENCY_AVG_KEY, SETTINGS_KEY};
pub use features::ProcFeatures;
pub use opt::{PrivateOpt, ProcOpt};
pub use proc_if::{OpenParams, ProcIf, Processor, ProcessorFactory};

//! Pluggable stream processors with a hot-swappable instance registry
//!
//! A processor type (a [`ProcIf`] descriptor) transforms frames. Each running
//! instance owns bounded input/output queues, a processing thread and,
//! when statistics are enabled, a statistics thread. Instances live in a
//! fixed-size [`Procs`] registry addressed by small integer ids; an
//! instance's type can be replaced in place while keeping its id and its
//! compatible settings.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mediaprocs::media::{Frame, SampleFormat};
//! use mediaprocs::processors::bypass;
//! use mediaprocs::{ModuleRegistry, Procs, RegistryConfig};
//!
//! # fn main() -> mediaprocs::Result<()> {
//! let modules = ModuleRegistry::open();
//! modules.register(&bypass::proc_if())?;
//!
//! let procs = Procs::open(RegistryConfig::default(), Arc::clone(&modules))?;
//! let id = procs.post("bypass", "setting1=100")?;
//!
//! procs.send_frame(id, &Frame::from_bytes(SampleFormat::Bytes, b"payload")?)?;
//! let frame = procs.recv_frame(id)?;
//! assert_eq!(frame.row(0, 0), Some(&b"payload"[..]));
//!
//! procs.put(id, r#"{"setting1": 5}"#)?;
//! procs.delete(id)?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod media;
pub mod processor;
pub mod processors;
pub mod queue;
pub mod registry;
pub mod rest;
pub mod settings;
pub mod stats;

pub use error::{Error, Result};
pub use media::{Frame, SampleFormat};
pub use processor::{OpenParams, ProcFeatures, ProcIf, ProcInstance, ProcOpt, Processor};
pub use registry::{AsyncProcs, ModuleRegistry, Procs, ProcsRequest, RegistryConfig};
pub use rest::{Method, RestAdapter, RestResponse};
pub use settings::Settings;

//! Processor registries
//!
//! Two levels:
//!
//! - [`ModuleRegistry`] maps type names to [`ProcIf`](crate::processor::ProcIf)
//!   descriptors.
//! - [`Procs`] maps small integer ids to running instances created from those
//!   types, and can swap an instance's type in place.
//!
//! ```text
//!                       Arc<ModuleRegistry>
//!                      ┌─────────────────────┐
//!                      │ "bypass"  ─► ProcIf │
//!                      │ "bypass2" ─► ProcIf │
//!                      └──────────┬──────────┘
//!                                 │ lookup
//!                                 ▼
//!   Procs ┌──────────┬──────────┬──────────┬─────┐
//!         │ slot 0   │ slot 1   │ slot 2   │ ... │
//!         │ Instance │  (free)  │ Instance │     │
//!         └──────────┴──────────┴──────────┴─────┘
//! ```

pub mod async_io;
pub mod config;
pub mod module;
pub mod repr;
pub mod request;
mod slot;
pub mod store;

pub use async_io::AsyncProcs;
pub use config::{RegistryConfig, MAX_INSTANCES};
pub use module::ModuleRegistry;
pub use repr::{Link, PostResponse, ProcSummary, ProcsListing};
pub use request::{ProcsFilter, ProcsRequest, FORCED_PROC_ID_KEY, PROC_NAME_KEY, PROC_NAME_NOT_KEY};
pub use store::Procs;

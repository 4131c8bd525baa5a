//! Processor type descriptors
//!
//! A [`ProcIf`] is the immutable template of one processor type: its name,
//! category, MIME type, feature flags and the factory that builds instances.
//! The per-instance behaviour lives behind the [`Processor`] trait.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::media::Frame;
use crate::queue::DupFn;
use crate::settings::Settings;

use super::engine::ProcContext;
use super::features::ProcFeatures;
use super::opt::PrivateOpt;

/// Per-instance state and callbacks of a processor type
///
/// Every method takes `&self`: the processing thread, I/O callers and
/// control callers reach the same processor concurrently, so
/// implementations keep their mutable state behind their own locks.
pub trait Processor: Send + Sync + 'static {
    /// Process one unit of work
    ///
    /// Called in a loop by the instance's processing thread. Implementations
    /// typically pop from `ctx.fifo_in()` and push to `ctx.fifo_out()`.
    /// Return [`Error::EndOfStream`] to stop the thread; any other error
    /// makes the thread yield and call again.
    fn process_frame(&self, ctx: &ProcContext) -> Result<()>;

    /// Apply new settings
    fn put_settings(&self, _settings: &Settings) -> Result<()> {
        Err(Error::not_found("put_settings"))
    }

    /// Current type-specific settings
    fn get_settings(&self) -> Result<Map<String, Value>> {
        Err(Error::not_found("get_settings"))
    }

    /// Accept a frame from a producer
    fn send_frame(&self, ctx: &ProcContext, frame: &Frame) -> Result<()> {
        ctx.send_frame_default(frame)
    }

    /// Hand a frame to a consumer
    fn recv_frame(&self, ctx: &ProcContext) -> Result<Frame> {
        ctx.recv_frame_default()
    }

    /// Release any wait the processor performs outside its queues
    fn unblock(&self) -> Result<()> {
        Err(Error::not_found("unblock"))
    }

    /// Type-specific option
    fn opt(&self, _ctx: &ProcContext, opt: &PrivateOpt) -> Result<Value> {
        Err(Error::not_found(format!("option '{}'", opt.tag)))
    }
}

/// Builds processor instances of one type
pub trait ProcessorFactory: Send + Sync {
    /// Allocate the private state of a new instance
    fn open(&self, settings: &Settings, params: &OpenParams) -> Result<Box<dyn Processor>>;
}

impl<F> ProcessorFactory for F
where
    F: Fn(&Settings, &OpenParams) -> Result<Box<dyn Processor>> + Send + Sync,
{
    fn open(&self, settings: &Settings, params: &OpenParams) -> Result<Box<dyn Processor>> {
        self(settings, params)
    }
}

/// Per-instance parameters given to [`ProcessorFactory::open`]
#[derive(Debug, Clone)]
pub struct OpenParams {
    /// Registry slot id of the instance
    pub id: usize,
    /// Input queue capacity
    pub fifo_in_capacity: usize,
    /// Output queue capacity
    pub fifo_out_capacity: usize,
    /// Statistics thread period
    pub stats_interval: Duration,
    /// Type-specific argument
    pub arg: Option<Arc<dyn Any + Send + Sync>>,
}

impl OpenParams {
    /// Parameters for slot `id` with default capacities
    pub fn new(id: usize) -> Self {
        Self {
            id,
            fifo_in_capacity: 16,
            fifo_out_capacity: 16,
            stats_interval: Duration::from_secs(1),
            arg: None,
        }
    }

    /// Set both queue capacities
    pub fn fifo_capacities(mut self, input: usize, output: usize) -> Self {
        self.fifo_in_capacity = input;
        self.fifo_out_capacity = output;
        self
    }

    /// Set the statistics period
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Attach a type-specific argument
    pub fn arg(mut self, arg: Arc<dyn Any + Send + Sync>) -> Self {
        self.arg = Some(arg);
        self
    }

    /// Downcast the type-specific argument
    pub fn arg_as<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.arg.as_deref().and_then(|a| a.downcast_ref::<T>())
    }
}

/// Descriptor of a processor type
#[derive(Clone)]
pub struct ProcIf {
    /// Unique type name
    pub name: String,
    /// Category, e.g. `encoder`, `decoder`, `muxer`, `demuxer`
    pub category: String,
    /// MIME type produced or consumed
    pub mime: String,
    /// Declared capabilities
    pub features: ProcFeatures,
    /// Instance factory
    pub factory: Arc<dyn ProcessorFactory>,
    /// Duplication of frames entering the input queue
    pub iput_dup: Option<DupFn<Frame>>,
    /// Duplication of frames entering the output queue
    pub oput_dup: Option<DupFn<Frame>>,
}

impl ProcIf {
    /// Create a descriptor
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        mime: impl Into<String>,
        features: ProcFeatures,
        factory: impl ProcessorFactory + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            mime: mime.into(),
            features,
            factory: Arc::new(factory),
            iput_dup: None,
            oput_dup: None,
        }
    }

    /// Use a custom duplication for input queue elements
    pub fn with_input_dup(mut self, dup: DupFn<Frame>) -> Self {
        self.iput_dup = Some(dup);
        self
    }

    /// Use a custom duplication for output queue elements
    pub fn with_output_dup(mut self, dup: DupFn<Frame>) -> Self {
        self.oput_dup = Some(dup);
        self
    }

    /// Same descriptor under another name
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub(crate) fn input_dup(&self) -> DupFn<Frame> {
        self.iput_dup.unwrap_or(Frame::duplicate)
    }

    pub(crate) fn output_dup(&self) -> DupFn<Frame> {
        self.oput_dup.unwrap_or(Frame::duplicate)
    }
}

fn dup_addr(dup: Option<DupFn<Frame>>) -> Option<usize> {
    dup.map(|f| f as usize)
}

impl PartialEq for ProcIf {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.category == other.category
            && self.mime == other.mime
            && self.features == other.features
            && Arc::ptr_eq(&self.factory, &other.factory)
            && dup_addr(self.iput_dup) == dup_addr(other.iput_dup)
            && dup_addr(self.oput_dup) == dup_addr(other.oput_dup)
    }
}

impl fmt::Debug for ProcIf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcIf")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("mime", &self.mime)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Idle;

    impl Processor for Idle {
        fn process_frame(&self, _ctx: &ProcContext) -> Result<()> {
            Err(Error::EndOfStream)
        }
    }

    fn open_idle(_: &Settings, _: &OpenParams) -> Result<Box<dyn Processor>> {
        Ok(Box::new(Idle))
    }

    fn proc_if() -> ProcIf {
        ProcIf::new("idle", "test", "application/octet-stream", ProcFeatures::default(), open_idle)
    }

    #[test]
    fn test_clone_is_equal() {
        let a = proc_if();
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_factories_differ() {
        assert_ne!(proc_if(), proc_if());
    }

    #[test]
    fn test_renamed_differs() {
        let a = proc_if();
        let b = a.renamed("idle2");
        assert_ne!(a, b);
        assert_eq!(b.name, "idle2");
        assert!(Arc::ptr_eq(&a.factory, &b.factory));
    }

    #[test]
    fn test_custom_dup_changes_identity() {
        fn dup(f: &Frame) -> Result<Frame> {
            f.duplicate()
        }
        let a = proc_if();
        let b = a.clone().with_input_dup(dup);
        assert_ne!(a, b);
    }

    #[test]
    fn test_open_params_arg() {
        let params = OpenParams::new(3).arg(Arc::new(42u32));
        assert_eq!(params.arg_as::<u32>(), Some(&42));
        assert_eq!(params.arg_as::<i64>(), None);
        assert_eq!(params.id, 3);
    }
}

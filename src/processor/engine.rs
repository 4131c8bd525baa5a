//! Processor instance engine
//!
//! A [`ProcInstance`] runs one processor built from a [`ProcIf`]:
//!
//! ```text
//!   send_frame ──► [fair_in] ──► fifo_in ──► processing thread ──► fifo_out ──► [fair_out] ──► recv_frame
//!                                                 │
//!                                      Processor::process_frame
//!
//!   opt(Get/Put/Unblock/Private) ──► [api]        statistics thread ──► IoStats::tick
//! ```
//!
//! I/O and control use disjoint locks: `fair_in` and `fair_out` arbitrate
//! each direction, `api` serializes option calls. None of them is held by
//! the background threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::media::Frame;
use crate::queue::Fifo;
use crate::settings::{self, Settings};
use crate::stats::{IoStats, ProcStats};

use super::features::ProcFeatures;
use super::opt::ProcOpt;
use super::proc_if::{OpenParams, ProcIf, Processor};

/// Key of the latency figure injected into GET snapshots
pub const LATENCY_AVG_KEY: &str = "latency_avg_usec";

/// Key wrapping the type-specific settings in GET snapshots
pub const SETTINGS_KEY: &str = "settings";

/// Interruptible sleep for the statistics thread
#[derive(Debug, Default)]
struct Wakeup {
    signalled: Mutex<bool>,
    cond: Condvar,
}

impl Wakeup {
    /// Sleep for `dur`; returns `true` if woken by [`Wakeup::signal`]
    fn sleep(&self, dur: Duration) -> bool {
        let deadline = Instant::now() + dur;
        let mut signalled = self.signalled.lock();
        while !*signalled {
            if self.cond.wait_until(&mut signalled, deadline).timed_out() {
                break;
            }
        }
        *signalled
    }

    fn signal(&self) {
        *self.signalled.lock() = true;
        self.cond.notify_all();
    }
}

/// State shared between an instance, its threads and its processor
///
/// Processor callbacks receive a `&ProcContext` to reach the queues and the
/// statistics helpers.
pub struct ProcContext {
    proc_if: Arc<ProcIf>,
    id: usize,
    processor: Box<dyn Processor>,
    fifo_in: Fifo<Frame>,
    fifo_out: Fifo<Frame>,
    stats: IoStats,
    exit: AtomicBool,
    wakeup: Wakeup,
}

impl ProcContext {
    /// Slot id of the instance
    pub fn id(&self) -> usize {
        self.id
    }

    /// Descriptor of the instance's type
    pub fn proc_if(&self) -> &ProcIf {
        &self.proc_if
    }

    /// Input queue
    pub fn fifo_in(&self) -> &Fifo<Frame> {
        &self.fifo_in
    }

    /// Output queue
    pub fn fifo_out(&self) -> &Fifo<Frame> {
        &self.fifo_out
    }

    /// Whether the instance is shutting down
    pub fn is_exiting(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    /// Attribute latency to an output frame with timestamp `pts`
    pub fn register_output_latency(&self, pts: i64) {
        if let Some(latency) = self.stats.register_output_latency(pts) {
            tracing::trace!(proc_id = self.id, pts, latency_ns = latency.as_nanos() as u64, "Output latency");
        }
    }

    /// Default send path: account the frame and queue a duplicate
    pub fn send_frame_default(&self, frame: &Frame) -> Result<()> {
        self.stats.record_input(frame);
        self.fifo_in.push(frame)
    }

    /// Default receive path: dequeue and account
    pub fn recv_frame_default(&self) -> Result<Frame> {
        let frame = self.fifo_out.pop()?;
        self.stats.record_output(&frame);
        Ok(frame)
    }
}

/// One running processor instance
pub struct ProcInstance {
    ctx: Arc<ProcContext>,
    api: Mutex<()>,
    fair_in: Mutex<()>,
    fair_out: Mutex<()>,
    proc_thread: Mutex<Option<JoinHandle<Result<()>>>>,
    stats_thread: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl ProcInstance {
    /// Open an instance of `proc_if`
    ///
    /// Builds the processor's private state, the queues and the statistics,
    /// then launches the statistics thread (when the type declares any
    /// statistics feature) and the processing thread. On failure everything
    /// built so far is torn down through [`ProcInstance::close`].
    pub fn open(proc_if: Arc<ProcIf>, settings: &Settings, params: &OpenParams) -> Result<Self> {
        if params.stats_interval.is_zero() {
            return Err(Error::invalid("statistics interval must be non-zero"));
        }

        let processor = proc_if.factory.open(settings, params)?;
        let fifo_in = Fifo::new(params.fifo_in_capacity, proc_if.input_dup())?;
        let fifo_out = Fifo::new(params.fifo_out_capacity, proc_if.output_dup())?;
        let features = proc_if.features;

        let ctx = Arc::new(ProcContext {
            id: params.id,
            processor,
            fifo_in,
            fifo_out,
            stats: IoStats::new(features),
            exit: AtomicBool::new(false),
            wakeup: Wakeup::default(),
            proc_if,
        });

        let instance = Self {
            ctx,
            api: Mutex::new(()),
            fair_in: Mutex::new(()),
            fair_out: Mutex::new(()),
            proc_thread: Mutex::new(None),
            stats_thread: Mutex::new(None),
            closed: AtomicBool::new(false),
        };

        if features.needs_stats_thread() {
            let ctx = Arc::clone(&instance.ctx);
            let interval = params.stats_interval;
            let handle = thread::Builder::new()
                .name(format!("proc-stats-{}", params.id))
                .spawn(move || statistics_loop(ctx, interval))
                .map_err(|e| Error::Failed(format!("spawn statistics thread: {e}")))?;
            *instance.stats_thread.lock() = Some(handle);
        }

        let ctx = Arc::clone(&instance.ctx);
        let handle = thread::Builder::new()
            .name(format!("proc-{}", params.id))
            .spawn(move || processing_loop(ctx))
            .map_err(|e| Error::Failed(format!("spawn processing thread: {e}")))?;
        *instance.proc_thread.lock() = Some(handle);

        tracing::info!(
            proc_id = instance.ctx.id,
            proc_name = %instance.ctx.proc_if.name,
            features = ?features,
            "Processor opened"
        );

        Ok(instance)
    }

    /// Stop the threads and release the instance
    ///
    /// Idempotent; also run on drop.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        self.ctx.exit.store(true, Ordering::Release);
        self.ctx.fifo_in.set_blocking(false);
        self.ctx.fifo_out.set_blocking(false);
        if let Err(e) = self.ctx.processor.unblock() {
            if !matches!(e, Error::NotFound(_)) {
                tracing::warn!(proc_id = self.ctx.id, error = %e, "Unblock hook failed during close");
            }
        }

        if let Some(handle) = self.proc_thread.lock().take() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(proc_id = self.ctx.id, error = %e, "Processing thread failed");
                    debug_assert!(false, "processing thread returned {e}");
                }
                Err(_) => tracing::error!(proc_id = self.ctx.id, "Processing thread panicked"),
            }
        }

        if let Some(handle) = self.stats_thread.lock().take() {
            self.ctx.wakeup.signal();
            if handle.join().is_err() {
                tracing::error!(proc_id = self.ctx.id, "Statistics thread panicked");
            }
        }

        tracing::info!(
            proc_id = self.ctx.id,
            proc_name = %self.ctx.proc_if.name,
            "Processor closed"
        );
    }

    /// Slot id of the instance
    pub fn id(&self) -> usize {
        self.ctx.id
    }

    /// Type name of the instance
    pub fn name(&self) -> &str {
        &self.ctx.proc_if.name
    }

    /// Descriptor of the instance's type
    pub fn proc_if(&self) -> &Arc<ProcIf> {
        &self.ctx.proc_if
    }

    /// Shared state, as seen by processor callbacks
    pub fn context(&self) -> &ProcContext {
        &self.ctx
    }

    /// Current statistics
    pub fn stats(&self) -> ProcStats {
        self.ctx.stats.snapshot()
    }

    /// Send a frame into the instance
    ///
    /// Serialized against other senders only.
    pub fn send_frame(&self, frame: &Frame) -> Result<()> {
        let _fair = self.fair_in.lock();
        self.ctx.processor.send_frame(&self.ctx, frame)
    }

    /// Receive a processed frame
    ///
    /// Serialized against other receivers only.
    pub fn recv_frame(&self) -> Result<Frame> {
        let _fair = self.fair_out.lock();
        self.ctx.processor.recv_frame(&self.ctx)
    }

    /// Run a control command
    ///
    /// Holds the API lock for the whole call; I/O is not blocked.
    /// Commands without a payload reply with `Value::Null`.
    pub fn opt(&self, opt: ProcOpt) -> Result<Value> {
        let api = self.api.lock();
        match opt {
            ProcOpt::Unblock => self.unblock_locked(&api).map(|()| Value::Null),
            ProcOpt::Get => self.get_locked(&api).map(Value::Object),
            ProcOpt::Put(settings) => self.put_locked(&api, &settings).map(|()| Value::Null),
            ProcOpt::Private(private) => self.ctx.processor.opt(&self.ctx, &private),
        }
    }

    /// Switch the instance to non-blocking I/O
    pub fn unblock(&self) -> Result<()> {
        self.opt(ProcOpt::Unblock).map(drop)
    }

    /// Settings snapshot (`{"latency_avg_usec": .., "settings": {..}}`)
    pub fn get_settings(&self) -> Result<Map<String, Value>> {
        let api = self.api.lock();
        self.get_locked(&api)
    }

    /// Apply new settings
    pub fn put_settings(&self, settings: &Settings) -> Result<()> {
        let api = self.api.lock();
        self.put_locked(&api, settings)
    }

    fn unblock_locked(&self, _api: &MutexGuard<'_, ()>) -> Result<()> {
        if !self.ctx.fifo_in.is_blocking() && !self.ctx.fifo_out.is_blocking() {
            return Err(Error::NotModified);
        }
        self.ctx.fifo_in.set_blocking(false);
        self.ctx.fifo_out.set_blocking(false);
        match self.ctx.processor.unblock() {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => return Err(e),
        }
        tracing::debug!(proc_id = self.ctx.id, "Processor unblocked");
        Ok(())
    }

    fn get_locked(&self, _api: &MutexGuard<'_, ()>) -> Result<Map<String, Value>> {
        let fields = self.ctx.processor.get_settings()?;
        let mut snapshot = Map::new();
        snapshot.insert(SETTINGS_KEY.to_owned(), Value::Object(fields));
        if self.ctx.proc_if.features.contains(ProcFeatures::LATENCY_STATS) {
            let latency = Value::from(self.ctx.stats.latency_avg_usec());
            snapshot = settings::prepend(LATENCY_AVG_KEY, latency, snapshot);
        }
        Ok(snapshot)
    }

    fn put_locked(&self, _api: &MutexGuard<'_, ()>, settings: &Settings) -> Result<()> {
        self.ctx.processor.put_settings(settings)?;
        tracing::debug!(proc_id = self.ctx.id, "Processor settings updated");
        Ok(())
    }
}

impl Drop for ProcInstance {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ProcInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcInstance")
            .field("id", &self.ctx.id)
            .field("name", &self.ctx.proc_if.name)
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

fn processing_loop(ctx: Arc<ProcContext>) -> Result<()> {
    tracing::debug!(proc_id = ctx.id, "Processing thread started");
    while !ctx.is_exiting() {
        match ctx.processor.process_frame(&ctx) {
            Ok(()) => {}
            Err(Error::EndOfStream) => {
                ctx.exit.store(true, Ordering::Release);
                tracing::debug!(proc_id = ctx.id, "Processor reached end of stream");
                return Ok(());
            }
            Err(_) => thread::yield_now(),
        }
    }
    tracing::debug!(proc_id = ctx.id, "Processing thread stopped");
    Ok(())
}

fn statistics_loop(ctx: Arc<ProcContext>, interval: Duration) {
    tracing::debug!(proc_id = ctx.id, "Statistics thread started");
    while !ctx.wakeup.sleep(interval) {
        ctx.stats.tick(interval);
    }
    tracing::debug!(proc_id = ctx.id, "Statistics thread stopped");
}

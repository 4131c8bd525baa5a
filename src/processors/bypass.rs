//! Bypass processor
//!
//! Moves every frame from the input queue to the output queue unchanged.
//! Useful as a pipeline placeholder and for exercising the engine. The same
//! implementation can be registered under several names, which makes
//! substitution between compatible types easy to test.

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::processor::{OpenParams, PrivateOpt, ProcContext, ProcFeatures, ProcIf, Processor};
use crate::settings::Settings;

/// Default type name
pub const BYPASS_NAME: &str = "bypass";

#[derive(Debug, Clone, Default, PartialEq)]
struct BypassSettings {
    setting1: i64,
    setting2: String,
}

/// Bypass processor state
#[derive(Debug, Default)]
pub struct Bypass {
    settings: Mutex<BypassSettings>,
}

impl Bypass {
    /// Create with settings applied over the defaults
    pub fn new(settings: &Settings) -> Result<Self> {
        let bypass = Self::default();
        bypass.put_settings(settings)?;
        Ok(bypass)
    }
}

impl Processor for Bypass {
    fn process_frame(&self, ctx: &ProcContext) -> Result<()> {
        let frame = ctx.fifo_in().pop()?;
        ctx.register_output_latency(frame.pts);
        ctx.fifo_out().push_owned(frame)
    }

    fn put_settings(&self, settings: &Settings) -> Result<()> {
        let setting1 = settings.get_i64("setting1")?;
        let setting2 = settings.get_str("setting2");

        let mut current = self.settings.lock();
        if let Some(v) = setting1 {
            current.setting1 = v;
        }
        if let Some(v) = setting2 {
            current.setting2 = v;
        }
        Ok(())
    }

    fn get_settings(&self) -> Result<Map<String, Value>> {
        let current = self.settings.lock();
        let mut map = Map::new();
        map.insert("setting1".into(), Value::from(current.setting1));
        map.insert("setting2".into(), Value::from(current.setting2.clone()));
        Ok(map)
    }

    fn opt(&self, ctx: &ProcContext, opt: &PrivateOpt) -> Result<Value> {
        match opt.tag.as_str() {
            "reset" => {
                *self.settings.lock() = BypassSettings::default();
                Ok(Value::Null)
            }
            "queue_depth" => Ok(serde_json::json!({
                "input": ctx.fifo_in().len(),
                "output": ctx.fifo_out().len(),
            })),
            other => Err(Error::not_found(format!("bypass option '{other}'"))),
        }
    }
}

fn open(settings: &Settings, params: &OpenParams) -> Result<Box<dyn Processor>> {
    tracing::debug!(proc_id = params.id, "Opening bypass processor");
    Ok(Box::new(Bypass::new(settings)?))
}

/// Descriptor registered as [`BYPASS_NAME`]
pub fn proc_if() -> ProcIf {
    proc_if_named(BYPASS_NAME)
}

/// Bypass descriptor under a custom name
pub fn proc_if_named(name: &str) -> ProcIf {
    ProcIf::new(
        name,
        "encoder",
        "application/octet-stream",
        ProcFeatures::READABLE
            | ProcFeatures::WRITABLE
            | ProcFeatures::IO_STATS
            | ProcFeatures::INPUT_TS_STATS
            | ProcFeatures::LATENCY_STATS,
        open,
    )
}

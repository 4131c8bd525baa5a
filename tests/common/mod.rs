#![allow(dead_code)]

use std::sync::Arc;

use mediaprocs::processors::bypass;
use mediaprocs::{ModuleRegistry, Procs, RegistryConfig};

/// Route `tracing` output to the test harness; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Module registry holding `bypass` and `bypass2`
pub fn modules() -> Arc<ModuleRegistry> {
    let modules = ModuleRegistry::open();
    modules.register(&bypass::proc_if()).unwrap();
    modules.register(&bypass::proc_if_named("bypass2")).unwrap();
    modules
}

pub fn registry(max_instances: usize) -> Procs {
    init_tracing();
    Procs::open(RegistryConfig::default().max_instances(max_instances), modules()).unwrap()
}

//! Bypass pipeline demo
//!
//! Run with: cargo run --example bypass_pipeline [FRAMES]
//!
//! Registers the `bypass` processor type, creates an instance through the
//! REST adapter, pushes frames through it from a producer thread, swaps the
//! instance's type in place and prints the registry state along the way.
//!
//! Set `RUST_LOG=debug` to see lifecycle logs.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mediaprocs::media::{Frame, SampleFormat};
use mediaprocs::processors::bypass;
use mediaprocs::{Method, ModuleRegistry, Procs, RegistryConfig, RestAdapter};
use tracing_subscriber::EnvFilter;

fn main() -> mediaprocs::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let frames: i64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(25);

    let modules = ModuleRegistry::open();
    modules.register(&bypass::proc_if())?;
    modules.register(&bypass::proc_if_named("bypass2"))?;

    let config = RegistryConfig::default()
        .max_instances(16)
        .href_base("http://127.0.0.1:8080")
        .stats_interval(Duration::from_millis(200));
    let procs = Arc::new(Procs::open(config, modules)?);
    let rest = RestAdapter::new(Arc::clone(&procs));

    let created = rest.handle(Method::Post, "/procs.json", r#"{"proc_name":"bypass","setting1":100}"#);
    println!("POST   {}", created.to_json_string()?);
    let id = created
        .data
        .as_ref()
        .and_then(|data| data["proc_id"].as_u64())
        .map(|id| id as usize)
        .ok_or_else(|| mediaprocs::Error::Failed(created.message.clone()))?;

    let producer = {
        let procs = Arc::clone(&procs);
        thread::spawn(move || -> mediaprocs::Result<()> {
            for pts in 0..frames {
                let mut frame = Frame::with_planes(SampleFormat::Yuv420p, &[(64, 48), (32, 24), (32, 24)])?;
                frame.pts = pts * 40_000;
                procs.send_frame(id, &frame)?;
                thread::sleep(Duration::from_millis(10));
            }
            Ok(())
        })
    };

    let mut received = 0;
    while received < frames {
        let frame = procs.recv_frame(id)?;
        received += 1;
        if received % 10 == 0 {
            println!("recv   pts={} planes={}", frame.pts, frame.plane_count());
        }
    }
    match producer.join() {
        Ok(result) => result?,
        Err(_) => return Err(mediaprocs::Error::Failed("producer panicked".into())),
    }

    let path = format!("/procs/{id}.json");
    println!("GET    {}", rest.handle(Method::Get, &path, "").to_json_string()?);
    println!("stats  {:?}", procs.stats(id)?);

    println!("PUT    {}", rest.handle(Method::Put, &path, "proc_name=bypass2").to_json_string()?);
    println!("GET    {}", rest.handle(Method::Get, &path, "").to_json_string()?);
    println!("LIST   {}", rest.handle(Method::Get, "/procs.json", "").to_json_string()?);

    println!("DELETE {}", rest.handle(Method::Delete, &path, "").to_json_string()?);
    println!("DELETE {}", rest.handle(Method::Delete, &path, "").to_json_string()?);
    Ok(())
}

//! End-to-end run of a bypass processor through the registry

mod common;

use mediaprocs::media::{Frame, SampleFormat, NO_TIMESTAMP};
use mediaprocs::processors::bypass;
use mediaprocs::{Error, ModuleRegistry, Procs, ProcsRequest, RegistryConfig};
use serde_json::json;

const WIDTH: usize = 352;
const HEIGHT: usize = 288;

fn yuv_frame() -> Frame {
    let dims = [(WIDTH, HEIGHT), (WIDTH / 2, HEIGHT / 2), (WIDTH / 2, HEIGHT / 2)];
    let mut frame = Frame::with_planes(SampleFormat::Yuv420p, &dims).unwrap();
    for (i, &(width, height)) in dims.iter().enumerate() {
        for y in 0..height {
            let row = frame.row_mut(i, y).unwrap();
            for (x, px) in row.iter_mut().enumerate() {
                *px = (x + y * width) as u8;
            }
        }
    }
    frame.pts = NO_TIMESTAMP;
    frame.dts = NO_TIMESTAMP;
    frame
}

fn check_pattern(frame: &Frame) {
    let dims = [(WIDTH, HEIGHT), (WIDTH / 2, HEIGHT / 2), (WIDTH / 2, HEIGHT / 2)];
    assert_eq!(frame.plane_count(), dims.len());
    for (i, &(width, height)) in dims.iter().enumerate() {
        let layout = frame.layout(i).unwrap();
        assert_eq!((layout.width, layout.height), (width, height));
        for y in 0..height {
            let row = frame.row(i, y).unwrap();
            for (x, &px) in row.iter().enumerate() {
                assert_eq!(px, (x + y * width) as u8, "plane {i} at ({x}, {y})");
            }
        }
    }
}

#[test]
fn test_bypass_processor_scenario() {
    common::init_tracing();

    let modules = ModuleRegistry::open();
    modules
        .register(&bypass::proc_if_named("bypass_processor"))
        .unwrap();
    let procs = Procs::open(RegistryConfig::default(), modules).unwrap();

    let reply = procs
        .dispatch(ProcsRequest::Post {
            proc_name: "bypass_processor".into(),
            settings: "setting1=100".into(),
        })
        .unwrap();
    assert_eq!(reply, json!({"proc_id": 0}));

    let sent = [yuv_frame(), yuv_frame()];
    for frame in &sent {
        procs.send_frame(0, frame).unwrap();
    }

    for input in &sent {
        let output = procs.recv_frame(0).unwrap();
        assert_eq!(output.sample_fmt, input.sample_fmt);
        assert_eq!(output.pts, input.pts);
        assert_eq!(output.dts, input.dts);
        check_pattern(&output);
    }

    assert_eq!(procs.dispatch(ProcsRequest::Delete(0)).unwrap(), serde_json::Value::Null);
    assert!(matches!(
        procs.dispatch(ProcsRequest::Delete(0)),
        Err(Error::NotFound(_))
    ));
}

#[test]
fn test_duplicate_keeps_pattern_in_one_slab() {
    let frame = yuv_frame();
    let copy = frame.duplicate().unwrap();
    check_pattern(&copy);

    let planes_total: usize = (0..copy.plane_count())
        .map(|i| copy.plane(i).unwrap().len())
        .sum();
    assert_eq!(copy.slab().len(), planes_total);
}

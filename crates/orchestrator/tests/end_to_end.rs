//! End-to-end pipeline test on the CPU backend
//!
//! A single pointer impulse at the grid centre, followed by 100 frames with
//! the pointer released. The centre velocity must decay, and every frame's
//! projection must reduce the velocity divergence.

use std::time::Duration;

use glam::{Vec2, Vec4Swizzles};
use stam_kernel::{divergence_metrics, CpuSolver, FieldMetrics, FieldSize, FieldSlot, PointerSample};
use stam_orchestrator::{
    create_pipeline, BackendType, FluidConfig, FluidPipeline, FrameOutcome, InputConfig,
    PipelineSettings, ScriptedInput,
};

const FRAME: Duration = Duration::from_micros(16_667);

fn impulse_pipeline(size: FieldSize) -> FluidPipeline<CpuSolver> {
    let centre = size.as_vec2() * 0.5;
    let press = PointerSample {
        position: centre,
        motion: Vec2::new(1.0, 0.0),
        active: true,
    };
    FluidPipeline::new(
        CpuSolver::new(size),
        PipelineSettings::default(),
        Box::new(ScriptedInput::keyframes(vec![press])),
    )
    .unwrap()
}

/// Interior divergence RMS before (scratch field) and after projection.
fn projection_divergence(pipeline: &mut FluidPipeline<CpuSolver>) -> (f32, f32) {
    let scratch = pipeline.read_field(FieldSlot::Scratch).unwrap();
    let velocity = pipeline.read_field(FieldSlot::Velocity).unwrap();
    (
        FieldMetrics::interior_x(&scratch).rms,
        divergence_metrics(&velocity).rms,
    )
}

#[test]
fn impulse_decays_and_stays_projected() {
    let size = FieldSize::square(64).unwrap();
    let mut pipeline = impulse_pipeline(size);

    assert_eq!(
        pipeline.update(FRAME).unwrap(),
        FrameOutcome::Completed { frame: 1 }
    );
    let peak = pipeline
        .read_field(FieldSlot::Velocity)
        .unwrap()
        .get(32, 32)
        .xy()
        .length();
    assert!(peak > 0.0, "impulse produced no velocity");
    let (before, after) = projection_divergence(&mut pipeline);
    assert!(after < before, "frame 1: {before} -> {after}");

    for frame in 2..=101 {
        pipeline.update(FRAME).unwrap();
        let (before, after) = projection_divergence(&mut pipeline);
        assert!(
            after < before,
            "frame {frame}: projection did not reduce divergence {before} -> {after}"
        );
    }

    let last = pipeline
        .read_field(FieldSlot::Velocity)
        .unwrap()
        .get(32, 32)
        .xy()
        .length();
    println!("centre |v|: peak {peak:.4e}, after 100 frames {last:.4e}");
    assert!(last < 0.05 * peak, "centre velocity {last} vs peak {peak}");
}

#[test]
fn composite_shows_dye_near_pointer() {
    let size = FieldSize::square(32).unwrap();
    let mut pipeline = impulse_pipeline(size);
    pipeline.update(FRAME).unwrap();
    let image = pipeline.final_composite().unwrap();
    assert_eq!(image.size(), size);
    assert!(image.texels().iter().all(|t| t.w == 1.0));
    let centre = image.get(16, 16);
    assert!(centre.x + centre.y + centre.z > 0.0, "no dye at pointer: {centre:?}");
    let corner = image.get(0, 0);
    assert_eq!(corner.xyz(), glam::Vec3::ZERO);
}

#[test]
fn reset_clears_state() {
    let size = FieldSize::square(16).unwrap();
    let mut pipeline = impulse_pipeline(size);
    pipeline.update(FRAME).unwrap();
    pipeline.reset().unwrap();
    assert_eq!(pipeline.frame_state().frame, 0);
    let velocity = pipeline.read_field(FieldSlot::Velocity).unwrap();
    assert!(velocity.texels().iter().all(|t| t.x == 0.0 && t.y == 0.0));
}

#[test]
fn config_driven_cpu_pipeline_runs() {
    let mut config = FluidConfig::new("orbit", 32, 32);
    config.backend = BackendType::Cpu;
    config.input = InputConfig::Scripted {
        orbit_radius: 0.25,
        orbit_period: 2.0,
        active: true,
    };
    let (mut pipeline, handle) = create_pipeline(&config).unwrap();
    assert!(handle.is_none());
    for _ in 0..10 {
        assert!(matches!(
            pipeline.update(FRAME).unwrap(),
            FrameOutcome::Completed { .. }
        ));
    }
    let speed = FieldMetrics::speed(&pipeline.read_field(FieldSlot::Velocity).unwrap());
    assert!(speed.max_abs > 0.0);
    assert!(speed.max_abs.is_finite());
}

#[test]
fn device_input_drives_pipeline() {
    let mut config = FluidConfig::new("device", 32, 32);
    config.backend = BackendType::Cpu;
    let (mut pipeline, handle) = create_pipeline(&config).unwrap();
    let handle = handle.expect("device input returns a handle");

    handle.pointer_moved(Vec2::new(10.0, 16.0));
    pipeline.update(FRAME).unwrap();
    handle.button(true);
    handle.pointer_moved(Vec2::new(14.0, 16.0));
    pipeline.update(FRAME).unwrap();

    let pointer = pipeline.frame_state().pointer;
    assert!(pointer.active);
    assert_eq!(pointer.motion, Vec2::new(4.0, 0.0));
    let v = pipeline.read_field(FieldSlot::Velocity).unwrap().get(14, 16);
    assert!(v.x > 0.0);
}

//! GPU backend reference scenarios
//!
//! Re-runs the reference scenarios on GpuSolver, and compares one scenario's
//! final fields against the CPU backend. Skips when no adapter is present.

use stam_kernel::{gpu_available, FieldMetrics, FieldSlot};
use stam_orchestrator::{create_pipeline_with_input, BackendType, ScriptedInput};

use crate::scenarios;
use crate::FRAME_TIME;

#[test]
fn gpu_reference_scenarios() {
    if !gpu_available() {
        eprintln!("no GPU adapter, skipping");
        return;
    }
    for test in scenarios::all(BackendType::Gpu).expect("scenario catalogue") {
        let result = test.run().expect("scenario execution failed");
        result.print_summary();
        assert_eq!(result.backend, "gpu");
        assert!(result.passed, "{} scenario failed on GPU", result.name);
    }
}

#[test]
fn gpu_matches_cpu_helmholtz() {
    if !gpu_available() {
        return;
    }
    let mut finals = Vec::new();
    for backend in [BackendType::Cpu, BackendType::Gpu] {
        let test = scenarios::helmholtz_projection(backend).expect("scenario");
        let mut pipeline =
            create_pipeline_with_input(&test.config, Box::new(ScriptedInput::idle())).expect("pipeline");
        if let Some(velocity) = &test.initial_velocity {
            pipeline.write_field(FieldSlot::Velocity, velocity).unwrap();
        }
        for _ in 0..10 {
            pipeline.update(FRAME_TIME).unwrap();
        }
        finals.push(pipeline.read_field(FieldSlot::Velocity).unwrap());
    }

    let scale = FieldMetrics::speed(&finals[0]).max_abs.max(1.0);
    let diff = finals[0].max_abs_diff(&finals[1]);
    println!("velocity max diff {diff:.3e} (scale {scale:.3e})");
    assert!(diff < 1e-2 * scale, "GPU diverged from CPU: {diff}");
}

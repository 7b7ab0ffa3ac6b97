//! Frame throughput benchmark
//!
//! Measures frames/second of the full stage schedule for several grid sizes
//! on the CPU backend and, with `--features gpu`, the GPU backend.
//!
//! Run with: cargo bench -p stam-kernel --bench frame_throughput [--features gpu]

use std::time::Instant;

use glam::Vec2;
use stam_kernel::{
    run_frame, CompositeMode, CpuSolver, FieldSize, FieldSlot, FluidBackend, FrameState,
    PointerSample, Schedule, SolverConstants,
};

fn drive<B: FluidBackend>(backend: &mut B, frames: usize) -> f64 {
    let size = backend.resolution();
    let schedule = Schedule::default();
    let constants = SolverConstants::default();
    let mut frame = FrameState::new(size);
    let centre = size.as_vec2() * 0.5;

    let start = Instant::now();
    for n in 0..frames {
        let angle = n as f32 * 0.05;
        let pointer = PointerSample {
            position: centre + Vec2::from_angle(angle) * centre.x * 0.5,
            motion: Vec2::from_angle(angle).perp() * 2.0,
            active: true,
        };
        frame.advance(1.0 / 60.0, pointer);
        if let Err(e) = run_frame(backend, &schedule, &frame, &constants, CompositeMode::Quantity) {
            eprintln!("  frame {n} failed: {e}");
            return 0.0;
        }
    }
    // Force completion before stopping the clock.
    let _ = backend.read_field(FieldSlot::Composite);
    let elapsed = start.elapsed().as_secs_f64();
    frames as f64 / elapsed
}

fn benchmark_cpu(n: u32, frames: usize) -> Option<f64> {
    let size = FieldSize::square(n).ok()?;
    let mut solver = CpuSolver::ready(size).ok()?;
    let fps = drive(&mut solver, frames);
    println!("  CPU  {n:>4}x{n:<4}  {frames:>4} frames  {fps:>8.1} frames/s");
    Some(fps)
}

#[cfg(feature = "gpu")]
fn benchmark_gpu(n: u32, frames: usize) -> Option<f64> {
    let size = FieldSize::square(n).ok()?;
    let mut solver = match stam_kernel::GpuSolver::ready(size) {
        Ok(s) => s,
        Err(e) => {
            println!("  GPU not available: {e}");
            return None;
        }
    };
    let fps = drive(&mut solver, frames);
    println!("  GPU  {n:>4}x{n:<4}  {frames:>4} frames  {fps:>8.1} frames/s");
    Some(fps)
}

#[cfg(not(feature = "gpu"))]
fn benchmark_gpu(_n: u32, _frames: usize) -> Option<f64> {
    None
}

fn main() {
    println!("=== Frame Throughput Benchmark ===\n");

    let configs = [(64, 200), (128, 100), (256, 40), (512, 10)];
    let mut results = Vec::new();

    for &(n, frames) in &configs {
        println!("--- {n}x{n}, {frames} frames ---");
        let cpu = benchmark_cpu(n, frames).unwrap_or(0.0);
        let gpu = benchmark_gpu(n, frames);
        results.push((n, cpu, gpu));
        println!();
    }

    println!("=== Summary ===");
    println!("{:>8} {:>10} {:>10} {:>10}", "Grid", "CPU", "GPU", "GPU/CPU");
    for (n, cpu, gpu) in results {
        match gpu {
            Some(g) => println!("{n:>8} {cpu:>10.1} {g:>10.1} {:>9.2}x", g / cpu),
            None => println!("{n:>8} {cpu:>10.1} {:>10} {:>10}", "-", "-"),
        }
    }
}

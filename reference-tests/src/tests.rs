//! Reference scenarios as cargo tests, pinned to the CPU backend.

use stam_orchestrator::BackendType;

use crate::scenarios;
use crate::ReferenceTest;

fn run_and_assert(test: ReferenceTest) {
    let result = test.run().expect("scenario execution failed");
    result.print_summary();
    assert_eq!(result.backend, "cpu");
    assert_eq!(result.dropped, 0);
    assert!(result.passed, "{} scenario failed", result.name);
}

#[test]
fn test_quiescent_fluid() {
    run_and_assert(scenarios::quiescent_fluid(BackendType::Cpu));
}

#[test]
fn test_impulse_decay() {
    run_and_assert(scenarios::impulse_decay(BackendType::Cpu));
}

#[test]
fn test_helmholtz_projection() {
    run_and_assert(scenarios::helmholtz_projection(BackendType::Cpu).unwrap());
}

#[test]
fn test_orbiting_stirrer() {
    run_and_assert(scenarios::orbiting_stirrer(BackendType::Cpu).unwrap());
}

#[test]
fn catalogue_loads() {
    let all = scenarios::all(BackendType::Cpu).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.iter().all(|t| t.frames > 0));
}

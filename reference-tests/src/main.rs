//! Reference scenario binary entry point
//!
//! Runs every reference scenario on the auto-selected backend.

use reference_tests::{scenarios, TestResult};
use stam_orchestrator::BackendType;

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    tracing::info!("Stable-Fluids Reference Suite");
    tracing::info!("=============================");

    let tests = match scenarios::all(BackendType::Auto) {
        Ok(tests) => tests,
        Err(e) => {
            eprintln!("ERROR building scenarios: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Found {} reference scenarios", tests.len());

    let mut results: Vec<TestResult> = Vec::new();
    let mut passed_count = 0;
    let mut failed_count = 0;

    for test in tests {
        match test.run() {
            Ok(result) => {
                if result.passed {
                    passed_count += 1;
                } else {
                    failed_count += 1;
                }
                result.print_summary();
                results.push(result);
            }
            Err(e) => {
                eprintln!("\nERROR running scenario {}: {}", test.name, e);
                failed_count += 1;
            }
        }
    }

    // Print overall summary
    println!("\n{}", "=".repeat(80));
    println!("OVERALL SUMMARY");
    println!("{}", "=".repeat(80));
    println!("Total scenarios: {}", results.len());
    println!("Passed: {}", passed_count);
    println!("Failed: {}", failed_count);
    println!("{}", "=".repeat(80));

    if failed_count > 0 {
        std::process::exit(1);
    }
}

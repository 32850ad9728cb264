//! Example: Logging Setup
//!
//! Installs the tracing subscriber and runs one invocation so the memory,
//! kernel and metrics events are visible.
//!
//! Run with:
//!
//! ```bash
//! RUST_LOG=debug cargo run --example logging_setup
//! RUST_LOG=ctc_bridge::memory=trace,warn cargo run --example logging_setup
//! ```

use ctc_bridge::logging::{info, LogLevel};
use ctc_bridge::{init_logging, CtcCost, LogConfig, Result};
use ndarray::{array, Array3};

fn main() -> Result<()> {
    println!("=== Logging Setup Example ===\n");

    println!("Presets:");
    println!("   LogConfig::development() - debug level, file/line info");
    println!("   LogConfig::testing()     - warn level, no decoration\n");

    let config = LogConfig::new()
        .with_level(LogLevel::Debug)
        .with_timestamps(false);
    init_logging(&config);
    info!("logging initialized");

    println!("Targets:");
    println!("   ctc_bridge::memory  - allocations, buffer reuse, releases");
    println!("   ctc_bridge::kernel  - workspace sizing, failures, skipped items");
    println!("   ctc_bridge::metrics - per-call cost summaries\n");

    // The second item cannot be aligned in one frame and logs a warning.
    let activations = Array3::<f32>::zeros((3, 2, 4));
    let outputs = CtcCost::cpu().compute(
        activations.view(),
        array![[1, 2], [3, 3]].view(),
        array![3, 1].view(),
    )?;
    println!("\ncosts: {:?}", outputs.costs.to_vec());

    println!("\n=== Example Complete ===");
    Ok(())
}

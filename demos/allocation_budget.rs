//! Example: Allocation Budget
//!
//! Runs the same invocation under a shrinking memory budget to show which
//! allocation fails first, and that nothing stays charged afterwards.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example allocation_budget
//! ```

use std::sync::Arc;

use ctc_bridge::{estimate_invocation_bytes, CtcCost, MemoryTracker};
use ndarray::{array, Array3};

fn main() {
    println!("=== Allocation Budget Example ===\n");

    // Stored [batch, time, alphabet]; the permuted view forces a contiguous copy.
    let stored = Array3::<f32>::zeros((2, 8, 6));
    let activations = stored.view().permuted_axes([1, 0, 2]);
    let labels = array![[1, 2, 3, -1], [5, -1, -1, -1]];
    let input_lengths = array![8, 6];

    let estimate = estimate_invocation_bytes([8, 2, 6], [2, 4], false);
    println!("Estimated transient bytes before the workspace: {estimate}\n");

    let unlimited = Arc::new(MemoryTracker::new());
    let op = CtcCost::cpu().with_tracker(Arc::clone(&unlimited));
    if op
        .compute(activations, labels.view(), input_lengths.view())
        .is_ok()
    {
        println!("Unlimited run peak: {} bytes\n", unlimited.peak_bytes());
    }

    for limit in [4096, 512, 420, 400, 64, 8] {
        let tracker = Arc::new(MemoryTracker::with_limit(limit));
        let op = CtcCost::cpu().with_tracker(Arc::clone(&tracker));
        match op.compute(activations, labels.view(), input_lengths.view()) {
            Ok(outputs) => println!("limit {limit:>5}: ok, costs {:?}", outputs.costs.to_vec()),
            Err(err) => println!("limit {limit:>5}: {err}"),
        }
        println!(
            "             peak {} bytes, still held {} bytes",
            tracker.peak_bytes(),
            tracker.allocated_bytes()
        );
    }

    println!("\n=== Example Complete ===");
}

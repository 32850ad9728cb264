//! Example: Error Handling
//!
//! Shows the failures a CTC invocation can report and how callers match on
//! them, including wrapping `CtcError` in an application error type.
//!
//! Run with:
//! ```bash
//! cargo run --example error_handling
//! ```

use ctc_bridge::{
    ComputeLocation, CtcCost, CtcError, CtcOptions, CtcStatus, Result, ValidatableConfig,
};
use ndarray::{array, Array3};

/// Training-loop error that wraps `CtcError`.
#[derive(Debug, thiserror::Error)]
enum StepError {
    #[error("batch {index} produced a non-finite loss")]
    NonFinite { index: usize },

    #[error(transparent)]
    Ctc(#[from] CtcError),
}

fn loss_for_batch(
    index: usize,
    op: &CtcCost,
    activations: &Array3<f32>,
) -> std::result::Result<f32, StepError> {
    let outputs = op.compute(activations.view(), array![[1, 2]].view(), array![4].view())?;
    let total = outputs.costs.sum();
    if !total.is_finite() {
        return Err(StepError::NonFinite { index });
    }
    Ok(total)
}

fn describe(result: Result<()>) {
    match result {
        Ok(()) => println!("   ok"),
        Err(CtcError::ShapeMismatch {
            what,
            expected,
            actual,
        }) => println!("   shape mismatch on {what}: expected {expected:?}, got {actual:?}"),
        Err(err) if err.is_out_of_memory() => println!("   out of memory: {err}"),
        Err(err) => match err.kernel_status() {
            Some(status) => println!("   kernel status {} ({status}): {err}", status.code()),
            None => println!("   error: {err}"),
        },
    }
}

fn main() {
    println!("=== Error Handling Example ===\n");

    let activations = Array3::<f32>::zeros((4, 1, 5));
    let op = CtcCost::cpu();

    println!("1. Successful batch wrapped in an application error type:");
    match loss_for_batch(0, &op, &activations) {
        Ok(loss) => println!("   loss = {loss:.4}\n"),
        Err(e) => println!("   Error: {e}\n"),
    }

    println!("2. Labels with the wrong batch size:");
    describe(
        op.compute(activations.view(), array![[1], [2]].view(), array![4].view())
            .map(|_| ()),
    );
    println!();

    println!("3. Label outside the alphabet (rejected by the kernel):");
    describe(
        op.compute(activations.view(), array![[9]].view(), array![4].view())
            .map(|_| ()),
    );
    println!();

    println!("4. Unsupported execution location:");
    let gpu = CtcOptions::new().with_location(ComputeLocation::Gpu);
    describe(gpu.validate());
    println!();

    println!("5. Kernel status strings:");
    for status in [
        CtcStatus::MemopsFailed,
        CtcStatus::InvalidValue,
        CtcStatus::ExecutionFailed,
        CtcStatus::UnknownError,
    ] {
        println!("   {} => {status}", status.code());
    }

    println!("\n=== Example Complete ===");
}

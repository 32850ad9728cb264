//! Example: CTC Cost
//!
//! Computes CTC costs and gradients for a small padded batch, reuses the
//! output buffers on a second call, and chains an upstream gradient.
//!
//! Run with:
//!
//! ```bash
//! cargo run --example ctc_cost
//! ```

use ctc_bridge::{scale_gradients, CtcCost, CtcOptions, Result};
use ndarray::{array, Array3, Axis};

fn main() -> Result<()> {
    println!("=== CTC Cost Example ===\n");

    // [time, batch, alphabet]; symbol 0 is blank.
    let activations = Array3::from_shape_fn((6, 3, 5), |(t, b, k)| {
        #[allow(clippy::cast_precision_loss)]
        let x = (t * 5 + b * 2 + k) as f32;
        (x * 0.7).sin()
    });
    // Negative entries are padding; the last item has an empty sequence.
    let labels = array![[1, 2, 3], [4, 4, -1], [-1, -1, -1]];
    let input_lengths = array![6, 5, 2];

    let op = CtcCost::cpu().with_options(CtcOptions::from_env());

    println!("1. First call allocates outputs:");
    let mut costs = None;
    let mut gradients = None;
    op.apply(
        activations.view(),
        labels.view(),
        input_lengths.view(),
        &mut costs,
        &mut gradients,
    )?;
    if let Some(costs) = &costs {
        for (item, cost) in costs.iter().enumerate() {
            println!("   item {item}: cost = {cost:.4}");
        }
    }
    println!();

    println!("2. Second call reuses the same buffers:");
    let before = gradients.as_ref().map(ndarray::ArrayBase::as_ptr);
    op.apply(
        activations.view(),
        labels.view(),
        input_lengths.view(),
        &mut costs,
        &mut gradients,
    )?;
    let after = gradients.as_ref().map(ndarray::ArrayBase::as_ptr);
    println!("   gradient buffer reused: {}\n", before == after);

    println!("3. Chain an upstream gradient of 1/batch:");
    if let Some(gradients) = &gradients {
        let upstream = ndarray::Array1::from_elem(3, 1.0 / 3.0);
        let scaled = scale_gradients(gradients.view(), upstream.view())?;
        for (item, slice) in scaled.axis_iter(Axis(1)).enumerate() {
            let norm = slice.iter().map(|g| g * g).sum::<f32>().sqrt();
            println!("   item {item}: |grad| = {norm:.4}");
        }
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! The CTC cost entry point.
//!
//! [`CtcCost`] wires the pieces together for one call:
//!
//! 1. validate options and the batch dimension of every input
//! 2. populate a [`CtcContext`] with the contiguous activations, packed input
//!    lengths and flattened labels
//! 3. negotiate the cost and gradient output slots
//! 4. size and allocate the kernel workspace, run the kernel
//! 5. release the context
//!
//! Any failure returns immediately; the context releases itself on drop, so
//! nothing it holds outlives the call.
//!
//! ## Example
//!
//! ```rust
//! use ctc_bridge::CtcCost;
//! use ndarray::{array, Array3};
//!
//! let activations = Array3::<f32>::zeros((2, 1, 3)); // [time, batch, alphabet]
//! let labels = array![[1, -1]];                      // -1 is padding
//! let input_lengths = array![2];
//!
//! let outputs = CtcCost::cpu().compute(activations.view(), labels.view(), input_lengths.view())?;
//! assert!((outputs.costs[0] - 3.0f32.ln()).abs() < 1e-5);
//! assert_eq!(outputs.gradients.unwrap().dim(), (2, 1, 3));
//! # Ok::<(), ctc_bridge::CtcError>(())
//! ```

use std::sync::Arc;

use ndarray::{Array1, Array3, ArrayView1, ArrayView2, ArrayView3, Axis};

use crate::bridge::{self, KernelOutputs};
use crate::config::CtcOptions;
use crate::context::CtcContext;
use crate::contiguity::make_contiguous;
use crate::error::{CtcError, Result};
use crate::kernel::CpuCtcKernel;
use crate::labels::flatten_labels;
use crate::lengths::extract_lengths;
use crate::logging::log_cost_summary;
use crate::memory::MemoryTracker;
use crate::outputs::{negotiate_costs, negotiate_gradients};
use crate::traits::{CtcKernel, ValidatableConfig};

/// Freshly allocated results of [`CtcCost::compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct CtcOutputs {
    /// Per-item loss, shape `[batch]`.
    pub costs: Array1<f32>,
    /// Loss gradient with the activation shape; `None` when gradients are off.
    pub gradients: Option<Array3<f32>>,
}

/// CTC loss operation bound to a kernel, options and a memory tracker.
///
/// The operation holds no per-call state; concurrent calls from several
/// threads each build their own context.
#[derive(Debug, Clone)]
pub struct CtcCost<K = CpuCtcKernel> {
    kernel: K,
    options: CtcOptions,
    tracker: Arc<MemoryTracker>,
    compute_grad: bool,
}

impl CtcCost<CpuCtcKernel> {
    /// Operation backed by the CPU reference kernel with default options.
    #[must_use]
    pub fn cpu() -> Self {
        Self::new(CpuCtcKernel::new())
    }
}

impl Default for CtcCost<CpuCtcKernel> {
    fn default() -> Self {
        Self::cpu()
    }
}

impl<K: CtcKernel> CtcCost<K> {
    /// Operation backed by `kernel` with default options, gradients on and an
    /// unlimited tracker.
    #[must_use]
    pub fn new(kernel: K) -> Self {
        Self {
            kernel,
            options: CtcOptions::default(),
            tracker: Arc::new(MemoryTracker::new()),
            compute_grad: true,
        }
    }

    /// Set the kernel options.
    #[must_use]
    pub fn with_options(mut self, options: CtcOptions) -> Self {
        self.options = options;
        self
    }

    /// Charge transient allocations to `tracker`.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<MemoryTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    /// Enable or disable gradient computation.
    #[must_use]
    pub fn with_compute_grad(mut self, compute_grad: bool) -> Self {
        self.compute_grad = compute_grad;
        self
    }

    /// The kernel.
    #[must_use]
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// The kernel options.
    #[must_use]
    pub fn options(&self) -> &CtcOptions {
        &self.options
    }

    /// The tracker transient allocations are charged to.
    #[must_use]
    pub fn tracker(&self) -> &Arc<MemoryTracker> {
        &self.tracker
    }

    /// Whether gradients are computed.
    #[must_use]
    pub fn compute_grad(&self) -> bool {
        self.compute_grad
    }

    /// Compute costs (and gradients) into caller-provided output slots.
    ///
    /// * `activations` - `[time, batch, alphabet]` unnormalized scores
    /// * `labels` - `[batch, max_label_length]`, negative entries are padding
    /// * `input_lengths` - valid time-steps per batch item
    /// * `costs` - reused if it is a contiguous `[batch]` array, replaced otherwise
    /// * `gradients` - reused if it is a contiguous array shaped like
    ///   `activations`, replaced otherwise; untouched when gradients are off
    ///
    /// On error the output slots are in an unspecified state.
    ///
    /// # Errors
    ///
    /// - `CtcError::InvalidConfig` / `NotImplemented` for invalid options
    /// - `CtcError::ShapeMismatch` if labels or input lengths disagree with
    ///   the activation batch size
    /// - `CtcError::OutOfMemory` if any allocation fails
    /// - `CtcError::Kernel` if the kernel rejects the problem or fails
    pub fn apply(
        &self,
        activations: ArrayView3<'_, f32>,
        labels: ArrayView2<'_, i32>,
        input_lengths: ArrayView1<'_, i32>,
        costs: &mut Option<Array1<f32>>,
        gradients: &mut Option<Array3<f32>>,
    ) -> Result<()> {
        self.options.validate()?;

        let (time, batch, alphabet) = activations.dim();
        if labels.nrows() != batch {
            return Err(CtcError::shape_mismatch(
                "labels",
                vec![batch, labels.ncols()],
                labels.shape(),
            ));
        }
        if input_lengths.len() != batch {
            return Err(CtcError::shape_mismatch(
                "input_lengths",
                vec![batch],
                input_lengths.shape(),
            ));
        }
        tracing::debug!(
            target: "ctc_bridge::kernel",
            time,
            batch,
            alphabet,
            max_label_length = labels.ncols(),
            compute_grad = self.compute_grad,
            "ctc cost invocation"
        );

        let tracker = &*self.tracker;
        let mut context = CtcContext::new(self.options.clone(), tracker);

        let borrowed = context.hold_activations(make_contiguous(activations, tracker)?);
        context.hold_input_lengths(extract_lengths(input_lengths, tracker)?);
        context.hold_labels(flatten_labels(labels, tracker)?);

        let cost_data = negotiate_costs(costs, batch, tracker)?;
        let gradient_data = if self.compute_grad {
            Some(negotiate_gradients(
                gradients,
                (time, batch, alphabet),
                tracker,
            )?)
        } else {
            None
        };

        bridge::invoke(
            &self.kernel,
            &mut context,
            borrowed,
            (time, batch, alphabet),
            KernelOutputs {
                costs: cost_data,
                gradients: gradient_data,
            },
        )?;
        context.release();

        if let Some(costs) = costs.as_ref() {
            log_cost_summary(batch, costs.mean().unwrap_or(0.0));
        }
        Ok(())
    }

    /// Compute costs (and gradients) into freshly allocated arrays.
    ///
    /// # Errors
    ///
    /// Same as [`CtcCost::apply`].
    pub fn compute(
        &self,
        activations: ArrayView3<'_, f32>,
        labels: ArrayView2<'_, i32>,
        input_lengths: ArrayView1<'_, i32>,
    ) -> Result<CtcOutputs> {
        let mut costs = None;
        let mut gradients = None;
        self.apply(activations, labels, input_lengths, &mut costs, &mut gradients)?;
        let costs = costs.ok_or_else(|| CtcError::invalid_input("cost output was not produced"))?;
        Ok(CtcOutputs { costs, gradients })
    }
}

/// Compute CTC costs and gradients with the CPU reference kernel.
///
/// # Errors
///
/// Same as [`CtcCost::apply`].
pub fn ctc_cost(
    activations: ArrayView3<'_, f32>,
    labels: ArrayView2<'_, i32>,
    input_lengths: ArrayView1<'_, i32>,
) -> Result<CtcOutputs> {
    CtcCost::cpu().compute(activations, labels, input_lengths)
}

/// Chain an upstream per-item cost gradient through the activation gradient.
///
/// Each batch item's `[time, alphabet]` slice is multiplied by `upstream[b]`.
///
/// # Errors
///
/// Returns `CtcError::ShapeMismatch` if `upstream` does not have one entry
/// per batch item.
pub fn scale_gradients(
    gradients: ArrayView3<'_, f32>,
    upstream: ArrayView1<'_, f32>,
) -> Result<Array3<f32>> {
    let batch = gradients.len_of(Axis(1));
    if upstream.len() != batch {
        return Err(CtcError::shape_mismatch(
            "upstream cost gradient",
            vec![batch],
            upstream.shape(),
        ));
    }
    let mut scaled = gradients.to_owned();
    for (mut item, &scale) in scaled.axis_iter_mut(Axis(1)).zip(upstream.iter()) {
        item *= scale;
    }
    Ok(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_compute_single_item() {
        let activations = Array3::<f32>::zeros((2, 1, 3));
        let outputs = ctc_cost(
            activations.view(),
            array![[1, -1]].view(),
            array![2].view(),
        )
        .unwrap();
        assert_eq!(outputs.costs.dim(), 1);
        assert!((outputs.costs[0] - 3.0f32.ln()).abs() < 1e-5);
        let gradients = outputs.gradients.unwrap();
        assert_eq!(gradients.dim(), (2, 1, 3));
        assert!(gradients.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn test_batch_mismatch_is_rejected_before_allocation() {
        let op = CtcCost::cpu();
        let activations = Array3::<f32>::zeros((2, 2, 3));
        let err = op
            .compute(
                activations.view(),
                array![[1, -1]].view(),
                array![2, 2].view(),
            )
            .unwrap_err();
        assert!(matches!(err, CtcError::ShapeMismatch { what: "labels", .. }));

        let err = op
            .compute(
                activations.view(),
                array![[1], [2]].view(),
                array![2].view(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            CtcError::ShapeMismatch {
                what: "input_lengths",
                ..
            }
        ));
        assert_eq!(op.tracker().peak_bytes(), 0);
    }

    #[test]
    fn test_cost_only_leaves_gradient_slot_untouched() {
        let op = CtcCost::cpu().with_compute_grad(false);
        let activations = Array3::<f32>::zeros((2, 1, 3));
        let mut costs = None;
        let mut gradients = Some(Array3::<f32>::from_elem((9, 9, 9), 5.0));

        op.apply(
            activations.view(),
            array![[1, -1]].view(),
            array![2].view(),
            &mut costs,
            &mut gradients,
        )
        .unwrap();

        assert!((costs.unwrap()[0] - 3.0f32.ln()).abs() < 1e-5);
        assert_eq!(gradients.unwrap().dim(), (9, 9, 9));
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let op = CtcCost::cpu().with_options(CtcOptions::new().with_num_threads(0));
        let activations = Array3::<f32>::zeros((2, 1, 3));
        let err = op
            .compute(activations.view(), array![[1]].view(), array![2].view())
            .unwrap_err();
        assert!(matches!(err, CtcError::InvalidConfig(_)));
    }

    #[test]
    fn test_scale_gradients() {
        let gradients = Array3::<f32>::ones((2, 2, 3));
        let scaled = scale_gradients(gradients.view(), array![2.0, -0.5].view()).unwrap();
        assert!(scaled.index_axis(Axis(1), 0).iter().all(|&g| g == 2.0));
        assert!(scaled.index_axis(Axis(1), 1).iter().all(|&g| g == -0.5));

        let err = scale_gradients(gradients.view(), array![1.0].view()).unwrap_err();
        assert!(matches!(err, CtcError::ShapeMismatch { .. }));
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Kernel invocation: size the workspace, allocate it, run the compute call.
//!
//! Kernel statuses are translated into [`CtcError::Kernel`] in exactly one
//! place, [`check_status`].

use crate::context::CtcContext;
use crate::error::{CtcError, Result};
use crate::kernel::{CtcProblem, CtcStatus};
use crate::traits::CtcKernel;

/// Context message for a failed workspace-size query.
pub const WORKSPACE_QUERY_FAILED: &str = "failed to obtain CTC workspace size";
/// Context message for a failed compute call.
pub const COMPUTE_FAILED: &str = "failed to compute CTC loss function";

/// Translate a kernel result into this crate's error convention.
///
/// # Errors
///
/// Returns `CtcError::Kernel` carrying `context` and the kernel's status.
pub fn check_status<T>(
    result: std::result::Result<T, CtcStatus>,
    context: &'static str,
) -> Result<T> {
    result.map_err(|status| {
        tracing::error!(
            target: "ctc_bridge::kernel",
            code = status.code(),
            %status,
            context,
            "kernel reported failure"
        );
        CtcError::kernel(context, status)
    })
}

/// Output slices the compute call writes into.
#[derive(Debug)]
pub struct KernelOutputs<'o> {
    /// One cost per minibatch item.
    pub costs: &'o mut [f32],
    /// Gradient with the activation layout, `None` for cost-only calls.
    pub gradients: Option<&'o mut [f32]>,
}

/// Run the kernel against a populated context.
///
/// `activations` is the zero-copy activation slice, or `None` when the
/// context holds a contiguous copy. `dims` is `(time, batch, alphabet)`.
///
/// # Errors
///
/// - `CtcError::Kernel` if the workspace query or the compute call fails
/// - `CtcError::OutOfMemory` if the workspace cannot be allocated
pub fn invoke<K: CtcKernel + ?Sized>(
    kernel: &K,
    context: &mut CtcContext<'_>,
    activations: Option<&[f32]>,
    dims: (usize, usize, usize),
    outputs: KernelOutputs<'_>,
) -> Result<()> {
    let (time_steps, minibatch, alphabet_size) = dims;
    let workspace_bytes = {
        let problem = context.problem(time_steps, alphabet_size, minibatch)?;
        check_status(
            kernel.workspace_size(&problem, context.options()),
            WORKSPACE_QUERY_FAILED,
        )?
    };
    tracing::debug!(
        target: "ctc_bridge::kernel",
        workspace_bytes,
        alphabet_size,
        minibatch,
        "workspace sized"
    );

    context.allocate_workspace(workspace_bytes)?;

    let buffers = context.kernel_buffers(activations)?;
    let problem = CtcProblem {
        flat_labels: buffers.flat_labels,
        label_lengths: buffers.label_lengths,
        input_lengths: buffers.input_lengths,
        time_steps,
        alphabet_size,
        minibatch,
    };
    check_status(
        kernel.compute(
            &problem,
            buffers.activations,
            outputs.gradients,
            outputs.costs,
            buffers.workspace,
            buffers.options,
        ),
        COMPUTE_FAILED,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_status_passes_success_through() {
        assert_eq!(check_status(Ok::<_, CtcStatus>(42usize), COMPUTE_FAILED).unwrap(), 42);
    }

    #[test]
    fn test_check_status_composes_message() {
        let err =
            check_status::<()>(Err(CtcStatus::ExecutionFailed), COMPUTE_FAILED).unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to compute CTC loss function | CTC library error message: execution failed"
        );
    }
}

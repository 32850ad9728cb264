// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Reuse-or-reallocate negotiation for the cost and gradient outputs.
//!
//! A caller-supplied buffer is reused untouched when it exists, has exactly
//! the required shape and is in standard layout (the kernel writes through
//! a packed slice). Otherwise the old buffer is dropped and a zero-filled
//! one of the required shape takes its place.

use candle_core::DType;
use ndarray::{Array, Array1, Array3, ArrayBase, Data, Dimension, Ix1, Ix3};

use crate::error::{CtcError, Result};
use crate::memory::{estimate_tensor_bytes, MemoryTracker};

/// Shape and layout of an existing output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    /// Buffer dimensions.
    pub shape: &'a [usize],
    /// Whether the buffer is row-major contiguous.
    pub standard_layout: bool,
}

impl<'a> BufferDescriptor<'a> {
    /// Describe an ndarray buffer.
    #[must_use]
    pub fn of<S, D>(array: &'a ArrayBase<S, D>) -> Self
    where
        S: Data,
        D: Dimension,
    {
        Self {
            shape: array.shape(),
            standard_layout: array.is_standard_layout(),
        }
    }
}

/// What to do with an output slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferDecision {
    /// Keep the existing buffer as is.
    Reuse,
    /// Drop whatever is there and allocate a zeroed buffer.
    Reallocate,
}

/// Decide whether `existing` can serve as an output of shape `required`.
#[must_use]
pub fn decide(existing: Option<BufferDescriptor<'_>>, required: &[usize]) -> BufferDecision {
    match existing {
        Some(desc) if desc.shape == required && desc.standard_layout => BufferDecision::Reuse,
        _ => BufferDecision::Reallocate,
    }
}

/// Negotiate the per-item cost buffer (`[batch]`) and return its packed data.
///
/// # Errors
///
/// Returns `CtcError::OutOfMemory` if a new buffer is needed and cannot be
/// allocated.
pub fn negotiate_costs<'s>(
    slot: &'s mut Option<Array1<f32>>,
    batch: usize,
    tracker: &MemoryTracker,
) -> Result<&'s mut [f32]> {
    negotiate(slot, Ix1(batch), tracker, "could not allocate storage for CTC costs")
}

/// Negotiate the gradient buffer (same shape as the activations) and return
/// its packed data.
///
/// # Errors
///
/// Returns `CtcError::OutOfMemory` if a new buffer is needed and cannot be
/// allocated.
pub fn negotiate_gradients<'s>(
    slot: &'s mut Option<Array3<f32>>,
    activation_dim: (usize, usize, usize),
    tracker: &MemoryTracker,
) -> Result<&'s mut [f32]> {
    let (time, batch, alphabet) = activation_dim;
    negotiate(
        slot,
        Ix3(time, batch, alphabet),
        tracker,
        "could not allocate storage for CTC gradients",
    )
}

fn negotiate<'s, D: Dimension>(
    slot: &'s mut Option<Array<f32, D>>,
    required: D,
    tracker: &MemoryTracker,
    what: &'static str,
) -> Result<&'s mut [f32]> {
    let decision = decide(slot.as_ref().map(BufferDescriptor::of), required.slice());
    tracing::debug!(
        target: "ctc_bridge::memory",
        output = what,
        ?decision,
        shape = ?required.slice(),
        "negotiated output buffer"
    );

    if decision == BufferDecision::Reallocate {
        // Release the caller's buffer before allocating its replacement.
        *slot = None;
        let len = required.size();
        debug_assert_eq!(
            len * std::mem::size_of::<f32>(),
            estimate_tensor_bytes(required.slice(), DType::F32)
        );
        let data = tracker.try_alloc_untracked(len, 0.0f32, what)?;
        *slot = Some(Array::from_shape_vec(required, data)?);
    }

    slot.as_mut()
        .and_then(|array| array.as_slice_mut())
        .ok_or_else(|| CtcError::invalid_input(format!("{what}: output is not contiguous")))
}

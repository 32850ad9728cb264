// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Row-major contiguity for the activation buffer.
//!
//! The kernel reads activations as one packed `[time, batch, alphabet]`
//! slice. A view that is already in standard layout is passed through
//! without copying; any other layout (transposed, stepped, reversed) is
//! copied element by element in logical order into a tracked buffer.

use ndarray::ArrayView3;

use crate::error::Result;
use crate::memory::{MemoryTracker, TrackedBuffer};

/// Activations in the layout the kernel expects.
#[derive(Debug)]
pub enum ContiguousActivations<'a, 't> {
    /// Zero-copy view over the caller's data.
    Borrowed(&'a [f32]),
    /// Owned row-major copy, charged to the tracker.
    Copied(TrackedBuffer<'t, f32>),
}

impl ContiguousActivations<'_, '_> {
    /// The packed activation values.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        match self {
            Self::Borrowed(data) => data,
            Self::Copied(buffer) => buffer,
        }
    }

    /// Whether a copy had to be made.
    #[must_use]
    pub fn is_copy(&self) -> bool {
        matches!(self, Self::Copied(_))
    }
}

/// Make `activations` row-major contiguous.
///
/// # Errors
///
/// Returns `CtcError::OutOfMemory` if the contiguous copy cannot be allocated.
pub fn make_contiguous<'a, 't>(
    activations: ArrayView3<'a, f32>,
    tracker: &'t MemoryTracker,
) -> Result<ContiguousActivations<'a, 't>> {
    if let Some(data) = activations.to_slice() {
        return Ok(ContiguousActivations::Borrowed(data));
    }

    tracing::debug!(
        target: "ctc_bridge::memory",
        shape = ?activations.shape(),
        strides = ?activations.strides(),
        "copying non-contiguous activations"
    );
    let copy = tracker.try_collect(
        activations.iter().copied(),
        "could not create a contiguous copy of activations array",
    )?;
    Ok(ContiguousActivations::Copied(copy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{s, Array3, Axis};

    fn sample() -> Array3<f32> {
        Array3::from_shape_fn((3, 2, 4), |(t, b, k)| (t * 100 + b * 10 + k) as f32)
    }

    #[test]
    fn test_contiguous_input_is_borrowed() {
        let tracker = MemoryTracker::new();
        let array = sample();
        let adapted = make_contiguous(array.view(), &tracker).unwrap();

        assert!(!adapted.is_copy());
        assert_eq!(adapted.as_slice().as_ptr(), array.as_ptr());
        assert_eq!(tracker.allocated_bytes(), 0);
    }

    #[test]
    fn test_transposed_input_is_copied_in_logical_order() {
        let tracker = MemoryTracker::new();
        let base = Array3::from_shape_fn((2, 3, 4), |(b, t, k)| (b + t * 7 + k * 13) as f32);
        // [batch, time, alphabet] -> [time, batch, alphabet]
        let view = base.view().permuted_axes([1, 0, 2]);
        assert!(view.to_slice().is_none());

        let adapted = make_contiguous(view, &tracker).unwrap();
        assert!(adapted.is_copy());
        assert_eq!(tracker.allocated_bytes(), 3 * 2 * 4 * 4);

        let expected: Vec<f32> = view.iter().copied().collect();
        assert_eq!(adapted.as_slice(), expected.as_slice());
        assert_eq!(adapted.as_slice()[4], view[[0, 1, 0]]);

        drop(adapted);
        assert_eq!(tracker.allocated_bytes(), 0);
    }

    #[test]
    fn test_stepped_and_reversed_views_are_copied() {
        let tracker = MemoryTracker::new();
        let array = sample();
        let stepped = array.slice(s![.., .., ..;2]);
        let adapted = make_contiguous(stepped, &tracker).unwrap();
        assert!(adapted.is_copy());
        assert_eq!(adapted.as_slice()[..2], [0.0, 2.0]);

        let mut reversed = array.view();
        reversed.invert_axis(Axis(0));
        let adapted = make_contiguous(reversed, &tracker).unwrap();
        assert_eq!(adapted.as_slice()[0], 200.0);
    }

    #[test]
    fn test_copy_failure_reports_oom() {
        let tracker = MemoryTracker::with_limit(8);
        let array = sample();
        let view = array.view().permuted_axes([1, 0, 2]);
        let err = make_contiguous(view, &tracker).unwrap_err();
        assert!(err.is_out_of_memory());
        assert!(err.to_string().contains("contiguous copy"));
        assert_eq!(tracker.allocated_bytes(), 0);
    }
}

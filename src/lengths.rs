// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Packed copy of the per-item input length vector.

use ndarray::ArrayView1;

use crate::error::Result;
use crate::memory::{MemoryTracker, TrackedBuffer};

/// Copy `lengths` into a tightly packed buffer, one entry per batch item.
///
/// Entries are read by index, so strided sources are handled.
///
/// # Errors
///
/// Returns `CtcError::OutOfMemory` if the buffer cannot be allocated.
pub fn extract_lengths<'t>(
    lengths: ArrayView1<'_, i32>,
    tracker: &'t MemoryTracker,
) -> Result<TrackedBuffer<'t, i32>> {
    let count = lengths.len();
    let mut packed =
        tracker.try_alloc(count, 0i32, "could not allocate storage for input lengths")?;
    for (idx, slot) in packed.iter_mut().enumerate() {
        *slot = lengths[idx];
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, s};

    #[test]
    fn test_contiguous_lengths_are_copied() {
        let tracker = MemoryTracker::new();
        let lengths = array![5, 3, 9];
        let packed = extract_lengths(lengths.view(), &tracker).unwrap();
        assert_eq!(&*packed, &[5, 3, 9]);
        assert_eq!(tracker.allocated_bytes(), 12);
    }

    #[test]
    fn test_strided_lengths_are_packed() {
        let tracker = MemoryTracker::new();
        let source = array![7, -1, 4, -1, 2, -1];
        let strided = source.slice(s![..;2]);
        let packed = extract_lengths(strided, &tracker).unwrap();
        assert_eq!(&*packed, &[7, 4, 2]);
    }

    #[test]
    fn test_column_of_matrix_is_packed() {
        let tracker = MemoryTracker::new();
        let table = array![[10, 0], [20, 0], [30, 0]];
        let packed = extract_lengths(table.column(0), &tracker).unwrap();
        assert_eq!(&*packed, &[10, 20, 30]);
    }

    #[test]
    fn test_allocation_failure_reports_oom() {
        let tracker = MemoryTracker::with_limit(4);
        let lengths = array![1, 2];
        let err = extract_lengths(lengths.view(), &tracker).unwrap_err();
        assert!(err.to_string().contains("input lengths"));
        assert_eq!(tracker.allocated_bytes(), 0);
    }
}

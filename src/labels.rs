// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Flattening of the padded label matrix.
//!
//! Rows are batch items and columns label slots. Any negative entry is
//! padding and is skipped wherever it sits in the row, not only at the end.
//! The remaining entries are concatenated row by row in column order.

use ndarray::ArrayView2;

use crate::error::Result;
use crate::memory::{MemoryTracker, TrackedBuffer};

/// Concatenated labels plus the number each row contributed.
#[derive(Debug)]
pub struct FlatLabels<'t> {
    /// Upper-bound sized (`rows × cols`); only the first `total` slots are used.
    labels: TrackedBuffer<'t, i32>,
    lengths: TrackedBuffer<'t, i32>,
    total: usize,
}

impl<'t> FlatLabels<'t> {
    /// Valid labels of every row, concatenated.
    #[must_use]
    pub fn labels(&self) -> &[i32] {
        &self.labels[..self.total]
    }

    /// Number of valid labels per row.
    #[must_use]
    pub fn lengths(&self) -> &[i32] {
        &self.lengths
    }

    /// Total number of valid labels.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Labels of row `row`, if it exists.
    #[must_use]
    pub fn row(&self, row: usize) -> Option<&[i32]> {
        let len = usize::try_from(*self.lengths.get(row)?).ok()?;
        let start: usize = self.lengths[..row]
            .iter()
            .map(|&n| usize::try_from(n).unwrap_or(0))
            .sum();
        self.labels().get(start..start + len)
    }

    pub(crate) fn into_parts(self) -> (TrackedBuffer<'t, i32>, TrackedBuffer<'t, i32>, usize) {
        (self.labels, self.lengths, self.total)
    }
}

/// Flatten `labels`, dropping negative (padding) entries.
///
/// # Errors
///
/// Returns `CtcError::OutOfMemory` if either array cannot be allocated. The
/// length array is only requested once the label array exists, and a failed
/// length allocation releases the label array before the error is returned.
pub fn flatten_labels<'t>(
    labels: ArrayView2<'_, i32>,
    tracker: &'t MemoryTracker,
) -> Result<FlatLabels<'t>> {
    let (rows, cols) = labels.dim();

    let mut flat = tracker.try_alloc(
        rows * cols,
        0i32,
        "could not allocate storage for flattened labels",
    )?;
    // `flat` drops (and is refunded) if this fails.
    let mut lengths =
        tracker.try_alloc(rows, 0i32, "could not allocate storage for label lengths")?;

    let mut next = 0usize;
    for (row, row_len) in labels.rows().into_iter().zip(lengths.iter_mut()) {
        let mut count = 0i32;
        for &label in &row {
            if label >= 0 {
                flat[next] = label;
                next += 1;
                count += 1;
            }
        }
        *row_len = count;
    }

    Ok(FlatLabels {
        labels: flat,
        lengths,
        total: next,
    })
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Memory accounting for the transient buffers of a CTC invocation.
//!
//! Every buffer an invocation owns (contiguous activation copy, length
//! arrays, flattened labels, kernel workspace) is a [`TrackedBuffer`]: it is
//! allocated fallibly, charged to a [`MemoryTracker`] when created and
//! refunded when dropped. A tracker with a limit turns "the allocator
//! refused" into a deterministic, testable event.
//!
//! - **No global state**: `MemoryTracker` is an explicit struct, shared by
//!   reference. Independent invocations may share one tracker or use their own.
//! - **Exact accounting**: the tracker is charged the byte size of each
//!   element array, with no overhead factor. After an invocation returns,
//!   `allocated_bytes()` is back where it started.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use candle_core::DType;

use crate::error::{CtcError, Result};

/// Estimate the memory required to store a tensor with given shape and dtype.
///
/// ```rust
/// use ctc_bridge::estimate_tensor_bytes;
/// use candle_core::DType;
///
/// // [time, batch, alphabet] activations
/// let bytes = estimate_tensor_bytes(&[50, 8, 29], DType::F32);
/// assert_eq!(bytes, 50 * 8 * 29 * 4);
/// ```
#[must_use]
pub fn estimate_tensor_bytes(shape: &[usize], dtype: DType) -> usize {
    let numel: usize = shape.iter().product();
    numel * dtype.size_in_bytes()
}

/// Estimate the transient bytes one invocation holds before the kernel
/// workspace is sized.
///
/// ## Arguments
///
/// * `activation_shape` - `[time, batch, alphabet]`
/// * `label_shape` - `[batch, max_label_length]`
/// * `activations_contiguous` - whether the activations can be passed without a copy
///
/// ## Memory Breakdown
///
/// - Activation copy: `time × batch × alphabet` f32, only when not contiguous
/// - Input lengths: `batch` i32
/// - Flattened labels: `batch × max_label_length` i32 (upper bound)
/// - Label lengths: `batch` i32
#[must_use]
pub fn estimate_invocation_bytes(
    activation_shape: [usize; 3],
    label_shape: [usize; 2],
    activations_contiguous: bool,
) -> usize {
    let [_, batch, _] = activation_shape;
    let copy = if activations_contiguous {
        0
    } else {
        estimate_tensor_bytes(&activation_shape, DType::F32)
    };
    let lengths = 2 * estimate_tensor_bytes(&[batch], DType::U32);
    let labels = estimate_tensor_bytes(&label_shape, DType::U32);
    copy + lengths + labels
}

/// Memory usage tracker. Thread-safe via atomics.
///
/// ## Usage Pattern
///
/// ```rust
/// use ctc_bridge::MemoryTracker;
///
/// let tracker = MemoryTracker::with_limit(1024);
/// {
///     let lengths = tracker.try_alloc(16, 0i32, "input lengths")?;
///     assert_eq!(tracker.allocated_bytes(), 64);
///     assert_eq!(lengths.len(), 16);
/// }
/// assert_eq!(tracker.allocated_bytes(), 0);
/// assert!(tracker.try_alloc(1024, 0.0f32, "workspace").is_err());
/// # Ok::<(), ctc_bridge::CtcError>(())
/// ```
#[derive(Debug)]
pub struct MemoryTracker {
    /// Currently allocated bytes.
    allocated: AtomicUsize,
    /// Peak allocation during lifetime.
    peak: AtomicUsize,
    /// Memory limit (0 = unlimited).
    limit: usize,
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTracker {
    /// Create a new memory tracker with no limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(0)
    }

    /// Create a tracker that refuses allocations beyond `limit_bytes`
    /// (0 = unlimited).
    #[must_use]
    pub fn with_limit(limit_bytes: usize) -> Self {
        Self {
            allocated: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            limit: limit_bytes,
        }
    }

    /// Charge `bytes` unless that would take the total past the limit.
    fn charge(&self, bytes: usize, what: &str) -> Result<()> {
        let limit = self.limit;
        let mut current = self.allocated.load(Ordering::SeqCst);
        let actual_new = loop {
            let new_allocated = current.saturating_add(bytes);
            if limit > 0 && new_allocated > limit {
                return Err(CtcError::oom(format!(
                    "{what}: {bytes} bytes would exceed limit of {limit} bytes \
                     (current: {current} bytes)"
                )));
            }
            match self.allocated.compare_exchange_weak(
                current,
                new_allocated,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break new_allocated,
                Err(observed) => current = observed,
            }
        };

        self.peak.fetch_max(actual_new, Ordering::SeqCst);
        Ok(())
    }

    /// Refund a charge. Only [`TrackedBuffer`] and a failed reservation
    /// refund, each exactly what it was charged.
    fn refund(&self, bytes: usize) {
        let _ = self
            .allocated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(bytes))
            });
    }

    /// Get currently allocated bytes.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    /// Get peak allocation during tracker lifetime.
    #[must_use]
    pub fn peak_bytes(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Get configured memory limit (0 = unlimited).
    #[must_use]
    pub fn limit_bytes(&self) -> usize {
        self.limit
    }

    /// Check if an allocation would fit within limits.
    #[must_use]
    pub fn would_fit(&self, bytes: usize) -> bool {
        let limit = self.limit;
        if limit == 0 {
            return true;
        }
        self.allocated
            .load(Ordering::SeqCst)
            .checked_add(bytes)
            .is_some_and(|total| total <= limit)
    }

    /// Allocate `len` elements initialised to `fill`, charged to this tracker.
    ///
    /// # Errors
    ///
    /// Returns `CtcError::OutOfMemory` naming `what` if the tracker limit or
    /// the system allocator refuses the request.
    pub fn try_alloc<T: Clone>(
        &self,
        len: usize,
        fill: T,
        what: &str,
    ) -> Result<TrackedBuffer<'_, T>> {
        let (mut data, bytes) = self.reserve::<T>(len, what)?;
        data.resize(len, fill);
        Ok(TrackedBuffer {
            data,
            bytes,
            tracker: self,
        })
    }

    /// Collect an exact-size iterator into a buffer charged to this tracker.
    ///
    /// # Errors
    ///
    /// Returns `CtcError::OutOfMemory` naming `what` if the tracker limit or
    /// the system allocator refuses the request.
    pub fn try_collect<T, I>(&self, iter: I, what: &str) -> Result<TrackedBuffer<'_, T>>
    where
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        let iter = iter.into_iter();
        let (mut data, bytes) = self.reserve::<T>(iter.len(), what)?;
        data.extend(iter);
        Ok(TrackedBuffer {
            data,
            bytes,
            tracker: self,
        })
    }

    /// Fallible untracked allocation for buffers that leave the invocation
    /// (host-owned outputs). Fails if the tracker's remaining budget could
    /// not hold them.
    pub(crate) fn try_alloc_untracked<T: Clone>(
        &self,
        len: usize,
        fill: T,
        what: &str,
    ) -> Result<Vec<T>> {
        let bytes = byte_len::<T>(len, what)?;
        if !self.would_fit(bytes) {
            return Err(CtcError::oom(format!(
                "{what}: {bytes} bytes do not fit the remaining budget of {} bytes",
                self.limit_bytes().saturating_sub(self.allocated_bytes())
            )));
        }
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|err| CtcError::oom(format!("{what}: {err}")))?;
        data.resize(len, fill);
        Ok(data)
    }

    fn reserve<T>(&self, len: usize, what: &str) -> Result<(Vec<T>, usize)> {
        let bytes = byte_len::<T>(len, what)?;
        self.charge(bytes, what)?;

        let mut data = Vec::new();
        if let Err(err) = data.try_reserve_exact(len) {
            self.refund(bytes);
            return Err(CtcError::oom(format!("{what}: {err}")));
        }
        tracing::trace!(target: "ctc_bridge::memory", what, bytes, "allocated");
        Ok((data, bytes))
    }
}

fn byte_len<T>(len: usize, what: &str) -> Result<usize> {
    len.checked_mul(std::mem::size_of::<T>())
        .ok_or_else(|| CtcError::oom(format!("{what}: size of {len} elements overflows usize")))
}

/// Heap buffer charged to a [`MemoryTracker`] for as long as it lives.
///
/// Dropping the buffer frees it and refunds the tracker. Ownership makes a
/// second release impossible.
#[derive(Debug)]
pub struct TrackedBuffer<'t, T> {
    data: Vec<T>,
    bytes: usize,
    tracker: &'t MemoryTracker,
}

impl<T> TrackedBuffer<'_, T> {
    /// Bytes charged to the tracker.
    #[must_use]
    pub fn bytes(&self) -> usize {
        self.bytes
    }
}

impl<T> Deref for TrackedBuffer<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for TrackedBuffer<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for TrackedBuffer<'_, T> {
    fn drop(&mut self) {
        self.tracker.refund(self.bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_tensor_bytes() {
        assert_eq!(estimate_tensor_bytes(&[10, 100], DType::F32), 4000);
        assert_eq!(estimate_tensor_bytes(&[10, 100], DType::F16), 2000);
        assert_eq!(estimate_tensor_bytes(&[0], DType::F32), 0);
    }

    #[test]
    fn test_estimate_invocation_bytes() {
        // lengths: 2 * 2 * 4, labels: 2 * 3 * 4
        assert_eq!(estimate_invocation_bytes([4, 2, 5], [2, 3], true), 16 + 24);
        // plus the activation copy: 4 * 2 * 5 * 4
        assert_eq!(
            estimate_invocation_bytes([4, 2, 5], [2, 3], false),
            160 + 16 + 24
        );
    }

    #[test]
    fn test_memory_tracker_limit() {
        let tracker = MemoryTracker::with_limit(1000);

        let first = tracker.try_alloc(500, 0u8, "first").unwrap();
        assert_eq!(tracker.allocated_bytes(), 500);

        let second = tracker.try_alloc(400, 0u8, "second").unwrap();
        assert_eq!(tracker.allocated_bytes(), 900);

        // Exceeds limit
        assert!(tracker.try_alloc(200, 0u8, "third").is_err());
        assert_eq!(tracker.allocated_bytes(), 900);

        drop(second);
        assert_eq!(tracker.allocated_bytes(), 500);

        assert!(tracker.try_alloc(200, 0u8, "third").is_ok());
        drop(first);
        assert_eq!(tracker.allocated_bytes(), 0);
    }

    #[test]
    fn test_memory_tracker_peak() {
        let tracker = MemoryTracker::new();

        let small = tracker.try_alloc(100, 0u8, "small").unwrap();
        let medium = tracker.try_alloc(200, 0u8, "medium").unwrap();
        assert_eq!(tracker.peak_bytes(), 300);

        drop(medium);
        assert_eq!(tracker.allocated_bytes(), 100);
        assert_eq!(tracker.peak_bytes(), 300);

        let _large = tracker.try_alloc(300, 0u8, "large").unwrap();
        assert_eq!(tracker.peak_bytes(), 400);
        drop(small);
    }

    #[test]
    fn test_would_fit() {
        let tracker = MemoryTracker::with_limit(1000);
        let _held = tracker.try_alloc(500, 0u8, "held").unwrap();

        assert!(tracker.would_fit(500));
        assert!(!tracker.would_fit(501));
        assert!(!tracker.would_fit(usize::MAX));

        let unlimited = MemoryTracker::new();
        assert!(unlimited.would_fit(usize::MAX));
    }

    #[test]
    fn test_limit_holds_under_concurrent_charges() {
        let tracker = MemoryTracker::with_limit(100);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..500 {
                        if let Ok(buffer) = tracker.try_alloc(30, 0u8, "scratch") {
                            assert!(tracker.allocated_bytes() <= 100);
                            drop(buffer);
                        }
                    }
                });
            }
        });
        assert!(tracker.peak_bytes() <= 100);
        assert!(tracker.peak_bytes() >= 30);
        assert_eq!(tracker.allocated_bytes(), 0);
    }

    #[test]
    fn test_tracked_buffer_refunds_on_drop() {
        let tracker = MemoryTracker::new();
        let buffer = tracker.try_alloc(8, 1.5f32, "scratch").unwrap();
        assert_eq!(buffer.bytes(), 32);
        assert_eq!(tracker.allocated_bytes(), 32);
        assert!(buffer.iter().all(|&v| (v - 1.5).abs() < f32::EPSILON));

        drop(buffer);
        assert_eq!(tracker.allocated_bytes(), 0);
        assert_eq!(tracker.peak_bytes(), 32);
    }

    #[test]
    fn test_try_collect_preserves_order() {
        let tracker = MemoryTracker::new();
        let buffer = tracker.try_collect(vec![3, 1, 2], "labels").unwrap();
        assert_eq!(&*buffer, &[3, 1, 2]);
        assert_eq!(tracker.allocated_bytes(), 12);
    }

    #[test]
    fn test_limit_failure_names_allocation_and_charges_nothing() {
        let tracker = MemoryTracker::with_limit(16);
        let err = tracker
            .try_alloc(5, 0i32, "could not allocate storage for input lengths")
            .unwrap_err();
        assert!(err.is_out_of_memory());
        assert!(err.to_string().contains("input lengths"));
        assert_eq!(tracker.allocated_bytes(), 0);
    }

    #[test]
    fn test_untracked_allocation_respects_budget() {
        let tracker = MemoryTracker::with_limit(64);
        let _held = tracker.try_alloc(8, 0u8, "held").unwrap();

        let data = tracker.try_alloc_untracked(14, 0.0f32, "costs").unwrap();
        assert_eq!(data.len(), 14);
        assert_eq!(tracker.allocated_bytes(), 8);

        assert!(tracker.try_alloc_untracked(15, 0.0f32, "costs").is_err());
    }
}

// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Per-invocation owner of every transient allocation.
//!
//! A [`CtcContext`] moves through three states:
//!
//! ```text
//! Initialized --(hold_* / allocate_workspace)--> Populated --(release / drop)--> Released
//! ```
//!
//! Every field is an optional [`TrackedBuffer`], so releasing is just taking
//! the options: a released field cannot be freed twice, and calling
//! [`CtcContext::release`] again is a no-op. `Drop` releases, so every
//! return path of an invocation (success, `?` on an allocation failure, a
//! kernel error) leaves nothing outstanding.

use crate::config::CtcOptions;
use crate::contiguity::ContiguousActivations;
use crate::error::{CtcError, Result};
use crate::kernel::CtcProblem;
use crate::labels::FlatLabels;
use crate::logging::log_memory_usage;
use crate::memory::{MemoryTracker, TrackedBuffer};

/// Lifecycle state of a [`CtcContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Nothing allocated yet.
    Initialized,
    /// At least one buffer is held.
    Populated,
    /// All buffers have been freed.
    Released,
}

/// Borrowed view of everything the compute call reads or scribbles on.
#[derive(Debug)]
pub(crate) struct KernelBuffers<'c> {
    pub activations: &'c [f32],
    pub flat_labels: &'c [i32],
    pub label_lengths: &'c [i32],
    pub input_lengths: &'c [i32],
    pub workspace: &'c mut [u8],
    pub options: &'c CtcOptions,
}

/// Owner of the transient state of one CTC invocation.
#[derive(Debug)]
pub struct CtcContext<'t> {
    options: CtcOptions,
    tracker: &'t MemoryTracker,
    /// Backed by `f32` words so the kernel can reinterpret it without
    /// alignment trouble; `workspace_bytes` is what the kernel asked for.
    workspace: Option<TrackedBuffer<'t, f32>>,
    workspace_bytes: usize,
    input_lengths: Option<TrackedBuffer<'t, i32>>,
    flat_labels: Option<TrackedBuffer<'t, i32>>,
    label_total: usize,
    label_lengths: Option<TrackedBuffer<'t, i32>>,
    activations_copy: Option<TrackedBuffer<'t, f32>>,
    released: bool,
}

impl<'t> CtcContext<'t> {
    /// Create an empty context charging allocations to `tracker`.
    #[must_use]
    pub fn new(options: CtcOptions, tracker: &'t MemoryTracker) -> Self {
        Self {
            options,
            tracker,
            workspace: None,
            workspace_bytes: 0,
            input_lengths: None,
            flat_labels: None,
            label_total: 0,
            label_lengths: None,
            activations_copy: None,
            released: false,
        }
    }

    /// Kernel options for this invocation.
    #[must_use]
    pub fn options(&self) -> &CtcOptions {
        &self.options
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ContextState {
        if self.released {
            ContextState::Released
        } else if self.workspace.is_none()
            && self.input_lengths.is_none()
            && self.flat_labels.is_none()
            && self.label_lengths.is_none()
            && self.activations_copy.is_none()
        {
            ContextState::Initialized
        } else {
            ContextState::Populated
        }
    }

    /// Bytes currently held by this context.
    #[must_use]
    pub fn held_bytes(&self) -> usize {
        [
            self.workspace.as_ref().map(TrackedBuffer::bytes),
            self.input_lengths.as_ref().map(TrackedBuffer::bytes),
            self.flat_labels.as_ref().map(TrackedBuffer::bytes),
            self.label_lengths.as_ref().map(TrackedBuffer::bytes),
            self.activations_copy.as_ref().map(TrackedBuffer::bytes),
        ]
        .into_iter()
        .flatten()
        .sum()
    }

    /// Take ownership of a contiguous activation copy, if one was made.
    ///
    /// Returns the zero-copy slice when no copy was needed.
    pub fn hold_activations<'a>(
        &mut self,
        activations: ContiguousActivations<'a, 't>,
    ) -> Option<&'a [f32]> {
        debug_assert!(!self.released, "context reused after release");
        match activations {
            ContiguousActivations::Borrowed(data) => Some(data),
            ContiguousActivations::Copied(copy) => {
                self.activations_copy = Some(copy);
                None
            }
        }
    }

    /// Take ownership of the packed input lengths.
    pub fn hold_input_lengths(&mut self, lengths: TrackedBuffer<'t, i32>) {
        debug_assert!(!self.released, "context reused after release");
        self.input_lengths = Some(lengths);
    }

    /// Take ownership of the flattened labels and their lengths.
    pub fn hold_labels(&mut self, labels: FlatLabels<'t>) {
        debug_assert!(!self.released, "context reused after release");
        let (flat, lengths, total) = labels.into_parts();
        self.flat_labels = Some(flat);
        self.label_lengths = Some(lengths);
        self.label_total = total;
    }

    /// Allocate `bytes` of kernel scratch.
    ///
    /// # Errors
    ///
    /// Returns `CtcError::OutOfMemory` if the workspace cannot be allocated.
    pub fn allocate_workspace(&mut self, bytes: usize) -> Result<()> {
        debug_assert!(!self.released, "context reused after release");
        let words = bytes.div_ceil(std::mem::size_of::<f32>());
        let workspace = self.tracker.try_alloc(
            words,
            0.0f32,
            "failed to allocate memory for CTC workspace",
        )?;
        self.workspace = Some(workspace);
        self.workspace_bytes = bytes;
        Ok(())
    }

    /// Problem description built from the held label and length arrays.
    ///
    /// # Errors
    ///
    /// Returns `CtcError::InvalidInput` if labels or lengths are not held yet.
    pub fn problem(
        &self,
        time_steps: usize,
        alphabet_size: usize,
        minibatch: usize,
    ) -> Result<CtcProblem<'_>> {
        let (flat_labels, label_lengths, input_lengths) = self.label_arrays()?;
        Ok(CtcProblem {
            flat_labels,
            label_lengths,
            input_lengths,
            time_steps,
            alphabet_size,
            minibatch,
        })
    }

    fn label_arrays(&self) -> Result<(&[i32], &[i32], &[i32])> {
        match (&self.flat_labels, &self.label_lengths, &self.input_lengths) {
            (Some(flat), Some(lengths), Some(inputs)) => {
                Ok((&flat[..self.label_total], &lengths[..], &inputs[..]))
            }
            _ => Err(CtcError::invalid_input(
                "labels and input lengths must be held before the kernel is queried",
            )),
        }
    }

    /// Split the context into the buffers the compute call needs.
    ///
    /// `borrowed` is the zero-copy activation slice returned by
    /// [`CtcContext::hold_activations`], if any.
    pub(crate) fn kernel_buffers<'c>(
        &'c mut self,
        borrowed: Option<&'c [f32]>,
    ) -> Result<KernelBuffers<'c>> {
        let Self {
            options,
            workspace,
            workspace_bytes,
            input_lengths,
            flat_labels,
            label_total,
            label_lengths,
            activations_copy,
            ..
        } = self;

        let activations = borrowed
            .or(activations_copy.as_deref())
            .ok_or_else(|| CtcError::invalid_input("context holds no activations"))?;
        let (Some(flat), Some(lengths), Some(inputs)) = (
            flat_labels.as_deref(),
            label_lengths.as_deref(),
            input_lengths.as_deref(),
        ) else {
            return Err(CtcError::invalid_input(
                "labels and input lengths must be held before the kernel runs",
            ));
        };
        let words = workspace.as_deref_mut().ok_or_else(|| {
            CtcError::invalid_input("workspace must be allocated before the kernel runs")
        })?;
        let workspace: &mut [u8] = bytemuck::cast_slice_mut(words);

        Ok(KernelBuffers {
            activations,
            flat_labels: &flat[..*label_total],
            label_lengths: lengths,
            input_lengths: inputs,
            workspace: &mut workspace[..*workspace_bytes],
            options,
        })
    }

    /// Free every held buffer. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        let held = self.held_bytes();
        self.workspace = None;
        self.workspace_bytes = 0;
        self.input_lengths = None;
        self.flat_labels = None;
        self.label_total = 0;
        self.label_lengths = None;
        self.activations_copy = None;
        self.released = true;

        tracing::trace!(target: "ctc_bridge::memory", released_bytes = held, "context released");
        log_memory_usage(
            self.tracker.allocated_bytes(),
            self.tracker.peak_bytes(),
            "ctc context released",
        );
    }
}

impl Drop for CtcContext<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

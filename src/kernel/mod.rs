// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! The kernel boundary: problem description, status codes and the CPU
//! reference kernel.

mod cpu;

pub use cpu::CpuCtcKernel;

use thiserror::Error;

/// Failure status returned by a CTC kernel. Success is `Ok(..)`.
///
/// The display string is the kernel's own status message.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CtcStatus {
    /// A memory copy or memset inside the kernel failed.
    #[error("memcpy or memset failed")]
    MemopsFailed,
    /// The problem description or a buffer was rejected.
    #[error("invalid value")]
    InvalidValue,
    /// The computation itself failed.
    #[error("execution failed")]
    ExecutionFailed,
    /// Anything else.
    #[error("unknown error")]
    UnknownError,
}

impl CtcStatus {
    /// Numeric status code, success being `0`.
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            Self::MemopsFailed => 1,
            Self::InvalidValue => 2,
            Self::ExecutionFailed => 3,
            Self::UnknownError => 4,
        }
    }

    /// Map a numeric status code back to a result.
    ///
    /// # Errors
    ///
    /// Any non-zero code is a failure; codes outside the known range map to
    /// [`CtcStatus::UnknownError`].
    pub fn from_code(code: i32) -> Result<(), Self> {
        match code {
            0 => Ok(()),
            1 => Err(Self::MemopsFailed),
            2 => Err(Self::InvalidValue),
            3 => Err(Self::ExecutionFailed),
            _ => Err(Self::UnknownError),
        }
    }
}

/// Everything about one minibatch except the float buffers.
///
/// `flat_labels` is the row-major concatenation of every item's labels and
/// `label_lengths[b]` says how many of them belong to item `b`.
#[derive(Debug, Clone, Copy)]
pub struct CtcProblem<'a> {
    /// Concatenated label sequences.
    pub flat_labels: &'a [i32],
    /// Label count per minibatch item.
    pub label_lengths: &'a [i32],
    /// Valid time-steps per minibatch item.
    pub input_lengths: &'a [i32],
    /// Time-steps in the activation buffer; no input length may exceed it.
    pub time_steps: usize,
    /// Symbols per time-step, blank included.
    pub alphabet_size: usize,
    /// Number of minibatch items.
    pub minibatch: usize,
}

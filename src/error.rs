// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Error types for CTC marshalling and kernel invocation.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CtcError
//! ├── InvalidConfig    - Option validation failures
//! ├── ShapeMismatch    - Host arrays disagree on batch/shape
//! ├── InvalidInput     - Host data the layer cannot marshal
//! ├── OutOfMemory      - Any transient or output allocation failed
//! ├── Kernel           - The external kernel returned a failure status
//! ├── NotImplemented   - Requested execution path is not available
//! ├── Shape            - ndarray shape construction errors
//! └── Candle           - Underlying Candle errors (tensor interop)
//! ```
//!
//! Every variant is fatal to the invocation that produced it. Nothing in this
//! crate retries.

use thiserror::Error;

use crate::kernel::CtcStatus;

/// Result type alias for ctc-bridge operations.
pub type Result<T> = std::result::Result<T, CtcError>;

/// Errors raised while marshalling buffers or invoking the CTC kernel.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum CtcError {
    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Host array shapes are incompatible with each other.
    #[error("shape mismatch for {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Which input disagreed.
        what: &'static str,
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape received.
        actual: Vec<usize>,
    },

    /// Host data that cannot be handed to the kernel.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Descriptive error message.
        message: String,
    },

    /// Out of memory.
    ///
    /// The message names the allocation that failed.
    #[error("out of memory: {message}")]
    OutOfMemory {
        /// Descriptive error message.
        message: String,
    },

    /// The external kernel reported a failure status.
    #[error("{context} | CTC library error message: {status}")]
    Kernel {
        /// What the bridge was doing when the kernel failed.
        context: &'static str,
        /// Status returned by the kernel.
        status: CtcStatus,
    },

    /// Feature not implemented.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// Description of the unimplemented feature.
        feature: String,
    },

    /// ndarray shape error.
    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Underlying Candle error.
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

impl CtcError {
    /// Create an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(
        what: &'static str,
        expected: impl Into<Vec<usize>>,
        actual: impl Into<Vec<usize>>,
    ) -> Self {
        Self::ShapeMismatch {
            what,
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }

    /// Create an out of memory error.
    pub fn oom(msg: impl Into<String>) -> Self {
        Self::OutOfMemory {
            message: msg.into(),
        }
    }

    /// Create a kernel failure error.
    pub fn kernel(context: &'static str, status: CtcStatus) -> Self {
        Self::Kernel { context, status }
    }

    /// Create a not implemented error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Returns `true` for allocation failures.
    #[must_use]
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }

    /// Kernel status carried by this error, if the kernel produced it.
    #[must_use]
    pub fn kernel_status(&self) -> Option<CtcStatus> {
        match self {
            Self::Kernel { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CtcError::invalid_config("num_threads must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration: num_threads must be > 0"
        );

        let err = CtcError::shape_mismatch("labels", vec![2, 3], vec![3, 3]);
        assert!(err.to_string().contains("shape mismatch for labels"));

        let err = CtcError::oom("could not allocate storage for input lengths");
        assert!(err.to_string().contains("input lengths"));
        assert!(err.is_out_of_memory());
    }

    #[test]
    fn test_kernel_error_embeds_status_string() {
        let err = CtcError::kernel("failed to obtain CTC workspace size", CtcStatus::InvalidValue);
        assert_eq!(
            err.to_string(),
            "failed to obtain CTC workspace size | CTC library error message: invalid value"
        );
        assert_eq!(err.kernel_status(), Some(CtcStatus::InvalidValue));
        assert!(!err.is_out_of_memory());
    }

    #[test]
    fn test_error_from_shape_error() {
        let shape_err = ndarray::Array2::<f32>::from_shape_vec((2, 2), vec![1.0; 3]).unwrap_err();
        let err: CtcError = shape_err.into();
        assert!(matches!(err, CtcError::Shape(_)));
    }
}

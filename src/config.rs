// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Kernel configuration passed into every invocation.
//!
//! The options are an immutable value owned by the caller rather than state
//! held by the kernel. The default is CPU execution on a single worker thread
//! with blank label `0`.
//!
//! ## Environment Variables
//!
//! - `CTC_BRIDGE_NUM_THREADS` - worker thread count handed to the kernel
//! - `CTC_BRIDGE_BLANK_LABEL` - index of the blank symbol in the alphabet
//!
//! ## Example
//!
//! ```rust
//! use ctc_bridge::{CtcOptions, ValidatableConfig};
//!
//! let options = CtcOptions::new().with_blank_label(0);
//! options.validate()?;
//! # Ok::<(), ctc_bridge::CtcError>(())
//! ```

use crate::error::{CtcError, Result};
use crate::traits::ValidatableConfig;

/// Where the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComputeLocation {
    /// Host CPU.
    #[default]
    Cpu,
    /// GPU device. Rejected by validation; there is no GPU path.
    Gpu,
}

/// Options forwarded to the CTC kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtcOptions {
    /// Execution location.
    pub location: ComputeLocation,
    /// Worker threads the kernel may use.
    pub num_threads: usize,
    /// Alphabet index of the blank symbol.
    pub blank_label: u32,
}

impl Default for CtcOptions {
    fn default() -> Self {
        Self {
            location: ComputeLocation::Cpu,
            num_threads: 1,
            blank_label: 0,
        }
    }
}

impl CtcOptions {
    /// Create options with defaults (CPU, one thread, blank 0).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the execution location.
    #[must_use]
    pub fn with_location(mut self, location: ComputeLocation) -> Self {
        self.location = location;
        self
    }

    /// Set the worker thread count.
    #[must_use]
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads;
        self
    }

    /// Set the blank label index.
    #[must_use]
    pub fn with_blank_label(mut self, blank_label: u32) -> Self {
        self.blank_label = blank_label;
        self
    }

    /// Build options from environment variables, falling back to defaults
    /// for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(val) = std::env::var("CTC_BRIDGE_NUM_THREADS") {
            match val.parse::<usize>() {
                Ok(n) => options.num_threads = n,
                Err(_) => tracing::warn!(
                    value = %val,
                    "ignoring unparsable CTC_BRIDGE_NUM_THREADS"
                ),
            }
        }

        if let Ok(val) = std::env::var("CTC_BRIDGE_BLANK_LABEL") {
            match val.parse::<u32>() {
                Ok(blank) => options.blank_label = blank,
                Err(_) => tracing::warn!(
                    value = %val,
                    "ignoring unparsable CTC_BRIDGE_BLANK_LABEL"
                ),
            }
        }

        options
    }
}

impl ValidatableConfig for CtcOptions {
    fn validate(&self) -> Result<()> {
        if self.location == ComputeLocation::Gpu {
            return Err(CtcError::not_implemented("GPU execution of the CTC kernel"));
        }
        if self.num_threads == 0 {
            return Err(CtcError::invalid_config("num_threads must be > 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default() {
        let options = CtcOptions::default();
        assert_eq!(options.location, ComputeLocation::Cpu);
        assert_eq!(options.num_threads, 1);
        assert_eq!(options.blank_label, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let options = CtcOptions::new().with_num_threads(4).with_blank_label(7);
        assert_eq!(options.num_threads, 4);
        assert_eq!(options.blank_label, 7);
    }

    #[test]
    fn test_validation_rejects_zero_threads() {
        let err = CtcOptions::new().with_num_threads(0).validate().unwrap_err();
        assert!(matches!(err, CtcError::InvalidConfig(_)));
    }

    #[test]
    fn test_validation_rejects_gpu() {
        let err = CtcOptions::new()
            .with_location(ComputeLocation::Gpu)
            .validate()
            .unwrap_err();
        assert!(matches!(err, CtcError::NotImplemented { .. }));
    }
}

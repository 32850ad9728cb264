// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Trait seams of the crate.
//!
//! - [`ValidatableConfig`] - Configuration validation interface
//! - [`CtcKernel`] - The external loss kernel, seen as a black box with a
//!   workspace-sizing query and a compute call

use crate::config::CtcOptions;
use crate::error::Result;
use crate::kernel::{CtcProblem, CtcStatus};

/// Configuration validation trait.
///
/// # Example
///
/// ```rust
/// use ctc_bridge::{CtcError, Result, ValidatableConfig};
///
/// #[derive(Clone)]
/// struct BatchLimits {
///     max_batch: usize,
/// }
///
/// impl ValidatableConfig for BatchLimits {
///     fn validate(&self) -> Result<()> {
///         if self.max_batch == 0 {
///             return Err(CtcError::invalid_config("max_batch must be > 0"));
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait ValidatableConfig: Clone + Send + Sync {
    /// Validate the configuration parameters.
    ///
    /// # Errors
    ///
    /// Returns `CtcError::InvalidConfig` (or `NotImplemented` for unsupported
    /// execution paths) if validation fails.
    fn validate(&self) -> Result<()>;
}

/// An external CTC loss kernel.
///
/// The bridge calls [`CtcKernel::workspace_size`] once, allocates that many
/// bytes of scratch, then calls [`CtcKernel::compute`] once. Both calls
/// report failure through a [`CtcStatus`]; the bridge translates it into a
/// `CtcError::Kernel`.
///
/// Buffers are tightly packed and row-major:
///
/// - `activations`: `[time, minibatch, alphabet]` unnormalized scores
/// - `gradients`: same layout as `activations`, `None` for cost-only calls
/// - `costs`: one value per minibatch item
pub trait CtcKernel: Send + Sync {
    /// Number of scratch bytes [`CtcKernel::compute`] needs for `problem`.
    ///
    /// # Errors
    ///
    /// Returns the kernel status when the problem description is rejected.
    fn workspace_size(
        &self,
        problem: &CtcProblem<'_>,
        options: &CtcOptions,
    ) -> std::result::Result<usize, CtcStatus>;

    /// Compute per-item costs and, when requested, gradients.
    ///
    /// # Errors
    ///
    /// Returns the kernel status when computation fails.
    fn compute(
        &self,
        problem: &CtcProblem<'_>,
        activations: &[f32],
        gradients: Option<&mut [f32]>,
        costs: &mut [f32],
        workspace: &mut [u8],
        options: &CtcOptions,
    ) -> std::result::Result<(), CtcStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtcError;

    #[derive(Clone)]
    struct TestConfig {
        value: i32,
    }

    impl ValidatableConfig for TestConfig {
        fn validate(&self) -> Result<()> {
            if self.value < 0 {
                return Err(CtcError::invalid_config("value must be non-negative"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_validatable_config() {
        let valid = TestConfig { value: 10 };
        assert!(valid.validate().is_ok());

        let invalid = TestConfig { value: -1 };
        assert!(invalid.validate().is_err());
    }
}

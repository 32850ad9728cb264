// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! # ctc-bridge
//!
//! Marshalling and resource-lifecycle layer between host arrays and an
//! external Connectionist Temporal Classification (CTC) loss kernel.
//!
//! The kernel is a black box behind [`CtcKernel`]: it wants tightly packed
//! activations, a flat concatenation of every label sequence, per-item label
//! and input lengths, and a scratch workspace it sizes itself. This crate
//! adapts ndarray (or candle) inputs to that contract, negotiates the output
//! buffers, and guarantees every transient allocation is freed exactly once
//! on every return path.
//!
//! ## Modules
//!
//! - [`contiguity`] - zero-copy-or-copy adapter for activations
//! - [`lengths`] - packed input-length extraction
//! - [`labels`] - padded label matrix flattening
//! - [`outputs`] - reuse-or-reallocate negotiation for costs and gradients
//! - [`context`] - RAII owner of an invocation's transient buffers
//! - [`bridge`] - workspace sizing and the compute call
//! - [`cost`] - the [`CtcCost`] entry point
//! - [`kernel`] - kernel statuses, problem description, CPU reference kernel
//! - [`memory`] - allocation accounting and failure injection
//! - [`interop`] - candle tensor front end
//!
//! ## Quick Start
//!
//! ```rust
//! use ctc_bridge::{CtcCost, CtcOptions, Result};
//! use ndarray::{array, Array3};
//!
//! fn main() -> Result<()> {
//!     let op = CtcCost::cpu().with_options(CtcOptions::new().with_blank_label(0));
//!
//!     let activations = Array3::<f32>::zeros((4, 2, 5));
//!     let labels = array![[1, 2, -1], [3, -1, -1]];
//!     let input_lengths = array![4, 3];
//!
//!     let mut costs = None;
//!     let mut gradients = None;
//!     op.apply(
//!         activations.view(),
//!         labels.view(),
//!         input_lengths.view(),
//!         &mut costs,
//!         &mut gradients,
//!     )?;
//!     assert_eq!(costs.unwrap().len(), 2);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod contiguity;
pub mod cost;
pub mod error;
pub mod interop;
pub mod kernel;
pub mod labels;
pub mod lengths;
pub mod logging;
pub mod memory;
pub mod outputs;
pub mod traits;

// Re-exports for convenience
pub use config::{ComputeLocation, CtcOptions};
pub use context::{ContextState, CtcContext};
pub use cost::{ctc_cost, scale_gradients, CtcCost, CtcOutputs};
pub use error::{CtcError, Result};
pub use interop::ctc_cost_tensors;
pub use kernel::{CpuCtcKernel, CtcProblem, CtcStatus};
pub use logging::{init_logging, LogConfig, LogLevel};
pub use memory::{estimate_invocation_bytes, estimate_tensor_bytes, MemoryTracker, TrackedBuffer};
pub use traits::{CtcKernel, ValidatableConfig};

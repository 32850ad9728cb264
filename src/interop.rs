// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! Candle tensor front end for [`CtcCost`].
//!
//! Tensors are pulled to host memory, run through the ndarray path and the
//! results are placed back on the activations' device. Activations may be any
//! floating-point dtype and are computed in f32. Labels and input lengths may
//! be any integer dtype whose values fit in an `i32`; negative labels are
//! padding, so unsigned label tensors simply carry none.

use candle_core::{DType, Tensor};
use ndarray::{Array1, Array2, Array3};

use crate::cost::CtcCost;
use crate::error::{CtcError, Result};
use crate::traits::CtcKernel;

/// Compute CTC costs (and gradients, if `op` computes them) for candle tensors.
///
/// * `activations` - `[time, batch, alphabet]`, floating point
/// * `labels` - `[batch, max_label_length]`
/// * `input_lengths` - `[batch]`
///
/// Returns `(costs, gradients)` where `costs` is `[batch]` f32 and
/// `gradients` has the activation shape.
///
/// # Errors
///
/// - `CtcError::ShapeMismatch` for tensors of the wrong rank
/// - `CtcError::InvalidInput` for non-float activations, non-integer labels
///   or lengths, or integer values outside the `i32` range
/// - `CtcError::Candle` if a tensor cannot be read or created
/// - any error of [`CtcCost::apply`]
pub fn ctc_cost_tensors<K: CtcKernel>(
    op: &CtcCost<K>,
    activations: &Tensor,
    labels: &Tensor,
    input_lengths: &Tensor,
) -> Result<(Tensor, Option<Tensor>)> {
    expect_rank("activations", activations, 3)?;
    expect_rank("labels", labels, 2)?;
    expect_rank("input_lengths", input_lengths, 1)?;
    if !activations.dtype().is_float() {
        return Err(CtcError::invalid_input(format!(
            "activations must be floating point, got {:?}",
            activations.dtype()
        )));
    }

    let dims = activations.dims3()?;
    let host_activations = activations
        .to_dtype(DType::F32)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<f32>()?;
    let host_activations = Array3::from_shape_vec(dims, host_activations)?;

    let label_dims = labels.dims2()?;
    let host_labels = Array2::from_shape_vec(label_dims, to_i32("labels", labels)?)?;
    let host_lengths = Array1::from_vec(to_i32("input_lengths", input_lengths)?);

    let mut costs = None;
    let mut gradients = None;
    op.apply(
        host_activations.view(),
        host_labels.view(),
        host_lengths.view(),
        &mut costs,
        &mut gradients,
    )?;

    let device = activations.device();
    let costs = costs.ok_or_else(|| CtcError::invalid_input("cost output was not produced"))?;
    let batch = costs.len();
    let costs = Tensor::from_vec(costs.to_vec(), batch, device)?;
    let gradients = if op.compute_grad() {
        gradients
            .map(|g| Tensor::from_vec(g.iter().copied().collect::<Vec<f32>>(), dims, device))
            .transpose()?
    } else {
        None
    };

    tracing::trace!(target: "ctc_bridge", ?dims, ?device, "tensor ctc cost computed");
    Ok((costs, gradients))
}

fn expect_rank(what: &'static str, tensor: &Tensor, rank: usize) -> Result<()> {
    if tensor.rank() == rank {
        Ok(())
    } else {
        // Report the shape against a same-rank placeholder of unknown extents.
        Err(CtcError::shape_mismatch(what, vec![0; rank], tensor.dims()))
    }
}

fn to_i32(what: &'static str, tensor: &Tensor) -> Result<Vec<i32>> {
    if !tensor.dtype().is_int() {
        return Err(CtcError::invalid_input(format!(
            "{what} must be an integer dtype, got {:?}",
            tensor.dtype()
        )));
    }
    tensor
        .to_dtype(DType::I64)?
        .contiguous()?
        .flatten_all()?
        .to_vec1::<i64>()?
        .into_iter()
        .map(|value| {
            i32::try_from(value).map_err(|_| {
                CtcError::invalid_input(format!("{what} value {value} does not fit in i32"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    #[test]
    fn test_tensor_round_trip_shapes() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 1, 3), DType::F32, &device).unwrap();
        let labels = Tensor::new(&[[1i64, -1]], &device).unwrap();
        let lengths = Tensor::new(&[2u32], &device).unwrap();

        let (costs, gradients) =
            ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap();
        assert_eq!(costs.dims(), &[1]);
        let cost = costs.to_vec1::<f32>().unwrap()[0];
        assert!((cost - 3.0f32.ln()).abs() < 1e-5);
        assert_eq!(gradients.unwrap().dims(), &[2, 1, 3]);
    }

    #[test]
    fn test_f64_activations_are_accepted() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 1, 3), DType::F64, &device).unwrap();
        let labels = Tensor::new(&[[1i64]], &device).unwrap();
        let lengths = Tensor::new(&[2i64], &device).unwrap();

        let op = CtcCost::cpu().with_compute_grad(false);
        let (costs, gradients) = ctc_cost_tensors(&op, &activations, &labels, &lengths).unwrap();
        assert_eq!(costs.dtype(), DType::F32);
        assert!(gradients.is_none());
    }

    #[test]
    fn test_wrong_rank_is_shape_mismatch() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 3), DType::F32, &device).unwrap();
        let labels = Tensor::new(&[[1i64]], &device).unwrap();
        let lengths = Tensor::new(&[2i64], &device).unwrap();

        let err = ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap_err();
        assert!(matches!(
            err,
            CtcError::ShapeMismatch {
                what: "activations",
                ..
            }
        ));
    }

    #[test]
    fn test_integer_activations_are_rejected() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 1, 3), DType::U32, &device).unwrap();
        let labels = Tensor::new(&[[1i64]], &device).unwrap();
        let lengths = Tensor::new(&[2i64], &device).unwrap();

        let err = ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap_err();
        assert!(matches!(err, CtcError::InvalidInput { .. }));
    }

    #[test]
    fn test_float_labels_are_rejected() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 1, 3), DType::F32, &device).unwrap();
        // -0.5 would truncate to label 0 instead of padding.
        let labels = Tensor::new(&[[1.0f32, -0.5]], &device).unwrap();
        let lengths = Tensor::new(&[2i64], &device).unwrap();

        let err = ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap_err();
        assert!(matches!(err, CtcError::InvalidInput { .. }));
        assert!(err.to_string().contains("labels"));

        let labels = Tensor::new(&[[1i64]], &device).unwrap();
        let lengths = Tensor::new(&[2.0f64], &device).unwrap();
        let err = ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap_err();
        assert!(err.to_string().contains("input_lengths"));
    }

    #[test]
    fn test_out_of_range_length_is_rejected() {
        let device = Device::Cpu;
        let activations = Tensor::zeros((2, 1, 3), DType::F32, &device).unwrap();
        let labels = Tensor::new(&[[1i64]], &device).unwrap();
        let lengths = Tensor::new(&[i64::from(i32::MAX) + 1], &device).unwrap();

        let err = ctc_cost_tensors(&CtcCost::cpu(), &activations, &labels, &lengths).unwrap_err();
        assert!(err.to_string().contains("input_lengths"));
    }
}

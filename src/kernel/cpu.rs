// SPDX-License-Identifier: MIT
// Copyright 2026 Tyler Zervas

//! CPU reference CTC kernel.
//!
//! Activations are unnormalized scores; each `(t, b)` frame is normalized
//! with a log-softmax before the forward-backward pass. Both passes run in
//! log space over the blank-extended label sequence
//! `[blank, l1, blank, l2, ..., lL, blank]`. Alpha and beta both include the
//! emission of the frame they belong to, so the per-symbol posterior at
//! frame `t` is `sum(alpha * beta) / (p * y_t)`.
//!
//! Items are processed one after another on the calling thread; the
//! workspace holds the scratch of a single item.

use crate::config::{ComputeLocation, CtcOptions};
use crate::kernel::{CtcProblem, CtcStatus};
use crate::traits::CtcKernel;

type KernelResult<T> = std::result::Result<T, CtcStatus>;

/// Forward-backward CTC loss on the host CPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuCtcKernel;

impl CpuCtcKernel {
    /// Create the kernel.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Scratch layout in `f32` words, sized for the longest item.
#[derive(Debug, Clone, Copy)]
struct Scratch {
    max_time: usize,
    max_states: usize,
    alphabet: usize,
}

impl Scratch {
    fn log_probs_len(&self) -> usize {
        self.max_time * self.alphabet
    }

    fn lattice_len(&self) -> usize {
        self.max_time * self.max_states
    }

    fn words(&self) -> usize {
        self.log_probs_len() + 2 * self.lattice_len() + self.alphabet
    }

    fn bytes(&self) -> usize {
        self.words() * std::mem::size_of::<f32>()
    }
}

/// Check the problem description and derive the scratch layout.
fn plan(problem: &CtcProblem<'_>, options: &CtcOptions) -> KernelResult<Scratch> {
    if options.location != ComputeLocation::Cpu {
        return Err(CtcStatus::InvalidValue);
    }
    let alphabet = problem.alphabet_size;
    if alphabet == 0
        || problem.minibatch == 0
        || problem.label_lengths.len() != problem.minibatch
        || problem.input_lengths.len() != problem.minibatch
        || options.blank_label as usize >= alphabet
    {
        return Err(CtcStatus::InvalidValue);
    }

    let mut max_time = 0usize;
    let mut max_labels = 0usize;
    let mut total_labels = 0usize;
    for (&label_len, &input_len) in problem.label_lengths.iter().zip(problem.input_lengths) {
        let label_len = usize::try_from(label_len).map_err(|_| CtcStatus::InvalidValue)?;
        let input_len = usize::try_from(input_len).map_err(|_| CtcStatus::InvalidValue)?;
        if input_len > problem.time_steps {
            return Err(CtcStatus::InvalidValue);
        }
        max_time = max_time.max(input_len);
        max_labels = max_labels.max(label_len);
        total_labels += label_len;
    }
    if total_labels > problem.flat_labels.len() {
        return Err(CtcStatus::InvalidValue);
    }
    if problem.flat_labels[..total_labels]
        .iter()
        .any(|&label| label < 0 || label as usize >= alphabet)
    {
        return Err(CtcStatus::InvalidValue);
    }

    Ok(Scratch {
        max_time,
        max_states: 2 * max_labels + 1,
        alphabet,
    })
}

#[inline]
fn log_add(a: f32, b: f32) -> f32 {
    if a == f32::NEG_INFINITY {
        return b;
    }
    if b == f32::NEG_INFINITY {
        return a;
    }
    let max = a.max(b);
    max + (-(a - b).abs()).exp().ln_1p()
}

/// One minibatch item's view of the problem.
struct Item<'a> {
    labels: &'a [i32],
    time: usize,
}

impl Item<'_> {
    fn states(&self) -> usize {
        2 * self.labels.len() + 1
    }

    /// Alphabet symbol of extended state `s`.
    #[inline]
    fn symbol(&self, s: usize, blank: usize) -> usize {
        if s % 2 == 0 {
            blank
        } else {
            self.labels[s / 2] as usize
        }
    }

    fn repeats(&self) -> usize {
        self.labels.windows(2).filter(|w| w[0] == w[1]).count()
    }
}

impl CtcKernel for CpuCtcKernel {
    fn workspace_size(
        &self,
        problem: &CtcProblem<'_>,
        options: &CtcOptions,
    ) -> KernelResult<usize> {
        Ok(plan(problem, options)?.bytes())
    }

    fn compute(
        &self,
        problem: &CtcProblem<'_>,
        activations: &[f32],
        mut gradients: Option<&mut [f32]>,
        costs: &mut [f32],
        workspace: &mut [u8],
        options: &CtcOptions,
    ) -> KernelResult<()> {
        let scratch = plan(problem, options)?;
        let alphabet = scratch.alphabet;
        let minibatch = problem.minibatch;
        let frame_stride = minibatch * alphabet;

        if activations.len() != problem.time_steps * frame_stride || costs.len() < minibatch {
            return Err(CtcStatus::InvalidValue);
        }
        if let Some(grads) = gradients.as_deref_mut() {
            if grads.len() != activations.len() {
                return Err(CtcStatus::InvalidValue);
            }
            grads.fill(0.0);
        }
        if workspace.len() < scratch.bytes() {
            return Err(CtcStatus::InvalidValue);
        }

        let words: &mut [f32] = bytemuck::try_cast_slice_mut(&mut workspace[..scratch.bytes()])
            .map_err(|_| CtcStatus::MemopsFailed)?;
        let (log_probs, rest) = words.split_at_mut(scratch.log_probs_len());
        let (alphas, rest) = rest.split_at_mut(scratch.lattice_len());
        let (betas, sums) = rest.split_at_mut(scratch.lattice_len());

        let blank = options.blank_label as usize;
        let mut offset = 0usize;
        for index in 0..minibatch {
            // Lengths were validated non-negative by `plan`.
            let label_len = problem.label_lengths[index] as usize;
            let item = Item {
                labels: &problem.flat_labels[offset..offset + label_len],
                time: problem.input_lengths[index] as usize,
            };
            offset += label_len;

            if item.time == 0 || item.labels.len() + item.repeats() > item.time {
                tracing::warn!(
                    target: "ctc_bridge::kernel",
                    item = index,
                    labels = item.labels.len(),
                    frames = item.time,
                    "labels cannot be aligned within the input length; cost set to 0"
                );
                costs[index] = 0.0;
                continue;
            }

            // Log-softmax of each valid frame.
            for t in 0..item.time {
                let start = t * frame_stride + index * alphabet;
                let row = &activations[start..start + alphabet];
                let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let norm = max + row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln();
                for (lp, &v) in log_probs[t * alphabet..(t + 1) * alphabet]
                    .iter_mut()
                    .zip(row)
                {
                    *lp = v - norm;
                }
            }

            let log_p = forward(&item, blank, alphabet, log_probs, alphas);
            backward(&item, blank, alphabet, log_probs, betas);
            costs[index] = -log_p;

            if let Some(grads) = gradients.as_deref_mut() {
                let states = item.states();
                for t in 0..item.time {
                    sums.fill(f32::NEG_INFINITY);
                    for s in 0..states {
                        let sym = item.symbol(s, blank);
                        let joint = alphas[t * states + s] + betas[t * states + s];
                        sums[sym] = log_add(sums[sym], joint);
                    }
                    let start = t * frame_stride + index * alphabet;
                    for k in 0..alphabet {
                        let lp = log_probs[t * alphabet + k];
                        let posterior = if sums[k] == f32::NEG_INFINITY {
                            0.0
                        } else {
                            (sums[k] - log_p - lp).exp()
                        };
                        grads[start + k] = lp.exp() - posterior;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Fill the alpha lattice and return `log p(labels | input)`.
fn forward(
    item: &Item<'_>,
    blank: usize,
    alphabet: usize,
    log_probs: &[f32],
    alphas: &mut [f32],
) -> f32 {
    let states = item.states();
    let alphas = &mut alphas[..item.time * states];
    alphas.fill(f32::NEG_INFINITY);

    alphas[0] = log_probs[blank];
    if states > 1 {
        alphas[1] = log_probs[item.symbol(1, blank)];
    }

    for t in 1..item.time {
        let (prev, curr) = alphas.split_at_mut(t * states);
        let prev = &prev[(t - 1) * states..];
        for s in 0..states {
            let sym = item.symbol(s, blank);
            let mut acc = prev[s];
            if s >= 1 {
                acc = log_add(acc, prev[s - 1]);
            }
            if s >= 2 && s % 2 == 1 && sym != item.symbol(s - 2, blank) {
                acc = log_add(acc, prev[s - 2]);
            }
            curr[s] = acc + log_probs[t * alphabet + sym];
        }
    }

    let last = (item.time - 1) * states;
    let mut log_p = alphas[last + states - 1];
    if states > 1 {
        log_p = log_add(log_p, alphas[last + states - 2]);
    }
    log_p
}

/// Fill the beta lattice.
fn backward(
    item: &Item<'_>,
    blank: usize,
    alphabet: usize,
    log_probs: &[f32],
    betas: &mut [f32],
) {
    let states = item.states();
    let betas = &mut betas[..item.time * states];
    betas.fill(f32::NEG_INFINITY);

    let last_t = item.time - 1;
    let last = last_t * states;
    betas[last + states - 1] = log_probs[last_t * alphabet + blank];
    if states > 1 {
        betas[last + states - 2] = log_probs[last_t * alphabet + item.symbol(states - 2, blank)];
    }

    for t in (0..last_t).rev() {
        let (curr, next) = betas.split_at_mut((t + 1) * states);
        let curr = &mut curr[t * states..];
        let next = &next[..states];
        for s in 0..states {
            let sym = item.symbol(s, blank);
            let mut acc = next[s];
            if s + 1 < states {
                acc = log_add(acc, next[s + 1]);
            }
            if s + 2 < states && s % 2 == 1 && sym != item.symbol(s + 2, blank) {
                acc = log_add(acc, next[s + 2]);
            }
            curr[s] = acc + log_probs[t * alphabet + sym];
        }
    }
}

//! CTC loss adapter: tensor marshaling around a [`CtcKernel`].
//!
//! Converts `ndarray` views into the flat buffers a warp-ctc style kernel
//! expects, manages every intermediate allocation for the duration of one
//! call, and marshals costs and gradients back into caller-provided array
//! handles. All scratch buffers are owned values, so they are released on
//! every exit path, including early error returns.

use std::collections::TryReserveError;
use std::fmt;

use ndarray::{Array, Array1, Array3, ArrayView1, ArrayView2, ArrayView3};
use ndarray::{Dimension, ErrorKind, ShapeError};

use crate::{CtcKernel, KernelOptions, KernelStatus};

/// An adapter-owned buffer that failed to allocate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// Contiguous copy of a non-contiguous activations tensor.
    ActivationsCopy,
    /// Owned copy of the input-lengths vector.
    InputLengths,
    /// Flattened labels and their per-row lengths.
    Labels,
    /// The per-sample costs output.
    Costs,
    /// The gradients output tensor.
    Gradients,
    /// Kernel scratch workspace.
    Workspace,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::ActivationsCopy => "a contiguous copy of the activations array",
            Resource::InputLengths => "input lengths",
            Resource::Labels => "labels and their lengths",
            Resource::Costs => "CTC costs",
            Resource::Gradients => "CTC gradients",
            Resource::Workspace => "the CTC workspace",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CtcLossError {
    #[error("could not allocate storage for {resource}")]
    Allocation {
        resource: Resource,
        #[source]
        source: TryReserveError,
    },
    #[error("failed to obtain CTC workspace size | CTC library error message: {0}")]
    SizeQuery(#[source] KernelStatus),
    #[error("failed to compute CTC loss function | CTC library error message: {0}")]
    Compute(#[source] KernelStatus),
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),
}

/// Contiguous read-only view of the activations tensor.
///
/// Borrows the caller's buffer when the input is already in standard
/// layout; otherwise holds an owned copy that lives for the call.
enum ActivationsBuf<'a> {
    Borrowed(&'a [f32]),
    Owned(Vec<f32>),
}

impl<'a> ActivationsBuf<'a> {
    fn from_view(view: ArrayView3<'a, f32>) -> Result<Self, CtcLossError> {
        match view.to_slice() {
            Some(slice) => Ok(ActivationsBuf::Borrowed(slice)),
            None => {
                let mut buf = Vec::new();
                buf.try_reserve_exact(view.len())
                    .map_err(|source| CtcLossError::Allocation {
                        resource: Resource::ActivationsCopy,
                        source,
                    })?;
                // Logical (row-major) iteration order matches the layout
                // the kernel expects.
                buf.extend(view.iter().copied());
                Ok(ActivationsBuf::Owned(buf))
            }
        }
    }

    fn as_slice(&self) -> &[f32] {
        match self {
            ActivationsBuf::Borrowed(slice) => slice,
            ActivationsBuf::Owned(buf) => buf,
        }
    }
}

/// Reuse-or-reallocate decision for a caller-provided output array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputPolicy {
    Reuse,
    Reallocate,
}

fn output_policy(existing: Option<&[usize]>, required: &[usize]) -> OutputPolicy {
    match existing {
        Some(shape) if shape == required => OutputPolicy::Reuse,
        _ => OutputPolicy::Reallocate,
    }
}

fn try_zeroed(len: usize, resource: Resource) -> Result<Vec<f32>, CtcLossError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|source| CtcLossError::Allocation { resource, source })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

fn copy_input_lengths(view: ArrayView1<'_, i32>) -> Result<Vec<i32>, CtcLossError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(view.len())
        .map_err(|source| CtcLossError::Allocation {
            resource: Resource::InputLengths,
            source,
        })?;
    buf.extend(view.iter().copied());
    Ok(buf)
}

/// Flatten a padded label matrix into the kernel's memory layout.
///
/// Scans each row left to right, appending every non-negative value to
/// one flat buffer and counting it toward that row's length. Any negative
/// value is padding, not just `-1`.
fn flatten_labels(labels: ArrayView2<'_, i32>) -> Result<(Vec<i32>, Vec<i32>), CtcLossError> {
    let alloc_err = |source| CtcLossError::Allocation {
        resource: Resource::Labels,
        source,
    };

    let mut flat = Vec::new();
    flat.try_reserve_exact(labels.len()).map_err(alloc_err)?;
    let mut lengths = Vec::new();
    lengths.try_reserve_exact(labels.nrows()).map_err(alloc_err)?;

    for row in labels.rows() {
        let mut count = 0i32;
        for &label in row.iter() {
            if label >= 0 {
                flat.push(label);
                count += 1;
            }
        }
        lengths.push(count);
    }

    Ok((flat, lengths))
}

fn dense_slice_mut<D: Dimension>(arr: &mut Array<f32, D>) -> Result<&mut [f32], CtcLossError> {
    arr.as_slice_mut()
        .ok_or_else(|| CtcLossError::Shape(ShapeError::from_kind(ErrorKind::IncompatibleLayout)))
}

/// The CTC loss operator: marshals host arrays into a kernel invocation.
///
/// One instance holds a kernel plus its options and can be called any
/// number of times; each call owns its intermediate buffers exclusively.
/// Calls are synchronous and run to completion, so callers sharing an
/// instance across threads must serialize their invocations.
pub struct CtcLossOp<K> {
    kernel: K,
    options: KernelOptions,
}

impl<K: CtcKernel> CtcLossOp<K> {
    /// Create an operator with default options (single CPU thread,
    /// blank label 0).
    pub fn new(kernel: K) -> Self {
        Self::with_options(kernel, KernelOptions::default())
    }

    pub fn with_options(kernel: K, options: KernelOptions) -> Self {
        Self { kernel, options }
    }

    pub fn options(&self) -> &KernelOptions {
        &self.options
    }

    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Compute per-sample costs and the gradient tensor.
    ///
    /// # Arguments
    ///
    /// * `activations` - `[time, batch, alphabet]` network outputs
    /// * `labels` - `[batch, max_label_len]` matrix; negative = padding
    /// * `input_lengths` - `[batch]` valid time-steps per sample
    /// * `costs` - output handle, reused when already shaped `[batch]`
    /// * `gradients` - output handle, reused when already shaped like
    ///   `activations`
    ///
    /// Mismatched or absent output handles are replaced with freshly
    /// zero-initialized arrays. On error the outputs may have been
    /// reallocated but hold no meaningful results.
    pub fn compute(
        &self,
        activations: ArrayView3<'_, f32>,
        labels: ArrayView2<'_, i32>,
        input_lengths: ArrayView1<'_, i32>,
        costs: &mut Option<Array1<f32>>,
        gradients: &mut Option<Array3<f32>>,
    ) -> Result<(), CtcLossError> {
        let (time_steps, minibatch, alphabet_size) = activations.dim();

        if labels.nrows() != minibatch {
            return Err(CtcLossError::ShapeMismatch(format!(
                "label matrix has {} rows but activations have batch size {}",
                labels.nrows(),
                minibatch
            )));
        }
        if input_lengths.len() != minibatch {
            return Err(CtcLossError::ShapeMismatch(format!(
                "input lengths has {} entries but activations have batch size {}",
                input_lengths.len(),
                minibatch
            )));
        }
        for (row, &len) in input_lengths.iter().enumerate() {
            if len < 0 || len as usize > time_steps {
                return Err(CtcLossError::ShapeMismatch(format!(
                    "input length {} for batch row {} is outside the {} available time-steps",
                    len, row, time_steps
                )));
            }
        }

        let acts = ActivationsBuf::from_view(activations)?;
        let input_lengths = copy_input_lengths(input_lengths)?;
        let (flat_labels, label_lengths) = flatten_labels(labels)?;

        log::debug!(
            "Marshaled CTC inputs: [{}, {}, {}] activations ({}), {} flat labels",
            time_steps,
            minibatch,
            alphabet_size,
            match &acts {
                ActivationsBuf::Borrowed(_) => "borrowed",
                ActivationsBuf::Owned(_) => "copied",
            },
            flat_labels.len(),
        );

        let costs_slice = prepare_costs(costs, minibatch)?;
        let gradients_slice = prepare_gradients(gradients, (time_steps, minibatch, alphabet_size))?;

        let workspace_size = self
            .kernel
            .workspace_size(
                &label_lengths,
                &input_lengths,
                alphabet_size as i32,
                minibatch as i32,
                &self.options,
            )
            .map_err(CtcLossError::SizeQuery)?;

        log::debug!("CTC workspace size: {} bytes", workspace_size);

        let mut workspace = Vec::new();
        workspace
            .try_reserve_exact(workspace_size)
            .map_err(|source| CtcLossError::Allocation {
                resource: Resource::Workspace,
                source,
            })?;
        workspace.resize(workspace_size, 0u8);

        self.kernel
            .compute_loss(
                acts.as_slice(),
                gradients_slice,
                &flat_labels,
                &label_lengths,
                &input_lengths,
                alphabet_size as i32,
                minibatch as i32,
                costs_slice,
                &mut workspace,
                &self.options,
            )
            .map_err(CtcLossError::Compute)?;

        Ok(())
    }
}

fn prepare_costs(
    slot: &mut Option<Array1<f32>>,
    minibatch: usize,
) -> Result<&mut [f32], CtcLossError> {
    let required = [minibatch];
    // The kernel writes through a dense slice, so a strided caller array
    // cannot be reused even when its shape matches.
    let reuse = output_policy(slot.as_ref().map(|c| c.shape()), &required) == OutputPolicy::Reuse
        && slot.as_ref().is_some_and(|c| c.is_standard_layout());

    let arr = if reuse {
        // `reuse` implies the slot is occupied; the fallback is never built.
        slot.get_or_insert_with(Default::default)
    } else {
        slot.insert(Array1::from_vec(try_zeroed(minibatch, Resource::Costs)?))
    };
    dense_slice_mut(arr)
}

fn prepare_gradients(
    slot: &mut Option<Array3<f32>>,
    dim: (usize, usize, usize),
) -> Result<&mut [f32], CtcLossError> {
    let required = [dim.0, dim.1, dim.2];
    let reuse = output_policy(slot.as_ref().map(|g| g.shape()), &required) == OutputPolicy::Reuse
        && slot.as_ref().is_some_and(|g| g.is_standard_layout());

    let arr = if reuse {
        slot.get_or_insert_with(Default::default)
    } else {
        let buf = try_zeroed(dim.0 * dim.1 * dim.2, Resource::Gradients)?;
        slot.insert(Array3::from_shape_vec(dim, buf)?)
    };
    dense_slice_mut(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_flatten_labels_skips_padding() {
        let labels = arr2(&[[3, 5, -1, -1], [1, 2, 3, -1]]);
        let (flat, lengths) = flatten_labels(labels.view()).unwrap();

        assert_eq!(flat, vec![3, 5, 1, 2, 3]);
        assert_eq!(lengths, vec![2, 3]);
    }

    #[test]
    fn test_flatten_labels_all_padding_row() {
        let labels = arr2(&[[-1, -1, -1, -1], [7, -1, 4, -1]]);
        let (flat, lengths) = flatten_labels(labels.view()).unwrap();

        // Interior padding is skipped too; order stays left-to-right.
        assert_eq!(flat, vec![7, 4]);
        assert_eq!(lengths, vec![0, 2]);
    }

    #[test]
    fn test_flatten_labels_any_negative_is_padding() {
        let labels = arr2(&[[0, -7, 2, -100]]);
        let (flat, lengths) = flatten_labels(labels.view()).unwrap();

        assert_eq!(flat, vec![0, 2]);
        assert_eq!(lengths, vec![2]);
    }

    #[test]
    fn test_output_policy() {
        assert_eq!(output_policy(None, &[2]), OutputPolicy::Reallocate);
        assert_eq!(output_policy(Some(&[3]), &[2]), OutputPolicy::Reallocate);
        assert_eq!(
            output_policy(Some(&[4, 2]), &[4, 2, 7]),
            OutputPolicy::Reallocate
        );
        assert_eq!(output_policy(Some(&[2]), &[2]), OutputPolicy::Reuse);
        assert_eq!(
            output_policy(Some(&[4, 2, 7]), &[4, 2, 7]),
            OutputPolicy::Reuse
        );
    }

    #[test]
    fn test_contiguous_activations_are_borrowed() {
        let acts = Array3::<f32>::zeros((4, 2, 7));
        let view = acts.view();
        let buf = ActivationsBuf::from_view(view).unwrap();

        assert!(matches!(buf, ActivationsBuf::Borrowed(_)));
        assert!(std::ptr::eq(buf.as_slice().as_ptr(), view.as_ptr()));
    }

    #[test]
    fn test_non_contiguous_activations_are_copied() {
        let mut acts = Array3::<f32>::zeros((4, 2, 7));
        for (i, v) in acts.iter_mut().enumerate() {
            *v = i as f32;
        }
        // Axis-permuted views are not in standard layout.
        let view = acts.view().permuted_axes([1, 0, 2]);
        let expected: Vec<f32> = view.iter().copied().collect();
        let buf = ActivationsBuf::from_view(view).unwrap();

        assert!(matches!(buf, ActivationsBuf::Owned(_)));
        assert_eq!(buf.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_sliced_activations_are_copied() {
        let acts = Array3::<f32>::zeros((8, 2, 7));
        let strided = acts.slice(ndarray::s![..;2, .., ..]);

        let buf = ActivationsBuf::from_view(strided).unwrap();
        assert!(matches!(buf, ActivationsBuf::Owned(_)));
        assert_eq!(buf.as_slice().len(), 4 * 2 * 7);
    }
}

//! # ctc-rs
//!
//! A Rust binding for warp-ctc style Connectionist Temporal Classification
//! (CTC) loss libraries, with a safe tensor-marshaling adapter on top.
//!
//! The external library does the actual forward-backward dynamic
//! programming; this crate owns everything around it: converting
//! [`ndarray`] views into the contiguous primitive buffers the library
//! expects, flattening padded label matrices, sizing and allocating the
//! scratch workspace, reusing or reallocating caller-provided output
//! arrays, and turning library status codes into typed errors.
//!
//! ## Features
//!
//! Kernel backends are enabled via Cargo features:
//! - `warpctc` - links the native warp-ctc library (CPU path)
//!
//! The marshaling layer itself has no native requirements; any type
//! implementing [`CtcKernel`] can stand in for the library, which is how
//! the test suite exercises every failure path without linking warp-ctc.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! ctc-rs = { version = "0.2", features = ["warpctc"] }
//! ```
//!
//! ```ignore
//! use ctc_rs::{kernels::warpctc::WarpCtc, CtcLossOp};
//! use ndarray::{Array1, Array3, arr2, arr1};
//!
//! // activations: [time, batch, alphabet]
//! let activations = Array3::<f32>::zeros((4, 2, 7));
//! // labels: [batch, max_label_len], negative entries are padding
//! let labels = arr2(&[[3, 5, -1, -1], [1, 2, 3, -1]]);
//! let input_lengths = arr1(&[4, 4]);
//!
//! let op = CtcLossOp::new(WarpCtc);
//! let mut costs: Option<Array1<f32>> = None;
//! let mut gradients: Option<Array3<f32>> = None;
//! op.compute(
//!     activations.view(),
//!     labels.view(),
//!     input_lengths.view(),
//!     &mut costs,
//!     &mut gradients,
//! )?;
//! # Ok::<(), ctc_rs::CtcLossError>(())
//! ```
//!
//! ## Input Requirements
//!
//! - Activations: 3-D `f32`, `[time, batch, alphabet]`, any layout
//!   (non-contiguous input is copied for the duration of the call)
//! - Labels: 2-D `i32`, `[batch, max_label_len]`; any negative value is
//!   treated as padding and stripped
//! - Input lengths: 1-D `i32`, `[batch]`, valid time-steps per sample

pub mod kernels;
pub mod loss;

pub use loss::{CtcLossError, CtcLossOp, Resource};

/// Options forwarded to the CTC kernel.
///
/// Defaults reproduce the single-threaded CPU configuration the binding
/// has always used: one compute thread, blank label at index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelOptions {
    /// Number of CPU threads the kernel may use.
    pub num_threads: u32,
    /// Alphabet index reserved for the CTC blank symbol.
    pub blank_label: i32,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            num_threads: 1,
            blank_label: 0,
        }
    }
}

/// Non-success status reported by a CTC kernel.
///
/// Carries the kernel's own diagnostic string (for the warp-ctc backend,
/// the text returned by `ctcGetStatusString`).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct KernelStatus(pub String);

impl KernelStatus {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Interface to an external CTC loss library.
///
/// Implementations receive fully marshaled flat buffers: the adapter in
/// [`loss`] guarantees contiguous activations, padding-free flattened
/// labels with per-row lengths, and output buffers of the right size.
///
/// The two methods mirror the warp-ctc C API (`get_workspace_size` and
/// `compute_ctc_loss`).
pub trait CtcKernel {
    /// Query the scratch workspace size in bytes for one loss invocation.
    ///
    /// # Arguments
    ///
    /// * `label_lengths` - valid labels per batch row, `[batch]`
    /// * `input_lengths` - valid time-steps per batch row, `[batch]`
    /// * `alphabet_size` - size of the alphabet including the blank
    /// * `minibatch` - number of batch rows
    /// * `options` - kernel configuration
    ///
    /// # Returns
    ///
    /// Required workspace size in bytes, or the kernel's failure status.
    fn workspace_size(
        &self,
        label_lengths: &[i32],
        input_lengths: &[i32],
        alphabet_size: i32,
        minibatch: i32,
        options: &KernelOptions,
    ) -> Result<usize, KernelStatus>;

    /// Compute per-sample costs and the full gradient tensor.
    ///
    /// # Arguments
    ///
    /// * `activations` - contiguous `[time, batch, alphabet]` values
    /// * `gradients` - output buffer, same length as `activations`
    /// * `flat_labels` - all valid labels, row-major, padding stripped
    /// * `label_lengths` - valid labels per batch row, `[batch]`
    /// * `input_lengths` - valid time-steps per batch row, `[batch]`
    /// * `alphabet_size` - size of the alphabet including the blank
    /// * `minibatch` - number of batch rows
    /// * `costs` - output buffer, `[batch]`
    /// * `workspace` - scratch memory of at least the queried size
    /// * `options` - kernel configuration
    #[allow(clippy::too_many_arguments)]
    fn compute_loss(
        &self,
        activations: &[f32],
        gradients: &mut [f32],
        flat_labels: &[i32],
        label_lengths: &[i32],
        input_lengths: &[i32],
        alphabet_size: i32,
        minibatch: i32,
        costs: &mut [f32],
        workspace: &mut [u8],
        options: &KernelOptions,
    ) -> Result<(), KernelStatus>;
}

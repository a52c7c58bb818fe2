//! Raw FFI declarations for the warp-ctc C API.
//!
//! These mirror `ctc.h` from Baidu warp-ctc. Use the safe wrapper in the
//! `kernel` module instead of calling these directly.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_float, c_int, c_uint, c_void};

/// `ctcStatus_t` values.
pub const CTC_STATUS_SUCCESS: c_int = 0;
pub const CTC_STATUS_MEMOPS_FAILED: c_int = 1;
pub const CTC_STATUS_INVALID_VALUE: c_int = 2;
pub const CTC_STATUS_EXECUTION_FAILED: c_int = 3;
pub const CTC_STATUS_UNKNOWN_ERROR: c_int = 4;

/// `ctcComputeLocation::CTC_CPU`.
pub const CTC_CPU: c_int = 0;

/// `struct ctcOptions` for the CPU execution path.
///
/// The C struct holds the compute location, a union of `num_threads`
/// (CPU) and a CUDA stream (GPU), and the blank label index. This
/// binding only drives the CPU path, so the union is represented by its
/// `num_threads` member.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ctcOptions {
    pub loc: c_int,
    pub num_threads: c_uint,
    pub blank_label: c_int,
}

#[link(name = "warpctc")]
extern "C" {
    /// Human-readable string for a `ctcStatus_t`.
    pub fn ctcGetStatusString(status: c_int) -> *const c_char;

    /// Scratch space required for one `compute_ctc_loss` invocation.
    pub fn get_workspace_size(
        label_lengths: *const c_int,
        input_lengths: *const c_int,
        alphabet_size: c_int,
        minibatch: c_int,
        info: ctcOptions,
        size_bytes: *mut usize,
    ) -> c_int;

    /// The forward-backward loss and gradient computation.
    pub fn compute_ctc_loss(
        activations: *const c_float,
        gradients: *mut c_float,
        flat_labels: *const c_int,
        label_lengths: *const c_int,
        input_lengths: *const c_int,
        alphabet_size: c_int,
        minibatch: c_int,
        costs: *mut c_float,
        workspace: *mut c_void,
        options: ctcOptions,
    ) -> c_int;
}

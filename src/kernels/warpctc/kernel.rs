use std::ffi::CStr;
use std::os::raw::{c_int, c_void};

use crate::{CtcKernel, KernelOptions, KernelStatus};

use super::ffi;

/// The warp-ctc CPU kernel.
///
/// Stateless; every invocation passes its configuration through
/// [`KernelOptions`]. The compute location is always `CTC_CPU`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WarpCtc;

fn status_string(status: c_int) -> String {
    // ctcGetStatusString returns pointers into a static string table.
    let ptr = unsafe { ffi::ctcGetStatusString(status) };
    if ptr.is_null() {
        return format!("unknown CTC status {}", status);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_string_lossy()
        .into_owned()
}

fn check(status: c_int) -> Result<(), KernelStatus> {
    if status == ffi::CTC_STATUS_SUCCESS {
        Ok(())
    } else {
        Err(KernelStatus::new(status_string(status)))
    }
}

fn ffi_options(options: &KernelOptions) -> ffi::ctcOptions {
    ffi::ctcOptions {
        loc: ffi::CTC_CPU,
        num_threads: options.num_threads,
        blank_label: options.blank_label,
    }
}

impl CtcKernel for WarpCtc {
    fn workspace_size(
        &self,
        label_lengths: &[i32],
        input_lengths: &[i32],
        alphabet_size: i32,
        minibatch: i32,
        options: &KernelOptions,
    ) -> Result<usize, KernelStatus> {
        let mut size_bytes = 0usize;
        // Safety: the slices stay alive across the call and hold
        // `minibatch` entries each, as the adapter guarantees.
        let status = unsafe {
            ffi::get_workspace_size(
                label_lengths.as_ptr(),
                input_lengths.as_ptr(),
                alphabet_size,
                minibatch,
                ffi_options(options),
                &mut size_bytes,
            )
        };
        check(status)?;
        Ok(size_bytes)
    }

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
    ) -> Result<(), KernelStatus> {
        // Safety: all buffers are sized by the adapter — activations and
        // gradients hold time*minibatch*alphabet entries, costs holds
        // minibatch, and workspace is at least the queried size.
        let status = unsafe {
            ffi::compute_ctc_loss(
                activations.as_ptr(),
                gradients.as_mut_ptr(),
                flat_labels.as_ptr(),
                label_lengths.as_ptr(),
                input_lengths.as_ptr(),
                alphabet_size,
                minibatch,
                costs.as_mut_ptr(),
                workspace.as_mut_ptr() as *mut c_void,
                ffi_options(options),
            )
        };
        check(status)
    }
}

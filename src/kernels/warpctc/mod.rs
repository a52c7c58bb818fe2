//! warp-ctc kernel backend.
//!
//! Binds the Baidu warp-ctc C library (`libwarpctc`) for single-threaded
//! CPU execution. The raw declarations live in [`ffi`]; use the safe
//! [`WarpCtc`] wrapper instead of calling them directly.

pub mod ffi;

mod kernel;

pub use kernel::WarpCtc;

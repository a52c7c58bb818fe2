//! Kernel backends for CTC loss computation.
//!
//! Each backend implements [`crate::CtcKernel`] on top of an external
//! library and is enabled via a Cargo feature, since enabling one links
//! the corresponding native dependency.
//!
//! # Available Kernels
//!
//! - `warpctc` - Baidu warp-ctc, CPU execution path
//!
//! # Example
//!
//! ```toml
//! [dependencies]
//! ctc-rs = { version = "0.2", features = ["warpctc"] }
//! ```

#[cfg(feature = "warpctc")]
pub mod warpctc;

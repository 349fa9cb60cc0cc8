//! ffpipe-core: shared error and configuration types.
//!
//! This crate is the foundational dependency of the `ffpipe` engine,
//! providing the unified error type and the options that describe how
//! ffmpeg is located and driven.

pub mod config;
pub mod error;

// Re-export the most commonly used items at the crate root.
pub use config::{FfOptions, LogLevel, DEFAULT_FAULT_GRACE_PERIOD};
pub use error::{Error, Result};

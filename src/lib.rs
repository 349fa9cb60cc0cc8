//! # ffpipe
//!
//! Runs ffmpeg as a child process from a set of typed arguments, streaming
//! data in and out through named pipes while the process runs.
//!
//! This crate provides:
//!
//! - **Arguments** ([`arguments`]) -- command-line fragments with a
//!   `pre`/`during`/`post` lifecycle: files, devices, concat lists, raw
//!   options and pipes.
//! - **Pipes** ([`pipes`]) -- single-connection named pipes (Unix domain
//!   sockets or Windows named pipes) and the sources/sinks that feed them.
//! - **Orchestration** ([`ArgumentProcessor`]) -- starts ffmpeg, drives every
//!   argument's data transfer alongside it, and reports the outcome.
//! - **Progress** ([`progress`]) -- `time=` parsing from ffmpeg's stats
//!   lines, percentage and line callbacks.
//! - **Cancellation** ([`CancelHandle`]) -- a graceful `q` on stdin, followed
//!   by a kill once the grace period runs out.
//!
//! Errors and options live in [`ffpipe_core`].

pub mod arguments;
pub mod cancel;
pub mod command;
pub mod context;
pub mod pipes;
pub mod processor;
pub mod progress;
pub mod tools;

// ---- Re-exports for convenience ----

pub use arguments::{
    Argument, Arguments, ConcatInput, CustomArgument, InputDevice, InputFile, InputPipe,
    OutputFile, OutputPipe,
};
pub use cancel::CancelHandle;
pub use context::ProcessContext;
pub use pipes::{PipeSink, PipeSource, StreamPipeSink, StreamPipeSource};
pub use processor::{ArgumentProcessor, ProcessResult};

pub use ffpipe_core::{Error, FfOptions, LogLevel, Result};

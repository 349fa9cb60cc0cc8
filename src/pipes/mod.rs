//! Named pipes for streaming bytes to and from ffmpeg while it runs.
//!
//! A [`PipeChannel`] owns one OS endpoint that ffmpeg connects to as a
//! client. [`PipeSource`] and [`PipeSink`] move the bytes once it has.

mod channel;
mod endpoint;
mod path;
mod stream;

pub use channel::{PipeChannel, PipeDirection, PipeState, TransmissionMode, DEFAULT_BUFFER_SIZE};
pub use path::{endpoint_path, pipe_path, unique_pipe_name};
pub use stream::{
    copy_cancellable, PipeSink, PipeSource, StreamPipeSink, StreamPipeSource, DEFAULT_BLOCK_SIZE,
};

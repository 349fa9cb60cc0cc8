//! The named, single-connection pipe behind a pipe argument.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use ffpipe_core::{Error, Result};

use super::endpoint::{self, EndpointConfig, Listener, PipeStream};
use super::path::{endpoint_path, pipe_path, unique_pipe_name};
use crate::context::ProcessContext;

/// Default in/out buffer size: 16 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// How long a pipe keeps accepting after the process exited. A client that
/// connected just before exiting is still queued in the backlog.
const LATE_CONNECT_WINDOW: Duration = Duration::from_millis(100);

/// Which way bytes flow through a pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeDirection {
    /// We write, ffmpeg reads (an input pipe).
    ToProcess,
    /// ffmpeg writes, we read (an output pipe).
    FromProcess,
}

/// Framing of pipe traffic. Message mode only exists on Windows named pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransmissionMode {
    #[default]
    Byte,
    Message,
}

/// Lifecycle state of a [`PipeChannel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeState {
    /// Named, no OS endpoint yet.
    Unopened,
    /// Endpoint created, nobody waiting on it yet.
    Listening,
    /// Waiting for ffmpeg to connect.
    AwaitingConnection,
    /// Connected; bytes are flowing.
    Streaming,
    /// Transfer over (finished, failed or cancelled); awaiting teardown.
    Disconnecting,
    /// Torn down. May be opened again.
    Closed,
}

/// A unidirectional pipe that accepts exactly one connection per opening.
///
/// ```text
/// Unopened --open--> Listening --connect--> AwaitingConnection --> Streaming
///     Streaming --finish/cancel--> Disconnecting --close--> Closed --open--> ...
/// ```
#[derive(Debug)]
pub struct PipeChannel {
    name: String,
    config: EndpointConfig,
    state: PipeState,
    listener: Option<Listener>,
    stream: Option<PipeStream>,
}

impl PipeChannel {
    /// Create an unopened channel with a fresh unique name.
    pub fn new(direction: PipeDirection) -> Self {
        Self {
            name: unique_pipe_name(),
            config: EndpointConfig {
                direction,
                in_buffer_size: DEFAULT_BUFFER_SIZE,
                out_buffer_size: DEFAULT_BUFFER_SIZE,
                mode: TransmissionMode::Byte,
            },
            state: PipeState::Unopened,
            listener: None,
            stream: None,
        }
    }

    /// Builder: set the in/out buffer sizes.
    pub fn with_buffer_sizes(mut self, in_buffer_size: usize, out_buffer_size: usize) -> Self {
        self.config.in_buffer_size = in_buffer_size;
        self.config.out_buffer_size = out_buffer_size;
        self
    }

    /// Builder: set the transmission mode.
    pub fn with_transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PipeDirection {
        self.config.direction
    }

    pub fn state(&self) -> PipeState {
        self.state
    }

    /// The path ffmpeg is told to open.
    pub fn path(&self) -> String {
        pipe_path(&self.name)
    }

    /// The OS-level endpoint (socket file or pipe name).
    pub fn endpoint_path(&self) -> PathBuf {
        endpoint_path(&self.name)
    }

    /// Create the OS endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the channel is already open, or an
    /// I/O error if the endpoint cannot be created.
    pub fn open(&mut self) -> Result<()> {
        if !matches!(self.state, PipeState::Unopened | PipeState::Closed) {
            return Err(Error::invalid_state(format!(
                "pipe {} already has been opened",
                self.name
            )));
        }

        let listener = endpoint::listen(&self.endpoint_path(), &self.config)?;
        self.listener = Some(listener);
        self.state = PipeState::Listening;
        tracing::debug!("Pipe {} listening at {}", self.name, self.path());
        Ok(())
    }

    /// Wait for ffmpeg to connect.
    ///
    /// Gives up with [`Error::Cancelled`] when the context's cancellation
    /// fires, or when the process exits without having connected.
    pub async fn connect(&mut self, ctx: &ProcessContext) -> Result<&mut PipeStream> {
        let Some(listener) = self.listener.take() else {
            return Err(Error::invalid_state(format!(
                "pipe {} is not listening ({:?})",
                self.name, self.state
            )));
        };
        self.state = PipeState::AwaitingConnection;

        let process_gone = async {
            ctx.process_exited().cancelled().await;
            tokio::time::sleep(LATE_CONNECT_WINDOW).await;
        };

        let connected = tokio::select! {
            result = endpoint::accept(listener, &self.config) => result,
            _ = ctx.cancellation().cancelled() => {
                self.state = PipeState::Disconnecting;
                tracing::debug!("Pipe {} cancelled before a connection", self.name);
                return Err(Error::Cancelled);
            }
            _ = process_gone => {
                self.state = PipeState::Disconnecting;
                tracing::debug!("Process exited without connecting to pipe {}", self.name);
                return Err(Error::Cancelled);
            }
        };

        match connected {
            Ok(stream) => {
                self.state = PipeState::Streaming;
                tracing::debug!("Pipe {} connected", self.name);
                Ok(self.stream.insert(stream))
            }
            Err(e) => {
                self.state = PipeState::Disconnecting;
                Err(e.into())
            }
        }
    }

    /// The connected stream, if any.
    pub fn stream(&mut self) -> Option<&mut PipeStream> {
        self.stream.as_mut()
    }

    /// End the transfer. An outgoing pipe is shut down so ffmpeg sees
    /// end-of-stream; the connection itself stays until [`close`](Self::close).
    pub async fn finish(&mut self) {
        if self.config.direction == PipeDirection::ToProcess {
            if let Some(stream) = self.stream.as_mut() {
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!("Shutting down pipe {} failed: {e}", self.name);
                }
            }
        }
        if self.state != PipeState::Closed {
            self.state = PipeState::Disconnecting;
        }
    }

    /// Disconnect and release the endpoint. Safe in every state; never fails.
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Disconnecting pipe {}", self.name);
            #[cfg(windows)]
            {
                if let Err(e) = stream.disconnect() {
                    tracing::debug!("Disconnecting pipe {} failed: {e}", self.name);
                }
            }
            drop(stream);
        }
        self.listener = None;
        if self.state != PipeState::Unopened {
            endpoint::cleanup(&self.endpoint_path());
            self.state = PipeState::Closed;
        }
    }
}

impl Drop for PipeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixStream;

    #[test]
    fn open_twice_is_rejected() {
        let mut channel = PipeChannel::new(PipeDirection::ToProcess);
        channel.open().unwrap();
        assert_eq!(channel.state(), PipeState::Listening);
        assert!(channel.endpoint_path().exists());
        let err = channel.open().unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)), "unexpected: {err:?}");
        channel.close();
        assert_eq!(channel.state(), PipeState::Closed);
        assert!(!channel.endpoint_path().exists());
    }

    #[test]
    fn close_is_safe_when_never_opened() {
        let mut channel = PipeChannel::new(PipeDirection::FromProcess);
        channel.close();
        channel.close();
        assert_eq!(channel.state(), PipeState::Unopened);
    }

    #[tokio::test]
    async fn connect_without_open_is_invalid_state() {
        let mut channel = PipeChannel::new(PipeDirection::ToProcess);
        let ctx = ProcessContext::new();
        let err = channel.connect(&ctx).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[tokio::test]
    async fn cancellation_before_connection() {
        let mut channel = PipeChannel::new(PipeDirection::ToProcess);
        channel.open().unwrap();
        let ctx = ProcessContext::new();
        ctx.fire_kill();
        let err = channel.connect(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(channel.state(), PipeState::Disconnecting);
        channel.close();
        assert_eq!(channel.state(), PipeState::Closed);
    }

    #[tokio::test]
    async fn process_exit_without_connection_gives_up() {
        let mut channel = PipeChannel::new(PipeDirection::FromProcess);
        channel.open().unwrap();
        let ctx = ProcessContext::new();
        ctx.fire_process_exited();
        let err = channel.connect(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
        channel.close();
    }

    #[tokio::test]
    async fn accepts_one_client_and_streams() {
        let mut channel = PipeChannel::new(PipeDirection::ToProcess);
        channel.open().unwrap();
        let socket = channel.endpoint_path();
        let ctx = ProcessContext::new();

        let client = async {
            let mut stream = UnixStream::connect(&socket).await.unwrap();
            let mut received = Vec::new();
            stream.read_to_end(&mut received).await.unwrap();
            received
        };
        let server = async {
            let stream = channel.connect(&ctx).await.unwrap();
            stream.write_all(b"payload").await.unwrap();
            channel.finish().await;
        };
        let (received, ()) = tokio::join!(client, server);

        assert_eq!(received, b"payload");
        assert_eq!(channel.state(), PipeState::Disconnecting);
        channel.close();
        assert!(!socket.exists());
    }
}

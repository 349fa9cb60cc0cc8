//! Platform endpoints backing a [`PipeChannel`](super::PipeChannel).
//!
//! Unix uses a Unix domain socket listener; Windows uses a named pipe
//! server. Both accept exactly one client.

use super::channel::{PipeDirection, TransmissionMode};

/// Settings applied when an endpoint is created or connected.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EndpointConfig {
    pub direction: PipeDirection,
    pub in_buffer_size: usize,
    pub out_buffer_size: usize,
    pub mode: TransmissionMode,
}

#[cfg(unix)]
pub(crate) use unix::{accept, cleanup, listen, Listener, PipeStream};
#[cfg(windows)]
pub(crate) use windows::{accept, cleanup, listen, Listener, PipeStream};

#[cfg(unix)]
mod unix {
    use std::io;
    use std::path::Path;

    use nix::sys::socket::{setsockopt, sockopt};

    use super::EndpointConfig;
    use crate::pipes::channel::{PipeDirection, TransmissionMode};

    pub(crate) type Listener = std::os::unix::net::UnixListener;
    pub(crate) type PipeStream = tokio::net::UnixStream;

    /// Bind a non-blocking listener at `path`, replacing a stale socket file.
    pub(crate) fn listen(path: &Path, config: &EndpointConfig) -> io::Result<Listener> {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!("Removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        if config.mode == TransmissionMode::Message {
            tracing::debug!("Message mode is not available on Unix sockets; using byte mode");
        }
        let listener = Listener::bind(path)?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }

    /// Accept the single client. The listener is closed afterwards.
    pub(crate) async fn accept(listener: Listener, config: &EndpointConfig) -> io::Result<PipeStream> {
        let listener = tokio::net::UnixListener::from_std(listener)?;
        let (stream, _) = listener.accept().await?;

        let applied = match config.direction {
            PipeDirection::ToProcess => setsockopt(&stream, sockopt::SndBuf, &config.out_buffer_size),
            PipeDirection::FromProcess => setsockopt(&stream, sockopt::RcvBuf, &config.in_buffer_size),
        };
        if let Err(e) = applied {
            tracing::debug!("Could not apply pipe buffer size: {e}");
        }

        Ok(stream)
    }

    /// Remove the socket file. Never fails.
    pub(crate) fn cleanup(path: &Path) {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove socket {}: {e}", path.display()),
        }
    }
}

#[cfg(windows)]
mod windows {
    use std::io;
    use std::path::Path;

    use tokio::net::windows::named_pipe::{NamedPipeServer, PipeMode, ServerOptions};

    use super::EndpointConfig;
    use crate::pipes::channel::{PipeDirection, TransmissionMode};

    pub(crate) type Listener = NamedPipeServer;
    pub(crate) type PipeStream = NamedPipeServer;

    pub(crate) fn listen(path: &Path, config: &EndpointConfig) -> io::Result<Listener> {
        let mode = match config.mode {
            TransmissionMode::Byte => PipeMode::Byte,
            TransmissionMode::Message => PipeMode::Message,
        };
        ServerOptions::new()
            .first_pipe_instance(true)
            .max_instances(1)
            .access_inbound(config.direction == PipeDirection::FromProcess)
            .access_outbound(config.direction == PipeDirection::ToProcess)
            .in_buffer_size(u32::try_from(config.in_buffer_size).unwrap_or(u32::MAX))
            .out_buffer_size(u32::try_from(config.out_buffer_size).unwrap_or(u32::MAX))
            .pipe_mode(mode)
            .create(path)
    }

    pub(crate) async fn accept(listener: Listener, _config: &EndpointConfig) -> io::Result<PipeStream> {
        listener.connect().await?;
        Ok(listener)
    }

    /// Named pipes vanish with their last handle; nothing to remove.
    pub(crate) fn cleanup(_path: &Path) {}
}

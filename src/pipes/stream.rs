//! Data movers: what gets written into an input pipe and where an output
//! pipe's bytes go.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use ffpipe_core::{Error, Result};

/// Default copy block size.
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Produces the bytes ffmpeg reads from an input pipe.
#[async_trait]
pub trait PipeSource: Send {
    /// Options describing the stream format, rendered before `-i`
    /// (e.g. `-f image2pipe`). Empty when ffmpeg can probe the format.
    fn stream_arguments(&self) -> String;

    /// Write the source into `pipe` until exhausted or `cancel` fires.
    async fn write(
        &mut self,
        pipe: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Consumes the bytes ffmpeg writes to an output pipe.
#[async_trait]
pub trait PipeSink: Send {
    /// Container format ffmpeg should produce (`-f <format>`). Empty to let
    /// ffmpeg decide.
    fn format(&self) -> String;

    /// Read `pipe` to its end, or until `cancel` fires.
    async fn read(
        &mut self,
        pipe: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Copy `reader` into `writer` in blocks of `block_size`, aborting with
/// [`Error::Cancelled`] as soon as `cancel` fires. Returns the bytes copied.
pub async fn copy_cancellable<R, W>(
    reader: &mut R,
    writer: &mut W,
    block_size: usize,
    cancel: &CancellationToken,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; block_size.max(1)];
    let mut total: u64 = 0;

    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            read = reader.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            written = writer.write_all(&buf[..n]) => written?,
        }
        total += n as u64;
    }

    writer.flush().await?;
    Ok(total)
}

/// Feeds an input pipe from any async reader (a file, a socket, an
/// in-memory cursor).
pub struct StreamPipeSource {
    source: Box<dyn AsyncRead + Send + Unpin>,
    block_size: usize,
    stream_format: String,
}

impl StreamPipeSource {
    pub fn new(source: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            source: Box::new(source),
            block_size: DEFAULT_BLOCK_SIZE,
            stream_format: String::new(),
        }
    }

    /// Builder: options rendered before `-i`, e.g. `-f image2pipe`.
    pub fn with_stream_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.stream_format = arguments.into();
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

#[async_trait]
impl PipeSource for StreamPipeSource {
    fn stream_arguments(&self) -> String {
        self.stream_format.clone()
    }

    async fn write(
        &mut self,
        pipe: &mut (dyn AsyncWrite + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let copied = copy_cancellable(&mut self.source, pipe, self.block_size, cancel).await?;
        tracing::debug!("Wrote {copied} bytes into input pipe");
        Ok(())
    }
}

impl std::fmt::Debug for StreamPipeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeSource")
            .field("block_size", &self.block_size)
            .field("stream_format", &self.stream_format)
            .finish_non_exhaustive()
    }
}

/// Drains an output pipe into any async writer.
pub struct StreamPipeSink {
    destination: Box<dyn AsyncWrite + Send + Unpin>,
    block_size: usize,
    format: String,
}

impl StreamPipeSink {
    pub fn new(destination: impl AsyncWrite + Send + Unpin + 'static) -> Self {
        Self {
            destination: Box::new(destination),
            block_size: DEFAULT_BLOCK_SIZE,
            format: String::new(),
        }
    }

    /// Builder: container format ffmpeg should write, e.g. `matroska`.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }
}

#[async_trait]
impl PipeSink for StreamPipeSink {
    fn format(&self) -> String {
        self.format.clone()
    }

    async fn read(
        &mut self,
        pipe: &mut (dyn AsyncRead + Send + Unpin),
        cancel: &CancellationToken,
    ) -> Result<()> {
        let copied = copy_cancellable(pipe, &mut self.destination, self.block_size, cancel).await?;
        tracing::debug!("Read {copied} bytes from output pipe");
        Ok(())
    }
}

impl std::fmt::Debug for StreamPipeSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeSink")
            .field("block_size", &self.block_size)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

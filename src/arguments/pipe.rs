//! Input and output arguments that stream through a [`PipeChannel`].

use async_trait::async_trait;

use ffpipe_core::{Error, FfOptions, Result};

use super::Argument;
use crate::context::ProcessContext;
use crate::pipes::{PipeChannel, PipeDirection, PipeSink, PipeSource, TransmissionMode};

/// ffmpeg reads its input from a pipe we feed from a [`PipeSource`].
pub struct InputPipe {
    channel: PipeChannel,
    source: Box<dyn PipeSource>,
}

impl InputPipe {
    pub fn new(source: impl PipeSource + 'static) -> Self {
        Self {
            channel: PipeChannel::new(PipeDirection::ToProcess),
            source: Box::new(source),
        }
    }

    pub fn with_buffer_sizes(mut self, in_buffer_size: usize, out_buffer_size: usize) -> Self {
        self.channel = self.channel.with_buffer_sizes(in_buffer_size, out_buffer_size);
        self
    }

    pub fn with_transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.channel = self.channel.with_transmission_mode(mode);
        self
    }

    pub fn channel(&self) -> &PipeChannel {
        &self.channel
    }

    async fn transfer(&mut self, ctx: &ProcessContext) -> Result<()> {
        let pipe = self.channel.connect(ctx).await?;
        self.source.write(pipe, ctx.cancellation()).await
    }
}

#[async_trait]
impl Argument for InputPipe {
    fn text(&self) -> String {
        format!(
            "{} -i \"{}\"",
            self.source.stream_arguments(),
            self.channel.path()
        )
        .trim()
        .to_string()
    }

    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        self.channel.open()
    }

    async fn during(&mut self, ctx: &ProcessContext) -> Result<()> {
        let result = self.transfer(ctx).await;
        self.channel.finish().await;
        match result {
            Ok(()) => Ok(()),
            Err(Error::Cancelled) => {
                tracing::debug!("Input pipe {} stopped by cancellation", self.channel.name());
                Ok(())
            }
            // ffmpeg may stop reading once it has what it needs.
            Err(Error::Io { source })
                if matches!(
                    source.kind(),
                    std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::ConnectionReset
                ) =>
            {
                tracing::debug!(
                    "ffmpeg closed input pipe {} early: {source}",
                    self.channel.name()
                );
                Ok(())
            }
            Err(e) => Err(Error::data_transfer(self.channel.name(), e)),
        }
    }

    fn post(&mut self) {
        self.channel.close();
    }
}

impl std::fmt::Debug for InputPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputPipe")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

/// ffmpeg writes its output to a pipe we drain into a [`PipeSink`].
pub struct OutputPipe {
    channel: PipeChannel,
    sink: Box<dyn PipeSink>,
}

impl OutputPipe {
    pub fn new(sink: impl PipeSink + 'static) -> Self {
        Self {
            channel: PipeChannel::new(PipeDirection::FromProcess),
            sink: Box::new(sink),
        }
    }

    pub fn with_buffer_sizes(mut self, in_buffer_size: usize, out_buffer_size: usize) -> Self {
        self.channel = self.channel.with_buffer_sizes(in_buffer_size, out_buffer_size);
        self
    }

    pub fn with_transmission_mode(mut self, mode: TransmissionMode) -> Self {
        self.channel = self.channel.with_transmission_mode(mode);
        self
    }

    pub fn channel(&self) -> &PipeChannel {
        &self.channel
    }

    async fn transfer(&mut self, ctx: &ProcessContext) -> Result<()> {
        let pipe = self.channel.connect(ctx).await?;
        self.sink.read(pipe, ctx.cancellation()).await
    }
}

#[async_trait]
impl Argument for OutputPipe {
    fn text(&self) -> String {
        let format = self.sink.format();
        if format.is_empty() {
            format!("\"{}\" -y", self.channel.path())
        } else {
            format!("-f {format} \"{}\" -y", self.channel.path())
        }
    }

    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        self.channel.open()
    }

    async fn during(&mut self, ctx: &ProcessContext) -> Result<()> {
        let result = self.transfer(ctx).await;
        self.channel.finish().await;
        match result {
            Ok(()) => Ok(()),
            Err(Error::Cancelled) => {
                tracing::debug!("Output pipe {} stopped by cancellation", self.channel.name());
                Ok(())
            }
            Err(e) => Err(Error::data_transfer(self.channel.name(), e)),
        }
    }

    fn post(&mut self) {
        self.channel.close();
    }
}

impl std::fmt::Debug for OutputPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPipe")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

//! Command-line arguments with a resource lifecycle.
//!
//! Every argument renders a fragment of the ffmpeg command line and takes part
//! in a three-phase lifecycle around the process:
//!
//! - [`Argument::pre`] runs before ffmpeg starts (write a manifest, open a
//!   pipe).
//! - [`Argument::during`] runs concurrently with ffmpeg (stream bytes through
//!   a pipe).
//! - [`Argument::post`] runs after ffmpeg exited and every `during` finished
//!   (delete the manifest, close the pipe).

use async_trait::async_trait;

use ffpipe_core::{FfOptions, Result};

use crate::context::ProcessContext;
use crate::processor::ArgumentProcessor;

mod concat;
mod custom;
mod device;
mod file;
mod pipe;

pub use concat::{escape_concat_path, ConcatInput};
pub use custom::CustomArgument;
pub use device::InputDevice;
pub use file::{InputFile, OutputFile};
pub use pipe::{InputPipe, OutputPipe};

/// One argument of an ffmpeg invocation.
#[async_trait]
pub trait Argument: Send {
    /// The command-line fragment for this argument.
    fn text(&self) -> String;

    /// Synchronous setup before the process starts, seeing the options of
    /// the processor running it. Must not block on external I/O.
    ///
    /// Runs before the command line is rendered, so [`text`](Argument::text)
    /// may depend on what it prepared.
    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        Ok(())
    }

    /// Work done while the process runs. Must observe
    /// [`ProcessContext::cancellation`].
    async fn during(&mut self, _ctx: &ProcessContext) -> Result<()> {
        Ok(())
    }

    /// Teardown after the process exited. Safe after a failed or partial
    /// [`pre`](Argument::pre); never fails.
    fn post(&mut self) {}
}

/// An ordered set of arguments making up one ffmpeg command line.
#[derive(Default)]
pub struct Arguments {
    arguments: Vec<Box<dyn Argument>>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an argument.
    pub fn add(mut self, argument: impl Argument + 'static) -> Self {
        self.arguments.push(Box::new(argument));
        self
    }

    /// Append a raw option string such as `-c:v libx264 -crf 20`.
    pub fn raw(self, text: impl Into<String>) -> Self {
        self.add(CustomArgument::new(text))
    }

    /// Finish assembling and hand the arguments to a processor.
    pub fn into_processor(self) -> ArgumentProcessor {
        ArgumentProcessor::new(self)
    }

    pub fn len(&self) -> usize {
        self.arguments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    /// The fragments joined by single spaces, skipping empty ones.
    pub fn text(&self) -> String {
        self.arguments
            .iter()
            .map(|a| a.text())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run [`Argument::pre`] in order, stopping at the first failure.
    pub fn pre(&mut self, options: &FfOptions) -> Result<()> {
        for argument in &mut self.arguments {
            argument.pre(options)?;
        }
        Ok(())
    }

    /// Run [`Argument::post`] on every argument.
    pub fn post(&mut self) {
        for argument in &mut self.arguments {
            argument.post();
        }
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Argument>> {
        self.arguments.iter_mut()
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arguments")
            .field("text", &self.text())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_fragments_in_order() {
        let args = Arguments::new()
            .add(InputDevice::new("/dev/video0"))
            .raw("")
            .raw("-c:v ffv1")
            .add(OutputFile::new("/tmp/out.mkv").overwrite(true));
        assert_eq!(args.len(), 4);
        assert_eq!(args.text(), "-i /dev/video0 -c:v ffv1 \"/tmp/out.mkv\" -y");
    }

    #[test]
    fn empty_arguments() {
        let args = Arguments::new();
        assert!(args.is_empty());
        assert_eq!(args.text(), "");
    }
}

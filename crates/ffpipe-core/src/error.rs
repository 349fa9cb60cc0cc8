//! Unified error type for ffpipe.
//!
//! Every stage of a run (argument setup, process start, data transfer and
//! completion handling) funnels its failures into [`Error`]. Cancellation has
//! its own variant so callers can tell it apart from a genuine failure.

/// Error type covering all failure modes of an ffmpeg run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument was driven through its lifecycle out of order, e.g. a
    /// pipe opened twice without an intervening teardown.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A file the run depends on is missing or already exists.
    #[error("File error [{}]: {message}", .path.display())]
    File {
        /// The offending path.
        path: std::path::PathBuf,
        /// Human-readable error description.
        message: String,
    },

    /// The run was cancelled by the caller.
    #[error("ffmpeg processing was cancelled")]
    Cancelled,

    /// ffmpeg exited with a non-zero exit code.
    #[error("ffmpeg exited with non-zero exit-code ({exit_code} - {stderr})")]
    Process {
        /// Exit code reported by the process (`-1` when killed by a signal).
        exit_code: i32,
        /// Captured standard error, one line per diagnostic line.
        stderr: String,
    },

    /// Streaming bytes through a pipe failed.
    #[error("Data transfer error [{pipe}]: {message}")]
    DataTransfer {
        /// Description of the pipe argument that failed.
        pipe: String,
        /// Human-readable error description.
        message: String,
    },

    /// The ffmpeg binary could not be located or started.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// Options failed validation or parsing.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Error {
    /// Whether this error is the cancellation outcome.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Convenience constructor for [`Error::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }

    /// Convenience constructor for [`Error::File`].
    pub fn file(path: impl Into<std::path::PathBuf>, message: impl Into<String>) -> Self {
        Error::File {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::DataTransfer`].
    pub fn data_transfer(pipe: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::DataTransfer {
            pipe: pipe.into(),
            message: message.to_string(),
        }
    }

    /// Build a [`Error::Process`] from an exit code and captured stderr lines.
    pub fn process(exit_code: i32, stderr: &[String]) -> Self {
        Error::Process {
            exit_code,
            stderr: stderr.join("\n"),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_display() {
        let err = Error::invalid_state("pipe already has been opened");
        assert_eq!(
            err.to_string(),
            "Invalid state: pipe already has been opened"
        );
    }

    #[test]
    fn cancelled_is_distinguished() {
        assert!(Error::Cancelled.is_cancelled());
        assert!(!Error::invalid_state("x").is_cancelled());
        assert!(!Error::process(1, &[]).is_cancelled());
    }

    #[test]
    fn process_display_joins_stderr() {
        let err = Error::process(
            1,
            &["first line".to_string(), "second line".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "ffmpeg exited with non-zero exit-code (1 - first line\nsecond line)"
        );
        match err {
            Error::Process { exit_code, stderr } => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "first line\nsecond line");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn file_display() {
        let err = Error::file("/tmp/out.mp4", "already exists");
        assert_eq!(err.to_string(), "File error [/tmp/out.mp4]: already exists");
    }

    #[test]
    fn data_transfer_display() {
        let err = Error::data_transfer("input pipe ffpipe_0a1b2c3d", "connection reset");
        assert_eq!(
            err.to_string(),
            "Data transfer error [input pipe ffpipe_0a1b2c3d]: connection reset"
        );
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn tool_display() {
        let err = Error::tool("ffmpeg", "not found");
        assert_eq!(err.to_string(), "Tool error [ffmpeg]: not found");
    }
}

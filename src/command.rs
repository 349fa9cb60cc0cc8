//! Spawning ffmpeg from an assembled command line.
//!
//! Arguments render themselves as text fragments and the processor joins them
//! into one string. On Windows that string is handed to the process verbatim;
//! elsewhere it is split into argv with double-quote grouping, the same rules
//! the fragments are rendered with.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::{Child, Command};

use ffpipe_core::{Error, Result};

/// A builder for a single ffmpeg invocation.
///
/// # Example
///
/// ```no_run
/// use ffpipe::command::ProcessCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> ffpipe_core::Result<()> {
/// let mut child = ProcessCommand::new(PathBuf::from("ffmpeg"), "-i \"in.mkv\" \"out.mp4\" -y")
///     .spawn()?;
/// child.wait().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ProcessCommand {
    program: PathBuf,
    command_line: String,
    working_directory: Option<PathBuf>,
}

impl ProcessCommand {
    /// Create a new command for the given program path and command line.
    pub fn new(program: PathBuf, command_line: impl Into<String>) -> Self {
        Self {
            program,
            command_line: command_line.into(),
            working_directory: None,
        }
    }

    /// Set the working directory of the spawned process.
    pub fn working_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }

    /// Short name of the program, used in errors and logs.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Spawn the process with stdin, stdout and stderr piped.
    ///
    /// The child is killed if its handle is dropped before it exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails.
    pub fn spawn(&self) -> Result<Child> {
        let mut cmd = Command::new(&self.program);
        self.apply_arguments(&mut cmd);

        if let Some(dir) = &self.working_directory {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::info!("Starting {}: {}", self.program.display(), self.command_line);

        cmd.spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))
    }

    #[cfg(windows)]
    fn apply_arguments(&self, cmd: &mut Command) {
        cmd.raw_arg(&self.command_line);
    }

    #[cfg(not(windows))]
    fn apply_arguments(&self, cmd: &mut Command) {
        cmd.args(split_command_line(&self.command_line));
    }
}

/// Split a rendered command line into individual arguments.
///
/// Whitespace separates arguments except inside double quotes. Quotes group
/// and are removed; `\"` yields a literal quote. Single quotes and other
/// backslashes are kept as-is, so filter expressions like
/// `scale='min(1920,iw)'` pass through untouched.
pub fn split_command_line(command_line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quoted = false;
    let mut chars = command_line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
                in_token = true;
            }
            '"' => {
                quoted = !quoted;
                in_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_arguments() {
        assert_eq!(
            split_command_line("-i input.mkv  -c copy out.mp4"),
            vec!["-i", "input.mkv", "-c", "copy", "out.mp4"]
        );
    }

    #[test]
    fn split_quoted_path_with_spaces() {
        assert_eq!(
            split_command_line("-f concat -safe 0 -i \"/tmp/my files/concat_1.txt\" \"out put.mp4\" -y"),
            vec![
                "-f",
                "concat",
                "-safe",
                "0",
                "-i",
                "/tmp/my files/concat_1.txt",
                "out put.mp4",
                "-y"
            ]
        );
    }

    #[test]
    fn split_keeps_single_quotes_and_escaped_double_quotes() {
        assert_eq!(
            split_command_line("-vf scale='min(1920,iw)':-2 -metadata title=\"a \\\"b\\\" c\""),
            vec!["-vf", "scale='min(1920,iw)':-2", "-metadata", "title=a \"b\" c"]
        );
    }

    #[test]
    fn split_empty_quotes_yield_empty_argument() {
        assert_eq!(split_command_line("-a \"\" -b"), vec!["-a", "", "-b"]);
    }

    #[test]
    fn split_blank_line() {
        assert!(split_command_line("   ").is_empty());
    }

    #[test]
    fn program_name_is_file_name() {
        let cmd = ProcessCommand::new(PathBuf::from("/usr/bin/ffmpeg"), "");
        assert_eq!(cmd.program_name(), "ffmpeg");
    }

    #[tokio::test]
    async fn spawn_nonexistent_tool() {
        let result = ProcessCommand::new(PathBuf::from("nonexistent_tool_xyz_12345"), "-version")
            .spawn();
        assert!(matches!(result, Err(Error::Tool { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_passes_split_arguments() {
        use tokio::io::AsyncReadExt;

        let mut child = ProcessCommand::new(PathBuf::from("/bin/sh"), "-c \"echo 'a b'\"")
            .spawn()
            .unwrap();
        let mut stdout = child.stdout.take().unwrap();
        let mut out = String::new();
        stdout.read_to_string(&mut out).await.unwrap();
        assert!(child.wait().await.unwrap().success());
        assert_eq!(out.trim(), "a b");
    }
}

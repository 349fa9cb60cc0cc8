//! Runs one ffmpeg invocation from an assembled [`Arguments`] set.
//!
//! A run goes through the argument lifecycle around the process: every
//! `pre` before the process starts, every `during` concurrently with it,
//! every `post` after both the process and all `during` work finished.
//! Everything is driven from the calling task; nothing is spawned.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::process::Child;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use ffpipe_core::{Error, FfOptions, LogLevel, Result};

use crate::arguments::Arguments;
use crate::cancel::{CancelHandle, CancelSources, Escalation};
use crate::command::ProcessCommand;
use crate::context::ProcessContext;
use crate::progress::{read_lines, OutputMonitor, ProgressMonitor};
use crate::tools::resolve_ffmpeg;

/// What an ffmpeg run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    /// Exit code; `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    /// Whether the run's kill signal terminated the process.
    pub killed: bool,
    /// stdout lines.
    pub output: Vec<String>,
    /// stderr lines.
    pub error_output: Vec<String>,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.killed
    }
}

/// Orchestrates ffmpeg runs for one set of arguments.
///
/// # Example
///
/// ```no_run
/// use ffpipe::arguments::{Arguments, InputFile, OutputFile};
/// use std::time::Duration;
///
/// # async fn example() -> ffpipe_core::Result<()> {
/// let mut processor = Arguments::new()
///     .add(InputFile::new("input.mkv"))
///     .raw("-c:v libx264 -crf 20")
///     .add(OutputFile::new("output.mp4").overwrite(true))
///     .into_processor()
///     .notify_on_progress(|pct| println!("{pct:.2}%"), Duration::from_secs(90));
///
/// let cancel = processor.cancel_handle();
/// // Hand `cancel` to whoever may stop the run.
/// # drop(cancel);
/// processor.process_async(true).await?;
/// # Ok(())
/// # }
/// ```
pub struct ArgumentProcessor {
    arguments: Arguments,
    options: FfOptions,
    log_level: Option<LogLevel>,
    progress: ProgressMonitor,
    output: OutputMonitor,
    cancel_sources: CancelSources,
    cancel_handle: Option<CancelHandle>,
}

/// How long stdout and stderr are still read once ffmpeg has exited.
///
/// Descendants that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_WINDOW: Duration = Duration::from_millis(500);

/// How the process half of a run ended.
struct Exit {
    status: io::Result<ExitStatus>,
    /// The run's kill signal terminated the process.
    killed: bool,
}

impl Exit {
    fn abnormal(&self) -> bool {
        !matches!(&self.status, Ok(status) if status.success())
    }
}

impl ArgumentProcessor {
    pub fn new(arguments: Arguments) -> Self {
        Self {
            arguments,
            options: FfOptions::default(),
            log_level: None,
            progress: ProgressMonitor::new(),
            output: OutputMonitor::new(),
            cancel_sources: CancelSources::default(),
            cancel_handle: None,
        }
    }

    /// Report progress as a percentage of `total`.
    pub fn notify_on_progress(
        mut self,
        callback: impl FnMut(f64) + Send + 'static,
        total: Duration,
    ) -> Self {
        self.progress.on_percentage(total, callback);
        self
    }

    /// Report the processed media time from every stats line.
    pub fn notify_on_time_progress(mut self, callback: impl FnMut(Duration) + Send + 'static) -> Self {
        self.progress.on_time(callback);
        self
    }

    /// Receive every stdout line.
    pub fn notify_on_output(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.output.on_line(callback);
        self
    }

    /// Receive every stderr line.
    pub fn notify_on_error(mut self, callback: impl FnMut(&str) + Send + 'static) -> Self {
        self.progress.on_line(callback);
        self
    }

    /// Stop runs when `token` is cancelled, killing ffmpeg if it is still
    /// running after `grace`.
    pub fn cancellable_through(mut self, token: CancellationToken, grace: Duration) -> Self {
        self.cancel_sources.set_token(token, grace);
        self
    }

    /// Replace the options wholesale.
    pub fn with_options(mut self, options: FfOptions) -> Self {
        self.options = options;
        self
    }

    /// Adjust the options in place.
    pub fn configure(mut self, configure: impl FnOnce(&mut FfOptions)) -> Self {
        configure(&mut self.options);
        self
    }

    /// Override the options' log level for this processor.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    /// A handle that cancels the run in progress. Requests made between runs
    /// are dropped.
    pub fn cancel_handle(&mut self) -> CancelHandle {
        if let Some(handle) = &self.cancel_handle {
            return handle.clone();
        }
        let (handle, rx) = CancelHandle::channel();
        self.cancel_sources.set_handle(rx);
        self.cancel_handle = Some(handle.clone());
        handle
    }

    pub fn options(&self) -> &FfOptions {
        &self.options
    }

    /// The full command line passed to ffmpeg.
    pub fn arguments(&self) -> String {
        let mut text = self.arguments.text();
        if let Some(level) = self.log_level.or(self.options.log_level) {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str("-v ");
            text.push_str(level.as_str());
        }
        text
    }

    /// Run ffmpeg and report success.
    ///
    /// With `throw_on_error` a nonzero exit becomes [`Error::Process`] and a
    /// cancelled run [`Error::Cancelled`]; without it both yield `Ok(false)`.
    /// Setup and data-transfer errors are returned either way.
    pub async fn process_async(&mut self, throw_on_error: bool) -> Result<bool> {
        match self.run().await {
            Ok(result) if result.success() => {
                self.progress.complete();
                tracing::info!("ffmpeg finished successfully");
                Ok(true)
            }
            Ok(result) => {
                tracing::warn!("ffmpeg exited with code {}", result.exit_code);
                if throw_on_error {
                    Err(Error::process(result.exit_code, &result.error_output))
                } else {
                    Ok(false)
                }
            }
            Err(Error::Cancelled) if !throw_on_error => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Blocking form of [`process_async`](Self::process_async) on a private
    /// current-thread runtime. Must not be called from within a runtime.
    pub fn process_sync(&mut self, throw_on_error: bool) -> Result<bool> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.process_async(throw_on_error))
    }

    /// Run ffmpeg once and return the raw result.
    ///
    /// A cancelled run yields [`Error::Cancelled`]; a failed pipe transfer
    /// yields [`Error::DataTransfer`]. `post` runs on every argument whatever
    /// the outcome, provided `pre` was attempted.
    pub async fn run(&mut self) -> Result<ProcessResult> {
        self.progress.reset();
        self.cancel_sources.reset();

        if let Err(e) = self.arguments.pre(&self.options) {
            tracing::debug!("Argument setup failed: {e}");
            self.arguments.post();
            return Err(e);
        }

        let command_line = self.arguments();

        let child = match self.spawn(&command_line) {
            Ok(child) => child,
            Err(e) => {
                self.arguments.post();
                return Err(e);
            }
        };

        let outcome = self.supervise(child).await;
        self.arguments.post();
        outcome
    }

    fn spawn(&self, command_line: &str) -> Result<Child> {
        let ffmpeg = resolve_ffmpeg(&self.options)?;
        ProcessCommand::new(ffmpeg, command_line)
            .working_directory(self.options.working_directory.clone())
            .spawn()
    }

    async fn supervise(&mut self, mut child: Child) -> Result<ProcessResult> {
        let Self {
            arguments,
            options,
            progress,
            output,
            cancel_sources,
            ..
        } = self;

        let ctx = ProcessContext::new();
        let mut escalation = Escalation::new(child.stdin.take());
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();

        let wait = async {
            tokio::select! {
                biased;
                status = child.wait() => Exit { status, killed: false },
                _ = ctx.kill_signal().cancelled() => match child.try_wait() {
                    Ok(Some(status)) => Exit { status: Ok(status), killed: false },
                    _ => {
                        tracing::debug!("Killing ffmpeg");
                        if let Err(e) = child.start_kill() {
                            tracing::debug!("Kill request failed: {e}");
                        }
                        Exit { status: child.wait().await, killed: true }
                    }
                },
            }
        };
        tokio::pin!(wait);

        let mut readers = Box::pin(async {
            let stdout = async {
                match stdout {
                    Some(pipe) => {
                        read_lines(pipe, |line| {
                            output.observe(line);
                            stdout_lines.push(line.to_string());
                        })
                        .await
                    }
                    None => Ok(()),
                }
            };
            let stderr = async {
                match stderr {
                    Some(pipe) => {
                        read_lines(pipe, |line| {
                            progress.observe(line);
                            stderr_lines.push(line.to_string());
                        })
                        .await
                    }
                    None => Ok(()),
                }
            };
            let (stdout, stderr) = tokio::join!(stdout, stderr);
            if let Err(e) = stdout {
                tracing::debug!("Reading ffmpeg stdout failed: {e}");
            }
            if let Err(e) = stderr {
                tracing::debug!("Reading ffmpeg stderr failed: {e}");
            }
        });

        let mut transfers: FuturesUnordered<_> =
            arguments.iter_mut().map(|a| a.during(&ctx)).collect();

        let mut exit: Option<Exit> = None;
        let mut drained = false;
        let mut drain_deadline: Option<Instant> = None;
        let mut fault: Option<Error> = None;

        while exit.is_none() || !drained || !transfers.is_empty() {
            tokio::select! {
                done = &mut wait, if exit.is_none() => {
                    ctx.fire_process_exited();
                    drain_deadline = Some(Instant::now() + OUTPUT_DRAIN_WINDOW);
                    if !transfers.is_empty() {
                        if done.abnormal() {
                            tracing::debug!("ffmpeg exited abnormally; cancelling data transfers");
                            ctx.fire_kill();
                        } else if ctx.is_user_cancelled() || fault.is_some() {
                            tracing::debug!("ffmpeg exited while being stopped; cancelling data transfers");
                            ctx.fire_cancellation();
                        }
                    }
                    exit = Some(done);
                }
                _ = &mut readers, if !drained => {
                    drained = true;
                }
                _ = sleep_until(drain_deadline), if !drained => {
                    tracing::debug!("ffmpeg output still open {OUTPUT_DRAIN_WINDOW:?} after exit; no longer reading it");
                    drained = true;
                }
                Some(result) = transfers.next(), if !transfers.is_empty() => {
                    let Err(e) = result else { continue };
                    match &exit {
                        Some(done) if done.abnormal() => {
                            tracing::debug!("Dropping data transfer error after abnormal exit: {e}");
                        }
                        _ if fault.is_some() => {
                            tracing::debug!("Additional data transfer error: {e}");
                        }
                        Some(_) => {
                            tracing::warn!("Data transfer failed after ffmpeg exited: {e}");
                            fault = Some(e);
                            ctx.fire_cancellation();
                        }
                        None => {
                            tracing::warn!("Data transfer failed; stopping ffmpeg: {e}");
                            fault = Some(e);
                            escalation.request(options.fault_grace_period, &ctx).await;
                        }
                    }
                }
                grace = cancel_sources.next() => {
                    tracing::info!("Cancellation requested (grace period {grace:?})");
                    ctx.fire_user_cancellation();
                    if exit.is_some() {
                        ctx.fire_cancellation();
                    } else {
                        escalation.request(grace, &ctx).await;
                    }
                }
                _ = escalation.expired(), if exit.is_none() => {
                    escalation.expire(&ctx);
                }
            }
        }

        ctx.fire_all();
        drop(transfers);
        drop(readers);

        let Some(exit) = exit else {
            return Err(Error::invalid_state("ffmpeg exit was never observed"));
        };

        if ctx.is_user_cancelled() {
            tracing::info!("ffmpeg run cancelled");
            return Err(Error::Cancelled);
        }
        if let Some(fault) = fault {
            return Err(fault);
        }

        let status = exit.status?;
        Ok(ProcessResult {
            exit_code: status.code().unwrap_or(-1),
            killed: exit.killed,
            output: stdout_lines,
            error_output: stderr_lines,
        })
    }
}

/// Sleep until `deadline`; pending forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for ArgumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentProcessor")
            .field("arguments", &self.arguments)
            .field("options", &self.options)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

//! Graceful-then-forceful cancellation.
//!
//! A caller stops a run through a [`CancelHandle`] (or an external
//! `CancellationToken` registered on the processor). The request starts
//! [`Escalation`]: `q` is written to ffmpeg's stdin, and if the process is
//! still running once the grace period has elapsed the run's *kill* signal
//! fires.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::ChildStdin;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::context::ProcessContext;

/// Key ffmpeg treats as an interactive quit request.
const QUIT_SIGNAL: &[u8] = b"q\n";

/// Caller-side handle for cancelling a run.
///
/// Handles are cheap to clone. Requests only affect the run in progress;
/// anything sent while no run is active is dropped when the next run starts.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: mpsc::UnboundedSender<Duration>,
}

impl CancelHandle {
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Duration>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Ask ffmpeg to quit, killing it if it is still running after `grace`.
    pub fn cancel(&self, grace: Duration) {
        if self.tx.send(grace).is_err() {
            tracing::debug!("Cancel requested after the processor was dropped");
        }
    }

    /// Ask ffmpeg to quit and kill it right away.
    pub fn cancel_now(&self) {
        self.cancel(Duration::ZERO);
    }
}

/// Where cancellation requests for a run come from.
#[derive(Debug, Default)]
pub(crate) struct CancelSources {
    handle: Option<mpsc::UnboundedReceiver<Duration>>,
    token: Option<(CancellationToken, Duration)>,
    token_seen: bool,
}

impl CancelSources {
    pub(crate) fn set_handle(&mut self, rx: mpsc::UnboundedReceiver<Duration>) {
        self.handle = Some(rx);
    }

    pub(crate) fn set_token(&mut self, token: CancellationToken, grace: Duration) {
        self.token = Some((token, grace));
    }

    /// Prepare for a new run: re-arm the external token and drop handle
    /// requests left over from before the run.
    pub(crate) fn reset(&mut self) {
        self.token_seen = false;
        if let Some(rx) = self.handle.as_mut() {
            let mut stale = 0;
            while rx.try_recv().is_ok() {
                stale += 1;
            }
            if stale > 0 {
                tracing::debug!("Dropped {stale} cancel request(s) made between runs");
            }
        }
    }

    /// Wait for the next cancellation request and return its grace period.
    ///
    /// Pending forever when no source is registered or every source is
    /// exhausted.
    pub(crate) async fn next(&mut self) -> Duration {
        let token = match &self.token {
            Some((token, grace)) if !self.token_seen => Some((token.clone(), *grace)),
            _ => None,
        };

        loop {
            tokio::select! {
                grace = recv(&mut self.handle) => match grace {
                    Some(grace) => return grace,
                    None => self.handle = None,
                },
                grace = token_cancelled(&token) => {
                    self.token_seen = true;
                    return grace;
                }
            }
        }
    }
}

async fn recv(rx: &mut Option<mpsc::UnboundedReceiver<Duration>>) -> Option<Duration> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn token_cancelled(token: &Option<(CancellationToken, Duration)>) -> Duration {
    match token {
        Some((token, grace)) => {
            token.cancelled().await;
            *grace
        }
        None => std::future::pending().await,
    }
}

/// Escalation state for one run.
#[derive(Debug)]
pub(crate) struct Escalation {
    stdin: Option<ChildStdin>,
    quit_sent: bool,
    deadline: Option<Instant>,
}

impl Escalation {
    pub(crate) fn new(stdin: Option<ChildStdin>) -> Self {
        Self {
            stdin,
            quit_sent: false,
            deadline: None,
        }
    }

    /// Start (or tighten) escalation with the given grace period.
    ///
    /// Sends the quit signal once per run. A zero grace period fires *kill*
    /// immediately. Once the process has exited this is a no-op.
    pub(crate) async fn request(&mut self, grace: Duration, ctx: &ProcessContext) {
        if ctx.has_exited() {
            tracing::debug!("Cancellation requested after ffmpeg exited; ignoring");
            return;
        }

        if !self.quit_sent {
            self.quit_sent = true;
            self.send_quit().await;
        }

        if grace.is_zero() {
            tracing::debug!("No grace period; killing ffmpeg");
            self.deadline = None;
            ctx.fire_kill();
            return;
        }

        let deadline = Instant::now() + grace;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
    }

    async fn send_quit(&mut self) {
        let Some(stdin) = self.stdin.as_mut() else {
            return;
        };
        let result = async {
            stdin.write_all(QUIT_SIGNAL).await?;
            stdin.flush().await
        }
        .await;
        match result {
            Ok(()) => tracing::debug!("Sent quit signal to ffmpeg"),
            Err(e) => tracing::debug!("Failed to send quit signal to ffmpeg: {e}"),
        }
    }

    /// Wait until the grace deadline passes; pending while none is armed.
    pub(crate) async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }

    /// Fire *kill* after the grace period ran out.
    pub(crate) fn expire(&mut self, ctx: &ProcessContext) {
        self.deadline = None;
        if !ctx.has_exited() {
            tracing::warn!("ffmpeg did not exit within the grace period; killing it");
            ctx.fire_kill();
        }
    }
}

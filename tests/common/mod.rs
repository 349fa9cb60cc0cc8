//! Shared helpers for integration tests.
//!
//! Process-driving tests run `/bin/sh` in place of ffmpeg: the processor only
//! cares that the binary reads `q` from stdin and writes lines to
//! stdout/stderr. Tests that need the real thing check [`ffmpeg_available`]
//! first.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use ffpipe::{Argument, FfOptions, ProcessContext, Result};

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Options running `/bin/sh` as the process binary.
pub fn shell_options() -> FfOptions {
    FfOptions {
        ffmpeg_path: Some("/bin/sh".into()),
        fault_grace_period: Duration::from_millis(300),
        ..FfOptions::default()
    }
}

/// `true` when an ffmpeg binary is on `PATH`.
pub fn ffmpeg_available() -> bool {
    if which::which("ffmpeg").is_ok() {
        true
    } else {
        eprintln!("ffmpeg not found on PATH; skipping");
        false
    }
}

/// Shared, clonable event log.
#[derive(Debug, Clone, Default)]
pub struct Events(Arc<Mutex<Vec<String>>>);

impl Events {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

/// An argument that records its lifecycle and renders nothing.
///
/// Its `during` waits until the process exits or the run is cancelled, then
/// records the context's state.
pub struct Recording {
    pub name: &'static str,
    pub events: Events,
}

impl Recording {
    pub fn new(name: &'static str, events: &Events) -> Self {
        Self {
            name,
            events: events.clone(),
        }
    }
}

#[async_trait]
impl Argument for Recording {
    fn text(&self) -> String {
        String::new()
    }

    fn pre(&mut self, _options: &FfOptions) -> Result<()> {
        self.events.push(format!("{}:pre", self.name));
        Ok(())
    }

    async fn during(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.events.push(format!("{}:during", self.name));
        tokio::select! {
            _ = ctx.process_exited().cancelled() => {}
            _ = ctx.cancellation().cancelled() => {}
        }
        self.events.push(format!(
            "{}:woke exited={} cancelled={}",
            self.name,
            ctx.has_exited(),
            ctx.is_cancelled()
        ));
        Ok(())
    }

    fn post(&mut self) {
        self.events.push(format!("{}:post", self.name));
    }
}

/// An argument whose data transfer fails right away.
pub struct Faulting {
    pub events: Events,
}

#[async_trait]
impl Argument for Faulting {
    fn text(&self) -> String {
        String::new()
    }

    async fn during(&mut self, _ctx: &ProcessContext) -> Result<()> {
        self.events.push("fault:during");
        Err(ffpipe::Error::data_transfer("test_pipe", "source went away"))
    }

    fn post(&mut self) {
        self.events.push("fault:post");
    }
}

/// An argument whose `during` ignores process exit and returns only once the
/// run's cancellation token fires.
pub struct AwaitsCancellation {
    pub events: Events,
}

impl AwaitsCancellation {
    pub fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
        }
    }
}

#[async_trait]
impl Argument for AwaitsCancellation {
    fn text(&self) -> String {
        String::new()
    }

    async fn during(&mut self, ctx: &ProcessContext) -> Result<()> {
        self.events.push("await:during");
        ctx.cancellation().cancelled().await;
        self.events.push("await:cancelled");
        Ok(())
    }

    fn post(&mut self) {
        self.events.push("await:post");
    }
}

//! Cancellation signals shared across one ffmpeg run.

use tokio_util::sync::CancellationToken;

/// The four cancellation signals of a run.
///
/// The signals are independent tokens; the hierarchy between them lives in
/// the `fire_*` methods:
///
/// - *user cancellation* fires when the caller asks to stop. It never kills
///   anything by itself; it starts escalation.
/// - *kill* fires when ffmpeg must be terminated forcefully. Firing it then
///   fires *cancellation*.
/// - *process exited* fires once ffmpeg has terminated and is never reset.
/// - *cancellation* is the token every `During()` phase observes.
///
/// Every fire operation is idempotent. Cloning yields handles onto the same
/// signals.
#[derive(Debug, Clone, Default)]
pub struct ProcessContext {
    user_cancellation: CancellationToken,
    kill: CancellationToken,
    process_exited: CancellationToken,
    cancellation: CancellationToken,
}

impl ProcessContext {
    /// Create a context with no signal fired.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by data-transfer phases.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Token fired once the process has exited.
    pub fn process_exited(&self) -> &CancellationToken {
        &self.process_exited
    }

    /// Token fired when the process must be killed.
    pub fn kill_signal(&self) -> &CancellationToken {
        &self.kill
    }

    pub fn is_user_cancelled(&self) -> bool {
        self.user_cancellation.is_cancelled()
    }

    pub fn is_killed(&self) -> bool {
        self.kill.is_cancelled()
    }

    pub fn has_exited(&self) -> bool {
        self.process_exited.is_cancelled()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn fire_user_cancellation(&self) {
        self.user_cancellation.cancel();
    }

    /// Fire *kill*, then *cancellation*.
    pub fn fire_kill(&self) {
        self.kill.cancel();
        self.cancellation.cancel();
    }

    pub fn fire_process_exited(&self) {
        self.process_exited.cancel();
    }

    /// Fire *cancellation* alone, for stopping data transfers once there is
    /// no process left to kill.
    pub fn fire_cancellation(&self) {
        self.cancellation.cancel();
    }

    /// Fire every signal except user cancellation, releasing anything still
    /// waiting on the context.
    pub fn fire_all(&self) {
        self.process_exited.cancel();
        self.kill.cancel();
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_nothing_fired() {
        let ctx = ProcessContext::new();
        assert!(!ctx.is_user_cancelled());
        assert!(!ctx.is_killed());
        assert!(!ctx.has_exited());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn kill_fires_cancellation() {
        let ctx = ProcessContext::new();
        ctx.fire_kill();
        assert!(ctx.is_killed());
        assert!(ctx.is_cancelled());
        assert!(!ctx.has_exited());
        assert!(!ctx.is_user_cancelled());
    }

    #[test]
    fn user_cancellation_does_not_kill() {
        let ctx = ProcessContext::new();
        ctx.fire_user_cancellation();
        assert!(ctx.is_user_cancelled());
        assert!(!ctx.is_killed());
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancellation_alone_leaves_kill_unfired() {
        let ctx = ProcessContext::new();
        ctx.fire_process_exited();
        ctx.fire_cancellation();
        assert!(ctx.is_cancelled());
        assert!(!ctx.is_killed());
    }

    #[test]
    fn fire_is_idempotent_and_shared_by_clones() {
        let ctx = ProcessContext::new();
        let clone = ctx.clone();
        ctx.fire_process_exited();
        ctx.fire_process_exited();
        assert!(clone.has_exited());

        clone.fire_all();
        clone.fire_all();
        assert!(ctx.is_killed());
        assert!(ctx.is_cancelled());
        assert!(!ctx.is_user_cancelled());
    }

    #[tokio::test]
    async fn waiters_wake_on_kill() {
        let ctx = ProcessContext::new();
        let waiter = ctx.clone();
        let handle = tokio::spawn(async move { waiter.cancellation().cancelled().await });
        ctx.fire_kill();
        handle.await.unwrap();
    }
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Time of the last inbound message
///
/// Written by the session's message path, read by the watchdog.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    /// Record activity now
    pub fn touch(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.store(now, Ordering::SeqCst);
    }

    /// Time since the last recorded activity
    pub fn idle_for(&self) -> Duration {
        let now = self.origin.elapsed().as_millis() as u64;
        let last = self.last_ms.load(Ordering::SeqCst);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-session idle timer
///
/// Polls the activity clock and, once the session has been idle for longer
/// than the threshold, cancels the session's `closing` token and exits.
/// Dropping the handle also stops the timer, without waiting for it.
pub struct Watchdog {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Watchdog {
    pub fn spawn(
        session_id: String,
        activity: Arc<ActivityClock>,
        closing: CancellationToken,
        poll_interval: Duration,
        idle_timeout: Duration,
    ) -> Self {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => {
                        debug!("Watchdog for session {} cancelled", session_id);
                        break;
                    }
                    _ = tokio::time::sleep(poll_interval) => {
                        let idle = activity.idle_for();
                        if idle > idle_timeout {
                            info!(
                                "Closing idle session {} after {:.1}s without messages",
                                session_id,
                                idle.as_secs_f64()
                            );
                            closing.cancel();
                            break;
                        }
                    }
                }
            }
        });

        Self { cancel, task }
    }

    /// Stop the timer and wait for its task to exit
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.task).await {
            debug!("Watchdog task ended abnormally: {}", e);
        }
    }

    /// Whether the timer task has exited (fired or cancelled)
    #[cfg(test)]
    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: Duration = Duration::from_secs(5);
    const IDLE: Duration = Duration::from_secs(15);

    fn spawn(activity: &Arc<ActivityClock>, closing: &CancellationToken) -> Watchdog {
        Watchdog::spawn(
            "test".to_string(),
            Arc::clone(activity),
            closing.clone(),
            POLL,
            IDLE,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_idle_threshold() {
        let activity = Arc::new(ActivityClock::new());
        let closing = CancellationToken::new();
        let started = Instant::now();
        let _watchdog = spawn(&activity, &closing);

        closing.cancelled().await;

        // 15s is not strictly past the threshold; the next poll at 20s is
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_resets_the_clock() {
        let activity = Arc::new(ActivityClock::new());
        let closing = CancellationToken::new();
        let started = Instant::now();
        let _watchdog = spawn(&activity, &closing);

        for _ in 0..6 {
            tokio::time::sleep(Duration::from_secs(10)).await;
            activity.touch();
            assert!(!closing.is_cancelled());
        }

        closing.cancelled().await;
        // Last touch at 60s, first poll past 75s is at 80s
        assert_eq!(started.elapsed(), Duration::from_secs(80));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_the_timer() {
        let activity = Arc::new(ActivityClock::new());
        let closing = CancellationToken::new();
        let watchdog = spawn(&activity, &closing);

        tokio::time::sleep(Duration::from_secs(6)).await;
        watchdog.stop().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!closing.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_the_timer() {
        let activity = Arc::new(ActivityClock::new());
        let closing = CancellationToken::new();
        let watchdog = spawn(&activity, &closing);
        let stop = watchdog.cancel.clone();

        drop(watchdog);
        assert!(stop.is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(!closing.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_after_firing() {
        let activity = Arc::new(ActivityClock::new());
        let closing = CancellationToken::new();
        let watchdog = spawn(&activity, &closing);

        closing.cancelled().await;
        tokio::task::yield_now().await;
        assert!(watchdog.is_finished());
    }
}

//! Single-shot timers driving t-Reordering
//!
//! A timer never calls back into its owner. When it fires it hands out an
//! [`ExpiryToken`] identifying the run; the owner passes the token back through
//! [`UniqueTimer::consume_expiry`], which rejects tokens of runs that were
//! stopped or restarted in the meantime.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies one run of a timer
pub type ExpiryToken = u64;

/// Single-shot timer exclusively owned by one entity
pub trait UniqueTimer {
    /// Set the duration used by subsequent runs
    fn set_duration(&mut self, duration: Duration);

    /// Configured duration
    fn duration(&self) -> Duration;

    /// Start the timer, restarting it if already running
    fn run(&mut self);

    /// Stop the timer, a pending expiry of the current run becomes stale
    fn stop(&mut self);

    /// True from `run` until the run is stopped or its expiry consumed
    fn is_running(&self) -> bool;

    /// Accept an expiry notification; false if it does not belong to the current run
    fn consume_expiry(&mut self, token: ExpiryToken) -> bool;
}

/// Timer backed by a tokio sleep task
///
/// On expiry the token is posted to the channel the owning task listens on.
/// Must be used from within a tokio runtime.
pub struct TokioTimer {
    duration: Duration,
    generation: ExpiryToken,
    running: bool,
    expiry_tx: mpsc::UnboundedSender<ExpiryToken>,
    sleep_task: Option<JoinHandle<()>>,
}

impl TokioTimer {
    /// Create a stopped timer posting expiries to `expiry_tx`
    pub fn new(expiry_tx: mpsc::UnboundedSender<ExpiryToken>) -> Self {
        Self {
            duration: Duration::ZERO,
            generation: 0,
            running: false,
            expiry_tx,
            sleep_task: None,
        }
    }

    fn abort_sleep(&mut self) {
        if let Some(task) = self.sleep_task.take() {
            task.abort();
        }
    }
}

impl UniqueTimer for TokioTimer {
    fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn run(&mut self) {
        self.abort_sleep();
        self.generation = self.generation.wrapping_add(1);
        self.running = true;

        let token = self.generation;
        let duration = self.duration;
        let expiry_tx = self.expiry_tx.clone();
        self.sleep_task = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Owner gone means nobody is waiting for the expiry
            let _ = expiry_tx.send(token);
        }));
        trace!("Timer run {} started for {:?}", token, duration);
    }

    fn stop(&mut self) {
        self.abort_sleep();
        if self.running {
            trace!("Timer run {} stopped", self.generation);
        }
        self.generation = self.generation.wrapping_add(1);
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn consume_expiry(&mut self, token: ExpiryToken) -> bool {
        if !self.running || token != self.generation {
            trace!("Ignoring stale expiry {} (current run {})", token, self.generation);
            return false;
        }
        self.running = false;
        self.sleep_task = None;
        true
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.abort_sleep();
    }
}

/// Deterministic timer advanced explicitly by the caller
#[derive(Debug, Default)]
pub struct ManualTimer {
    duration: Duration,
    generation: ExpiryToken,
    remaining: Option<Duration>,
    fired: Option<ExpiryToken>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `elapsed` pass; returns the token if the current run expires
    pub fn advance(&mut self, elapsed: Duration) -> Option<ExpiryToken> {
        let remaining = self.remaining?;
        if elapsed < remaining {
            self.remaining = Some(remaining - elapsed);
            return None;
        }
        self.remaining = None;
        self.fired = Some(self.generation);
        self.fired
    }

    /// Time left in the current run
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }
}

impl UniqueTimer for ManualTimer {
    fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn run(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.remaining = Some(self.duration);
        self.fired = None;
    }

    fn stop(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.remaining = None;
        self.fired = None;
    }

    fn is_running(&self) -> bool {
        self.remaining.is_some() || self.fired.is_some()
    }

    fn consume_expiry(&mut self, token: ExpiryToken) -> bool {
        if self.fired != Some(token) {
            return false;
        }
        self.fired = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timer_expiry() {
        let mut timer = ManualTimer::new();
        timer.set_duration(Duration::from_millis(10));
        assert!(!timer.is_running());
        assert_eq!(timer.advance(Duration::from_millis(100)), None);

        timer.run();
        assert!(timer.is_running());
        assert_eq!(timer.advance(Duration::from_millis(4)), None);
        assert_eq!(timer.remaining(), Some(Duration::from_millis(6)));

        let token = timer.advance(Duration::from_millis(6)).unwrap();
        assert!(timer.is_running());
        assert!(timer.consume_expiry(token));
        assert!(!timer.is_running());
        assert!(!timer.consume_expiry(token));
    }

    #[test]
    fn test_manual_timer_stale_token() {
        let mut timer = ManualTimer::new();
        timer.set_duration(Duration::from_millis(5));
        timer.run();
        let stale = timer.advance(Duration::from_millis(5)).unwrap();

        // Restart before the expiry was processed
        timer.run();
        assert!(!timer.consume_expiry(stale));
        assert!(timer.is_running());

        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.advance(Duration::from_millis(5)), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_posts_token() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(tx);
        timer.set_duration(Duration::from_millis(20));
        timer.run();
        assert!(timer.is_running());

        let token = rx.recv().await.unwrap();
        assert!(timer.consume_expiry(token));
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_timer_stop_discards_expiry() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = TokioTimer::new(tx);
        timer.set_duration(Duration::from_millis(20));
        timer.run();
        timer.stop();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        // A token that raced with stop is rejected
        timer.run();
        let token = rx.recv().await.unwrap();
        timer.stop();
        assert!(!timer.consume_expiry(token));
    }
}

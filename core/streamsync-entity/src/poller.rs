//! Periodic timer with re-arm-before-fire semantics.
//!
//! On each fire the next deadline is scheduled *before* the callback runs,
//! measured from the moment the timer fired. A slow callback therefore
//! never pushes the schedule back; if it overruns, the next fire is simply
//! due immediately. The guarantee is "at least this often", not an exact
//! period.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::trace;

/// A restartable periodic timer driving a callback on the tokio runtime.
#[derive(Debug)]
pub struct Poller {
    interval: watch::Sender<Duration>,
    task: Option<JoinHandle<()>>,
}

impl Poller {
    /// Creates an idle poller.
    pub fn new(interval: Duration) -> Self {
        let (interval, _) = watch::channel(interval);
        Self { interval, task: None }
    }

    /// Arms the timer at `interval`, invoking `callback` on every fire.
    ///
    /// A running timer is stopped first.
    pub fn start<F>(&mut self, interval: Duration, mut callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.interval.send_replace(interval);
        let period = self.interval.subscribe();
        self.task = Some(tokio::spawn(async move {
            let mut deadline = Instant::now() + *period.borrow();
            loop {
                sleep_until(deadline).await;
                deadline = Instant::now() + *period.borrow();
                trace!("poll timer fired");
                callback();
            }
        }));
    }

    /// Disarms the timer. No further fires are scheduled; a callback that is
    /// already executing on another worker thread runs to completion.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Changes the interval. Takes effect at the next re-arm.
    pub fn set_interval(&mut self, interval: Duration) {
        self.interval.send_replace(interval);
    }

    /// The current interval.
    pub fn interval(&self) -> Duration {
        *self.interval.borrow()
    }

    /// Whether the timer is armed.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

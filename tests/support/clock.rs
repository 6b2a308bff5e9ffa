// ABOUTME: Test clocks that return immediately instead of sleeping.
// ABOUTME: RecordingClock logs requested delays; CancellingClock raises cancel on a chosen delay.

use async_trait::async_trait;
use bluegreen::deploy::Clock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Records every sleep and returns at once.
#[derive(Clone, Default)]
pub struct RecordingClock {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }
}

#[async_trait]
impl Clock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
    }
}

/// Raises the cancel flag when asked to sleep for `trigger`, simulating a
/// Ctrl-C that arrives during that delay.
pub struct CancellingClock {
    trigger: Duration,
    cancel: Arc<watch::Sender<bool>>,
}

impl CancellingClock {
    /// Returns the clock and the receiver to hand to the orchestrator.
    pub fn new(trigger: Duration) -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        let clock = Self {
            trigger,
            cancel: Arc::new(tx),
        };
        (clock, rx)
    }
}

#[async_trait]
impl Clock for CancellingClock {
    async fn sleep(&self, duration: Duration) {
        if duration == self.trigger {
            self.cancel.send_replace(true);
        }
    }
}

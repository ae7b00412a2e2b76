//! Periodic driver that advances automated work only while no human
//! decision is pending.
//!
//! Each tick checks the prompt queue: an outstanding prompt makes the tick a
//! no-op, so human approval requests freeze forward automated progress until
//! answered.

use std::sync::Arc;
use std::time::Duration;

use super::prompt::PromptQueue;

/// Default tick period.
pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

/// Scheduler loop gated on the prompt queue.
#[derive(Debug)]
pub struct Scheduler {
    queue: Arc<PromptQueue>,
    period: Duration,
}

impl Scheduler {
    /// Create a scheduler over the given prompt queue.
    #[must_use]
    pub fn new(queue: Arc<PromptQueue>) -> Self {
        Self {
            queue,
            period: DEFAULT_TICK,
        }
    }

    /// Override the tick period.
    #[must_use]
    pub const fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Run the tick loop, calling `advance` once per tick while the queue is
    /// empty. Runs until the owning future is dropped.
    pub async fn run<F>(self, mut advance: F)
    where
        F: FnMut() + Send,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if self.queue.is_empty() {
                advance();
            } else {
                tracing::trace!(pending = self.queue.len(), "tick skipped, prompt pending");
            }
        }
    }
}

//! # Rate Window
//! Per-channel sliding-window admission control for outbound requests.
//!
//! Bounds requests to `limit` per rolling `window`. `try_acquire` is the
//! non-blocking form; `acquire` waits until the oldest timestamp expires.
//! Waiters are admitted in FIFO order (the tokio mutex queues fairly), so a
//! waiting request is never re-queued behind new arrivals.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::channel::Channel;

#[derive(Debug)]
pub struct RateWindow {
    channel: Channel,
    limit: usize,
    window: Duration,
    /// Timestamps of admitted requests, oldest at the front.
    stamps: Mutex<VecDeque<Instant>>,
    /// FIFO queue for the wait path; held across the sleep so later
    /// arrivals line up behind earlier ones.
    waiters: tokio::sync::Mutex<()>,
}

impl RateWindow {
    pub fn new(channel: Channel, limit: usize, window: Duration) -> Self {
        Self {
            channel,
            limit: limit.max(1),
            window,
            stamps: Mutex::new(VecDeque::new()),
            waiters: tokio::sync::Mutex::new(()),
        }
    }

    /// Admit immediately if the window has room; never blocks.
    pub fn try_acquire(&self) -> bool {
        self.step(Instant::now()).is_ok()
    }

    /// Admit, waiting until the window clears if saturated. Guaranteed
    /// admission once the oldest stamp expires.
    pub async fn acquire(&self) {
        let _front_of_line = self.waiters.lock().await;
        loop {
            match self.step(Instant::now()) {
                Ok(()) => return,
                Err(wait) => {
                    tracing::debug!(
                        channel = %self.channel,
                        wait_ms = wait.as_millis() as u64,
                        "rate window saturated, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Try to record an admission at `now`. On saturation returns how long
    /// until the oldest stamp leaves the window.
    fn step(&self, now: Instant) -> Result<(), Duration> {
        let mut stamps = self.stamps.lock().expect("rate window mutex poisoned");
        while let Some(&front) = stamps.front() {
            if now.duration_since(front) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
        if stamps.len() < self.limit {
            stamps.push_back(now);
            return Ok(());
        }
        let oldest = *stamps.front().expect("saturated window cannot be empty");
        Err(self.window.saturating_sub(now.duration_since(oldest)))
    }

    /// Requests currently inside the window (diagnostics).
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        let stamps = self.stamps.lock().expect("rate window mutex poisoned");
        stamps
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}

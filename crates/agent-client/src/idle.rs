//! Inactivity detection
//!
//! The host reports user activity (mouse, keyboard, focus) through
//! [`IdleTimer::record_activity`]. [`IdleTimer::wait_for_idle`] resolves once
//! the timer is enabled and no activity was seen for the configured timeout.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{sleep_until, Instant};

pub struct IdleTimer {
    timeout: Duration,
    last_activity: Mutex<Instant>,
    enabled: AtomicBool,
    changed: Notify,
}

impl IdleTimer {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            last_activity: Mutex::new(Instant::now()),
            enabled: AtomicBool::new(true),
            changed: Notify::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn record_activity(&self) {
        *self.last_activity.lock() = Instant::now();
        self.changed.notify_waiters();
    }

    /// Disabled timers never fire. Re-enabling restarts the countdown.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            *self.last_activity.lock() = Instant::now();
        }
        self.changed.notify_waiters();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Time left before the agent counts as idle, `None` while disabled.
    pub fn time_until_idle(&self) -> Option<Duration> {
        if !self.is_enabled() {
            return None;
        }
        let deadline = *self.last_activity.lock() + self.timeout;
        Some(deadline.saturating_duration_since(Instant::now()))
    }

    /// Wait until the agent has been inactive for the full timeout.
    pub async fn wait_for_idle(&self) {
        loop {
            let changed = self.changed.notified();
            tokio::pin!(changed);
            changed.as_mut().enable();

            match self.time_until_idle() {
                Some(left) if left.is_zero() => return,
                Some(left) => {
                    tokio::select! {
                        _ = sleep_until(Instant::now() + left) => {}
                        _ = &mut changed => {}
                    }
                }
                None => changed.await,
            }
        }
    }
}

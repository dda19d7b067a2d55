//! Time for the engine.
//!
//! Every deadline and every "now" the engine compares against comes from a [`Clock`], never from the database, so
//! tests can move time forward explicitly with a [`ManualClock`].
//!
//! The engine works in whole milliseconds: SQLite's `julianday()` resolves no finer, and a deadline check in Rust must
//! agree with the same check in SQL. [`engine_time`] does the truncation.
//!
//! [`DispatchTimer`] lets the deadline sweeper sleep until the next offer deadline instead of polling.
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Duration, DurationRound, Utc};
use log::*;
use tokio::sync::Notify;

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
        trace!("🕰️ Manual clock advanced to {}", *now);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Truncates an instant to the millisecond.
pub fn engine_time(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at)
}

/// The shared deadline for the offers of a dispatch round opened at `now`.
pub fn offer_deadline(now: DateTime<Utc>, offer_timeout: std::time::Duration) -> DateTime<Utc> {
    let timeout = Duration::from_std(offer_timeout).unwrap_or_else(|_| Duration::seconds(30));
    engine_time(now + timeout)
}

#[derive(Debug, Clone, Default)]
pub struct DispatchTimer {
    notify: Arc<Notify>,
}

impl DispatchTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals that a new dispatch round (and so a new deadline) has been opened.
    pub fn deadline_scheduled(&self) {
        self.notify.notify_one();
    }

    /// Sleeps until `next` (if given), `max_wait`, or a newly scheduled deadline, whichever comes first.
    pub async fn wait_for_next_deadline(&self, next: Option<DateTime<Utc>>, now: DateTime<Utc>, max_wait: std::time::Duration) {
        let wait = match next {
            Some(t) if t <= now => std::time::Duration::ZERO,
            Some(t) => (t - now).to_std().map(|d| d.min(max_wait)).unwrap_or(max_wait),
            None => max_wait,
        };
        trace!("🕰️ Waiting up to {}ms for the next dispatch deadline", wait.as_millis());
        tokio::select! {
            _ = tokio::time::sleep(wait) => {},
            _ = self.notify.notified() => {
                trace!("🕰️ New dispatch deadline scheduled");
            },
        }
    }
}

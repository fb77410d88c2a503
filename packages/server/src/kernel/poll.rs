//! Bounded polling against the record store.
//!
//! The store offers no push-based wait, so long-lived waits re-read state on
//! a fixed interval until a condition holds, a deadline passes, or the
//! surrounding task is cancelled.

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub interval: Duration,
    pub timeout: Duration,
}

impl PollSchedule {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
    Cancelled,
}

/// Run `probe` now and then every `schedule.interval` until it yields a value.
///
/// The probe runs one last time at the deadline, so a condition that becomes
/// true during the final interval is still observed.
pub async fn poll_until<T, F, Fut>(
    schedule: PollSchedule,
    cancel: &CancellationToken,
    mut probe: F,
) -> Result<PollOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + schedule.timeout;

    loop {
        if cancel.is_cancelled() {
            return Ok(PollOutcome::Cancelled);
        }

        if let Some(value) = probe().await? {
            return Ok(PollOutcome::Ready(value));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(PollOutcome::TimedOut);
        }

        let nap = schedule.interval.min(deadline - now);
        tokio::select! {
            _ = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
            _ = tokio::time::sleep(nap) => {}
        }
    }
}

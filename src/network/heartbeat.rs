//! Heartbeat timer
//!
//! A periodic signal source that requests, once per interval, that the
//! event loop perform exactly one heartbeat send. The timer itself never
//! performs I/O; its only action is raising a single pending-heartbeat
//! flag and re-arming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Single-slot "heartbeat is due" flag.
///
/// The only state shared between the timer task and the event loop. The
/// producer side only ever stores `true`; the consumer takes the flag with
/// an atomic swap, so intervening fires coalesce into one pending
/// heartbeat rather than queueing.
#[derive(Default)]
pub struct HeartbeatFlag {
    due: AtomicBool,
    wake: Notify,
}

impl HeartbeatFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a heartbeat as due and wake any waiter.
    pub fn raise(&self) {
        self.due.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Whether a heartbeat is currently pending.
    pub fn is_due(&self) -> bool {
        self.due.load(Ordering::Acquire)
    }

    /// Consume the pending heartbeat, if any.
    ///
    /// Returns `true` at most once per raise, however many times the timer
    /// fired in between.
    pub fn take(&self) -> bool {
        self.due.swap(false, Ordering::AcqRel)
    }

    /// Wait until a heartbeat is due.
    pub async fn due(&self) {
        loop {
            let notified = self.wake.notified();
            if self.is_due() {
                return;
            }
            notified.await;
        }
    }
}

/// Periodic heartbeat signal source.
///
/// Spawns a background task that raises the shared flag once per period,
/// indefinitely, starting one full period after creation. The task is
/// aborted when the timer is dropped.
pub struct HeartbeatTimer {
    flag: Arc<HeartbeatFlag>,
    task: JoinHandle<()>,
}

impl HeartbeatTimer {
    /// Start a timer firing every `period`.
    pub fn start(period: Duration) -> Self {
        let flag = Arc::new(HeartbeatFlag::new());
        let shared = flag.clone();

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            // Missed ticks already coalesce into the flag; never replay them.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                shared.raise();
            }
        });

        Self { flag, task }
    }

    /// Whether a heartbeat is currently pending.
    pub fn is_due(&self) -> bool {
        self.flag.is_due()
    }

    /// Consume the pending heartbeat, if any.
    pub fn take(&self) -> bool {
        self.flag.take()
    }

    /// Wait until a heartbeat is due.
    pub async fn due(&self) {
        self.flag.due().await;
    }
}

impl Drop for HeartbeatTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_coalesces_raises() {
        let flag = HeartbeatFlag::new();
        assert!(!flag.is_due());

        flag.raise();
        flag.raise();

        // Two raises, exactly one pending heartbeat
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_one_period() {
        let timer = HeartbeatTimer::start(Duration::from_millis(100));
        assert!(!timer.is_due());

        time::sleep(Duration::from_millis(50)).await;
        assert!(!timer.is_due());

        time::sleep(Duration::from_millis(60)).await;
        assert!(timer.is_due());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_coalesces_missed_ticks() {
        let timer = HeartbeatTimer::start(Duration::from_millis(100));

        // Let the timer fire several times before anyone checks
        time::sleep(Duration::from_millis(350)).await;

        assert!(timer.take());
        assert!(!timer.take());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_rearms() {
        let timer = HeartbeatTimer::start(Duration::from_millis(100));

        time::sleep(Duration::from_millis(110)).await;
        assert!(timer.take());

        time::sleep(Duration::from_millis(110)).await;
        assert!(timer.take());
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_wakes_waiter() {
        let timer = HeartbeatTimer::start(Duration::from_millis(100));
        timer.due().await;
        assert!(timer.take());
    }
}

//! Delayed refresh scheduling
//!
//! The refresh signal is emitted through the same event channel as toasts.
//! Timers are injectable so tests and replays can run on a virtual clock.

use crate::types::{Result, WatchError, WatchEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// A deferred unit of work
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run a task after a delay
pub trait Timer: Send + Sync {
    fn schedule(&self, delay: Duration, task: TimerTask);
}

/// Timer backed by the tokio runtime clock
pub struct TokioTimer {
    handle: tokio::runtime::Handle,
}

impl TokioTimer {
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on
    pub fn current() -> Result<Self> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| WatchError::Timer(e.to_string()))?;
        Ok(Self::new(handle))
    }
}

impl Timer for TokioTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) {
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            task();
        });
    }
}

/// Virtual-clock timer; tasks only run when [`ManualTimer::advance`] is called
#[derive(Default)]
pub struct ManualTimer {
    clock: Mutex<ManualClock>,
}

#[derive(Default)]
struct ManualClock {
    now: Duration,
    next_seq: u64,
    pending: Vec<PendingTask>,
}

struct PendingTask {
    due: Duration,
    seq: u64,
    task: TimerTask,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed on the virtual clock
    pub fn now(&self) -> Duration {
        self.clock.lock().now
    }

    pub fn pending(&self) -> usize {
        self.clock.lock().pending.len()
    }

    /// Move the clock forward and run every task that became due
    ///
    /// Tasks run in deadline order (ties in scheduling order) with the lock
    /// released, so a task may schedule further work. Returns the number of
    /// tasks that ran.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.clock.lock().now + by;
        let mut fired = 0;

        loop {
            let next = {
                let mut clock = self.clock.lock();
                let due = clock
                    .pending
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.due <= target)
                    .min_by_key(|(_, p)| (p.due, p.seq))
                    .map(|(idx, _)| idx);

                match due {
                    Some(idx) => {
                        let pending = clock.pending.remove(idx);
                        clock.now = clock.now.max(pending.due);
                        Some(pending.task)
                    }
                    None => {
                        clock.now = target;
                        None
                    }
                }
            };

            match next {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => break,
            }
        }

        fired
    }
}

impl Timer for ManualTimer {
    fn schedule(&self, delay: Duration, task: TimerTask) {
        let mut clock = self.clock.lock();
        let due = clock.now + delay;
        let seq = clock.next_seq;
        clock.next_seq += 1;
        clock.pending.push(PendingTask { due, seq, task });
    }
}

/// Emits view refresh requests, immediately or after a delay
#[derive(Clone)]
pub struct RefreshScheduler {
    timer: Arc<dyn Timer>,
    events: UnboundedSender<WatchEvent>,
}

impl RefreshScheduler {
    pub fn new(timer: Arc<dyn Timer>, events: UnboundedSender<WatchEvent>) -> Self {
        Self { timer, events }
    }

    /// Request a refresh after `delay`
    ///
    /// A zero delay emits right away. Every call schedules its own refresh;
    /// pending refreshes outlive the notifier and are dropped silently if the
    /// receiver is gone by then.
    pub fn schedule_refresh(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self
                .events
                .send(WatchEvent::Refresh)
                .map_err(|_| WatchError::EmitFailed("refresh"));
        }

        let events = self.events.clone();
        self.timer.schedule(
            delay,
            Box::new(move || {
                if events.send(WatchEvent::Refresh).is_err() {
                    log::debug!("Delayed refresh dropped: view is detached");
                }
            }),
        );
        Ok(())
    }
}

//! Cancellable delay timers
//!
//! A timer is a tokio task that sleeps and then hands a [`TimerFired`] to a
//! sink, normally the session's event channel. Cancelling aborts the task and
//! clears the slot's token, so a message that was already queued is rejected
//! by [`TimerSlot::claim`] on arrival.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::tracker::VisitKey;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Page has been active long enough to be eligible
    Settle,
    /// Page has stayed at bottom long enough to complete
    BottomDwell,
    /// Programmatic resume scroll has finished
    ResumeSettle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    pub kind: TimerKind,
    pub visit: VisitKey,
    pub token: u64,
}

/// Where fired timers are delivered
pub type TimerSink = Arc<dyn Fn(TimerFired) + Send + Sync>;

struct DelayTimer {
    token: u64,
    task: JoinHandle<()>,
}

impl DelayTimer {
    fn spawn(kind: TimerKind, visit: VisitKey, delay: Duration, sink: &TimerSink) -> Self {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        let sink = Arc::clone(sink);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sink(TimerFired { kind, visit, token });
        });
        Self { token, task }
    }
}

impl Drop for DelayTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Holds at most one armed timer
#[derive(Default)]
pub struct TimerSlot {
    armed: Option<DelayTimer>,
}

impl TimerSlot {
    /// Arm a timer, replacing (and cancelling) any armed one
    pub fn arm(&mut self, kind: TimerKind, visit: VisitKey, delay: Duration, sink: &TimerSink) {
        self.armed = Some(DelayTimer::spawn(kind, visit, delay, sink));
    }

    /// Cancel the armed timer; returns whether one was armed
    pub fn cancel(&mut self) -> bool {
        self.armed.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Accept a fired timer if it belongs to this slot, disarming it
    pub fn claim(&mut self, fired: &TimerFired) -> bool {
        match &self.armed {
            Some(timer) if timer.token == fired.token => {
                self.armed = None;
                true
            }
            _ => false,
        }
    }
}

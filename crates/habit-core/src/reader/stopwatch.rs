//! Pausable elapsed-time accumulator

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct StopwatchState {
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl StopwatchState {
    fn running_interval(&self) -> Duration {
        self.started_at
            .map_or(Duration::ZERO, |started| started.elapsed())
    }
}

/// Time spent on the active page
///
/// Clones share state, so timer callbacks and UI events can hold the same
/// stopwatch without losing updates.
#[derive(Debug, Clone, Default)]
pub struct ReadingStopwatch {
    state: Arc<Mutex<StopwatchState>>,
}

impl ReadingStopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin timing; no-op if already running
    pub fn start(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    /// Stop timing and return the accumulated whole seconds
    ///
    /// Pausing an already paused stopwatch returns the same value.
    pub fn pause(&self) -> u64 {
        let mut state = self.state.lock();
        if let Some(started) = state.started_at.take() {
            state.accumulated += started.elapsed();
        }
        state.accumulated.as_secs()
    }

    /// Zero the accumulator and stop
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.accumulated = Duration::ZERO;
        state.started_at = None;
    }

    /// Accumulated plus running time, without changing state
    pub fn total_seconds(&self) -> u64 {
        let state = self.state.lock();
        (state.accumulated + state.running_interval()).as_secs()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().started_at.is_some()
    }
}

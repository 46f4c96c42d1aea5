//! Page completion state machine
//!
//! One visit per active page. A page counts as read once the settle timer has
//! elapsed and the page has stayed at bottom for the dwell delay. Time on the
//! page is credited whenever the visit ends, read or not.

use std::time::Duration;

use tracing::{debug, info, trace};

use super::scroll::SurfaceId;
use super::stopwatch::ReadingStopwatch;
use super::timers::{TimerFired, TimerKind, TimerSink, TimerSlot};
use crate::stats::local_today;
use crate::worker::PersistenceHandle;

/// Identity of one page visit; timer callbacks carry it back for validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisitKey {
    pub page: usize,
    pub surface: SurfaceId,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitPhase {
    /// Page just became active
    Viewing,
    /// Settle timer running; bottom signals are recorded but cannot complete
    Settling,
    /// Settle elapsed; waiting for a sustained bottom
    Eligible,
    /// Counted as read for this visit
    Completed,
}

#[derive(Debug)]
struct Visit {
    key: VisitKey,
    phase: VisitPhase,
    settle_elapsed: bool,
    bottom_reached: bool,
    /// Bottom held for the full dwell delay
    dwelled: bool,
    completed: bool,
}

impl Visit {
    fn new(key: VisitKey) -> Self {
        Self {
            key,
            phase: VisitPhase::Viewing,
            settle_elapsed: false,
            bottom_reached: false,
            dwelled: false,
            completed: false,
        }
    }
}

pub struct PageTracker {
    stopwatch: ReadingStopwatch,
    persistence: PersistenceHandle,
    timer_sink: TimerSink,
    settle_delay: Duration,
    bottom_dwell: Duration,
    visit: Option<Visit>,
    settle_timer: TimerSlot,
    dwell_timer: TimerSlot,
    generation: u64,
    last_completed_page: Option<usize>,
}

impl PageTracker {
    pub fn new(
        persistence: PersistenceHandle,
        timer_sink: TimerSink,
        settle_delay: Duration,
        bottom_dwell: Duration,
    ) -> Self {
        Self {
            stopwatch: ReadingStopwatch::new(),
            persistence,
            timer_sink,
            settle_delay,
            bottom_dwell,
            visit: None,
            settle_timer: TimerSlot::default(),
            dwell_timer: TimerSlot::default(),
            generation: 0,
            last_completed_page: None,
        }
    }

    /// Begin a visit; any previous visit is ended and flushed first
    pub fn enter_page(&mut self, page: usize, surface: SurfaceId) -> VisitKey {
        if self.visit.is_some() {
            self.leave_page();
        }

        self.generation += 1;
        let key = VisitKey {
            page,
            surface,
            generation: self.generation,
        };
        let mut visit = Visit::new(key);

        self.settle_timer
            .arm(TimerKind::Settle, key, self.settle_delay, &self.timer_sink);
        visit.phase = VisitPhase::Settling;
        self.stopwatch.start();
        self.visit = Some(visit);

        debug!(page, surface = surface.0, generation = key.generation, "Entered page");
        key
    }

    /// End the active visit, crediting its time; returns the seconds credited
    pub fn leave_page(&mut self) -> u64 {
        self.settle_timer.cancel();
        self.dwell_timer.cancel();

        let Some(visit) = self.visit.take() else {
            return 0;
        };

        let seconds = self.stopwatch.pause();
        if seconds > 0 {
            self.persistence.upsert_daily(local_today(), 0, seconds);
        }
        self.stopwatch.reset();

        debug!(
            page = visit.key.page,
            seconds,
            completed = visit.completed,
            "Left page"
        );
        seconds
    }

    /// Record a bottom transition from the monitor
    pub fn on_bottom_changed(&mut self, surface: SurfaceId, at_bottom: bool) {
        let Some(visit) = self.visit.as_mut() else {
            return;
        };
        if visit.key.surface != surface {
            trace!(surface = surface.0, "Ignoring bottom signal from inactive surface");
            return;
        }

        visit.bottom_reached = at_bottom;
        if at_bottom {
            if !self.dwell_timer.is_armed() && !visit.dwelled {
                self.dwell_timer.arm(
                    TimerKind::BottomDwell,
                    visit.key,
                    self.bottom_dwell,
                    &self.timer_sink,
                );
            }
        } else {
            visit.dwelled = false;
            self.dwell_timer.cancel();
        }
    }

    /// Handle a fired settle or dwell timer; returns the page if it completed
    pub fn on_timer(&mut self, fired: TimerFired) -> Option<usize> {
        let visit = self.visit.as_mut()?;
        if visit.key != fired.visit {
            trace!(page = fired.visit.page, kind = ?fired.kind, "Ignoring stale timer");
            return None;
        }

        match fired.kind {
            TimerKind::Settle => {
                if !self.settle_timer.claim(&fired) {
                    return None;
                }
                visit.settle_elapsed = true;
                if !visit.completed {
                    visit.phase = VisitPhase::Eligible;
                }
            }
            TimerKind::BottomDwell => {
                if !self.dwell_timer.claim(&fired) || !visit.bottom_reached {
                    return None;
                }
                visit.dwelled = true;
            }
            TimerKind::ResumeSettle => return None,
        }

        self.try_complete()
    }

    fn try_complete(&mut self) -> Option<usize> {
        let visit = self.visit.as_mut()?;
        let page = visit.key.page;

        if !(visit.settle_elapsed && visit.bottom_reached && visit.dwelled) || visit.completed {
            return None;
        }
        if self.last_completed_page == Some(page) {
            trace!(page, "Page already completed, waiting for a different page");
            return None;
        }

        let seconds = self.stopwatch.total_seconds();
        self.persistence.upsert_daily(local_today(), 1, seconds);

        visit.completed = true;
        visit.phase = VisitPhase::Completed;
        self.last_completed_page = Some(page);
        self.dwell_timer.cancel();

        // Time after completion still belongs to this page
        self.stopwatch.reset();
        self.stopwatch.start();

        info!(page, seconds, "Page marked read");
        Some(page)
    }

    pub fn active_visit(&self) -> Option<VisitKey> {
        self.visit.as_ref().map(|v| v.key)
    }

    pub fn phase(&self) -> Option<VisitPhase> {
        self.visit.as_ref().map(|v| v.phase)
    }

    pub fn last_completed_page(&self) -> Option<usize> {
        self.last_completed_page
    }

    pub fn stopwatch(&self) -> &ReadingStopwatch {
        &self.stopwatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::advance;

    use crate::stats::{ProgressFeed, StatisticsAggregator};
    use crate::storage::SqliteGateway;
    use crate::worker::PersistenceWorker;

    const SURFACE: SurfaceId = SurfaceId(7);

    struct Harness {
        tracker: PageTracker,
        timers: mpsc::UnboundedReceiver<TimerFired>,
        persistence: PersistenceHandle,
        stats: StatisticsAggregator,
    }

    impl Harness {
        fn new() -> Self {
            let gateway = SqliteGateway::in_memory().expect("Failed to open database");
            let stats = StatisticsAggregator::new(Arc::new(gateway));
            let (persistence, _task) = PersistenceWorker::spawn(stats.clone(), ProgressFeed::default());

            let (tx, timers) = mpsc::unbounded_channel();
            let sink: TimerSink = Arc::new(move |fired| {
                let _ = tx.send(fired);
            });
            let tracker = PageTracker::new(
                persistence.clone(),
                sink,
                Duration::from_millis(3000),
                Duration::from_millis(1000),
            );
            Self {
                tracker,
                timers,
                persistence,
                stats,
            }
        }

        /// Deliver every timer due within `duration`, returning completions
        async fn run_for(&mut self, duration: Duration) -> Vec<usize> {
            let deadline = tokio::time::Instant::now() + duration;
            let mut completed = Vec::new();
            loop {
                tokio::select! {
                    Some(fired) = self.timers.recv() => {
                        completed.extend(self.tracker.on_timer(fired));
                    }
                    _ = tokio::time::sleep_until(deadline) => break,
                }
            }
            completed
        }

        async fn today(&self) -> (u64, u64) {
            self.persistence.flush().await.expect("worker alive");
            let today = local_today();
            (
                self.stats.pages_read(today).expect("pages"),
                self.stats.seconds_read(today).expect("seconds"),
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_settle_and_dwell() {
        let mut h = Harness::new();
        h.tracker.enter_page(4, SURFACE);
        assert_eq!(h.tracker.phase(), Some(VisitPhase::Settling));

        h.tracker.on_bottom_changed(SURFACE, true);
        assert!(h.run_for(Duration::from_millis(2500)).await.is_empty());

        let completed = h.run_for(Duration::from_millis(1000)).await;
        assert_eq!(completed, vec![4]);
        assert_eq!(h.tracker.phase(), Some(VisitPhase::Completed));
        assert_eq!(h.today().await, (1, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaving_bottom_cancels_dwell() {
        let mut h = Harness::new();
        h.tracker.enter_page(0, SURFACE);
        assert!(h.run_for(Duration::from_millis(3100)).await.is_empty());
        assert_eq!(h.tracker.phase(), Some(VisitPhase::Eligible));

        h.tracker.on_bottom_changed(SURFACE, true);
        advance(Duration::from_millis(600)).await;
        h.tracker.on_bottom_changed(SURFACE, false);
        assert!(h.run_for(Duration::from_secs(2)).await.is_empty());

        h.tracker.on_bottom_changed(SURFACE, true);
        assert_eq!(h.run_for(Duration::from_millis(1100)).await, vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bottom_bounce_after_completion_does_not_recomplete() {
        let mut h = Harness::new();
        h.tracker.enter_page(6, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);
        assert_eq!(h.run_for(Duration::from_secs(4)).await, vec![6]);

        h.tracker.on_bottom_changed(SURFACE, false);
        advance(Duration::from_millis(300)).await;
        h.tracker.on_bottom_changed(SURFACE, true);
        assert!(h.run_for(Duration::from_secs(2)).await.is_empty());
        assert_eq!(h.tracker.phase(), Some(VisitPhase::Completed));
        assert_eq!(h.today().await.0, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_credits_time_without_page() {
        let mut h = Harness::new();
        h.tracker.enter_page(2, SURFACE);
        h.run_for(Duration::from_secs(8)).await;

        assert_eq!(h.tracker.leave_page(), 8);
        assert!(h.tracker.active_visit().is_none());
        assert_eq!(h.today().await, (0, 8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quick_flick_credits_nothing() {
        let mut h = Harness::new();
        h.tracker.enter_page(2, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);
        advance(Duration::from_millis(400)).await;

        assert_eq!(h.tracker.leave_page(), 0);
        assert!(h.run_for(Duration::from_secs(5)).await.is_empty());
        assert_eq!(h.today().await, (0, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_revisit_same_page_does_not_recomplete() {
        let mut h = Harness::new();
        h.tracker.enter_page(9, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);
        assert_eq!(h.run_for(Duration::from_secs(4)).await, vec![9]);

        h.tracker.enter_page(9, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);
        assert!(h.run_for(Duration::from_secs(4)).await.is_empty());
        assert_eq!(h.tracker.last_completed_page(), Some(9));

        h.tracker.enter_page(10, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);
        assert_eq!(h.run_for(Duration::from_secs(4)).await, vec![10]);

        assert_eq!(h.today().await.0, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_timers_from_previous_visit_are_ignored() {
        let mut h = Harness::new();
        let first = h.tracker.enter_page(1, SURFACE);
        h.tracker.on_bottom_changed(SURFACE, true);

        let stale = TimerFired {
            kind: TimerKind::BottomDwell,
            visit: first,
            token: u64::MAX,
        };
        h.tracker.enter_page(2, SurfaceId(8));
        assert_eq!(h.tracker.on_timer(stale), None);

        // Signals from the recycled surface do not reach the new visit
        h.tracker.on_bottom_changed(SURFACE, true);
        assert!(h.run_for(Duration::from_secs(5)).await.is_empty());
    }
}

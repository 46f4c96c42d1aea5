//! Reading session event loop
//!
//! Owns the monitor, tracker, and persister for one reader view. Every input
//! (scroll reports, surface recycling, navigation, lifecycle, fired timers)
//! arrives as a [`ReaderEvent`] on one channel, so transitions never race.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, trace, warn};

use super::layout::PageLayout;
use super::position::PositionPersister;
use super::scroll::{ScrollMetrics, ScrollPositionMonitor, ScrollSignal, ScrollSurface, SurfaceId};
use super::timers::{TimerFired, TimerKind, TimerSink, TimerSlot};
use super::tracker::{PageTracker, VisitKey};
use super::ui::ReaderUi;
use crate::config::ReaderConfig;
use crate::storage::{PersistenceGateway, ReadingPosition};
use crate::worker::PersistenceHandle;

/// Input to a [`ReadingSession`]
pub enum ReaderEvent {
    /// A page widget was created or recycled for `page`
    SurfaceAttached {
        page: usize,
        surface: Box<dyn ScrollSurface>,
    },
    /// A page widget is about to be destroyed or recycled
    SurfaceDetached { surface: SurfaceId },
    /// The user navigated to `page`
    PageSelected { page: usize },
    Scrolled {
        surface: SurfaceId,
        metrics: ScrollMetrics,
    },
    TimerFired(TimerFired),
    Backgrounded,
    Foregrounded,
    /// The reader view is gone; ends the session
    ViewDestroyed,
}

pub struct ReadingSession<U: ReaderUi> {
    config: ReaderConfig,
    layout: Arc<PageLayout>,
    monitor: ScrollPositionMonitor,
    tracker: PageTracker,
    positions: PositionPersister,
    persistence: PersistenceHandle,
    ui: U,
    events_tx: mpsc::UnboundedSender<ReaderEvent>,
    events_rx: mpsc::UnboundedReceiver<ReaderEvent>,
    timer_sink: TimerSink,
    surfaces: HashMap<usize, Box<dyn ScrollSurface>>,
    remembered_offsets: HashMap<usize, u32>,
    active_page: usize,
    pending_resume: Option<ReadingPosition>,
    resume_timer: TimerSlot,
    resume_visit: Option<VisitKey>,
    backgrounded: bool,
}

impl<U: ReaderUi> ReadingSession<U> {
    pub fn new(
        config: ReaderConfig,
        layout: Arc<PageLayout>,
        gateway: Arc<dyn PersistenceGateway>,
        persistence: PersistenceHandle,
        ui: U,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        // Weak so pending timers never keep the event loop alive
        let timer_tx = events_tx.downgrade();
        let timer_sink: TimerSink = Arc::new(move |fired| {
            if let Some(tx) = timer_tx.upgrade() {
                let _ = tx.send(ReaderEvent::TimerFired(fired));
            }
        });

        let tracker = PageTracker::new(
            persistence.clone(),
            Arc::clone(&timer_sink),
            config.settle_delay(),
            config.bottom_dwell(),
        );
        let monitor = ScrollPositionMonitor::new(config.bottom_buffer, config.scroll_error_margin);
        let positions = PositionPersister::new(persistence.clone(), gateway, Arc::clone(&layout));
        let active_page = layout.clamp_page(config.start_page);

        Self {
            config,
            layout,
            monitor,
            tracker,
            positions,
            persistence,
            ui,
            events_tx,
            events_rx,
            timer_sink,
            surfaces: HashMap::new(),
            remembered_offsets: HashMap::new(),
            active_page,
            pending_resume: None,
            resume_timer: TimerSlot::default(),
            resume_visit: None,
            backgrounded: false,
        }
    }

    /// Sender for UI-side events
    pub fn sender(&self) -> mpsc::UnboundedSender<ReaderEvent> {
        self.events_tx.clone()
    }

    /// Load the saved position and pick the initial page
    ///
    /// With history, the UI is told to prepare for a resume and the offset is
    /// restored when the page's surface attaches. Returns the initial page.
    pub fn open(&mut self) -> usize {
        match self.positions.load_or_default() {
            Some(position) => {
                info!(
                    surah = position.surah,
                    ayah = position.ayah,
                    page = position.page,
                    offset = position.scroll_offset,
                    "Resuming from saved position"
                );
                self.ui.on_position_ready_for_resume(&position);
                self.active_page = position.page;
                self.pending_resume = Some(position);
            }
            None => {
                debug!(page = self.active_page, "No saved position, starting fresh");
            }
        }
        self.active_page
    }

    /// Process events until the view is destroyed, then drain persistence
    ///
    /// Dropping every sender handed out by [`sender`](Self::sender) ends the
    /// session the same way as [`ReaderEvent::ViewDestroyed`].
    pub async fn run(mut self) -> U {
        let mut failures = self.persistence.subscribe_failures();
        let mut failures_open = true;

        // Only senders held by the UI keep the loop running from here on
        let (closed_tx, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.events_tx, closed_tx));

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    let Some(event) = event else {
                        debug!("All event senders dropped");
                        self.handle(ReaderEvent::ViewDestroyed);
                        break;
                    };
                    if !self.handle(event) {
                        break;
                    }
                }
                failure = failures.recv(), if failures_open => match failure {
                    Ok(failure) => self.ui.on_persistence_failed(&failure.message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Dropped persistence failure notices");
                    }
                    Err(broadcast::error::RecvError::Closed) => failures_open = false,
                },
            }
        }

        if let Err(e) = self.persistence.flush().await {
            warn!(error = %e, "Could not drain pending writes");
        }
        debug!("Reading session ended");
        self.ui
    }

    /// Apply one event; returns false once the session should stop
    pub fn handle(&mut self, event: ReaderEvent) -> bool {
        match event {
            ReaderEvent::SurfaceAttached { page, surface } => self.attach_surface(page, surface),
            ReaderEvent::SurfaceDetached { surface } => self.detach_surface(surface),
            ReaderEvent::PageSelected { page } => self.select_page(page),
            ReaderEvent::Scrolled { surface, metrics } => {
                if self.monitor.surface() != Some(surface) {
                    trace!(surface = surface.0, "Ignoring scroll from inactive surface");
                } else {
                    for signal in self.monitor.report(metrics) {
                        self.on_scroll_signal(surface, signal);
                    }
                }
            }
            ReaderEvent::TimerFired(fired) => self.on_timer(fired),
            ReaderEvent::Backgrounded => {
                if !self.backgrounded {
                    self.backgrounded = true;
                    self.deactivate();
                    debug!(page = self.active_page, "Reader backgrounded");
                }
            }
            ReaderEvent::Foregrounded => {
                if self.backgrounded {
                    self.backgrounded = false;
                    self.activate();
                    debug!(page = self.active_page, "Reader foregrounded");
                }
            }
            ReaderEvent::ViewDestroyed => {
                self.deactivate();
                self.surfaces.clear();
                return false;
            }
        }
        true
    }

    pub fn active_page(&self) -> usize {
        self.active_page
    }

    /// Offset last seen on `page` before its surface went away
    pub fn remembered_offset(&self, page: usize) -> Option<u32> {
        self.remembered_offsets.get(&page).copied()
    }

    pub fn tracker(&self) -> &PageTracker {
        &self.tracker
    }

    pub fn ui(&self) -> &U {
        &self.ui
    }

    fn attach_surface(&mut self, page: usize, surface: Box<dyn ScrollSurface>) {
        if page == self.active_page && self.monitor.surface().is_some() {
            // The active page's widget was swapped out from under us
            self.deactivate();
        }

        debug!(page, surface = surface.id().0, "Surface attached");
        self.surfaces.insert(page, surface);

        if page == self.active_page && !self.backgrounded {
            self.activate();
        }
    }

    fn detach_surface(&mut self, surface: SurfaceId) {
        if self.monitor.surface() == Some(surface) {
            self.deactivate();
        }
        self.surfaces.retain(|_, s| s.id() != surface);
        debug!(surface = surface.0, "Surface detached");
    }

    fn select_page(&mut self, page: usize) {
        let page = self.layout.clamp_page(page);
        if page == self.active_page && self.tracker.active_visit().is_some() {
            return;
        }

        self.deactivate();
        self.active_page = page;
        self.pending_resume = None;

        if !self.backgrounded {
            self.activate();
        }
    }

    /// Start a visit on the active page if its surface is present
    fn activate(&mut self) {
        let page = self.active_page;
        let Some(surface) = self.surfaces.get_mut(&page) else {
            trace!(page, "Active page has no surface yet");
            return;
        };
        let surface_id = surface.id();

        self.monitor.attach(&**surface);
        let visit = self.tracker.enter_page(page, surface_id);

        let resume = self.pending_resume.take().filter(|p| p.page == page);
        let restore_to = match resume {
            Some(position) => Some(position.scroll_offset),
            None => self.remembered_offsets.get(&page).copied(),
        };

        let mut offset = surface.metrics().offset;
        if let Some(target) = restore_to.filter(|target| *target != offset) {
            self.monitor.set_programmatic_scroll(true);
            surface.scroll_to(target);
            self.resume_timer.arm(
                TimerKind::ResumeSettle,
                visit,
                self.config.resume_settle(),
                &self.timer_sink,
            );
            self.resume_visit = Some(visit);
            offset = target;
            debug!(page, offset, "Restoring scroll offset");
        }

        // Baseline so a page that already fits the viewport reports bottom
        let signals = self.monitor.report(surface.metrics());
        for signal in signals {
            self.on_scroll_signal(surface_id, signal);
        }

        self.ui
            .on_header_info_changed(self.layout.surah_for_page(page), page + 1);
        match resume {
            // Keep the exact ayah the position was saved with
            Some(position) => self.positions.save(position.surah, position.ayah, page, offset),
            None => self.positions.save_page(page, offset),
        }
    }

    /// End the active visit, remembering where the page was left
    fn deactivate(&mut self) {
        self.resume_timer.cancel();
        self.resume_visit = None;

        if let Some(offset) = self.monitor.detach() {
            self.remembered_offsets.insert(self.active_page, offset);
            self.positions.save_page(self.active_page, offset);
        }
        self.tracker.leave_page();
    }

    fn on_scroll_signal(&mut self, surface: SurfaceId, signal: ScrollSignal) {
        match signal {
            ScrollSignal::ScrollingChanged(scrolling) => {
                trace!(surface = surface.0, scrolling, "Scrolling changed");
            }
            ScrollSignal::BottomChanged(at_bottom) => {
                self.tracker.on_bottom_changed(surface, at_bottom);
            }
            ScrollSignal::Settled(offset) => {
                self.remembered_offsets.insert(self.active_page, offset);
                self.positions.save_page(self.active_page, offset);
            }
        }
    }

    fn on_timer(&mut self, fired: TimerFired) {
        if fired.kind == TimerKind::ResumeSettle {
            if self.resume_visit == Some(fired.visit) && self.resume_timer.claim(&fired) {
                self.resume_visit = None;
                self.monitor.set_programmatic_scroll(false);
                debug!(page = fired.visit.page, "Resume scroll settled");
            }
            return;
        }

        if let Some(page) = self.tracker.on_timer(fired) {
            self.positions.save_page(page, self.monitor.current_offset());
            self.ui.on_page_marked_read(page);
        }
    }
}

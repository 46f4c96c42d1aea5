//! Scroll position monitor
//!
//! Watches one scrollable surface at a time and turns raw offset reports into
//! three transitions: scrolling started/stopped, bottom reached/left, and
//! settled. Nothing is emitted for reports that do not change state.

use crate::constants::scroll::{BOTTOM_BUFFER, SCROLL_ERROR_MARGIN};

/// Identity of a UI surface instance; a recycled widget gets a new id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// Geometry of a scrollable surface at one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollMetrics {
    pub offset: u32,
    pub viewport_height: u32,
    pub content_height: u32,
}

impl ScrollMetrics {
    pub fn new(offset: u32, viewport_height: u32, content_height: u32) -> Self {
        Self {
            offset,
            viewport_height,
            content_height,
        }
    }

    /// `offset + viewport >= content - buffer`, without underflow
    pub fn is_at_bottom(&self, buffer: u32) -> bool {
        u64::from(self.offset) + u64::from(self.viewport_height) + u64::from(buffer)
            >= u64::from(self.content_height)
    }
}

/// Transition emitted by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollSignal {
    ScrollingChanged(bool),
    BottomChanged(bool),
    /// Scrolling stopped at this offset
    Settled(u32),
}

/// The widget side of a scrollable page
pub trait ScrollSurface: Send {
    fn id(&self) -> SurfaceId;
    fn metrics(&self) -> ScrollMetrics;
    fn scroll_to(&mut self, offset: u32);
}

type Listener = Box<dyn FnMut(SurfaceId, ScrollSignal) + Send>;

pub struct ScrollPositionMonitor {
    bottom_buffer: u32,
    error_margin: u32,
    surface: Option<SurfaceId>,
    last_offset: Option<u32>,
    scrolling: bool,
    at_bottom: bool,
    programmatic: bool,
    listeners: Vec<Listener>,
}

impl Default for ScrollPositionMonitor {
    fn default() -> Self {
        Self::new(BOTTOM_BUFFER, SCROLL_ERROR_MARGIN)
    }
}

impl ScrollPositionMonitor {
    pub fn new(bottom_buffer: u32, error_margin: u32) -> Self {
        Self {
            bottom_buffer,
            error_margin,
            surface: None,
            last_offset: None,
            scrolling: false,
            at_bottom: false,
            programmatic: false,
            listeners: Vec::new(),
        }
    }

    /// Start observing `surface`, detaching from any previous one first
    pub fn attach(&mut self, surface: &dyn ScrollSurface) {
        if self.surface.is_some() {
            self.detach();
        }
        self.surface = Some(surface.id());
        tracing::debug!(surface = surface.id().0, "Attached scroll monitor");
    }

    /// Stop observing; returns the last known offset and drops all listeners
    pub fn detach(&mut self) -> Option<u32> {
        let surface = self.surface.take()?;
        let offset = self.last_offset.unwrap_or(0);

        self.listeners.clear();
        self.last_offset = None;
        self.scrolling = false;
        self.at_bottom = false;
        self.programmatic = false;

        tracing::debug!(surface = surface.0, offset, "Detached scroll monitor");
        Some(offset)
    }

    /// Register a listener; cleared on detach
    pub fn subscribe(&mut self, listener: impl FnMut(SurfaceId, ScrollSignal) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    /// Last reported offset, or zero before any report
    pub fn current_offset(&self) -> u32 {
        self.last_offset.unwrap_or(0)
    }

    pub fn is_scrolling(&self) -> bool {
        self.scrolling
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    pub fn is_programmatic_scroll(&self) -> bool {
        self.programmatic
    }

    /// While set, state is tracked but nothing is emitted
    pub fn set_programmatic_scroll(&mut self, programmatic: bool) {
        self.programmatic = programmatic;
    }

    /// Feed a new report; returns the signals delivered to listeners
    pub fn report(&mut self, metrics: ScrollMetrics) -> Vec<ScrollSignal> {
        let Some(surface) = self.surface else {
            return Vec::new();
        };

        let mut signals = Vec::new();

        let delta = self
            .last_offset
            .map_or(0, |last| last.abs_diff(metrics.offset));
        self.last_offset = Some(metrics.offset);

        let scrolling = delta > self.error_margin;
        if scrolling != self.scrolling {
            self.scrolling = scrolling;
            signals.push(ScrollSignal::ScrollingChanged(scrolling));
            if !scrolling {
                signals.push(ScrollSignal::Settled(metrics.offset));
            }
        }

        let at_bottom = metrics.is_at_bottom(self.bottom_buffer);
        if at_bottom != self.at_bottom {
            self.at_bottom = at_bottom;
            signals.push(ScrollSignal::BottomChanged(at_bottom));
        }

        if self.programmatic {
            return Vec::new();
        }

        for signal in &signals {
            for listener in &mut self.listeners {
                listener(surface, *signal);
            }
        }
        signals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FixedSurface(u64);

    impl ScrollSurface for FixedSurface {
        fn id(&self) -> SurfaceId {
            SurfaceId(self.0)
        }
        fn metrics(&self) -> ScrollMetrics {
            ScrollMetrics::default()
        }
        fn scroll_to(&mut self, _offset: u32) {}
    }

    fn at(offset: u32) -> ScrollMetrics {
        ScrollMetrics::new(offset, 800, 2000)
    }

    fn attached() -> ScrollPositionMonitor {
        let mut monitor = ScrollPositionMonitor::default();
        monitor.attach(&FixedSurface(1));
        monitor
    }

    #[test]
    fn test_bottom_fires_once_per_transition() {
        let mut monitor = attached();

        assert!(monitor.report(at(0)).is_empty());
        let signals = monitor.report(at(1190));
        assert!(signals.contains(&ScrollSignal::BottomChanged(true)));

        // Same offset again: scrolling stops, bottom does not re-fire
        let signals = monitor.report(at(1190));
        assert_eq!(
            signals,
            vec![
                ScrollSignal::ScrollingChanged(false),
                ScrollSignal::Settled(1190)
            ]
        );
        assert!(monitor.report(at(1190)).is_empty());

        let signals = monitor.report(at(400));
        assert!(signals.contains(&ScrollSignal::BottomChanged(false)));
    }

    #[test]
    fn test_bottom_buffer_boundary() {
        // 1184 + 800 = 1984 = 2000 - 16
        assert!(at(1184).is_at_bottom(16));
        assert!(!at(1183).is_at_bottom(16));
        // Content shorter than the viewport is always at bottom
        assert!(ScrollMetrics::new(0, 800, 300).is_at_bottom(16));
    }

    #[test]
    fn test_jitter_within_margin_is_not_scrolling() {
        let mut monitor = attached();
        monitor.report(at(100));

        assert!(monitor.report(at(116)).is_empty());
        assert_eq!(
            monitor.report(at(133)),
            vec![ScrollSignal::ScrollingChanged(true)]
        );
        assert_eq!(
            monitor.report(at(140)),
            vec![
                ScrollSignal::ScrollingChanged(false),
                ScrollSignal::Settled(140)
            ]
        );
    }

    #[test]
    fn test_programmatic_scroll_suppresses_signals() {
        let mut monitor = attached();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.subscribe(move |_, signal| sink.lock().expect("lock").push(signal));

        monitor.set_programmatic_scroll(true);
        assert!(monitor.report(at(0)).is_empty());
        assert!(monitor.report(at(1200)).is_empty());
        assert!(monitor.report(at(1200)).is_empty());
        monitor.set_programmatic_scroll(false);

        // State was tracked while suppressed, so nothing fires late
        assert!(monitor.report(at(1200)).is_empty());
        assert!(monitor.is_at_bottom());
        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn test_detach_flushes_offset_and_clears_listeners() {
        let mut monitor = attached();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.subscribe(move |surface, signal| {
            sink.lock().expect("lock").push((surface, signal))
        });

        monitor.report(at(0));
        monitor.report(at(500));
        assert_eq!(monitor.detach(), Some(500));
        assert_eq!(monitor.detach(), None);

        let before = seen.lock().expect("lock").len();
        monitor.attach(&FixedSurface(2));
        monitor.report(at(0));
        monitor.report(at(1200));
        assert_eq!(seen.lock().expect("lock").len(), before);
        assert!(seen
            .lock()
            .expect("lock")
            .iter()
            .all(|(surface, _)| *surface == SurfaceId(1)));
    }

    #[test]
    fn test_reports_ignored_when_detached() {
        let mut monitor = ScrollPositionMonitor::default();
        assert!(monitor.report(at(1200)).is_empty());
        assert_eq!(monitor.current_offset(), 0);
    }
}

//! Reading-session engine
//!
//! Turns scroll and navigation events into completed pages, credited reading
//! time, and a resumable position:
//! - [`ScrollPositionMonitor`] detects scrolling, settling, and bottom-of-page
//! - [`ReadingStopwatch`] accumulates time on the active page
//! - [`PageTracker`] decides when a page counts as read
//! - [`PositionPersister`] keeps the single last-read position
//! - [`ReadingSession`] wires them together on one event task

pub mod layout;
pub mod position;
pub mod scroll;
pub mod session;
pub mod stopwatch;
pub mod timers;
pub mod tracker;
pub mod ui;

pub use layout::{AyahRange, PageLayout};
pub use position::PositionPersister;
pub use scroll::{ScrollMetrics, ScrollPositionMonitor, ScrollSignal, ScrollSurface, SurfaceId};
pub use session::{ReaderEvent, ReadingSession};
pub use stopwatch::ReadingStopwatch;
pub use timers::{TimerFired, TimerKind, TimerSink};
pub use tracker::{PageTracker, VisitKey, VisitPhase};
pub use ui::{NoopUi, ReaderUi};

//! Progress feed
//!
//! Broadcasts the latest [`ReadingSummary`] to any number of subscribers.
//! A subscriber that attaches late immediately sees the last published value;
//! dropping the receiver unsubscribes.

use std::sync::Arc;

use tokio::sync::watch;

use super::ReadingSummary;

#[derive(Clone)]
pub struct ProgressFeed {
    tx: Arc<watch::Sender<ReadingSummary>>,
}

impl Default for ProgressFeed {
    fn default() -> Self {
        Self::new(ReadingSummary::default())
    }
}

impl ProgressFeed {
    pub fn new(initial: ReadingSummary) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<ReadingSummary> {
        self.tx.subscribe()
    }

    /// Replace the current summary, waking subscribers only if it changed
    pub fn publish(&self, summary: ReadingSummary) {
        self.tx.send_if_modified(|current| {
            if *current == summary {
                false
            } else {
                *current = summary;
                true
            }
        });
    }

    pub fn current(&self) -> ReadingSummary {
        self.tx.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

//! Bounded lookahead prefetch over the canvas-event subsequence.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{AbortHandle, JoinSet};

use crate::decode::cache::DeserializationCache;
use crate::events::classify::{CanvasEvent, EventSeq};

/// Drives the deserialization cache ahead of the playback cursor.
///
/// The window holds events whose speculative resolution has been handed to a
/// tracked background task; an entry leaves the window when its task finishes,
/// including by panic, and is never re-entered. Each `advance` slides the
/// cursor forward by one step, so per-call work stays bounded.
pub(crate) struct PreloadScheduler {
    events: Arc<Vec<CanvasEvent>>,
    cache: Arc<DeserializationCache>,
    capacity: usize,
    cursor: Option<usize>,
    // In-flight seqs with their task handles; reaped by `is_finished` so a
    // panicking collaborator decoder cannot pin window capacity. Decode
    // failures are observed through the cache's error-reporting path.
    window: HashMap<EventSeq, AbortHandle>,
    tasks: JoinSet<()>,
}

impl PreloadScheduler {
    pub(crate) fn new(
        events: Arc<Vec<CanvasEvent>>,
        cache: Arc<DeserializationCache>,
        capacity: usize,
    ) -> Self {
        Self {
            events,
            cache,
            capacity: capacity.max(1),
            cursor: None,
            window: HashMap::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Slide the lookahead window one step forward from the cursor, or from
    /// `current` (else index 0) when the cursor was reset, enqueueing up to
    /// the window's remaining capacity of not-yet-resolved upcoming events.
    pub(crate) fn advance(&mut self, current: Option<EventSeq>) {
        self.reap();

        let start = self
            .cursor
            .unwrap_or_else(|| current.map(EventSeq::index).unwrap_or(0))
            .min(self.events.len());
        let budget = self.capacity.saturating_sub(self.window.len());
        let end = start.saturating_add(budget).min(self.events.len());

        for ev in self.events[start..end].iter() {
            if self.window.contains_key(&ev.seq) || self.cache.is_settled(ev.seq) {
                continue;
            }
            if !ev.payload.needs_decode() {
                // Nothing to prefetch; plain events resolve synchronously.
                continue;
            }
            let cache = self.cache.clone();
            let events = self.events.clone();
            let seq = ev.seq;
            let handle = self.tasks.spawn(async move {
                if cache.resolve(&events[seq.index()]).await.is_err() {
                    tracing::debug!(seq = seq.0, "prefetch resolution dropped");
                }
            });
            self.window.insert(seq, handle);
        }

        self.cursor = Some((start + 1).min(self.events.len()));
    }

    /// Forget the cursor after a non-sequential jump (scrub/seek). In-flight
    /// decodes complete and populate the cache but stop feeding the window.
    pub(crate) fn reset(&mut self) {
        self.cursor = None;
    }

    /// Abort outstanding prefetch tasks. Session teardown only.
    pub(crate) fn shutdown(&mut self) {
        self.tasks.abort_all();
        self.cursor = None;
        self.window.clear();
    }

    /// Release finished task slots and drop their window entries. Covers
    /// tasks that completed, were aborted, or panicked.
    fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
        self.window.retain(|_, task| !task.is_finished());
    }
}

impl std::fmt::Debug for PreloadScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadScheduler")
            .field("capacity", &self.capacity)
            .field("cursor", &self.cursor)
            .field("window", &self.window.len())
            .finish()
    }
}

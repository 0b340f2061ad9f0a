//! Session-oriented replay API.
//!
//! One [`ReplaySession`] owns every piece of replay state — classified events,
//! decode cache, preload window, canvas targets and placeholders — and is torn
//! down as a unit when the player unmounts. Nothing here is process-global;
//! two sessions never share state.

use std::sync::Arc;

use crate::apply::MutationApplier;
use crate::decode::cache::DeserializationCache;
use crate::decode::payload::{InlineDecoder, PayloadDecoder};
use crate::events::classify::{CanvasEvent, EventLookup, EventSeq, classify};
use crate::events::model::{CanvasId, EventData, RecordedEvent};
use crate::foundation::pixel::FrameRgba;
use crate::host::{ErrorReporter, HostNode, Mirror, TracingReporter};
use crate::preload::scheduler::PreloadScheduler;
use crate::registry::{CanvasRegistry, PlaceholderSurface};

/// Options controlling replay-session behavior.
#[derive(Clone, Copy, Debug)]
pub struct ReplaySessionOpts {
    /// Maximum number of mutations being speculatively resolved at once.
    pub preload_capacity: usize,
}

impl Default for ReplaySessionOpts {
    fn default() -> Self {
        Self {
            preload_capacity: 30,
        }
    }
}

/// Replays recorded canvas mutations for one playback session.
///
/// Construction classifies the stream once; thereafter the playback driver
/// feeds events through [`ReplaySession::on_event`] and the tree builder
/// announces nodes through [`ReplaySession::on_node_built`].
pub struct ReplaySession {
    events: Arc<Vec<CanvasEvent>>,
    lookup: EventLookup,
    cache: Arc<DeserializationCache>,
    scheduler: PreloadScheduler,
    applier: MutationApplier,
    registry: CanvasRegistry,
}

impl ReplaySession {
    /// Create a session with the built-in inline decoder and tracing reporter.
    pub fn new(stream: &[RecordedEvent], opts: ReplaySessionOpts) -> Self {
        Self::with_collaborators(
            stream,
            Arc::new(InlineDecoder),
            Arc::new(TracingReporter),
            opts,
        )
    }

    /// Create a session with explicit decode and error-reporting collaborators.
    pub fn with_collaborators(
        stream: &[RecordedEvent],
        decoder: Arc<dyn PayloadDecoder>,
        reporter: Arc<dyn ErrorReporter>,
        opts: ReplaySessionOpts,
    ) -> Self {
        let events = Arc::new(classify(stream));
        let lookup = EventLookup::new(&events);
        let cache = Arc::new(DeserializationCache::new(decoder, reporter.clone()));
        let scheduler = PreloadScheduler::new(events.clone(), cache.clone(), opts.preload_capacity);
        let applier = MutationApplier::new(cache.clone(), reporter);
        tracing::debug!(
            canvas_events = events.len(),
            capacity = opts.preload_capacity,
            "replay session created"
        );
        Self {
            events,
            lookup,
            cache,
            scheduler,
            applier,
            registry: CanvasRegistry::default(),
        }
    }

    /// Hook invoked by the tree-reconstruction collaborator for every built
    /// node. Canvas nodes get their placeholder bound and mounted as a visual
    /// child; other nodes are ignored.
    pub fn on_node_built(&mut self, id: CanvasId, node: &mut dyn HostNode) {
        if !node.is_canvas() {
            return;
        }
        let placeholder = self.registry.bind_placeholder(id);
        node.mount(placeholder);
    }

    /// Hook invoked by the playback driver for every stream event as it is
    /// reached.
    ///
    /// `is_sync` marks a fast-forward/seek boundary: the preload cursor is
    /// reset (the old lookahead is stale relative to the new position) before
    /// the event is applied. Normal forward delivery is treated identically,
    /// minus the reset. Either way the scheduler advances one step so
    /// prefetching stays ahead of playback.
    pub async fn on_event(&mut self, event: &RecordedEvent, is_sync: bool, mirror: &mut dyn Mirror) {
        if is_sync {
            self.scheduler.reset();
        }

        let seq = match &event.data {
            EventData::CanvasMutation(data) => {
                self.lookup.locate(&self.events, event.timestamp, data)
            }
            _ => None,
        };

        if let Some(seq) = seq {
            let events = self.events.clone();
            self.applier
                .apply(&events[seq.index()], mirror, &mut self.registry)
                .await;
        }

        self.scheduler.advance(seq);
    }

    /// Latest pixel contents of the off-screen target for `id`, if one exists.
    pub fn target_frame(&self, id: CanvasId) -> Option<FrameRgba> {
        self.registry.target(id).map(|t| t.surface.snapshot())
    }

    /// The placeholder bound to `id`, if the tree has instantiated that canvas.
    pub fn placeholder(&self, id: CanvasId) -> Option<Arc<PlaceholderSurface>> {
        self.registry.placeholder(id)
    }

    /// `true` when a replay target exists for `id`.
    pub fn has_target(&self, id: CanvasId) -> bool {
        self.registry.has_target(id)
    }

    /// Number of canvas-mutation events in the classified subsequence.
    pub fn canvas_event_count(&self) -> usize {
        self.events.len()
    }

    /// Tear the session down: abort outstanding prefetch work and drop every
    /// per-session map. Called automatically on drop.
    pub fn teardown(&mut self) {
        self.scheduler.shutdown();
        self.cache.clear();
        self.registry.clear();
    }

    /// Advance prefetching without delivering an event, e.g. from an idle
    /// tick. Equivalent to `on_event` for a non-canvas event. Must be called
    /// from within the runtime driving the session; prefetch work is spawned.
    pub fn poll_preload(&mut self) {
        self.scheduler.advance(None);
    }

    /// Locate a stream event within the canvas subsequence. Exposed for
    /// integrations that track playback position themselves.
    pub fn locate(&self, event: &RecordedEvent) -> Option<usize> {
        match &event.data {
            EventData::CanvasMutation(data) => self
                .lookup
                .locate(&self.events, event.timestamp, data)
                .map(EventSeq::index),
            _ => None,
        }
    }
}

impl Drop for ReplaySession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for ReplaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySession")
            .field("canvas_events", &self.events.len())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

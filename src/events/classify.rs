//! Canvas-event classification and stream-event lookup.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::events::model::{
    CanvasId, CanvasMutationData, EventData, MutationPayload, RecordedEvent,
};

/// Position of a canvas event within the classified subsequence.
///
/// This is the stable per-event identifier used as the deserialization-cache
/// key and as the preload cursor unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventSeq(pub u32);

impl EventSeq {
    /// Index into the classified subsequence.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One classified canvas-mutation event.
#[derive(Clone, Debug, PartialEq)]
pub struct CanvasEvent {
    /// Position in the classified subsequence.
    pub seq: EventSeq,
    /// Recording timestamp in milliseconds.
    pub timestamp: u64,
    /// Target canvas identity.
    pub canvas_id: CanvasId,
    /// Draw-call payload.
    pub payload: MutationPayload,
}

/// Filter the full recorded stream down to the ordered canvas-mutation
/// subsequence. Pure and deterministic; computed once per session.
pub fn classify(stream: &[RecordedEvent]) -> Vec<CanvasEvent> {
    let mut out = Vec::new();
    for event in stream {
        if let EventData::CanvasMutation(data) = &event.data {
            out.push(CanvasEvent {
                seq: EventSeq(out.len() as u32),
                timestamp: event.timestamp,
                canvas_id: data.canvas_id,
                payload: data.payload.clone(),
            });
        }
    }
    out
}

/// Locates an incoming stream event within the classified subsequence.
///
/// Keyed by `(timestamp, canvas id)`; the rare collision (two mutations for one
/// canvas in the same millisecond) is disambiguated by payload equality.
#[derive(Debug, Default)]
pub(crate) struct EventLookup {
    by_key: HashMap<(u64, CanvasId), SmallVec<[EventSeq; 2]>>,
}

impl EventLookup {
    pub(crate) fn new(events: &[CanvasEvent]) -> Self {
        let mut by_key: HashMap<(u64, CanvasId), SmallVec<[EventSeq; 2]>> = HashMap::new();
        for ev in events {
            by_key
                .entry((ev.timestamp, ev.canvas_id))
                .or_default()
                .push(ev.seq);
        }
        Self { by_key }
    }

    pub(crate) fn locate(
        &self,
        events: &[CanvasEvent],
        timestamp: u64,
        data: &CanvasMutationData,
    ) -> Option<EventSeq> {
        let candidates = self.by_key.get(&(timestamp, data.canvas_id))?;
        if let [only] = candidates.as_slice() {
            return Some(*only);
        }
        candidates
            .iter()
            .copied()
            .find(|seq| events[seq.index()].payload == data.payload)
    }
}

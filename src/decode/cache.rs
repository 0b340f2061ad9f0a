//! Memoized resolution of mutation events into ready-to-apply draw calls.
//!
//! Resolution state per event is an explicit tri-state: absent (unresolved),
//! `Resolving` (one in-flight decode, later callers await it), `Resolved`.
//! Only mutations whose resolution actually replaced a payload reference are
//! retained, so memory stays proportional to ref-bearing mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use xxhash_rust::xxh3::Xxh3;

use crate::decode::payload::{DecodedPayload, PayloadDecoder};
use crate::events::classify::{CanvasEvent, EventSeq};
use crate::events::model::{CanvasId, DrawArg, SerializedRef};
use crate::foundation::error::{ReplayError, ReplayResult};
use crate::host::ErrorReporter;

/// A mutation with every payload reference replaced by its decoded value.
/// Produced at most once per event and never mutated afterwards.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedMutation {
    pub(crate) canvas_id: CanvasId,
    pub(crate) commands: Vec<ResolvedCommand>,
}

/// One ready-to-apply draw call.
#[derive(Clone, Debug)]
pub(crate) struct ResolvedCommand {
    pub(crate) method: String,
    pub(crate) args: Vec<ResolvedArg>,
}

/// One ready-to-apply draw-call argument.
#[derive(Clone, Debug)]
pub(crate) enum ResolvedArg {
    /// Primitive or plain structured value, as recorded.
    Value(serde_json::Value),
    /// Decoded image handle.
    Image(Arc<crate::decode::image::PreparedImage>),
    /// Decoded raw bytes.
    Bytes(Arc<Vec<u8>>),
}

impl From<DecodedPayload> for ResolvedArg {
    fn from(p: DecodedPayload) -> Self {
        match p {
            DecodedPayload::Image(img) => Self::Image(img),
            DecodedPayload::Bytes(b) => Self::Bytes(b),
        }
    }
}

/// Outcome broadcast to callers awaiting an in-flight decode.
type DecodeOutcome = Result<Arc<ResolvedMutation>, String>;

enum EntryState {
    Resolving(watch::Receiver<Option<DecodeOutcome>>),
    Resolved(Arc<ResolvedMutation>),
}

enum Claim {
    Resolved(Arc<ResolvedMutation>),
    Waiter(watch::Receiver<Option<DecodeOutcome>>),
    Owner(watch::Sender<Option<DecodeOutcome>>),
}

/// Memoized event-resolution cache shared by prefetch and playback.
pub(crate) struct DeserializationCache {
    decoder: Arc<dyn PayloadDecoder>,
    reporter: Arc<dyn ErrorReporter>,
    states: Mutex<HashMap<EventSeq, EntryState>>,
    // Payload fingerprint -> decoded handle, scoped to the session lifetime,
    // so identical binary payloads decode once across events.
    payloads: Mutex<HashMap<u64, DecodedPayload>>,
}

impl DeserializationCache {
    pub(crate) fn new(decoder: Arc<dyn PayloadDecoder>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            decoder,
            reporter,
            states: Mutex::new(HashMap::new()),
            payloads: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve `event` into its ready-to-apply form.
    ///
    /// Idempotent per event: concurrent calls collapse into one decode, later
    /// calls return the cached value. Events without payload references are
    /// materialized on the fly and never stored. A decode failure discards the
    /// entry, reports once to the error collaborator, and returns `Err`; the
    /// caller skips that mutation.
    pub(crate) async fn resolve(&self, event: &CanvasEvent) -> ReplayResult<Arc<ResolvedMutation>> {
        if !event.payload.needs_decode() {
            return Ok(Arc::new(resolve_plain(event)));
        }

        let claim = {
            let mut states = lock(&self.states);
            match states.get(&event.seq) {
                Some(EntryState::Resolved(r)) => Claim::Resolved(r.clone()),
                Some(EntryState::Resolving(rx)) => Claim::Waiter(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    states.insert(event.seq, EntryState::Resolving(rx));
                    Claim::Owner(tx)
                }
            }
        };

        match claim {
            Claim::Resolved(r) => Ok(r),
            Claim::Waiter(rx) => await_outcome(rx).await,
            Claim::Owner(tx) => {
                let result = self.decode_event(event).await;
                {
                    let mut states = lock(&self.states);
                    match &result {
                        Ok(resolved) => {
                            states.insert(event.seq, EntryState::Resolved(resolved.clone()));
                        }
                        Err(_) => {
                            states.remove(&event.seq);
                        }
                    }
                }
                let outcome = match &result {
                    Ok(resolved) => Ok(resolved.clone()),
                    Err(err) => {
                        self.reporter.report(err);
                        tracing::debug!(seq = event.seq.0, error = %err, "mutation resolution dropped");
                        Err(err.to_string())
                    }
                };
                // Receivers may all be gone; that only means nobody else waited.
                let _ = tx.send(Some(outcome));
                result
            }
        }
    }

    /// `true` when a decode for `seq` is currently in flight.
    pub(crate) fn is_resolving(&self, seq: EventSeq) -> bool {
        matches!(lock(&self.states).get(&seq), Some(EntryState::Resolving(_)))
    }

    /// `true` when `seq` has a cached resolution (in flight or done).
    pub(crate) fn is_settled(&self, seq: EventSeq) -> bool {
        lock(&self.states).contains_key(&seq)
    }

    /// Drop all cached resolutions and payload handles. Session teardown only.
    pub(crate) fn clear(&self) {
        lock(&self.states).clear();
        lock(&self.payloads).clear();
    }

    async fn decode_event(&self, event: &CanvasEvent) -> ReplayResult<Arc<ResolvedMutation>> {
        let recorded = event.payload.commands();
        let mut commands = Vec::with_capacity(recorded.len());
        for cmd in recorded {
            let mut args = Vec::with_capacity(cmd.args.len());
            for arg in &cmd.args {
                match arg {
                    DrawArg::Value(v) => args.push(ResolvedArg::Value(v.clone())),
                    DrawArg::Ref(r) => args.push(self.resolve_ref(r).await?),
                }
            }
            commands.push(ResolvedCommand {
                method: cmd.method.clone(),
                args,
            });
        }
        Ok(Arc::new(ResolvedMutation {
            canvas_id: event.canvas_id,
            commands,
        }))
    }

    async fn resolve_ref(&self, reference: &SerializedRef) -> ReplayResult<ResolvedArg> {
        let key = payload_key(reference);
        if let Some(hit) = lock(&self.payloads).get(&key).cloned() {
            return Ok(hit.into());
        }
        let decoded = self.decoder.decode(reference).await?;
        // Two events racing on one payload may both decode it; last insert
        // wins and both handles are valid. Event-level collapse makes this
        // rare, so it is tolerated rather than locked across the await.
        lock(&self.payloads).insert(key, decoded.clone());
        Ok(decoded.into())
    }
}

impl std::fmt::Debug for DeserializationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeserializationCache")
            .field("entries", &lock(&self.states).len())
            .field("payloads", &lock(&self.payloads).len())
            .finish()
    }
}

async fn await_outcome(
    mut rx: watch::Receiver<Option<DecodeOutcome>>,
) -> ReplayResult<Arc<ResolvedMutation>> {
    loop {
        {
            let current = rx.borrow_and_update();
            if let Some(outcome) = current.as_ref() {
                return outcome.clone().map_err(ReplayError::decode);
            }
        }
        if rx.changed().await.is_err() {
            return Err(ReplayError::decode("decode abandoned before completion"));
        }
    }
}

fn resolve_plain(event: &CanvasEvent) -> ResolvedMutation {
    let recorded = event.payload.commands();
    let mut commands = Vec::with_capacity(recorded.len());
    for cmd in recorded {
        let args = cmd
            .args
            .iter()
            .map(|arg| match arg {
                DrawArg::Value(v) => ResolvedArg::Value(v.clone()),
                // Unreachable when needs_decode() is false; kept total.
                DrawArg::Ref(_) => ResolvedArg::Value(serde_json::Value::Null),
            })
            .collect();
        commands.push(ResolvedCommand {
            method: cmd.method.clone(),
            args,
        });
    }
    ResolvedMutation {
        canvas_id: event.canvas_id,
        commands,
    }
}

fn payload_key(reference: &SerializedRef) -> u64 {
    let mut h = Xxh3::new();
    h.update(&[reference.kind as u8]);
    h.update(reference.payload.as_bytes());
    h.digest()
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

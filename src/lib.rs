//! Canvas-mutation replay engine for session-recording playback.
//!
//! Reconstructs, frame by frame, the pixel contents of recorded canvas
//! elements from a serialized stream of draw-call mutations. The API is
//! session-oriented:
//!
//! - Deserialize a stream of [`RecordedEvent`]s
//! - Create a [`ReplaySession`] (classification happens once, up front)
//! - Wire the player's tree builder to [`ReplaySession::on_node_built`] and
//!   its playback driver to [`ReplaySession::on_event`]
//!
//! The session prefetches upcoming mutations inside a bounded lookahead
//! window, decodes referenced binary/image payloads at most once, and replays
//! draw calls onto off-screen targets in strictly recorded order. Every
//! failure degrades to a visually incomplete frame; nothing here halts
//! playback.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod apply;
mod decode;
mod events;
mod foundation;
mod host;
mod preload;
mod registry;
mod session;
mod surface;

pub use crate::decode::image::{PreparedImage, decode_image};
pub use crate::decode::payload::{DecodedPayload, InlineDecoder, PayloadDecoder};
pub use crate::events::classify::{CanvasEvent, EventSeq, classify};
pub use crate::events::model::{
    CanvasId, CanvasMutationData, DrawArg, DrawCommand, EventData, MutationPayload, RecordedEvent,
    RefKind, SerializedRef,
};
pub use crate::foundation::error::{ReplayError, ReplayResult};
pub use crate::foundation::pixel::{FrameRgba, PremulRgba8};
pub use crate::host::{ErrorReporter, HostNode, Mirror, TracingReporter};
pub use crate::registry::PlaceholderSurface;
pub use crate::session::{ReplaySession, ReplaySessionOpts};

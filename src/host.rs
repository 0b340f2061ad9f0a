//! Collaborator traits supplied by the embedding player.
//!
//! The replay engine never owns the reconstructed node tree; it sees it only
//! through [`Mirror`] lookups and [`HostNode`] handles, and it never terminates
//! playback on failure — everything recoverable is handed to the session's
//! [`ErrorReporter`].

use std::sync::Arc;

use crate::events::model::CanvasId;
use crate::foundation::error::ReplayError;
use crate::registry::PlaceholderSurface;

/// A live reconstructed node, as seen by the replay engine.
pub trait HostNode {
    /// `true` when this node is a canvas element.
    fn is_canvas(&self) -> bool;

    /// Current visible dimensions in pixels.
    ///
    /// Re-read on every apply; recorded pages resize canvases at will.
    fn size(&self) -> (u32, u32);

    /// Attach a placeholder surface as a visual child of this node.
    fn mount(&mut self, placeholder: Arc<PlaceholderSurface>);
}

/// External structure mapping a recorded node identity to its currently-live
/// reconstructed node. A miss is expected during partial mounts and is not an
/// error.
pub trait Mirror {
    /// Look up the live node for `id`, if mounted.
    fn node(&mut self, id: CanvasId) -> Option<&mut dyn HostNode>;
}

/// Collaborator receiving every recovered replay error.
pub trait ErrorReporter: Send + Sync {
    /// Observe one recovered error. Must not panic.
    fn report(&self, err: &ReplayError);
}

/// Default reporter that forwards recovered errors to `tracing` at warn level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &ReplayError) {
        tracing::warn!(error = %err, "replay error recovered");
    }
}

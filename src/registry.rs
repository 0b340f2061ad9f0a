//! Per-session ownership of replay targets and on-screen placeholders.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::events::model::CanvasId;
use crate::foundation::pixel::FrameRgba;
use crate::surface::canvas::{CanvasSurface, DrawState};

/// Off-screen replay target for one recorded canvas: the surface accumulating
/// replayed draw state plus the replayed 2D-context state.
#[derive(Debug)]
pub(crate) struct CanvasTarget {
    pub(crate) surface: CanvasSurface,
    pub(crate) state: DrawState,
}

/// On-screen element presenting the latest rendered frame for one canvas.
///
/// Lifecycle is independent from the replay target: the host binds a
/// placeholder when the reconstructed tree instantiates a canvas node, which
/// may happen before any mutation arrives (or never be followed by one).
#[derive(Debug, Default)]
pub struct PlaceholderSurface {
    frame: Mutex<Option<Arc<FrameRgba>>>,
}

impl PlaceholderSurface {
    /// Publish a newly rendered frame.
    pub(crate) fn present(&self, frame: Arc<FrameRgba>) {
        *self
            .frame
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(frame);
    }

    /// Latest published frame, or `None` before the first publish.
    pub fn frame(&self) -> Option<Arc<FrameRgba>> {
        self.frame
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

/// Owns the canvas-id keyed maps for one replay session.
///
/// The two maps are independent and may be populated in either order; both are
/// cleared on session teardown and never shared across sessions.
#[derive(Debug, Default)]
pub(crate) struct CanvasRegistry {
    targets: HashMap<CanvasId, CanvasTarget>,
    placeholders: HashMap<CanvasId, Arc<PlaceholderSurface>>,
}

impl CanvasRegistry {
    /// Existing target for `id`, or a fresh one cloned from the source
    /// element's current size.
    pub(crate) fn get_or_create_target(
        &mut self,
        id: CanvasId,
        size: (u32, u32),
    ) -> &mut CanvasTarget {
        self.targets.entry(id).or_insert_with(|| {
            tracing::debug!(canvas = id.0, width = size.0, height = size.1, "creating replay target");
            CanvasTarget {
                surface: CanvasSurface::new(size.0, size.1),
                state: DrawState::default(),
            }
        })
    }

    pub(crate) fn target(&self, id: CanvasId) -> Option<&CanvasTarget> {
        self.targets.get(&id)
    }

    pub(crate) fn has_target(&self, id: CanvasId) -> bool {
        self.targets.contains_key(&id)
    }

    /// Create (once) or return the placeholder bound to `id`.
    ///
    /// If a target already exists, its current contents are published so the
    /// placeholder does not start blank after a late mount.
    pub(crate) fn bind_placeholder(&mut self, id: CanvasId) -> Arc<PlaceholderSurface> {
        let placeholder = self
            .placeholders
            .entry(id)
            .or_insert_with(|| Arc::new(PlaceholderSurface::default()))
            .clone();
        if let Some(target) = self.targets.get(&id) {
            placeholder.present(Arc::new(target.surface.snapshot()));
        }
        placeholder
    }

    pub(crate) fn placeholder(&self, id: CanvasId) -> Option<Arc<PlaceholderSurface>> {
        self.placeholders.get(&id).cloned()
    }

    /// Session teardown: drop both maps.
    pub(crate) fn clear(&mut self) {
        self.targets.clear();
        self.placeholders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_created_once_and_keeps_contents() {
        let mut reg = CanvasRegistry::default();
        let id = CanvasId(3);

        let t = reg.get_or_create_target(id, (2, 2));
        t.surface.fill_rect(0.0, 0.0, 2.0, 2.0, [255, 0, 0, 255]);

        // Second lookup with a different size returns the same target.
        let t = reg.get_or_create_target(id, (9, 9));
        assert_eq!((t.surface.width(), t.surface.height()), (2, 2));
        assert_eq!(t.surface.snapshot().pixel(0, 0), Some([255, 0, 0, 255]));
    }

    #[test]
    fn bind_placeholder_is_idempotent_and_order_independent() {
        let mut reg = CanvasRegistry::default();
        let id = CanvasId(1);

        // Placeholder before any target.
        let a = reg.bind_placeholder(id);
        assert!(a.frame().is_none());
        let b = reg.bind_placeholder(id);
        assert!(Arc::ptr_eq(&a, &b));

        // Late-bound placeholder picks up existing target contents.
        let mut reg = CanvasRegistry::default();
        reg.get_or_create_target(id, (1, 1))
            .surface
            .fill_rect(0.0, 0.0, 1.0, 1.0, [0, 0, 255, 255]);
        let p = reg.bind_placeholder(id);
        assert_eq!(p.frame().unwrap().pixel(0, 0), Some([0, 0, 255, 255]));
    }

    #[test]
    fn clear_drops_both_maps() {
        let mut reg = CanvasRegistry::default();
        reg.get_or_create_target(CanvasId(1), (1, 1));
        reg.bind_placeholder(CanvasId(2));
        reg.clear();
        assert!(!reg.has_target(CanvasId(1)));
        assert!(reg.placeholder(CanvasId(2)).is_none());
    }
}

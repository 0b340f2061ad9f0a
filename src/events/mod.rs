//! Recorded event model and canvas-event classification.

pub(crate) mod classify;
pub(crate) mod model;

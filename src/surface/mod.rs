//! CPU raster surface, replayed 2D state, and style parsing.

pub(crate) mod canvas;
pub(crate) mod color;

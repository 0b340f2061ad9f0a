//! Crate-wide error and pixel primitives.

pub(crate) mod error;
pub(crate) mod pixel;

//! Asynchronous payload decode pipeline and the memoized resolution cache.

pub(crate) mod cache;
pub(crate) mod image;
pub(crate) mod payload;

//! Speculative resolution ahead of the playback cursor.

pub(crate) mod scheduler;

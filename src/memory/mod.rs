//! Pure parsing and classification of process memory maps.

pub mod classify;
pub mod smaps;
pub mod summary;

//! Group folding, change detection and row selection. Pure: no I/O.
pub mod group;
pub mod rows;

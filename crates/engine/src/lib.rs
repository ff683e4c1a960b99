//! Rate comparison engine.
//!
//! Diffs consecutive market snapshots into classified alerts and produces
//! the per-token movement summary written to the cycle log.

pub mod comparer;
pub mod summary;

pub use comparer::*;
pub use summary::*;

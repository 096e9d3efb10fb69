//! Strongly connected component search used by the reference counter.

pub mod tarjan;

pub use tarjan::Tarjan;

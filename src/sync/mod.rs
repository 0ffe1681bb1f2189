//! Synchronisation primitives used by the cache layers.

pub mod arbiter;
pub(crate) mod lock;

pub use arbiter::{Arbiter, ArbiterGuard};

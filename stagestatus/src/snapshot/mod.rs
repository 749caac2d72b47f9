//! Snapshot loading.
//!
//! One bulk fetch per collection through a [`StatusSource`], turned into a
//! [`Snapshot`] with lazily built lookup indexes.

mod loader;
mod source;

pub use loader::{Snapshot, SnapshotLoader};
#[cfg(test)]
pub use source::MockStatusSource;
pub use source::{InMemoryStatusSource, JsonStatusSource, StatusSource};

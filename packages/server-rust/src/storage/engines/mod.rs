//! Concrete [`BlobEngine`](super::BlobEngine) implementations.

pub mod fs;
pub mod hashmap;

pub use fs::FsBlobEngine;
pub use hashmap::HashMapBlobEngine;

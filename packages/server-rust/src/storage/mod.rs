//! Storage gateways for the relay pipeline.
//!
//! - [`BlobEngine`]: low-level put/get of opaque bytes by key, with
//!   in-memory and filesystem engines under [`engines`]
//! - [`BlobResultStore`]: the result store gateway, serializing
//!   [`ResultRecord`](relay_core::ResultRecord)s as JSON blobs
//! - [`InMemorySubjectStore`]: the lookup gateway used in development and tests

pub mod engine;
pub mod engines;
pub mod results;
pub mod subjects;

pub use engine::BlobEngine;
pub use engines::{FsBlobEngine, HashMapBlobEngine};
pub use results::BlobResultStore;
pub use subjects::InMemorySubjectStore;

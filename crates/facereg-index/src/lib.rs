//! facereg-index: similarity-search backends for the identity registry.
//!
//! The [`VectorIndex`] trait is the only view the matching engine has of
//! stored identities. Two drivers implement it: [`QdrantIndex`] speaks the
//! Qdrant REST API, [`MemoryIndex`] keeps points in process.

pub mod connect;
pub mod error;
pub mod index;
pub mod memory;
pub mod qdrant;
pub mod types;

pub use connect::connect_with_retry;
pub use error::IndexError;
pub use index::{scroll_all, VectorIndex};
pub use memory::MemoryIndex;
pub use qdrant::{QdrantEndpoint, QdrantIndex};
pub use types::{CollectionSpec, Metric, Point, ScoredPoint, ScrollPage};

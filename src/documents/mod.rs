//! The documentation corpus: chunking, ingestion, and similarity search.

pub mod chunk;
pub mod search;
pub mod store;

pub use search::{join_passages, similar_passages, Passage};

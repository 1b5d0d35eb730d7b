// Database module
// Vector records, their on-disk snapshot, and exact similarity search over them

pub mod similarity;
pub mod snapshot;
pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use similarity::{cosine_similarity, dot_product, magnitude};
pub use snapshot::{FileSnapshot, MemorySnapshot, Snapshot, SnapshotRead};
pub use vector_store::{LoadOutcome, ScoredRecord, VectorStore};

/// A chunk of document text together with its embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub embedding: Vec<f32>,
    pub content: String,
}

impl VectorRecord {
    #[inline]
    pub const fn new(embedding: Vec<f32>, content: String) -> Self {
        Self { embedding, content }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

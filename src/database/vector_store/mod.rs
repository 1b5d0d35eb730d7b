
use std::cmp::Ordering;

use tracing::{debug, error, info, warn};

use super::similarity::cosine_similarity;
use super::snapshot::{Snapshot, SnapshotRead};
use super::VectorRecord;
use crate::{RagError, Result};

/// In-memory vector records mirrored to a [`Snapshot`], searched by exact cosine similarity
#[derive(Debug)]
pub struct VectorStore<S> {
    snapshot: S,
    records: Vec<VectorRecord>,
}

/// What a [`VectorStore::load`] found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Missing,
    Unreadable,
    Corrupt,
    Loaded { records: usize },
}

impl LoadOutcome {
    /// Whether a readable snapshot existed, even if it held no records
    #[inline]
    pub const fn is_present(self) -> bool {
        matches!(self, Self::Loaded { .. })
    }
}

/// A record paired with its similarity to a query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRecord<'a> {
    pub record: &'a VectorRecord,
    pub similarity: f32,
    /// Position of the record in insertion order
    pub index: usize,
}

impl<S: Snapshot> VectorStore<S> {
    /// Create an empty store backed by `snapshot`. Nothing is read until [`Self::load`].
    #[inline]
    pub const fn new(snapshot: S) -> Self {
        Self {
            snapshot,
            records: Vec::new(),
        }
    }

    #[inline]
    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Embedding dimension shared by every record, `None` while empty
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.records.first().map(VectorRecord::dimension)
    }

    /// Replace the in-memory records with the persisted snapshot.
    ///
    /// Never fails: a missing, unreadable or corrupt snapshot is logged and leaves the store
    /// empty. The outcome tells callers which of those happened.
    #[inline]
    pub fn load(&mut self) -> LoadOutcome {
        self.records.clear();

        match self.snapshot.read() {
            SnapshotRead::Missing => {
                info!("No vector snapshot at {}, starting empty", self.snapshot.location());
                LoadOutcome::Missing
            }
            SnapshotRead::Unreadable(reason) => {
                error!(
                    "Cannot read vector snapshot {}: {}",
                    self.snapshot.location(),
                    reason
                );
                LoadOutcome::Unreadable
            }
            SnapshotRead::Corrupt(reason) => {
                error!(
                    "Cannot decode vector snapshot {}: {}",
                    self.snapshot.location(),
                    reason
                );
                LoadOutcome::Corrupt
            }
            SnapshotRead::Loaded(records) => {
                if let Some(first) = records.first() {
                    let expected = first.dimension();
                    let mismatched = records
                        .iter()
                        .filter(|r| r.dimension() != expected)
                        .count();
                    if mismatched > 0 {
                        warn!(
                            "{} of {} loaded records do not have dimension {}; they will never match",
                            mismatched,
                            records.len(),
                            expected
                        );
                    }
                }
                info!("Loaded {} records into the vector store", records.len());
                self.records = records;
                LoadOutcome::Loaded {
                    records: self.records.len(),
                }
            }
        }
    }

    /// Append records and rewrite the full snapshot.
    ///
    /// All records must share the store's embedding dimension. On any error nothing is
    /// appended and the previous snapshot is left in place.
    #[inline]
    pub fn append(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("Nothing to append");
            return Ok(());
        }

        let expected = self
            .dimension()
            .unwrap_or_else(|| records[0].dimension());
        if let Some(bad) = records.iter().find(|r| r.dimension() != expected) {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: bad.dimension(),
            });
        }
        if expected == 0 {
            return Err(RagError::Store(
                "Refusing to store records with empty embeddings".to_string(),
            ));
        }

        let previous_len = self.records.len();
        let added = records.len();
        self.records.extend(records);

        if let Err(e) = self.snapshot.write(&self.records) {
            self.records.truncate(previous_len);
            return Err(e);
        }

        info!(
            "Appended {} records ({} total) to {}",
            added,
            self.records.len(),
            self.snapshot.location()
        );
        Ok(())
    }

    /// Score every record against `query`, best first.
    ///
    /// Ties keep insertion order. At most `k` results are returned.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredRecord<'_>> {
        if k == 0 || self.records.is_empty() {
            return Vec::new();
        }

        if self.dimension().is_some_and(|d| d != query.len()) {
            warn!(
                "Query has dimension {} but the store holds dimension {:?}; nothing will match",
                query.len(),
                self.dimension()
            );
        }

        let mut scored: Vec<ScoredRecord<'_>> = self
            .records
            .iter()
            .enumerate()
            .map(|(index, record)| ScoredRecord {
                record,
                similarity: cosine_similarity(query, &record.embedding),
                index,
            })
            .collect();

        // Stable sort: equal scores (including -0.0 and 0.0) stay in insertion order
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Contents of the `k` records most similar to `query`, best first
    #[inline]
    pub fn top_k(&self, query: &[f32], k: usize) -> Vec<String> {
        self.search(query, k)
            .into_iter()
            .map(|scored| scored.record.content.clone())
            .collect()
    }

    /// Drop every record, in memory and on disk
    #[inline]
    pub fn clear(&mut self) -> Result<()> {
        self.snapshot.clear()?;
        self.records.clear();
        info!("Cleared vector store at {}", self.snapshot.location());
        Ok(())
    }
}

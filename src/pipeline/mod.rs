// Retrieval pipeline
// Orchestrates chunking, embedding, storage and generation for the add and call paths


use tracing::{debug, info, warn};

use crate::config::Config;
use crate::config::settings::DEFAULT_TOP_K;
use crate::database::{LoadOutcome, Snapshot, VectorRecord, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, chunk_document};
use crate::embeddings::{Embedder, Generator};
use crate::{RagError, Result};

/// Separator placed between retrieved chunks in the generator's system context
pub const CONTEXT_SEPARATOR: &str = "\n";

pub struct RetrievalPipeline<E, G, S> {
    embedder: E,
    generator: G,
    store: VectorStore<S>,
    chunking: ChunkingConfig,
    top_k: usize,
}

/// Outcome of ingesting one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    /// What was persisted before this document was added
    pub prior: LoadOutcome,
    /// Chunks embedded and stored from this document
    pub chunks_added: usize,
    pub total_records: usize,
}

/// Outcome of answering one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryReport {
    pub snapshot: LoadOutcome,
    /// Context handed to the generator, best match first
    pub chunks: Vec<String>,
}

impl<E, G, S> RetrievalPipeline<E, G, S>
where
    E: Embedder,
    G: Generator,
    S: Snapshot,
{
    #[inline]
    pub fn new(embedder: E, generator: G, store: VectorStore<S>) -> Self {
        Self {
            embedder,
            generator,
            store,
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Build a pipeline using the chunking and retrieval settings from `config`
    #[inline]
    pub fn from_config(config: &Config, embedder: E, generator: G, store: VectorStore<S>) -> Self {
        Self::new(embedder, generator, store)
            .with_chunking(config.chunking.clone())
            .with_top_k(config.retrieval.top_k)
    }

    #[inline]
    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub const fn store(&self) -> &VectorStore<S> {
        &self.store
    }

    #[inline]
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk, embed and persist a document on top of what is already stored.
    ///
    /// The store is loaded first so repeated ingestion accumulates. Embedding failures and
    /// count mismatches abort before anything is written.
    #[inline]
    pub fn ingest(&mut self, document_text: &str) -> Result<IngestReport> {
        let prior = self.store.load();
        if prior == LoadOutcome::Unreadable {
            return Err(RagError::Store(
                "Existing vector snapshot could not be read; refusing to overwrite it".to_string(),
            ));
        }

        let chunks = chunk_document(document_text, &self.chunking);
        if chunks.is_empty() {
            warn!("Document produced no chunks worth embedding");
            return Ok(IngestReport {
                prior,
                chunks_added: 0,
                total_records: self.store.len(),
            });
        }

        info!("Embedding {} chunks", chunks.len());
        let embeddings = self
            .embedder
            .embed(&chunks)
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?;

        if embeddings.len() != chunks.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let records: Vec<VectorRecord> = embeddings
            .into_iter()
            .zip(chunks)
            .map(|(embedding, content)| VectorRecord::new(embedding, content))
            .collect();
        let chunks_added = records.len();

        self.store.append(records)?;

        Ok(IngestReport {
            prior,
            chunks_added,
            total_records: self.store.len(),
        })
    }

    /// Load the store and return the chunks most relevant to `question`
    #[inline]
    pub fn retrieve(&mut self, question: &str) -> Result<QueryReport> {
        let snapshot = self.store.load();
        if self.store.is_empty() {
            warn!("Vector store is empty ({:?}); answering without context", snapshot);
            return Ok(QueryReport {
                snapshot,
                chunks: Vec::new(),
            });
        }

        let query = self
            .embedder
            .embed(&[question.to_string()])
            .map_err(|e| RagError::Embedding(format!("{:#}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| RagError::Embedding("No embedding returned for question".to_string()))?;

        let results = self.store.search(&query, self.top_k);
        for result in &results {
            debug!(
                "Retrieved record {} with similarity {:.4}",
                result.index, result.similarity
            );
        }

        let chunks = results
            .into_iter()
            .map(|scored| scored.record.content.clone())
            .collect();

        Ok(QueryReport { snapshot, chunks })
    }

    /// Retrieve context for `question` and stream the generated answer to `on_chunk`
    #[inline]
    pub fn query(
        &mut self,
        question: &str,
        on_chunk: &mut dyn FnMut(&str) -> anyhow::Result<()>,
    ) -> Result<QueryReport> {
        let report = self.retrieve(question)?;
        let context = report.chunks.join(CONTEXT_SEPARATOR);

        info!(
            "Generating answer with {} context chunks",
            report.chunks.len()
        );
        self.generator
            .generate(&context, question, on_chunk)
            .map_err(|e| RagError::Generation(format!("{:#}", e)))?;

        Ok(report)
    }
}

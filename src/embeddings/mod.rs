// Embeddings module
// Chunking policy plus the model-facing Embedder/Generator seams and their Ollama implementation

pub mod chunking;
pub mod ollama;

pub use chunking::{ChunkingConfig, chunk_document, word_count};
pub use ollama::OllamaClient;

/// Maps text to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input order.
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Streams a model answer for a question grounded in `system` context.
///
/// `on_chunk` is called with each fragment as it arrives; an error from it aborts the stream.
pub trait Generator {
    fn generate(
        &self,
        system: &str,
        question: &str,
        on_chunk: &mut dyn FnMut(&str) -> anyhow::Result<()>,
    ) -> anyhow::Result<()>;
}

impl<T: Embedder + ?Sized> Embedder for &T {
    #[inline]
    fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        (**self).embed(texts)
    }
}

impl<T: Generator + ?Sized> Generator for &T {
    #[inline]
    fn generate(
        &self,
        system: &str,
        question: &str,
        on_chunk: &mut dyn FnMut(&str) -> anyhow::Result<()>,
    ) -> anyhow::Result<()> {
        (**self).generate(system, question, on_chunk)
    }
}

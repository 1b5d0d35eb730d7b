
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Paragraph separator used to split extracted document text
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Configuration for document chunking
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Segments with this many words or fewer are discarded
    pub short_segment_words: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            short_segment_words: 3,
        }
    }
}

/// Split document text into embedding-ready chunks.
///
/// Paragraphs are trimmed, exact duplicates are dropped keeping the first occurrence, and
/// paragraphs of `short_segment_words` words or fewer are filtered out. Order is preserved.
#[inline]
pub fn chunk_document(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let segments: Vec<&str> = text.split(PARAGRAPH_SEPARATOR).map(str::trim).collect();
    let total = segments.len();

    let unique = dedup_preserving_order(segments);
    let duplicates = total - unique.len();

    let chunks: Vec<String> = unique
        .into_iter()
        .filter(|segment| word_count(segment) > config.short_segment_words)
        .map(str::to_string)
        .collect();

    debug!(
        "Chunked {} segments into {} chunks ({} duplicates, {} too short)",
        total,
        chunks.len(),
        duplicates,
        total - duplicates - chunks.len()
    );

    chunks
}

/// Whitespace-delimited word count
#[inline]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn dedup_preserving_order(segments: Vec<&str>) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(segments.len());
    segments
        .into_iter()
        .filter(|segment| seen.insert(*segment))
        .collect()
}

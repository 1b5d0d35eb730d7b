use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Model runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Process exit code reported by the CLI for this error
    #[inline]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Store(_) => 3,
            Self::DimensionMismatch { .. } => 4,
            Self::Embedding(_) => 5,
            Self::Generation(_) => 6,
            Self::Conversion(_) => 7,
            Self::Runtime(_) => 8,
            Self::Io(_) => 9,
            Self::Other(_) => 1,
        }
    }
}

pub mod commands;
pub mod config;
pub mod converter;
pub mod database;
pub mod embeddings;
pub mod pipeline;
pub mod runtime;

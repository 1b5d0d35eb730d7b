
use std::io::Write;
use std::path::Path;

use console::style;
use dialoguer::Confirm;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::converter::DocumentConverter;
use crate::database::{FileSnapshot, LoadOutcome, Snapshot, VectorStore};
use crate::embeddings::{Embedder, Generator, OllamaClient};
use crate::pipeline::{IngestReport, QueryReport, RetrievalPipeline};
use crate::runtime::ModelRuntime;
use crate::{RagError, Result};

type OllamaPipeline = RetrievalPipeline<OllamaClient, OllamaClient, FileSnapshot>;

/// Open the vector store persisted in the configured data directory
#[inline]
pub fn open_store(config: &Config) -> VectorStore<FileSnapshot> {
    VectorStore::new(FileSnapshot::new(config.store_path()))
}

fn build_pipeline(config: &Config) -> Result<OllamaPipeline> {
    let client = OllamaClient::new(&config.ollama)?;
    Ok(RetrievalPipeline::from_config(
        config,
        client.clone(),
        client,
        open_store(config),
    ))
}

/// The pipeline and HTTP client block, so keep them off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RagError::Other(anyhow::anyhow!("Background task failed: {}", e)))?
}

/// Convert a document, then chunk, embed and add it to the vector store
#[inline]
pub async fn add_document(config: &Config, path: &Path) -> Result<IngestReport> {
    info!("Adding document: {}", path.display());

    let text = DocumentConverter::new(&config.converter)
        .extract_text(path)
        .await?;

    let mut runtime = ModelRuntime::new(config)?;
    runtime.ensure_ready().await?;

    let mut pipeline = build_pipeline(config)?;
    let report = run_blocking(move || pipeline.ingest(&text)).await?;

    if report.chunks_added == 0 {
        warn!("No chunks were extracted from {}", path.display());
    }
    println!(
        "Added {} chunks from {} ({} records stored)",
        report.chunks_added,
        path.display(),
        report.total_records
    );

    runtime.shutdown().await?;
    Ok(report)
}

/// Answer a question from the stored chunks, streaming the answer to stdout
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<QueryReport> {
    info!("Answering question: {}", question);

    let mut runtime = ModelRuntime::new(config)?;
    runtime.ensure_ready().await?;

    let mut pipeline = build_pipeline(config)?;
    let question = question.to_string();
    let report = run_blocking(move || {
        let stdout = std::io::stdout();
        stream_answer(&mut pipeline, &question, &mut stdout.lock())
    })
    .await?;

    if !report.snapshot.is_present() {
        warn!("No documents have been added yet; run `pdf-rag add <file>` first");
    }

    runtime.shutdown().await?;
    Ok(report)
}

/// Stream the answer to `out`, ending the line even when generation fails midway
#[inline]
pub fn stream_answer<E, G, S, W>(
    pipeline: &mut RetrievalPipeline<E, G, S>,
    question: &str,
    out: &mut W,
) -> Result<QueryReport>
where
    E: Embedder,
    G: Generator,
    S: Snapshot,
    W: Write,
{
    let result = pipeline.query(question, &mut |fragment| {
        out.write_all(fragment.as_bytes())?;
        out.flush()?;
        Ok(())
    });
    writeln!(out)?;
    out.flush()?;
    result
}

/// Print the configuration in use, the vector store contents and Ollama health
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("PDF RAG Status").bold());
    println!("{}", "=".repeat(50));
    println!();

    println!("Configuration:");
    println!("   Data directory: {}", config.get_base_dir().display());
    println!("   Config file: {}", config.config_file_path().display());
    println!("   Top-k: {}", config.retrieval.top_k);
    println!();

    println!("Vector Store ({}):", config.store_path().display());
    let mut store = open_store(config);
    match store.load() {
        LoadOutcome::Missing => println!("   ⚪ No snapshot yet, add a document first"),
        LoadOutcome::Unreadable => println!("   ❌ Snapshot exists but cannot be read"),
        LoadOutcome::Corrupt => {
            println!("   ❌ Snapshot was corrupt and has been moved aside");
        }
        LoadOutcome::Loaded { records } => {
            println!("   ✅ {} records", records);
            if let Some(dimension) = store.dimension() {
                println!("   🔢 Embedding dimension: {}", dimension);
            }
        }
    }
    println!();

    println!("Ollama ({}):", config.ollama.host_port());
    let client = OllamaClient::new(&config.ollama)?.with_retry_attempts(1);
    match run_blocking(move || client.health_check().map_err(RagError::from)).await {
        Ok(()) => {
            println!("   ✅ Connected");
            println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            println!("   📋 Generation model: {}", config.ollama.generation_model);
        }
        Err(e) => {
            error!("Ollama health check failed: {}", e);
            println!("   ❌ Unavailable - {}", e);
        }
    }

    Ok(())
}

/// Delete every stored record after confirmation
#[inline]
pub fn clear_store(config: &Config, assume_yes: bool) -> Result<bool> {
    let path = config.store_path();
    if !path.exists() {
        println!("Nothing to clear at {}", path.display());
        return Ok(false);
    }

    if !assume_yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete all stored chunks in {}?", path.display()))
            .default(false)
            .interact()
            .map_err(|e| RagError::Other(anyhow::anyhow!("Failed to read confirmation: {}", e)))?;
        if !confirmed {
            println!("Cancelled");
            return Ok(false);
        }
    }

    open_store(config).clear()?;
    println!("{} Cleared {}", style("✓").green(), path.display());
    Ok(true)
}

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use pdf_rag::commands::{add_document, ask_question, clear_store, show_status};
use pdf_rag::config::{Config, run_interactive_config, show_config};
use pdf_rag::{RagError, Result};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pdf-rag")]
#[command(about = "Ask questions about your PDFs using a local Ollama model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a PDF (or plain text file) to the vector store
    Add {
        /// Path of the document to add
        path: PathBuf,
    },
    /// Ask a question answered from the stored documents
    Call {
        /// The question to ask
        question: String,
    },
    /// Show the vector store and Ollama status
    Status,
    /// Delete every stored chunk
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

fn load_config() -> Result<Config> {
    Config::load_from_env().map_err(|e| RagError::Config(format!("{:#}", e)))
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Add { path } => {
            add_document(&load_config()?, &path).await?;
        }
        Commands::Call { question } => {
            ask_question(&load_config()?, &question).await?;
        }
        Commands::Status => {
            show_status(&load_config()?).await?;
        }
        Commands::Clear { yes } => {
            clear_store(&load_config()?, yes)?;
        }
        Commands::Config { show } => {
            let result = if show {
                show_config()
            } else {
                run_interactive_config()
            };
            result.map_err(|e| RagError::Config(format!("{:#}", e)))?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Answers go to stdout, so logs stay on stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

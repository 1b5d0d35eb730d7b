// Document conversion
// Turns a PDF (via an external pdftotext binary) or a plain text file into UTF-8 text


use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ConverterConfig;
use crate::{RagError, Result};

const OUTPUT_FILE_NAME: &str = "output.txt";

/// Extensions read as-is instead of being passed through pdftotext
const PLAIN_TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

#[derive(Debug, Clone)]
pub struct DocumentConverter {
    pdftotext: PathBuf,
}

impl DocumentConverter {
    #[inline]
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            pdftotext: config.pdftotext.clone(),
        }
    }

    #[inline]
    pub fn pdftotext(&self) -> &Path {
        &self.pdftotext
    }

    /// Extract the text of `path`.
    ///
    /// Invalid UTF-8 sequences are dropped from the result rather than replaced.
    #[inline]
    pub async fn extract_text(&self, path: &Path) -> Result<String> {
        if !path.is_file() {
            return Err(RagError::Conversion(format!(
                "Input file not found: {}",
                path.display()
            )));
        }

        let bytes = if is_plain_text(path) {
            debug!("Reading {} directly", path.display());
            tokio::fs::read(path).await.map_err(|e| {
                RagError::Conversion(format!("Failed to read {}: {}", path.display(), e))
            })?
        } else {
            self.run_pdftotext(path).await?
        };

        let text = strip_invalid_utf8(&bytes);
        if text.len() < bytes.len() {
            warn!(
                "Dropped {} bytes of invalid UTF-8 from {}",
                bytes.len() - text.len(),
                path.display()
            );
        }
        info!("Extracted {} bytes of text from {}", text.len(), path.display());
        Ok(text)
    }

    async fn run_pdftotext(&self, input: &Path) -> Result<Vec<u8>> {
        // Removed with its contents when dropped
        let workdir = TempDir::new()
            .map_err(|e| RagError::Conversion(format!("Failed to create temp dir: {}", e)))?;
        let output_path = workdir.path().join(OUTPUT_FILE_NAME);

        debug!(
            "Running {} {} {}",
            self.pdftotext.display(),
            input.display(),
            output_path.display()
        );
        let output = Command::new(&self.pdftotext)
            .arg(input)
            .arg(&output_path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                RagError::Conversion(format!(
                    "Failed to run {}: {}",
                    self.pdftotext.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RagError::Conversion(format!(
                "{} exited with {}: {}",
                self.pdftotext.display(),
                output.status,
                stderr.trim()
            )));
        }

        tokio::fs::read(&output_path).await.map_err(|e| {
            RagError::Conversion(format!(
                "{} produced no readable output: {}",
                self.pdftotext.display(),
                e
            ))
        })
    }
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            PLAIN_TEXT_EXTENSIONS
                .iter()
                .any(|plain| ext.eq_ignore_ascii_case(plain))
        })
}

/// Keep the valid UTF-8 runs of `bytes`, discarding everything else
#[inline]
pub fn strip_invalid_utf8(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

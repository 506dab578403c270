//! Translator trait and shared types.
//!
//! The [`Translator`] trait is the seam between the translate stage and the
//! model provider. The production implementation is
//! [`AnthropicClient`](super::anthropic::AnthropicClient); tests use
//! [`MockTranslator`](tests::MockTranslator).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Thread pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("{0} environment variable not set (export {0}=sk-ant-...)")]
    MissingApiKey(String),
    #[error("Extracted directory not found: {0} (extract the PDF text into part-NN.txt files first)")]
    MissingExtracted(PathBuf),
    #[error("No extracted text files found in {0} (extract the PDF text into part-NN.txt files first)")]
    NoExtracted(PathBuf),
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("API response contained no text")]
    EmptyResponse,
    #[error("Failed to translate part {part} after {attempts} attempts: {source}")]
    PartFailed {
        part: String,
        attempts: u32,
        source: Box<TranslateError>,
    },
}

impl TranslateError {
    /// Whether another attempt could succeed.
    ///
    /// Network failures, rate limiting, server errors and empty responses are
    /// retried; rejected requests (bad key, bad model name) are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Http(_) | Self::EmptyResponse => true,
            Self::Api { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A successful translation with its token usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Trait for translation providers.
///
/// `Sync` so a single translator can be shared across the worker pool.
pub trait Translator: Sync {
    /// Model identifier recorded in each draft.
    fn model(&self) -> &str;

    /// Translate one part's extracted text, page markers included.
    fn translate(&self, source_text: &str) -> Result<Translation, TranslateError>;
}

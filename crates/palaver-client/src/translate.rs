//! Text translation boundary.
//!
//! Translation is performed by an external, network-backed service.
//! Failures here are never surfaced to the user: the translation overlay
//! falls back to the original text and retries on the next request.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from the external translation service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TranslationError {
    /// The service could not be reached or errored.
    #[error("translation service unavailable: {reason}")]
    Unavailable {
        /// Underlying failure detail.
        reason: String,
    },

    /// The target language is not supported.
    #[error("unsupported target language {language:?}")]
    UnsupportedLanguage {
        /// The rejected language code.
        language: String,
    },
}

/// External text translation function.
#[async_trait]
pub trait Translator: Send + Sync + 'static {
    /// Translate `text` into the target language (BCP-47 code).
    async fn translate(&self, text: &str, target_language: &str)
    -> Result<String, TranslationError>;
}

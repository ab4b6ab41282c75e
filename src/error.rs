//! Error types for clinscribe.

use std::fmt;
use thiserror::Error;

/// Which external backend a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    SpeechToText,
    TextGeneration,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::SpeechToText => write!(f, "speech-to-text"),
            BackendKind::TextGeneration => write!(f, "text-generation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScribeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    // Audio errors
    #[error("Failed to decode audio: {message}")]
    AudioDecode { message: String },

    #[error("Failed to encode audio chunk: {message}")]
    AudioEncode { message: String },

    // Per-chunk transcription failure; recovered by the assembler, never
    // propagated past it.
    #[error("No speech detected in audio chunk")]
    NoSpeechDetected,

    // Whole-run transcription failure: zero chunks produced usable text.
    #[error("Transcription produced no usable text")]
    EmptyTranscript,

    #[error("{backend} backend unavailable: {message}")]
    BackendUnavailable {
        backend: BackendKind,
        message: String,
    },

    // The generation backend violated the positional line contract.
    #[error("Malformed categorization reply: {non_empty_lines} non-empty lines, expected at least 5")]
    MalformedReply { non_empty_lines: usize },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScribeError {
    /// Shorthand for a backend failure.
    pub fn backend(backend: BackendKind, message: impl Into<String>) -> Self {
        ScribeError::BackendUnavailable {
            backend,
            message: message.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, ScribeError>;

//! clinscribe - audio recordings into structured clinical notes.
//!
//! The pipeline segments a recording at pauses, transcribes each chunk
//! against a speech-to-text service, assembles the ordered transcript, asks
//! a text-generation service to sort it into the six note categories, and
//! parses the reply into a [`NoteRecord`]. The web layer that accepts
//! uploads and persists notes is the caller; it gets either a full record or
//! a classified failure, never a partial one.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod config;
pub mod defaults;
pub mod error;
pub mod llm;
pub mod note;
pub mod pipeline;
pub mod prompt;
pub mod segment;
pub mod stt;
pub mod transcript;

// Core traits (backends injected at the seams)
pub use llm::CompletionBackend;
pub use stt::SpeechBackend;

// Pipeline
pub use pipeline::{NotePipeline, PipelineConfig};
pub use transcript::{
    Assembly, AssemblerConfig, ChunkFailure, ChunkFailurePolicy, ChunkOutcome, TranscriptAssembler,
};

// Output
pub use note::{parse_reply, NoteRecord};
pub use prompt::build_prompt;

// Error handling
pub use error::{BackendKind, Result, ScribeError};

// Config
pub use config::Config;

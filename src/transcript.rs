//! Transcript assembler.
//!
//! Drives the segmenter and the speech backend: segments the recording,
//! transcribes each clip (bounded concurrency), and concatenates successful
//! fragments in temporal order as `capitalize(text) + ". "`.
//!
//! Chunk failures are structured results, not side-channel logging: every
//! chunk's outcome is kept in the returned [`Assembly`]. A failed chunk
//! contributes nothing to the transcript and never aborts the run under the
//! default policy. Only zero usable chunks is fatal (`EmptyTranscript`).
//!
//! Chunk WAV files live in a per-run temp directory which is removed on
//! every exit path, success or failure.

use crate::audio::{AudioBuffer, AudioClip};
use crate::defaults;
use crate::error::{BackendKind, Result, ScribeError};
use crate::segment::Segmenter;
use crate::stt::SpeechBackend;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// What to do when a chunk fails with a service error (not no-speech).
///
/// A handful of failed chunks should not sink an otherwise-good transcript,
/// so the default is to skip and continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkFailurePolicy {
    #[default]
    Skip,
    Abort,
}

/// Configuration for the assembler.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum number of chunks transcribed concurrently.
    pub max_concurrent: usize,
    /// Policy for service failures on individual chunks.
    pub failure_policy: ChunkFailurePolicy,
    /// Parent directory for the per-run chunk spool; system temp if unset.
    pub spool_dir: Option<PathBuf>,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT_TRANSCRIPTIONS,
            failure_policy: ChunkFailurePolicy::default(),
            spool_dir: None,
        }
    }
}

/// Why one chunk produced no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkFailure {
    /// The recognizer found no utterance; expected for silent chunks.
    NoSpeech,
    /// The speech service itself failed.
    Backend(String),
}

/// Per-chunk result, in temporal order.
#[derive(Debug, Clone)]
pub struct ChunkOutcome {
    pub index: usize,
    pub start_ms: u32,
    pub end_ms: u32,
    pub result: std::result::Result<String, ChunkFailure>,
}

/// Output of one assembly run: the concatenated transcript plus the
/// structured per-chunk outcomes that produced it.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub transcript: String,
    pub chunks: Vec<ChunkOutcome>,
}

/// Assembles a whole transcript from one recording.
pub struct TranscriptAssembler {
    segmenter: Segmenter,
    backend: Arc<dyn SpeechBackend>,
    config: AssemblerConfig,
}

impl TranscriptAssembler {
    /// Assembler with default segmentation and concurrency settings.
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self::with_config(backend, Segmenter::new(), AssemblerConfig::default())
    }

    pub fn with_config(
        backend: Arc<dyn SpeechBackend>,
        segmenter: Segmenter,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            segmenter,
            backend,
            config,
        }
    }

    /// Decode a WAV file and assemble its transcript.
    pub async fn assemble_file(&self, path: &Path) -> Result<Assembly> {
        let path = path.to_path_buf();
        let audio = tokio::task::spawn_blocking(move || AudioBuffer::from_wav_file(&path))
            .await
            .map_err(|e| {
                ScribeError::backend(
                    BackendKind::SpeechToText,
                    format!("audio decode task panicked: {}", e),
                )
            })??;
        self.assemble(&audio).await
    }

    /// Assemble the transcript of an already-decoded recording.
    pub async fn assemble(&self, audio: &AudioBuffer) -> Result<Assembly> {
        let clips = self.segmenter.segment(audio);
        debug!(chunks = clips.len(), "segmented recording");

        // Per-run chunk spool, removed on drop on every exit path
        let spool = match &self.config.spool_dir {
            Some(dir) => TempDir::new_in(dir)?,
            None => TempDir::new()?,
        };

        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent.max(1)));
        let mut handles = Vec::with_capacity(clips.len());
        for (index, clip) in clips.into_iter().enumerate() {
            let chunk_path = spool.path().join(format!("chunk{}.wav", index + 1));
            let start_ms = clip.start_ms();
            let end_ms = clip.end_ms();
            let backend = Arc::clone(&self.backend);
            let semaphore = Arc::clone(&semaphore);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = transcribe_chunk(backend, clip, &chunk_path).await;
                ChunkOutcome {
                    index,
                    start_ms,
                    end_ms,
                    result,
                }
            }));
        }

        // Collect keyed by chunk index, then reassemble in temporal order so
        // concurrent completion order is never visible to the caller.
        let mut by_index = BTreeMap::new();
        for handle in handles {
            let outcome = handle.await.map_err(|e| {
                ScribeError::backend(
                    BackendKind::SpeechToText,
                    format!("transcription task panicked: {}", e),
                )
            })?;
            by_index.insert(outcome.index, outcome);
        }

        let mut transcript = String::new();
        let mut chunks = Vec::with_capacity(by_index.len());
        for (_, outcome) in by_index {
            match &outcome.result {
                Ok(text) => {
                    let fragment = capitalize(text);
                    if !fragment.is_empty() {
                        transcript.push_str(&fragment);
                        transcript.push_str(". ");
                    }
                }
                Err(ChunkFailure::NoSpeech) => {
                    debug!(chunk = outcome.index, "no speech in chunk, skipping");
                }
                Err(ChunkFailure::Backend(message)) => match self.config.failure_policy {
                    ChunkFailurePolicy::Skip => {
                        warn!(chunk = outcome.index, %message, "chunk transcription failed, skipping");
                    }
                    ChunkFailurePolicy::Abort => {
                        return Err(ScribeError::backend(
                            BackendKind::SpeechToText,
                            message.clone(),
                        ));
                    }
                },
            }
            chunks.push(outcome);
        }

        if transcript.is_empty() {
            return Err(ScribeError::EmptyTranscript);
        }
        Ok(Assembly { transcript, chunks })
    }
}

/// Export one clip to its spool file and transcribe it.
async fn transcribe_chunk(
    backend: Arc<dyn SpeechBackend>,
    clip: AudioClip,
    chunk_path: &Path,
) -> std::result::Result<String, ChunkFailure> {
    clip.export_wav(chunk_path)
        .map_err(|e| ChunkFailure::Backend(e.to_string()))?;
    let bytes = tokio::fs::read(chunk_path)
        .await
        .map_err(|e| ChunkFailure::Backend(e.to_string()))?;
    match backend.recognize(&bytes).await {
        Ok(text) => Ok(text),
        Err(ScribeError::NoSpeechDetected) => Err(ChunkFailure::NoSpeech),
        Err(e) => Err(ChunkFailure::Backend(e.to_string())),
    }
}

/// Uppercase the first character of the trimmed fragment; the rest is left
/// untouched so proper nouns and drug names keep their case.
fn capitalize(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

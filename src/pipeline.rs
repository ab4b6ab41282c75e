//! Note pipeline orchestrator.
//!
//! Composes assembler → prompt builder → completion backend → parser into a
//! single `process(audio_path) -> NoteRecord` call. Both backends are
//! injected; the pipeline owns no credentials and no global state.
//!
//! On any failure the error of the first failing stage propagates unchanged
//! and no record is produced; persisting the record is the caller's job and
//! only happens once a full `NoteRecord` exists.

use crate::audio::AudioBuffer;
use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::llm::CompletionBackend;
use crate::note::{parse_reply, NoteRecord};
use crate::prompt::build_prompt;
use crate::stt::SpeechBackend;
use crate::transcript::TranscriptAssembler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Completion retries on `BackendUnavailable`; 0 matches the original
    /// single-shot behavior.
    pub max_retries: u32,
    /// Base backoff between retries, scaled linearly per attempt.
    pub retry_backoff: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_backoff: defaults::RETRY_BACKOFF,
        }
    }
}

/// The audio-to-structured-note pipeline.
pub struct NotePipeline {
    assembler: TranscriptAssembler,
    completion: Arc<dyn CompletionBackend>,
    config: PipelineConfig,
}

impl NotePipeline {
    /// Pipeline with default assembler and orchestration settings.
    pub fn new(speech: Arc<dyn SpeechBackend>, completion: Arc<dyn CompletionBackend>) -> Self {
        Self::with_config(
            TranscriptAssembler::new(speech),
            completion,
            PipelineConfig::default(),
        )
    }

    pub fn with_config(
        assembler: TranscriptAssembler,
        completion: Arc<dyn CompletionBackend>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            assembler,
            completion,
            config,
        }
    }

    /// Process one uploaded recording into a structured note.
    pub async fn process(&self, audio_path: &Path) -> Result<NoteRecord> {
        info!(path = %audio_path.display(), "processing recording");
        let assembly = self.assembler.assemble_file(audio_path).await?;
        self.summarize(&assembly.transcript, assembly.chunks.len())
            .await
    }

    /// Same as [`process`](Self::process) for an already-decoded recording.
    pub async fn process_audio(&self, audio: &AudioBuffer) -> Result<NoteRecord> {
        let assembly = self.assembler.assemble(audio).await?;
        self.summarize(&assembly.transcript, assembly.chunks.len())
            .await
    }

    async fn summarize(&self, transcript: &str, chunk_count: usize) -> Result<NoteRecord> {
        debug!(
            chunks = chunk_count,
            transcript_len = transcript.len(),
            "transcript assembled"
        );

        let prompt = build_prompt(transcript);
        let reply = self.complete_with_retry(&prompt).await?;

        match parse_reply(&reply) {
            Ok(note) => {
                info!(backend = self.completion.name(), "note categorized");
                Ok(note)
            }
            Err(error) => {
                // Contract violation by a non-deterministic external service;
                // keep the raw reply for diagnosis.
                warn!(raw_reply = %reply, %error, "categorization reply rejected");
                Err(error)
            }
        }
    }

    async fn complete_with_retry(&self, prompt: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.completion.complete(prompt).await {
                Ok(reply) => return Ok(reply),
                Err(error @ ScribeError::BackendUnavailable { .. })
                    if attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    let backoff = self.config.retry_backoff * attempt;
                    warn!(attempt, %error, backoff_ms = backoff.as_millis() as u64, "completion failed, retrying");
                    tokio::time::sleep(backoff).await;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockCompletionBackend;
    use crate::stt::MockSpeechBackend;

    fn single_chunk_audio() -> AudioBuffer {
        let samples: Vec<i16> = (0..24000)
            .map(|i| if i % 2 == 0 { 16000 } else { -16000 })
            .collect();
        AudioBuffer::from_samples(samples, 8000)
    }

    fn pipeline_with(
        speech: MockSpeechBackend,
        completion: MockCompletionBackend,
        config: PipelineConfig,
    ) -> (NotePipeline, Arc<MockCompletionBackend>) {
        let completion = Arc::new(completion);
        let pipeline = NotePipeline::with_config(
            TranscriptAssembler::new(Arc::new(speech)),
            Arc::clone(&completion) as Arc<dyn CompletionBackend>,
            config,
        );
        (pipeline, completion)
    }

    #[tokio::test]
    async fn test_process_produces_note_record() {
        let speech = MockSpeechBackend::new().then_text("patient reports fatigue");
        let completion =
            MockCompletionBackend::new("fatigue reported\nvitals fine\ntired\nrest\nnone\n");
        let (pipeline, _) = pipeline_with(speech, completion, PipelineConfig::default());

        let note = pipeline.process_audio(&single_chunk_audio()).await.unwrap();
        assert_eq!(note.subjective, "fatigue reported");
        assert_eq!(note.intervention, "none");
        assert_eq!(note.other, "");
    }

    #[tokio::test]
    async fn test_empty_transcript_propagates() {
        let speech = MockSpeechBackend::failing_no_speech();
        let completion = MockCompletionBackend::new("unused");
        let (pipeline, completion) = pipeline_with(speech, completion, PipelineConfig::default());

        let result = pipeline.process_audio(&single_chunk_audio()).await;
        assert!(matches!(result, Err(ScribeError::EmptyTranscript)));
        // The completion backend must never be called without a transcript
        assert_eq!(completion.call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_reply_propagates() {
        let speech = MockSpeechBackend::new();
        let completion = MockCompletionBackend::new("only\nthree\nlines");
        let (pipeline, _) = pipeline_with(speech, completion, PipelineConfig::default());

        let result = pipeline.process_audio(&single_chunk_audio()).await;
        assert!(matches!(
            result,
            Err(ScribeError::MalformedReply { non_empty_lines: 3 })
        ));
    }

    #[tokio::test]
    async fn test_completion_failure_propagates_without_retries() {
        let speech = MockSpeechBackend::new();
        let completion = MockCompletionBackend::failing();
        let (pipeline, completion) = pipeline_with(speech, completion, PipelineConfig::default());

        let result = pipeline.process_audio(&single_chunk_audio()).await;
        assert!(matches!(
            result,
            Err(ScribeError::BackendUnavailable { .. })
        ));
        assert_eq!(completion.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failure() {
        let speech = MockSpeechBackend::new();
        let completion = MockCompletionBackend::new("s\no\na\np\ni\n").fail_times(2);
        let config = PipelineConfig {
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
        };
        let (pipeline, completion) = pipeline_with(speech, completion, config);

        let note = pipeline.process_audio(&single_chunk_audio()).await.unwrap();
        assert_eq!(note.subjective, "s");
        assert_eq!(completion.call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let speech = MockSpeechBackend::new();
        let completion = MockCompletionBackend::failing();
        let config = PipelineConfig {
            max_retries: 2,
            retry_backoff: Duration::from_millis(1),
        };
        let (pipeline, completion) = pipeline_with(speech, completion, config);

        let result = pipeline.process_audio(&single_chunk_audio()).await;
        assert!(matches!(
            result,
            Err(ScribeError::BackendUnavailable { .. })
        ));
        // 1 initial attempt + 2 retries
        assert_eq!(completion.call_count(), 3);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_retried() {
        let speech = MockSpeechBackend::new();
        let completion = MockCompletionBackend::new("short\nreply");
        let config = PipelineConfig {
            max_retries: 3,
            retry_backoff: Duration::from_millis(1),
        };
        let (pipeline, completion) = pipeline_with(speech, completion, config);

        let result = pipeline.process_audio(&single_chunk_audio()).await;
        assert!(matches!(result, Err(ScribeError::MalformedReply { .. })));
        assert_eq!(completion.call_count(), 1);
    }
}

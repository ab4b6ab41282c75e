//! End-to-end pipeline runs against mock backends, from a WAV file on disk
//! to a parsed note record.

use clinscribe::audio::AudioBuffer;
use clinscribe::llm::{CompletionBackend, MockCompletionBackend};
use clinscribe::pipeline::{NotePipeline, PipelineConfig};
use clinscribe::segment::Segmenter;
use clinscribe::stt::MockSpeechBackend;
use clinscribe::transcript::{AssemblerConfig, TranscriptAssembler};
use clinscribe::{ScribeError, SpeechBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const RATE: u32 = 8000;

fn loud(count: usize) -> Vec<i16> {
    (0..count)
        .map(|i| if i % 2 == 0 { 16000 } else { -16000 })
        .collect()
}

/// Write a speech/silence/speech/silence/speech recording to disk; the
/// default segmenter splits it into three chunks.
fn write_three_chunk_fixture(dir: &Path) -> PathBuf {
    let samples: Vec<i16> = [
        loud(8000),
        vec![0i16; 8000],
        loud(8000),
        vec![0i16; 8000],
        loud(8000),
    ]
    .into_iter()
    .flatten()
    .collect();
    let audio = AudioBuffer::from_samples(samples, RATE);

    let path = dir.join("visit.wav");
    let clip = audio.slice_ms(0, audio.duration_ms());
    clip.export_wav(&path).expect("fixture export failed");
    path
}

/// A pipeline whose chunk spool lives under `spool_parent`, transcribing
/// sequentially so scripted mock replies line up with chunk order.
fn build_pipeline(
    speech: Arc<dyn SpeechBackend>,
    completion: Arc<dyn CompletionBackend>,
    spool_parent: &Path,
) -> NotePipeline {
    let assembler_config = AssemblerConfig {
        max_concurrent: 1,
        spool_dir: Some(spool_parent.to_path_buf()),
        ..Default::default()
    };
    let assembler = TranscriptAssembler::with_config(speech, Segmenter::new(), assembler_config);
    NotePipeline::with_config(assembler, completion, PipelineConfig::default())
}

fn assert_spool_empty(spool_parent: &Path) {
    let leftovers: Vec<_> = std::fs::read_dir(spool_parent)
        .expect("spool parent should still exist")
        .collect::<Result<Vec<_>, _>>()
        .expect("spool parent should be readable");
    assert!(
        leftovers.is_empty(),
        "chunk files left on disk after pipeline run: {:?}",
        leftovers
    );
}

#[tokio::test]
async fn full_run_produces_structured_note() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let audio_path = write_three_chunk_fixture(work.path());

    let speech = Arc::new(
        MockSpeechBackend::new()
            .then_text("patient complains of persistent cough")
            .then_text("lungs clear on auscultation")
            .then_text("prescribe rest and fluids"),
    );
    let completion = Arc::new(MockCompletionBackend::new(
        "persistent cough for a week\n\
         lungs clear, afebrile\n\
         likely viral bronchitis\n\
         rest and fluids, recheck in a week\n\
         none today\n\
         patient mentioned an upcoming trip",
    ));

    let pipeline = build_pipeline(
        Arc::clone(&speech) as Arc<dyn SpeechBackend>,
        Arc::clone(&completion) as Arc<dyn CompletionBackend>,
        spool.path(),
    );
    let note = pipeline.process(&audio_path).await.unwrap();

    assert_eq!(note.subjective, "persistent cough for a week");
    assert_eq!(note.objective, "lungs clear, afebrile");
    assert_eq!(note.assessment, "likely viral bronchitis");
    assert_eq!(note.plan, "rest and fluids, recheck in a week");
    assert_eq!(note.intervention, "none today");
    assert_eq!(note.other, "patient mentioned an upcoming trip");

    // The prompt carried the assembled transcript: capitalized fragments,
    // chunk order preserved.
    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].ends_with(
        "Patient complains of persistent cough. \
         Lungs clear on auscultation. \
         Prescribe rest and fluids. "
    ));

    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn failed_chunk_is_skipped_and_order_preserved() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let audio_path = write_three_chunk_fixture(work.path());

    let speech = Arc::new(
        MockSpeechBackend::new()
            .then_text("first fragment")
            .then_no_speech()
            .then_text("third fragment"),
    );
    let completion = Arc::new(MockCompletionBackend::new("s\no\na\np\ni\n"));

    let pipeline = build_pipeline(
        speech,
        Arc::clone(&completion) as Arc<dyn CompletionBackend>,
        spool.path(),
    );
    pipeline.process(&audio_path).await.unwrap();

    let prompts = completion.prompts();
    assert!(
        prompts[0].ends_with("First fragment. Third fragment. "),
        "failed chunk should contribute nothing: {:?}",
        prompts[0]
    );
}

#[tokio::test]
async fn all_chunks_failing_rejects_upload_with_empty_transcript() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let audio_path = write_three_chunk_fixture(work.path());

    let speech = Arc::new(MockSpeechBackend::failing_no_speech());
    let completion = Arc::new(MockCompletionBackend::new("unused"));

    let pipeline = build_pipeline(
        speech,
        Arc::clone(&completion) as Arc<dyn CompletionBackend>,
        spool.path(),
    );
    let result = pipeline.process(&audio_path).await;

    assert!(matches!(result, Err(ScribeError::EmptyTranscript)));
    assert_eq!(completion.call_count(), 0);
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn completion_outage_surfaces_backend_unavailable() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let audio_path = write_three_chunk_fixture(work.path());

    let pipeline = build_pipeline(
        Arc::new(MockSpeechBackend::new()),
        Arc::new(MockCompletionBackend::failing()),
        spool.path(),
    );
    let result = pipeline.process(&audio_path).await;

    assert!(matches!(
        result,
        Err(ScribeError::BackendUnavailable { .. })
    ));
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn malformed_reply_surfaces_as_processing_failure() {
    let work = TempDir::new().unwrap();
    let spool = TempDir::new().unwrap();
    let audio_path = write_three_chunk_fixture(work.path());

    let pipeline = build_pipeline(
        Arc::new(MockSpeechBackend::new()),
        Arc::new(MockCompletionBackend::new("only\ntwo")),
        spool.path(),
    );
    let result = pipeline.process(&audio_path).await;

    assert!(matches!(
        result,
        Err(ScribeError::MalformedReply { non_empty_lines: 2 })
    ));
    assert_spool_empty(spool.path());
}

#[tokio::test]
async fn missing_audio_file_is_an_io_error() {
    let spool = TempDir::new().unwrap();

    let pipeline = build_pipeline(
        Arc::new(MockSpeechBackend::new()),
        Arc::new(MockCompletionBackend::new("unused")),
        spool.path(),
    );
    let result = pipeline.process(Path::new("/nonexistent/visit.wav")).await;

    assert!(matches!(result, Err(ScribeError::Io(_))));
}

//! Speech-to-text backend.
//!
//! One chunk in, one text out. The trait exists so the pipeline can be
//! driven against a mock in tests; the HTTP implementation treats the
//! remote recognizer as an opaque service.
//!
//! Failure kinds are deliberately distinguishable: `NoSpeechDetected` is a
//! recoverable per-chunk outcome (the chunk is skipped), while
//! `BackendUnavailable` means the service itself failed.

use crate::error::{BackendKind, Result, ScribeError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Trait for one-shot speech recognition.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Recognize the utterance in one WAV-encoded chunk.
    ///
    /// Fails with [`ScribeError::NoSpeechDetected`] when the recognizer finds
    /// no utterance, and [`ScribeError::BackendUnavailable`] on service or
    /// transport errors.
    async fn recognize(&self, wav_bytes: &[u8]) -> Result<String>;

    /// Short backend name for logging.
    fn name(&self) -> &str;
}

/// HTTP client for a remote recognizer.
///
/// Wire contract: `POST {base_url}/recognize` with `audio/wav` body, JSON
/// reply `{"text": "..."}`. An empty recognized text and HTTP 422 both mean
/// no speech; everything else non-2xx is a service failure.
pub struct HttpSpeechBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecognizeReply {
    text: String,
}

impl HttpSpeechBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScribeError::backend(BackendKind::SpeechToText, e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/recognize", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechBackend {
    async fn recognize(&self, wav_bytes: &[u8]) -> Result<String> {
        let mut request = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav_bytes.to_vec());
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(BackendKind::SpeechToText, &e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ScribeError::NoSpeechDetected);
        }
        if !status.is_success() {
            return Err(ScribeError::backend(
                BackendKind::SpeechToText,
                format!("HTTP {}", status),
            ));
        }

        let reply: RecognizeReply = response
            .json()
            .await
            .map_err(|e| ScribeError::backend(BackendKind::SpeechToText, e.to_string()))?;

        let text = reply.text.trim();
        if text.is_empty() {
            Err(ScribeError::NoSpeechDetected)
        } else {
            Ok(text.to_string())
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Classify a reqwest failure; timeouts read better spelled out.
pub(crate) fn transport_error(backend: BackendKind, error: &reqwest::Error) -> ScribeError {
    let message = if error.is_timeout() {
        "request timed out".to_string()
    } else {
        error.to_string()
    };
    ScribeError::backend(backend, message)
}

/// Scripted outcome for the mock backend.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    NoSpeech,
    Unavailable,
}

/// Mock recognizer for testing.
///
/// Replies are consumed from a script in call order; once the script is
/// exhausted, every further call gets the fallback reply. With the
/// assembler's concurrency set to 1, call order equals chunk order.
pub struct MockSpeechBackend {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    calls: AtomicUsize,
}

impl MockSpeechBackend {
    /// Mock whose fallback reply is a fixed transcription.
    pub fn new() -> Self {
        Self::with_fallback(MockReply::Text("mock transcription".to_string()))
    }

    /// Mock that reports no speech on every unscripted call.
    pub fn failing_no_speech() -> Self {
        Self::with_fallback(MockReply::NoSpeech)
    }

    /// Mock that reports a service failure on every unscripted call.
    pub fn failing_unavailable() -> Self {
        Self::with_fallback(MockReply::Unavailable)
    }

    fn with_fallback(fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Append a successful recognition to the script.
    pub fn then_text(self, text: &str) -> Self {
        self.push(MockReply::Text(text.to_string()))
    }

    /// Append a no-speech outcome to the script.
    pub fn then_no_speech(self) -> Self {
        self.push(MockReply::NoSpeech)
    }

    /// Append a service failure to the script.
    pub fn then_unavailable(self) -> Self {
        self.push(MockReply::Unavailable)
    }

    fn push(self, reply: MockReply) -> Self {
        {
            let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
            script.push_back(reply);
        }
        self
    }

    /// Number of recognition calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockSpeechBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechBackend for MockSpeechBackend {
    async fn recognize(&self, _wav_bytes: &[u8]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
            script.pop_front().unwrap_or_else(|| self.fallback.clone())
        };
        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::NoSpeech => Err(ScribeError::NoSpeechDetected),
            MockReply::Unavailable => Err(ScribeError::backend(
                BackendKind::SpeechToText,
                "mock service failure",
            )),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

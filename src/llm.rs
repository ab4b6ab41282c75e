//! Text-generation backend.
//!
//! A single non-streaming completion request per pipeline run. The client is
//! explicitly constructed with its own credentials and injected into the
//! orchestrator; there is no process-wide client state.

use crate::defaults;
use crate::error::{BackendKind, Result, ScribeError};
use crate::stt::transport_error;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Trait for one-shot text completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send one prompt, receive one free-text reply.
    ///
    /// Fails with [`ScribeError::BackendUnavailable`] on service or transport
    /// errors; timeouts are classified the same way.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short backend name for logging.
    fn name(&self) -> &str;
}

/// HTTP client for an OpenAI-style chat-completions service.
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl HttpCompletionBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ScribeError::backend(BackendKind::TextGeneration, e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionBackend for HttpCompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": defaults::SYSTEM_MESSAGE },
                { "role": "user", "content": prompt },
            ],
            "stream": false,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(BackendKind::TextGeneration, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScribeError::backend(
                BackendKind::TextGeneration,
                format!("HTTP {}", status),
            ));
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::backend(BackendKind::TextGeneration, e.to_string()))?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ScribeError::backend(BackendKind::TextGeneration, "reply contained no choices")
            })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

/// Mock completion backend for testing.
///
/// Optionally fails its first N calls with `BackendUnavailable`, which is
/// how the retry path is exercised.
pub struct MockCompletionBackend {
    reply: String,
    failures_remaining: AtomicUsize,
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

impl MockCompletionBackend {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            failures_remaining: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            prompts: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        let mock = Self::new("");
        mock.failures_remaining.store(usize::MAX, Ordering::SeqCst);
        mock
    }

    /// Fail the first `n` calls, then reply normally.
    pub fn fail_times(self, n: usize) -> Self {
        self.failures_remaining.store(n, Ordering::SeqCst);
        self
    }

    /// Number of completion calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl CompletionBackend for MockCompletionBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != usize::MAX {
                self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            }
            return Err(ScribeError::backend(
                BackendKind::TextGeneration,
                "mock service failure",
            ));
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

use crate::defaults;
use crate::error::{Result, ScribeError};
use crate::pipeline::PipelineConfig;
use crate::segment::SegmenterConfig;
use crate::transcript::{AssemblerConfig, ChunkFailurePolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub completion: CompletionConfig,
    pub segmenter: SegmenterSettings,
    pub assembler: AssemblerSettings,
    pub pipeline: PipelineSettings,
}

/// Speech-to-text backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeechConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

/// Text-generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
}

/// Silence segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSettings {
    pub min_silence_ms: u32,
    pub threshold_offset_db: f32,
    pub keep_silence_ms: u32,
}

/// Transcript assembly configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssemblerSettings {
    pub max_concurrent: usize,
    pub abort_on_backend_failure: bool,
    pub spool_dir: Option<PathBuf>,
}

/// Orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            timeout_secs: defaults::SPEECH_TIMEOUT.as_secs(),
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            model: defaults::DEFAULT_MODEL.to_string(),
            timeout_secs: defaults::COMPLETION_TIMEOUT.as_secs(),
        }
    }
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            min_silence_ms: defaults::MIN_SILENCE_MS,
            threshold_offset_db: defaults::SILENCE_THRESH_OFFSET_DB,
            keep_silence_ms: defaults::KEEP_SILENCE_MS,
        }
    }
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::MAX_CONCURRENT_TRANSCRIPTIONS,
            abort_on_backend_failure: false,
            spool_dir: None,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_backoff_ms: defaults::RETRY_BACKOFF.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file is
    /// missing. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ScribeError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - CLINSCRIBE_SPEECH_URL → speech.base_url
    /// - CLINSCRIBE_SPEECH_API_KEY → speech.api_key
    /// - CLINSCRIBE_COMPLETION_URL → completion.base_url
    /// - CLINSCRIBE_API_KEY → completion.api_key
    /// - CLINSCRIBE_MODEL → completion.model
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("CLINSCRIBE_SPEECH_URL") {
            if !url.is_empty() {
                self.speech.base_url = url;
            }
        }
        if let Ok(key) = std::env::var("CLINSCRIBE_SPEECH_API_KEY") {
            if !key.is_empty() {
                self.speech.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("CLINSCRIBE_COMPLETION_URL") {
            if !url.is_empty() {
                self.completion.base_url = url;
            }
        }
        if let Ok(key) = std::env::var("CLINSCRIBE_API_KEY") {
            if !key.is_empty() {
                self.completion.api_key = key;
            }
        }
        if let Ok(model) = std::env::var("CLINSCRIBE_MODEL") {
            if !model.is_empty() {
                self.completion.model = model;
            }
        }
        self
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.assembler.max_concurrent == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "assembler.max_concurrent".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.speech.timeout_secs == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "speech.timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.completion.timeout_secs == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "completion.timeout_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.segmenter.min_silence_ms == 0 {
            return Err(ScribeError::ConfigInvalidValue {
                key: "segmenter.min_silence_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn speech_timeout(&self) -> Duration {
        Duration::from_secs(self.speech.timeout_secs)
    }

    pub fn completion_timeout(&self) -> Duration {
        Duration::from_secs(self.completion.timeout_secs)
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            min_silence_ms: self.segmenter.min_silence_ms,
            threshold_offset_db: self.segmenter.threshold_offset_db,
            keep_silence_ms: self.segmenter.keep_silence_ms,
            frame_ms: defaults::FRAME_MS,
        }
    }

    pub fn assembler_config(&self) -> AssemblerConfig {
        AssemblerConfig {
            max_concurrent: self.assembler.max_concurrent,
            failure_policy: if self.assembler.abort_on_backend_failure {
                ChunkFailurePolicy::Abort
            } else {
                ChunkFailurePolicy::Skip
            },
            spool_dir: self.assembler.spool_dir.clone(),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            max_retries: self.pipeline.max_retries,
            retry_backoff: Duration::from_millis(self.pipeline.retry_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segmenter.min_silence_ms, 500);
        assert_eq!(config.segmenter.threshold_offset_db, 14.0);
        assert_eq!(config.segmenter.keep_silence_ms, 500);
        assert_eq!(config.completion.model, "gpt-4");
    }

    #[test]
    fn test_load_partial_toml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[completion]\nmodel = \"gpt-3.5-turbo\"\n\n[segmenter]\nmin_silence_ms = 300"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.completion.model, "gpt-3.5-turbo");
        assert_eq!(config.segmenter.min_silence_ms, 300);
        // Untouched sections keep defaults
        assert_eq!(config.segmenter.keep_silence_ms, 500);
        assert_eq!(config.speech.timeout_secs, 60);
    }

    #[test]
    fn test_load_invalid_toml_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "this is not = valid = toml").unwrap();

        assert!(matches!(
            Config::load(file.path()),
            Err(ScribeError::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/clinscribe.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_still_rejects_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not valid [[[").unwrap();
        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = Config {
            assembler: AssemblerSettings {
                max_concurrent: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScribeError::ConfigInvalidValue { .. })
        ));
    }

    #[test]
    fn test_assembler_config_maps_failure_policy() {
        let config = Config {
            assembler: AssemblerSettings {
                abort_on_backend_failure: true,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(
            config.assembler_config().failure_policy,
            ChunkFailurePolicy::Abort
        );
        assert_eq!(
            Config::default().assembler_config().failure_policy,
            ChunkFailurePolicy::Skip
        );
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let back: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(back, config);
    }
}

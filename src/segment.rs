//! Silence segmenter.
//!
//! Splits a decoded recording into an ordered sequence of clips, cutting at
//! pauses. The silence threshold is adaptive: a fixed offset below the
//! recording's own mean loudness, so a quiet recording is segmented as
//! reliably as a loud one.
//!
//! The segmenter never fails silently: when no qualifying silence exists
//! (including the degenerate all-silence and all-speech cases) the whole
//! recording is returned as one clip, and downstream transcription decides
//! what to do with it.

use crate::audio::{dbfs, AudioBuffer, AudioClip};
use crate::defaults;

/// Configuration for the silence segmenter.
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Minimum silence duration (ms) that counts as a chunk boundary.
    pub min_silence_ms: u32,
    /// Silence threshold offset (dB) below the clip's mean loudness.
    pub threshold_offset_db: f32,
    /// Silence padding (ms) retained on each side of a cut.
    pub keep_silence_ms: u32,
    /// Analysis frame length (ms).
    pub frame_ms: u32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_silence_ms: defaults::MIN_SILENCE_MS,
            threshold_offset_db: defaults::SILENCE_THRESH_OFFSET_DB,
            keep_silence_ms: defaults::KEEP_SILENCE_MS,
            frame_ms: defaults::FRAME_MS,
        }
    }
}

/// Splits recordings into silence-delimited clips.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

/// Half-open span in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpanMs {
    start: u32,
    end: u32,
}

impl Segmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: SegmenterConfig) -> Self {
        Self { config }
    }

    /// Split `audio` into silence-delimited clips, in temporal order.
    ///
    /// Always returns at least one clip. A recording shorter than the
    /// minimum silence window is returned whole.
    pub fn segment(&self, audio: &AudioBuffer) -> Vec<AudioClip> {
        let duration_ms = audio.duration_ms();
        if audio.is_empty() || duration_ms < self.config.min_silence_ms {
            return vec![audio.slice_ms(0, duration_ms)];
        }

        let threshold = audio.dbfs() - self.config.threshold_offset_db;
        let silent_frames = self.scan_frames(audio, threshold);
        let speech_spans = self.speech_spans(&silent_frames, duration_ms);

        let whole = SpanMs {
            start: 0,
            end: duration_ms,
        };
        if speech_spans.is_empty() || speech_spans == [whole] {
            // No usable boundary found; hand the whole recording downstream.
            return vec![audio.slice_ms(0, duration_ms)];
        }

        speech_spans
            .into_iter()
            .map(|span| {
                let start = span.start.saturating_sub(self.config.keep_silence_ms);
                let end = (span.end + self.config.keep_silence_ms).min(duration_ms);
                audio.slice_ms(start, end)
            })
            .collect()
    }

    /// Per-frame silence flags, one per analysis frame.
    fn scan_frames(&self, audio: &AudioBuffer, threshold: f32) -> Vec<bool> {
        let frame_len = (audio.sample_rate() as u64 * self.config.frame_ms as u64 / 1000) as usize;
        if frame_len == 0 {
            return Vec::new();
        }
        audio
            .samples()
            .chunks(frame_len)
            .map(|frame| dbfs(frame) < threshold)
            .collect()
    }

    /// Complement of the qualifying silent runs: the spans to keep.
    fn speech_spans(&self, silent_frames: &[bool], duration_ms: u32) -> Vec<SpanMs> {
        let frame_ms = self.config.frame_ms;
        let min_silence_frames = (self.config.min_silence_ms / frame_ms).max(1) as usize;

        // Qualifying silent runs, as frame index ranges
        let mut cuts: Vec<(usize, usize)> = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, &silent) in silent_frames.iter().enumerate() {
            match (silent, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(start)) => {
                    if i - start >= min_silence_frames {
                        cuts.push((start, i));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            if silent_frames.len() - start >= min_silence_frames {
                cuts.push((start, silent_frames.len()));
            }
        }

        // Spans between cuts, clamped to the recording
        let mut spans = Vec::new();
        let mut cursor_ms = 0u32;
        for (start, end) in cuts {
            let cut_start_ms = (start as u32 * frame_ms).min(duration_ms);
            let cut_end_ms = (end as u32 * frame_ms).min(duration_ms);
            if cut_start_ms > cursor_ms {
                spans.push(SpanMs {
                    start: cursor_ms,
                    end: cut_start_ms,
                });
            }
            cursor_ms = cut_end_ms;
        }
        if cursor_ms < duration_ms {
            spans.push(SpanMs {
                start: cursor_ms,
                end: duration_ms,
            });
        }
        spans
    }
}

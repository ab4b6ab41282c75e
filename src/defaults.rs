//! Default configuration constants for clinscribe.
//!
//! Shared constants used across configuration types to ensure consistency
//! and eliminate duplication.

use std::time::Duration;

/// Minimum silence duration in milliseconds that counts as a chunk boundary.
///
/// Pauses shorter than this are treated as part of speech, so hesitations
/// and breaths do not fragment a sentence across chunks.
pub const MIN_SILENCE_MS: u32 = 500;

/// Offset in dB below the clip's own mean loudness used as the silence
/// threshold.
///
/// The threshold is `clip_dbfs - SILENCE_THRESH_OFFSET_DB`, not an absolute
/// level, which keeps detection stable across quiet and loud recordings.
pub const SILENCE_THRESH_OFFSET_DB: f32 = 14.0;

/// Milliseconds of silence retained on each side of a cut.
///
/// Padding avoids clipping word onsets and endings at chunk boundaries.
pub const KEEP_SILENCE_MS: u32 = 500;

/// Analysis frame length in milliseconds for the silence scan.
pub const FRAME_MS: u32 = 10;

/// Maximum number of chunks transcribed concurrently.
pub const MAX_CONCURRENT_TRANSCRIPTIONS: usize = 2;

/// Default timeout for one speech-to-text request.
pub const SPEECH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for the single text-generation request of a run.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(120);

/// Default backoff between completion retries (doubled per attempt).
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// The six note categories, in canonical order.
///
/// Order is significant: it is the order categories are named in the prompt
/// and the order reply lines are mapped back to fields.
pub const CATEGORIES: [&str; 6] = [
    "subjective",
    "objective",
    "assessment",
    "plan",
    "intervention",
    "other",
];

/// Number of categories with a dedicated reply line; the remainder of the
/// reply overflows into `other`.
pub const PRIMARY_CATEGORY_COUNT: usize = 5;

/// System message sent ahead of the categorization prompt.
pub const SYSTEM_MESSAGE: &str = "You are an intelligent assistant.";

/// Default text-generation model name.
pub const DEFAULT_MODEL: &str = "gpt-4";

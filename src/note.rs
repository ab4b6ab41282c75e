//! Structured note record and reply parser.
//!
//! The generation backend replies in free text; the only structure we can
//! rely on is line position. The parser maps the first five non-empty lines
//! to the named categories and concatenates everything after them into the
//! `other` bucket, so no transcript content is ever silently dropped.

use crate::defaults::PRIMARY_CATEGORY_COUNT;
use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};

/// One structured clinical note, ready for the caller to persist.
///
/// Immutable by convention after creation; the pipeline never hands out a
/// partially filled record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteRecord {
    pub subjective: String,
    pub objective: String,
    pub assessment: String,
    pub plan: String,
    pub intervention: String,
    /// Overflow bucket: text the backend could not confidently assign.
    pub other: String,
}

impl NoteRecord {
    /// Fields paired with their category names, in canonical order.
    pub fn fields(&self) -> [(&'static str, &str); 6] {
        [
            ("subjective", &self.subjective),
            ("objective", &self.objective),
            ("assessment", &self.assessment),
            ("plan", &self.plan),
            ("intervention", &self.intervention),
            ("other", &self.other),
        ]
    }
}

/// Parse the backend's free-text reply into a [`NoteRecord`].
///
/// Lines that are empty after trimming are dropped before positional
/// assignment, so a genuinely empty category and a blank formatting line are
/// indistinguishable. Fewer than five usable lines means line position can
/// no longer identify categories and the reply is rejected as malformed.
pub fn parse_reply(reply: &str) -> Result<NoteRecord> {
    let lines: Vec<&str> = reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < PRIMARY_CATEGORY_COUNT {
        return Err(ScribeError::MalformedReply {
            non_empty_lines: lines.len(),
        });
    }

    Ok(NoteRecord {
        subjective: lines[0].to_string(),
        objective: lines[1].to_string(),
        assessment: lines[2].to_string(),
        plan: lines[3].to_string(),
        intervention: lines[4].to_string(),
        // Overflow lines are concatenated, not dropped
        other: lines[PRIMARY_CATEGORY_COUNT..].concat(),
    })
}

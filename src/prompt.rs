//! Categorization prompt builder.
//!
//! A pure function of the transcript: fixed instruction block naming the six
//! categories in canonical order, followed by the transcript verbatim. Line
//! position encodes the category in the reply, so the instructions insist on
//! empty lines rather than omitted ones.

use crate::defaults;

/// Build the instruction prompt for one assembled transcript.
///
/// Same transcript in, same prompt out, always.
pub fn build_prompt(transcript: &str) -> String {
    let categories = defaults::CATEGORIES.join(", ");
    format!(
        "The text after the last colon below is a transcription of a clinical visit recording. \
         Sort every sentence of it into exactly one of these six categories, in this order: \
         {categories}.\n\
         Reply with exactly six lines, one line per category, in that order.\n\
         Put all content for a category on its single line, with no label or prefix.\n\
         If a category has no content, leave its line empty; never omit a line, because \
         line position identifies the category.\n\
         The sixth line must collect any text you could not confidently assign to the \
         first five categories.\n\
         Transcription: {transcript}"
    )
}

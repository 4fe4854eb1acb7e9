//! Input validation for submitted text.

use crate::error::ValidationError;

/// Maximum number of characters accepted for one submission.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Trim `text` and check it against the length limits.
///
/// Length is counted in characters, not bytes. Runs before any network or
/// engine call.
pub fn validate(text: &str) -> Result<&str, ValidationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty);
    }
    if char_count(trimmed) > MAX_TEXT_CHARS {
        return Err(ValidationError::too_long());
    }
    Ok(trimmed)
}

/// Number of characters in the raw (untrimmed) input, as shown in the counter.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

/// Characters left before the limit. Negative when the input is over it.
pub fn remaining_chars(text: &str) -> isize {
    MAX_TEXT_CHARS as isize - char_count(text) as isize
}

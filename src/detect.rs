//! Base64 payload detection
//!
//! Text nodes are classified as embedded files with a cheap self-consistency
//! check instead of a strict validator:
//!
//! 1. Text of [`MIN_PAYLOAD_LEN`] characters or fewer is an ordinary field value
//! 2. The text must decode as standard, padded base64 (whitespace skipped)
//! 3. The first [`PREFIX_WINDOW`] characters of the re-encoded bytes must occur
//!    within the first [`SOURCE_WINDOW`] characters of the original text
//!
//! Any long string over the base64 alphabet passes, e.g. a run of `a`
//! characters. The detector is a heuristic and is treated as one.

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

/// Texts at or below this length are never payloads
pub const MIN_PAYLOAD_LEN: usize = 100;
/// Length of the re-encoded prefix that has to be found in the source
pub const PREFIX_WINDOW: usize = 100;
/// Length of the source prefix searched for the re-encoded prefix
pub const SOURCE_WINDOW: usize = 110;

/// Standard alphabet with padding, tolerant of non-zero trailing bits
pub(crate) const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Remove all whitespace (line breaks, indentation) from base64 text
pub fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Decode base64 text after stripping whitespace
pub fn decode_payload(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    PAYLOAD_ENGINE.decode(strip_whitespace(text))
}

/// Decide whether `text` looks like a base64-encoded file
pub fn is_base64_payload(text: &str) -> bool {
    if text.chars().count() <= MIN_PAYLOAD_LEN {
        return false;
    }

    let decoded = match decode_payload(text) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    let reencoded = PAYLOAD_ENGINE.encode(decoded);
    let prefix = head(&reencoded, PREFIX_WINDOW);
    head(text, SOURCE_WINDOW).contains(prefix)
}

/// First `n` characters of `s`
fn head(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((end, _)) => &s[..end],
        None => s,
    }
}

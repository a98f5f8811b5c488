/// Number of dot-separated segments in a compact signed token
/// (header, payload, signature).
const COMPACT_SEGMENTS: usize = 3;

/// Check that a credential has the compact signed-token shape:
/// exactly three non-empty segments separated by dots.
///
/// This is a local sanity check only. It says nothing about whether the
/// signature is valid or the token unexpired.
pub fn is_compact_token(token: &str) -> bool {
    let mut segments = 0;
    for segment in token.split('.') {
        if segment.is_empty() || segment.chars().any(char::is_whitespace) {
            return false;
        }
        segments += 1;
    }
    segments == COMPACT_SEGMENTS
}

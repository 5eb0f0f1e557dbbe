use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

/// Unicode replacement character left behind by mis-decoded bytes
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

static REPLACEMENT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new("\u{FFFD}{2,}").unwrap());

/// Collapses runs of adjacent replacement characters into a single one.
///
/// Everything else passes through untouched. Lossy: it cannot tell how many
/// bytes were originally undecodable.
pub fn sanitize(value: &str) -> Cow<'_, str> {
    if !value.contains(REPLACEMENT_CHAR) {
        return Cow::Borrowed(value);
    }
    REPLACEMENT_RUN.replace_all(value, "\u{FFFD}")
}

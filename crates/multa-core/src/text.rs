//! Text normalization shared by every judgment key and offense match.
//!
//! Two texts denote the same description or location iff their normalized
//! forms are byte-equal. The fold is: canonical decomposition, combining marks
//! dropped, lowercase, internal whitespace collapsed, trimmed.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Case-fold, accent-fold, and trim `text`.
pub fn normalize(text: &str) -> String {
  let folded: String = text
    .nfd()
    .filter(|c| !is_combining_mark(*c))
    .flat_map(char::to_lowercase)
    .collect();
  folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize `text` and split it into alphanumeric tokens.
pub fn tokenize(text: &str) -> Vec<String> {
  normalize(text)
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
    .collect()
}

/// Split a description on commas into trimmed, non-empty segments.
pub fn segments(text: &str) -> Vec<&str> {
  text
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .collect()
}

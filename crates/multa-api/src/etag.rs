//! Strong ETags over rendered response bodies.

use sha2::{Digest, Sha256};

/// A quoted SHA-256 of `body`.
pub fn compute_etag(body: &[u8]) -> String {
  format!("\"{}\"", hex::encode(Sha256::digest(body)))
}

/// Whether an `If-None-Match` header value matches `etag`.
pub fn matches(if_none_match: &str, etag: &str) -> bool {
  if_none_match.trim() == "*"
    || if_none_match
      .split(',')
      .map(|t| t.trim().trim_start_matches("W/"))
      .any(|t| t == etag)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn same_body_same_etag() {
    assert_eq!(compute_etag(b"{}"), compute_etag(b"{}"));
    assert_ne!(compute_etag(b"{}"), compute_etag(b"[]"));
    assert!(compute_etag(b"").starts_with('"'));
  }

  #[test]
  fn if_none_match_lists() {
    let etag = compute_etag(b"x");
    assert!(matches(&etag, &etag));
    assert!(matches(&format!("\"other\", W/{etag}"), &etag));
    assert!(matches("*", &etag));
    assert!(!matches("\"other\"", &etag));
  }
}

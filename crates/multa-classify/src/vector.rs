//! Sparse term-frequency vectors over a shared vocabulary.

use std::collections::HashMap;

/// Token → dense index, grown only while a [`Classifier`](crate::Classifier)
/// is being built.
#[derive(Debug, Default)]
pub(crate) struct Vocabulary {
  index: HashMap<String, u32>,
}

impl Vocabulary {
  fn intern(&mut self, token: &str) -> u32 {
    let next = self.index.len() as u32;
    *self.index.entry(token.to_owned()).or_insert(next)
  }

  fn get(&self, token: &str) -> Option<u32> { self.index.get(token).copied() }

  pub(crate) fn len(&self) -> usize { self.index.len() }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TermVector {
  terms: HashMap<u32, f64>,
  norm:  f64,
}

fn frequencies(tokens: &[String]) -> HashMap<&str, f64> {
  let mut tf: HashMap<&str, f64> = HashMap::new();
  for t in tokens {
    *tf.entry(t.as_str()).or_default() += 1.0;
  }
  tf
}

fn norm_of<'a>(weights: impl Iterator<Item = &'a f64>) -> f64 {
  weights.map(|w| w * w).sum::<f64>().sqrt()
}

impl TermVector {
  /// Build a catalog vector, adding unseen tokens to `vocabulary`.
  pub(crate) fn build(tokens: &[String], vocabulary: &mut Vocabulary) -> Self {
    let tf = frequencies(tokens);
    let norm = norm_of(tf.values());
    let terms = tf.into_iter().map(|(t, w)| (vocabulary.intern(t), w)).collect();
    Self { terms, norm }
  }

  /// Build a query vector against a frozen vocabulary.
  ///
  /// Tokens outside the vocabulary cannot match anything but still count
  /// toward the norm, so unknown words lower the score.
  pub(crate) fn query(tokens: &[String], vocabulary: &Vocabulary) -> Self {
    let tf = frequencies(tokens);
    let norm = norm_of(tf.values());
    let terms = tf
      .into_iter()
      .filter_map(|(t, w)| vocabulary.get(t).map(|i| (i, w)))
      .collect();
    Self { terms, norm }
  }

  pub(crate) fn is_empty(&self) -> bool { self.norm == 0.0 }

  pub(crate) fn cosine(&self, other: &Self) -> f64 {
    if self.is_empty() || other.is_empty() {
      return 0.0;
    }
    let (small, large) = if self.terms.len() <= other.terms.len() {
      (&self.terms, &other.terms)
    } else {
      (&other.terms, &self.terms)
    };
    let dot: f64 = small
      .iter()
      .filter_map(|(i, w)| large.get(i).map(|v| w * v))
      .sum();
    dot / (self.norm * other.norm)
  }
}

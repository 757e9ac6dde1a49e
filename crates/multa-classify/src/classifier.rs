//! [`Classifier`]: the immutable similarity snapshot.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use multa_core::{
  article::Article,
  judgment::DescriptionJudgment,
  text::{normalize, segments, tokenize},
};

use crate::{
  Error, Result,
  vector::{TermVector, Vocabulary},
};

// ─── Output types ────────────────────────────────────────────────────────────

/// One candidate article for a piece of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
  pub article_id:   String,
  pub score:        f64,
  pub article_text: String,
}

/// Suggestions for one comma-separated segment of a description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSuggestions {
  pub segment:     String,
  pub suggestions: Vec<Suggestion>,
}

/// A fully resolved composite description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiArticle {
  pub article_ids:   Vec<String>,
  pub article_codes: Vec<i64>,
}

// ─── Classifier ──────────────────────────────────────────────────────────────

/// A scored reference: either a catalog article's title and text, or a judged
/// single-article description.
#[derive(Debug)]
struct Entry {
  article_id: String,
  vector:     TermVector,
}

/// Read-only scoring snapshot over the catalog and confirmed judgments.
///
/// Built once and shared behind an `Arc`; a reconciliation load builds a new
/// one rather than mutating this.
#[derive(Debug)]
pub struct Classifier {
  articles:   BTreeMap<String, Article>,
  /// Normalized description → confirmed article ids (empty = no article).
  judged:     HashMap<String, Vec<String>>,
  entries:    Vec<Entry>,
  vocabulary: Vocabulary,
}

impl Classifier {
  /// Build a snapshot. Judgments naming an article absent from `articles`
  /// are rejected.
  pub fn build(articles: Vec<Article>, judgments: &[DescriptionJudgment]) -> Result<Self> {
    let articles: BTreeMap<String, Article> =
      articles.into_iter().map(|a| (a.id.clone(), a)).collect();

    let mut vocabulary = Vocabulary::default();
    let mut entries = Vec::with_capacity(articles.len() + judgments.len());

    for article in articles.values() {
      let tokens = tokenize(&format!("{} {}", article.title, article.text));
      entries.push(Entry {
        article_id: article.id.clone(),
        vector:     TermVector::build(&tokens, &mut vocabulary),
      });
    }

    let mut judged = HashMap::with_capacity(judgments.len());
    for j in judgments {
      if let Some(missing) = j.article_ids.iter().find(|id| !articles.contains_key(*id)) {
        return Err(Error::UnknownArticle {
          description: j.description.clone(),
          article_id:  missing.clone(),
        });
      }
      let key = normalize(&j.description);
      if key.is_empty() {
        continue;
      }
      if let [only] = j.article_ids.as_slice() {
        entries.push(Entry {
          article_id: only.clone(),
          vector:     TermVector::build(&tokenize(&key), &mut vocabulary),
        });
      }
      judged.insert(key, j.article_ids.clone());
    }

    debug!(
      articles = articles.len(),
      judgments = judged.len(),
      vocabulary = vocabulary.len(),
      "built classifier snapshot"
    );

    Ok(Self { articles, judged, entries, vocabulary })
  }

  /// An empty snapshot that never suggests anything.
  pub fn empty() -> Self {
    Self {
      articles:   BTreeMap::new(),
      judged:     HashMap::new(),
      entries:    Vec::new(),
      vocabulary: Vocabulary::default(),
    }
  }

  pub fn article(&self, id: &str) -> Option<&Article> { self.articles.get(id) }

  pub fn article_count(&self) -> usize { self.articles.len() }

  /// The confirmed article ids for `text`, if it has been judged.
  pub fn judgment(&self, text: &str) -> Option<&[String]> {
    self.judged.get(&normalize(text)).map(Vec::as_slice)
  }

  fn suggestion(&self, article_id: &str, score: f64) -> Suggestion {
    Suggestion {
      article_id: article_id.to_owned(),
      score,
      article_text: self
        .articles
        .get(article_id)
        .map(|a| a.text.clone())
        .unwrap_or_default(),
    }
  }

  /// Articles scoring at least `threshold` against `text`, best first.
  ///
  /// A previously judged description answers with its own articles at score
  /// 1.0; one judged as "no article" answers with nothing.
  pub fn suggest(&self, text: &str, threshold: f64) -> Vec<Suggestion> {
    let key = normalize(text);
    if key.is_empty() {
      return Vec::new();
    }

    if let Some(ids) = self.judged.get(&key) {
      let mut out: Vec<Suggestion> = ids.iter().map(|id| self.suggestion(id, 1.0)).collect();
      out.sort_by(|a, b| a.article_id.cmp(&b.article_id));
      out.dedup_by(|a, b| a.article_id == b.article_id);
      return out;
    }

    let query = TermVector::query(&tokenize(&key), &self.vocabulary);
    if query.is_empty() {
      return Vec::new();
    }

    let mut best: HashMap<&str, f64> = HashMap::new();
    for entry in &self.entries {
      let score = entry.vector.cosine(&query);
      if score > 0.0 && score >= threshold {
        let slot = best.entry(entry.article_id.as_str()).or_default();
        if score > *slot {
          *slot = score;
        }
      }
    }

    let mut out: Vec<Suggestion> =
      best.into_iter().map(|(id, score)| self.suggestion(id, score)).collect();
    out.sort_by(|a, b| {
      b.score
        .total_cmp(&a.score)
        .then_with(|| a.article_id.cmp(&b.article_id))
    });
    out
  }

  fn top_score(&self, text: &str, threshold: f64) -> f64 {
    self.suggest(text, threshold).first().map_or(0.0, |s| s.score)
  }

  /// Whether splitting `text` on commas finds a better match than scoring it
  /// whole. Needs at least two non-empty segments.
  pub fn detect_multi_article(&self, text: &str, threshold: f64) -> bool {
    let parts = segments(text);
    if parts.len() < 2 {
      return false;
    }
    let whole = self.top_score(text, threshold);
    parts.iter().any(|p| self.top_score(p, threshold) > whole)
  }

  pub fn suggest_with_breakdown(&self, text: &str, threshold: f64) -> Vec<SegmentSuggestions> {
    segments(text)
      .into_iter()
      .map(|segment| SegmentSuggestions {
        segment:     segment.to_owned(),
        suggestions: self.suggest(segment, threshold),
      })
      .collect()
  }

  /// The default per-part classification: a confirmed judgment if there is
  /// one, otherwise the best similarity match at or above `threshold`.
  ///
  /// Returns `None` for unmatched parts and for parts judged "no article".
  pub fn classify_part(&self, part: &str, threshold: f64) -> Option<Vec<String>> {
    match self.judgment(part) {
      Some([]) => None,
      Some(ids) => Some(ids.to_vec()),
      None => self
        .suggest(part, threshold)
        .into_iter()
        .next()
        .map(|s| vec![s.article_id]),
    }
  }

  /// Resolve every comma-separated part of `description` with `classify`.
  ///
  /// Succeeds only if there is at least one part and every part yields one
  /// or more catalog articles; ids are collected in part order without
  /// duplicates. Never partially succeeds.
  pub fn resolve_multi_article<F>(&self, description: &str, mut classify: F) -> Option<MultiArticle>
  where
    F: FnMut(&str) -> Option<Vec<String>>,
  {
    let parts = segments(description);
    if parts.is_empty() {
      return None;
    }

    let mut resolved = MultiArticle { article_ids: Vec::new(), article_codes: Vec::new() };
    for part in parts {
      let ids = classify(part)?;
      if ids.is_empty() {
        return None;
      }
      for id in ids {
        if resolved.article_ids.contains(&id) {
          continue;
        }
        let article = self.articles.get(&id)?;
        resolved.article_codes.push(article.group_code);
        resolved.article_ids.push(id);
      }
    }
    Some(resolved)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;

  fn article(id: &str, code: i64, title: &str, text: &str) -> Article {
    Article { id: id.into(), group_code: code, title: title.into(), text: text.into() }
  }

  fn catalog() -> Vec<Article> {
    vec![
      article(
        "13.3.A",
        13,
        "Velocidad maxima",
        "Circular a una velocidad superior a la maxima permitida para la via",
      ),
      article(
        "21.1",
        21,
        "Elementos de seguridad",
        "Conducir un vehiculo automotor omitiendo el uso obligatorio del cinturon de \
         seguridad por parte del conductor o de sus acompanantes",
      ),
      article("27.2", 27, "Estacionamiento", "Estacionar en lugar prohibido o en doble fila"),
    ]
  }

  fn judgment(description: &str, ids: &[&str]) -> DescriptionJudgment {
    DescriptionJudgment {
      description: description.into(),
      article_ids: ids.iter().map(|s| s.to_string()).collect(),
      group_codes: Vec::new(),
      updated_at:  Utc::now(),
    }
  }

  const THRESHOLD: f64 = 0.6;

  #[test]
  fn build_rejects_unknown_article() {
    let err = Classifier::build(catalog(), &[judgment("algo", &["99.1"])]).unwrap_err();
    assert!(matches!(err, Error::UnknownArticle { article_id, .. } if article_id == "99.1"));
  }

  #[test]
  fn judged_description_is_an_oracle() {
    let c = Classifier::build(catalog(), &[judgment("Exceso de velocidad", &["13.3.A"])])
      .unwrap();
    let s = c.suggest("EXCESO DE VELOCIDAD", THRESHOLD);
    assert_eq!(s.len(), 1);
    assert_eq!(s[0].article_id, "13.3.A");
    assert_eq!(s[0].score, 1.0);
  }

  #[test]
  fn no_article_judgment_suggests_nothing() {
    let c = Classifier::build(catalog(), &[judgment("Acta anulada", &[])]).unwrap();
    assert!(c.suggest("acta anulada", 0.0).is_empty());
    assert_eq!(c.classify_part("acta anulada", 0.0), None);
  }

  #[test]
  fn empty_input_never_matches() {
    let c = Classifier::build(catalog(), &[]).unwrap();
    assert!(c.suggest("   ", 0.0).is_empty());
    assert!(c.suggest(",,,", 0.0).is_empty());
    assert!(!c.detect_multi_article("", 0.0));
    assert!(c.resolve_multi_article(" , ", |_| Some(vec!["27.2".into()])).is_none());
  }

  #[test]
  fn suggestions_are_sorted_and_thresholded() {
    let c = Classifier::build(catalog(), &[]).unwrap();
    let s = c.suggest("estacionar en doble fila", 0.1);
    assert_eq!(s[0].article_id, "27.2");
    assert!(s.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(s.iter().all(|x| x.score >= 0.1));
    assert!(c.suggest("estacionar en doble fila", 0.99).is_empty());
  }

  #[test]
  fn breakdown_has_one_entry_per_segment() {
    let c = Classifier::build(catalog(), &[]).unwrap();
    let b = c.suggest_with_breakdown("a, , b,c", THRESHOLD);
    let segs: Vec<&str> = b.iter().map(|s| s.segment.as_str()).collect();
    assert_eq!(segs, vec!["a", "b", "c"]);
  }

  #[test]
  fn multi_article_accumulates_as_fragments_are_judged() {
    let text = "EXCESO DE VELOCIDAD, SIN CINTURON";
    let mut judgments = vec![judgment("EXCESO DE VELOCIDAD", &["13.3.A"])];

    let c = Classifier::build(catalog(), &judgments).unwrap();
    assert!(c.detect_multi_article(text, THRESHOLD));
    assert_eq!(c.resolve_multi_article(text, |p| c.classify_part(p, THRESHOLD)), None);

    judgments.push(judgment("SIN CINTURON", &["21.1"]));
    let c = Classifier::build(catalog(), &judgments).unwrap();
    let resolved = c
      .resolve_multi_article(text, |p| c.classify_part(p, THRESHOLD))
      .expect("every fragment is judged");
    assert_eq!(resolved.article_ids, vec!["13.3.A", "21.1"]);
    assert_eq!(resolved.article_codes, vec![13, 21]);
  }

  #[test]
  fn single_segment_is_never_multi() {
    let c = Classifier::build(catalog(), &[judgment("sin cinturon", &["21.1"])]).unwrap();
    assert!(!c.detect_multi_article("sin cinturon", THRESHOLD));
    assert!(!c.detect_multi_article("sin cinturon,", THRESHOLD));
  }

  #[test]
  fn segment_tying_the_whole_text_is_not_multi() {
    let text = "SIN CINTURON, SIN CASCO";
    let mut judgments = vec![judgment("sin cinturon", &["21.1"])];

    let c = Classifier::build(catalog(), &judgments).unwrap();
    assert!(c.detect_multi_article(text, THRESHOLD));

    // Both the whole text and its best segment now score 1.0.
    judgments.push(judgment(text, &["21.1"]));
    let c = Classifier::build(catalog(), &judgments).unwrap();
    let whole = c.suggest(text, THRESHOLD)[0].score;
    assert_eq!(whole, c.suggest("sin cinturon", THRESHOLD)[0].score);
    assert!(!c.detect_multi_article(text, THRESHOLD));
  }

  #[test]
  fn resolve_deduplicates_in_part_order() {
    let c = Classifier::build(catalog(), &[]).unwrap();
    let out = c
      .resolve_multi_article("x, y, z", |p| match p {
        "x" => Some(vec!["27.2".into()]),
        "y" => Some(vec!["13.3.A".into(), "27.2".into()]),
        _ => Some(vec!["13.3.A".into()]),
      })
      .unwrap();
    assert_eq!(out.article_ids, vec!["27.2", "13.3.A"]);
    assert_eq!(out.article_codes, vec![27, 13]);
  }
}

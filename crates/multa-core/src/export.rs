//! The portable export document.
//!
//! Three arrays, each sorted by key so that successive exports of similar
//! stores produce small textual diffs. The document is decoded once at the
//! file boundary into these strongly-typed entries.

use serde::{Deserialize, Serialize};

use crate::{
  article::Article,
  judgment::{
    ConfidenceTier, DescriptionJudgment, LocationJudgment, NewDescriptionJudgment,
    ResolutionMethod,
  },
  point::Point,
  store::{EntityCounts, JudgmentSnapshot},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleEntry {
  pub id:    String,
  pub text:  String,
  pub code:  i64,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionEntry {
  pub description:   String,
  #[serde(default)]
  pub article_ids:   Vec<String>,
  #[serde(default)]
  pub article_codes: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
  pub jurisdiction_id:    i64,
  pub location:           String,
  pub canonical_location: Option<String>,
  pub lat:                Option<f64>,
  pub lng:                Option<f64>,
  #[serde(default)]
  pub is_electronic:      bool,
  #[serde(default)]
  pub method:             ResolutionMethod,
  pub confidence:         Option<ConfidenceTier>,
  pub notes:              Option<String>,
}

impl LocationEntry {
  /// The point, if both coordinates are present.
  pub fn point(&self) -> Option<Point> {
    Some(Point::new(self.lat?, self.lng?))
  }
}

/// The whole portable file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
  #[serde(default)]
  pub articles:     Vec<ArticleEntry>,
  #[serde(default)]
  pub descriptions: Vec<DescriptionEntry>,
  #[serde(default)]
  pub locations:    Vec<LocationEntry>,
}

impl ExportDocument {
  /// Build a document from a store snapshot, sorted for diff stability.
  pub fn from_snapshot(snapshot: JudgmentSnapshot) -> Self {
    let mut doc = Self {
      articles:     snapshot.articles.into_iter().map(ArticleEntry::from).collect(),
      descriptions: snapshot
        .descriptions
        .into_iter()
        .map(DescriptionEntry::from)
        .collect(),
      locations:    snapshot.locations.into_iter().map(LocationEntry::from).collect(),
    };
    doc.sort();
    doc
  }

  /// Sort every array by its natural key.
  pub fn sort(&mut self) {
    self.articles.sort_by(|a, b| a.id.cmp(&b.id));
    self.descriptions.sort_by(|a, b| a.description.cmp(&b.description));
    self.locations.sort_by(|a, b| {
      (a.jurisdiction_id, &a.location).cmp(&(b.jurisdiction_id, &b.location))
    });
  }

  pub fn counts(&self) -> EntityCounts {
    EntityCounts {
      locations:    self.locations.len() as u64,
      descriptions: self.descriptions.len() as u64,
      articles:     self.articles.len() as u64,
    }
  }

  pub fn articles(&self) -> Vec<Article> {
    self
      .articles
      .iter()
      .map(|a| Article {
        id:         a.id.clone(),
        group_code: a.code,
        title:      a.title.clone(),
        text:       a.text.clone(),
      })
      .collect()
  }

  pub fn description_judgments(&self) -> Vec<NewDescriptionJudgment> {
    self
      .descriptions
      .iter()
      .map(|d| NewDescriptionJudgment {
        description: d.description.clone(),
        article_ids: d.article_ids.clone(),
      })
      .collect()
  }
}

impl From<Article> for ArticleEntry {
  fn from(a: Article) -> Self {
    Self { id: a.id, text: a.text, code: a.group_code, title: a.title }
  }
}

impl From<DescriptionJudgment> for DescriptionEntry {
  fn from(d: DescriptionJudgment) -> Self {
    Self {
      description:   d.description,
      article_ids:   d.article_ids,
      article_codes: d.group_codes,
    }
  }
}

impl From<LocationJudgment> for LocationEntry {
  fn from(l: LocationJudgment) -> Self {
    Self {
      jurisdiction_id:    l.jurisdiction_id,
      location:           l.location,
      canonical_location: l.canonical_location,
      lat:                l.point.map(|p| p.lat),
      lng:                l.point.map(|p| p.lng),
      is_electronic:      l.is_electronic,
      method:             l.method,
      confidence:         l.confidence,
      notes:              l.notes,
    }
  }
}

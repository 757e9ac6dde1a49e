//! The line-oriented batch classification exchange format.
//!
//! A curator receives a rendered file of unjudged descriptions, deletes the
//! suggestion lines that are wrong (or reorders them), and feeds the file
//! back. The first remaining article of every segment becomes the judgment.
//! A block left without lines is skipped; to judge a description as matching
//! no article, the curator writes the line `0 | - | no article`.
//!
//! ```text
//! # EXCESO DE VELOCIDAD
//! 0.912 | 13.3.A | Circular a una velocidad superior ...
//!
//! # MULTI | EXCESO DE VELOCIDAD, SIN CINTURON
//! ## EXCESO DE VELOCIDAD
//! 1.000 | 13.3.A | Circular a una velocidad superior ...
//! ## SIN CINTURON
//! 0.700 | 21.1 | Conducir un vehiculo automotor omitiendo ...
//! ```

use std::fmt::Write as _;

use tracing::{info, warn};

use multa_core::{judgment::NewDescriptionJudgment, store::JudgmentStore};

use crate::{Classifier, Error, Result, Suggestion};

const MULTI_MARKER: &str = "MULTI |";

/// Article id a curator writes to judge a description as "no article".
pub const NO_ARTICLE: &str = "-";

/// Suggestion lines rendered per block or segment.
pub const SUGGESTIONS_PER_LIST: usize = 5;

// ─── Model ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct BatchLine {
  pub score:        f64,
  pub article_id:   String,
  pub article_text: String,
}

/// Lines under one `##` header, or under the block header when `segment` is
/// `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchSegment {
  pub segment: Option<String>,
  pub lines:   Vec<BatchLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchBlock {
  pub description: String,
  pub multi:       bool,
  pub segments:    Vec<BatchSegment>,
}

impl BatchBlock {
  /// The article ids this block commits to, or `None` if nothing was chosen:
  /// a single block without lines, or a composite block with a segment that
  /// is empty or marked [`NO_ARTICLE`]. A single block whose first line is
  /// [`NO_ARTICLE`] means "no article".
  pub fn chosen_articles(&self) -> Option<Vec<String>> {
    let headed: Vec<&BatchSegment> =
      self.segments.iter().filter(|s| s.segment.is_some()).collect();

    if self.multi || !headed.is_empty() {
      if headed.is_empty() {
        return None;
      }
      let mut ids: Vec<String> = Vec::new();
      for seg in headed {
        let first = seg.lines.first()?;
        if first.article_id == NO_ARTICLE {
          return None;
        }
        if !ids.contains(&first.article_id) {
          ids.push(first.article_id.clone());
        }
      }
      return Some(ids);
    }

    let first = self.segments.iter().find_map(|s| s.lines.first())?;
    if first.article_id == NO_ARTICLE {
      Some(Vec::new())
    } else {
      Some(vec![first.article_id.clone()])
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
  pub persisted:      usize,
  pub already_judged: usize,
  pub incomplete:     usize,
}

// ─── Render ──────────────────────────────────────────────────────────────────

fn write_lines(out: &mut String, suggestions: &[Suggestion]) {
  for s in suggestions.iter().take(SUGGESTIONS_PER_LIST) {
    let text = s.article_text.replace('\n', " ");
    let _ = writeln!(out, "{:.3} | {} | {}", s.score, s.article_id, text);
  }
}

/// Render one block per description, marking composite narratives as
/// `MULTI` with per-segment suggestions.
pub fn render(classifier: &Classifier, descriptions: &[String], threshold: f64) -> String {
  let mut out = String::new();
  for description in descriptions {
    let description = description.trim();
    if description.is_empty() {
      continue;
    }
    if !out.is_empty() {
      out.push('\n');
    }

    if classifier.detect_multi_article(description, threshold) {
      let _ = writeln!(out, "# {MULTI_MARKER} {description}");
      for seg in classifier.suggest_with_breakdown(description, threshold) {
        let _ = writeln!(out, "## {}", seg.segment);
        write_lines(&mut out, &seg.suggestions);
      }
    } else {
      let _ = writeln!(out, "# {description}");
      write_lines(&mut out, &classifier.suggest(description, threshold));
    }
  }
  out
}

// ─── Parse ───────────────────────────────────────────────────────────────────

fn parse_line(raw: &str, line: usize) -> Result<BatchLine> {
  let mut fields = raw.splitn(3, '|').map(str::trim);
  let (Some(score), Some(article_id)) = (fields.next(), fields.next()) else {
    return Err(Error::Parse { line, message: "expected `score | article_id | text`".into() });
  };
  let score = score.parse::<f64>().map_err(|e| Error::Parse {
    line,
    message: format!("bad score {score:?}: {e}"),
  })?;
  if article_id.is_empty() {
    return Err(Error::Parse { line, message: "empty article id".into() });
  }
  Ok(BatchLine {
    score,
    article_id: article_id.to_owned(),
    article_text: fields.next().unwrap_or_default().to_owned(),
  })
}

/// Parse a batch file. Blank lines are ignored anywhere.
pub fn parse(input: &str) -> Result<Vec<BatchBlock>> {
  let mut blocks: Vec<BatchBlock> = Vec::new();

  for (idx, raw) in input.lines().enumerate() {
    let line = idx + 1;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      continue;
    }

    if let Some(segment) = trimmed.strip_prefix("##") {
      let block = blocks.last_mut().ok_or_else(|| Error::Parse {
        line,
        message: "segment header before any block".into(),
      })?;
      block.segments.push(BatchSegment {
        segment: Some(segment.trim().to_owned()),
        lines:   Vec::new(),
      });
    } else if let Some(header) = trimmed.strip_prefix('#') {
      let header = header.trim();
      let (multi, description) = match header.strip_prefix(MULTI_MARKER) {
        Some(rest) => (true, rest.trim()),
        None => (false, header),
      };
      if description.is_empty() {
        return Err(Error::Parse { line, message: "empty description".into() });
      }
      blocks.push(BatchBlock {
        description: description.to_owned(),
        multi,
        segments: Vec::new(),
      });
    } else {
      let parsed = parse_line(trimmed, line)?;
      let block = blocks.last_mut().ok_or_else(|| Error::Parse {
        line,
        message: "suggestion line before any block".into(),
      })?;
      match block.segments.last_mut() {
        Some(seg) => seg.lines.push(parsed),
        None => block.segments.push(BatchSegment { segment: None, lines: vec![parsed] }),
      }
    }
  }

  Ok(blocks)
}

// ─── Ingest ──────────────────────────────────────────────────────────────────

/// Persist one judgment per block, skipping descriptions that are already
/// judged and blocks with nothing chosen.
pub async fn ingest<S: JudgmentStore>(store: &S, blocks: &[BatchBlock]) -> Result<IngestReport> {
  let mut report = IngestReport::default();

  for block in blocks {
    if store
      .get_description_judgment(&block.description)
      .await
      .map_err(Error::store)?
      .is_some()
    {
      report.already_judged += 1;
      continue;
    }

    let Some(article_ids) = block.chosen_articles() else {
      warn!(description = %block.description, "skipping block with no chosen article");
      report.incomplete += 1;
      continue;
    };

    store
      .upsert_description_judgment(NewDescriptionJudgment {
        description: block.description.clone(),
        article_ids,
      })
      .await
      .map_err(Error::store)?;
    report.persisted += 1;
  }

  info!(
    persisted = report.persisted,
    already_judged = report.already_judged,
    incomplete = report.incomplete,
    "ingested batch classifications"
  );
  Ok(report)
}

//! [`ReconcileController`]: load, store, and backfill.

use std::{
  collections::HashMap,
  io::Write as _,
  path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::{debug, info, warn};

use multa_classify::Classifier;
use multa_core::{
  export::ExportDocument,
  judgment::{NewDescriptionJudgment, NewLocationJudgment},
  store::{EntityCounts, JudgmentStore, ReplaceSet},
  text::{normalize, segments},
};
use multa_spatial::SpatialIndexer;

use crate::{Error, Result};

// ─── Outcomes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
  Uninitialized,
  Loaded,
  /// A curation write happened after the last load or store.
  Dirty,
  Exported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
  /// Counts matched; nothing was written.
  Unchanged { counts: EntityCounts },
  /// The store was cleared and reloaded from the file.
  Replaced { before: EntityCounts, after: EntityCounts },
}

/// Backfill result for one kind of enrichment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentReport {
  /// Records enriched by this run.
  pub updated:          u64,
  /// Records whose text has no judgment yet.
  pub pending_unjudged: u64,
  /// Records with a judgment that could not be applied.
  pub judged_unapplied: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackfillReport {
  /// Composite description judgments persisted from judged fragments.
  pub composites:   u64,
  pub descriptions: EnrichmentReport,
  pub locations:    EnrichmentReport,
}

/// The result of [`ReconcileController::maintain`].
#[derive(Debug)]
pub struct Maintenance {
  pub load:       LoadOutcome,
  pub backfill:   BackfillReport,
  /// Set when backfill persisted composites and the export file was
  /// rewritten to include them.
  pub exported:   Option<EntityCounts>,
  /// A classifier snapshot rebuilt from the reconciled store.
  pub classifier: Classifier,
}

// ─── Controller ──────────────────────────────────────────────────────────────

/// Guards every bulk transition between the store and the export file.
///
/// Not internally synchronised; callers serialise access (the API keeps it
/// behind a mutex).
pub struct ReconcileController<S> {
  store:   S,
  path:    PathBuf,
  indexer: SpatialIndexer,
  state:   SyncState,
  loaded:  bool,
}

impl<S: JudgmentStore> ReconcileController<S> {
  pub fn new(store: S, path: impl Into<PathBuf>, indexer: SpatialIndexer) -> Self {
    Self {
      store,
      path: path.into(),
      indexer,
      state: SyncState::Uninitialized,
      loaded: false,
    }
  }

  pub fn state(&self) -> SyncState { self.state }

  pub fn path(&self) -> &Path { &self.path }

  /// Record that the store changed outside a load.
  pub fn mark_dirty(&mut self) {
    if self.state != SyncState::Dirty {
      debug!("reconciliation state is now dirty");
    }
    self.state = SyncState::Dirty;
  }

  // ── Load ──────────────────────────────────────────────────────────────────

  /// Bring the store up to date with the export file.
  ///
  /// If the store has more rows than the file for any entity, nothing is
  /// written and [`Error::UnsavedWork`] is returned. If the file has more for
  /// any entity, all three tables are replaced together. Otherwise this is a
  /// no-op.
  pub async fn load(&mut self) -> Result<LoadOutcome> {
    let doc = read_document(&self.path).await?;
    let file = doc.counts();
    let store = self.store.counts().await.map_err(Error::store)?;

    for (entity, in_store, in_file) in [
      ("locations", store.locations, file.locations),
      ("descriptions", store.descriptions, file.descriptions),
      ("articles", store.articles, file.articles),
    ] {
      if in_store > in_file {
        warn!(entity, store = in_store, file = in_file, "load aborted: store has unsaved judgments");
        return Err(Error::UnsavedWork { entity, store: in_store, file: in_file });
      }
    }

    let outcome = if store == file {
      info!(path = %self.path.display(), "store already matches export file");
      LoadOutcome::Unchanged { counts: store }
    } else {
      let set = self.replace_set(&doc)?;
      let after = self.store.replace_all(set).await.map_err(Error::store)?;
      info!(
        path = %self.path.display(),
        locations = after.locations,
        descriptions = after.descriptions,
        articles = after.articles,
        "reloaded store from export file"
      );
      LoadOutcome::Replaced { before: store, after }
    };

    self.state = SyncState::Loaded;
    self.loaded = true;
    Ok(outcome)
  }

  fn replace_set(&self, doc: &ExportDocument) -> Result<ReplaceSet> {
    let mut locations = Vec::with_capacity(doc.locations.len());
    for entry in &doc.locations {
      let point = entry.point();
      let cells = match point {
        Some(p) => self.indexer.index(p)?,
        None => Vec::new(),
      };
      locations.push(NewLocationJudgment {
        jurisdiction_id: entry.jurisdiction_id,
        location: entry.location.clone(),
        canonical_location: entry.canonical_location.clone(),
        point,
        is_electronic: entry.is_electronic,
        method: entry.method,
        confidence: entry.confidence,
        notes: entry.notes.clone(),
        cells,
      });
    }

    Ok(ReplaceSet {
      articles: doc.articles(),
      descriptions: doc.description_judgments(),
      locations,
    })
  }

  // ── Store ─────────────────────────────────────────────────────────────────

  /// Write every article and judgment to the export file, replacing it
  /// atomically.
  pub async fn store(&mut self) -> Result<EntityCounts> {
    let snapshot = self.store.export_all().await.map_err(Error::store)?;
    let doc = ExportDocument::from_snapshot(snapshot);
    let counts = doc.counts();

    let mut json = serde_json::to_vec_pretty(&doc)?;
    json.push(b'\n');
    let path = self.path.clone();
    tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await??;

    info!(
      path = %self.path.display(),
      locations = counts.locations,
      descriptions = counts.descriptions,
      articles = counts.articles,
      "exported judgments"
    );
    self.state = SyncState::Exported;
    Ok(counts)
  }

  // ── Backfill ──────────────────────────────────────────────────────────────

  /// Enrich records still missing article or location columns.
  ///
  /// First persists a composite judgment for every unjudged comma-separated
  /// description whose fragments are all judged already, then applies
  /// judgments to the records. Only touches unenriched rows, so it can be
  /// re-run freely.
  pub async fn backfill(&mut self, classifier: &Classifier) -> Result<BackfillReport> {
    if !self.loaded {
      return Err(Error::NotLoaded);
    }

    let composites = self.persist_composites(classifier).await?;
    if composites > 0 {
      self.mark_dirty();
    }

    let descriptions = self.store.backfill_descriptions().await.map_err(Error::store)?;
    let locations = self.store.backfill_locations().await.map_err(Error::store)?;
    let pending = self.store.pending_counts().await.map_err(Error::store)?;

    let report = BackfillReport {
      composites,
      descriptions: EnrichmentReport {
        updated:          descriptions,
        pending_unjudged: pending.descriptions.unjudged,
        judged_unapplied: pending.descriptions.unapplied,
      },
      locations: EnrichmentReport {
        updated:          locations,
        pending_unjudged: pending.locations.unjudged,
        judged_unapplied: pending.locations.unapplied,
      },
    };
    info!(
      composites,
      descriptions = descriptions,
      locations = locations,
      descriptions_unjudged = pending.descriptions.unjudged,
      locations_unjudged = pending.locations.unjudged,
      "backfill complete"
    );
    Ok(report)
  }

  async fn persist_composites(&self, classifier: &Classifier) -> Result<u64> {
    let queue = self.store.unjudged_descriptions(None).await.map_err(Error::store)?;
    if queue.is_empty() {
      return Ok(0);
    }

    let judged: HashMap<String, Vec<String>> = self
      .store
      .list_description_judgments()
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|j| !j.is_no_article())
      .map(|j| (normalize(&j.description), j.article_ids))
      .collect();

    let mut persisted = 0;
    for item in queue {
      if segments(&item.description).len() < 2 {
        continue;
      }
      let Some(multi) = classifier
        .resolve_multi_article(&item.description, |part| judged.get(&normalize(part)).cloned())
      else {
        continue;
      };

      debug!(description = %item.description, articles = ?multi.article_ids, "composite judgment");
      self
        .store
        .upsert_description_judgment(NewDescriptionJudgment {
          description: item.description,
          article_ids: multi.article_ids,
        })
        .await
        .map_err(Error::store)?;
      persisted += 1;
    }
    Ok(persisted)
  }

  // ── Combined ──────────────────────────────────────────────────────────────

  /// Build a classifier snapshot from the current store contents.
  pub async fn classifier(&self) -> Result<Classifier> {
    let articles = self.store.list_articles().await.map_err(Error::store)?;
    let judgments = self.store.list_description_judgments().await.map_err(Error::store)?;
    Ok(Classifier::build(articles, &judgments)?)
  }

  /// Load, then backfill with a classifier rebuilt from the loaded store. A
  /// failed load skips the backfill.
  ///
  /// Composites persisted by the backfill are exported straight away, so the
  /// next load still finds the file in step with the store.
  pub async fn maintain(&mut self) -> Result<Maintenance> {
    let load = self.load().await?;
    let classifier = self.classifier().await?;
    let backfill = self.backfill(&classifier).await?;
    let exported = if backfill.composites > 0 { Some(self.store().await?) } else { None };
    Ok(Maintenance { load, backfill, exported, classifier })
  }
}

// ─── File I/O ────────────────────────────────────────────────────────────────

/// A missing file reads as an empty document.
async fn read_document(path: &Path) -> Result<ExportDocument> {
  match tokio::fs::read(path).await {
    Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      debug!(path = %path.display(), "export file missing; treating as empty");
      Ok(ExportDocument::default())
    }
    Err(e) => Err(e.into()),
  }
}

/// Write to a sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
  let dir = match path.parent() {
    Some(p) if !p.as_os_str().is_empty() => p,
    _ => Path::new("."),
  };
  std::fs::create_dir_all(dir)?;

  let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
  tmp.write_all(bytes)?;
  tmp.as_file().sync_all()?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

//! One function per CLI subcommand.

use std::{collections::BTreeMap, path::Path};

use anyhow::Context as _;
use multa_api::AppState;
use multa_classify::batch;
use multa_core::{
  article::Article,
  judgment::{NewDescriptionJudgment, NewLocationJudgment},
  store::{JudgmentStore, ReplaceSet},
};
use multa_store_sqlite::SqliteStore;
use multa_sync::ReconcileController;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::ServerConfig;

fn controller(
  cfg: &ServerConfig,
  store: SqliteStore,
) -> anyhow::Result<ReconcileController<SqliteStore>> {
  Ok(ReconcileController::new(store, &cfg.export_path, cfg.indexer()?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

// ─── Serve ───────────────────────────────────────────────────────────────────

pub async fn serve(cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let state = AppState::new(store, &cfg.export_path, cfg.aggregator()?, cfg.resolver().await?)
    .with_threshold(cfg.threshold);

  // Reconcile on startup; unsaved work keeps the store as it is.
  {
    let mut controller = state.controller.lock().await;
    let classifier = match controller.maintain().await {
      Ok(done) => done.classifier,
      Err(e @ multa_sync::Error::UnsavedWork { .. }) => {
        warn!(error = %e, "skipping startup reconciliation");
        controller.classifier().await?
      }
      Err(e) => return Err(e).context("startup reconciliation failed"),
    };
    info!(articles = classifier.article_count(), "classifier ready");
    state.set_classifier(classifier);
  }

  let app = multa_api::api_router(state);
  let address = format!("{}:{}", cfg.host, cfg.port);

  info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

pub async fn reconcile(
  cfg: &ServerConfig,
  store: SqliteStore,
  backfill: bool,
) -> anyhow::Result<()> {
  let mut controller = controller(cfg, store)?;
  if backfill {
    let done = controller.maintain().await?;
    print_json(&done.load)?;
    print_json(&done.backfill)?;
    if let Some(counts) = done.exported {
      info!(descriptions = counts.descriptions, "exported composite judgments");
    }
    Ok(())
  } else {
    print_json(&controller.load().await?)
  }
}

pub async fn export(cfg: &ServerConfig, store: SqliteStore) -> anyhow::Result<()> {
  let counts = controller(cfg, store)?.store().await?;
  print_json(&counts)
}

// ─── Geocoding ───────────────────────────────────────────────────────────────

pub async fn resolve_pending(
  cfg: &ServerConfig,
  store: SqliteStore,
  limit: Option<usize>,
) -> anyhow::Result<()> {
  let resolver = cfg.resolver().await?;
  let report = resolver.resolve_pending(&store, limit).await?;
  println!("resolved: {}\nneeds manual: {}", report.resolved, report.needs_manual);
  Ok(())
}

// ─── Batch classification ────────────────────────────────────────────────────

pub async fn batch_export(
  cfg: &ServerConfig,
  store: SqliteStore,
  file: &Path,
  limit: Option<usize>,
) -> anyhow::Result<()> {
  let queue = store.unjudged_descriptions(limit).await?;
  let classifier = controller(cfg, store)?.classifier().await?;
  let descriptions: Vec<String> = queue.into_iter().map(|item| item.description).collect();

  let rendered = batch::render(&classifier, &descriptions, cfg.threshold);
  tokio::fs::write(file, rendered)
    .await
    .with_context(|| format!("failed to write {file:?}"))?;
  info!(descriptions = descriptions.len(), file = %file.display(), "wrote batch file");
  Ok(())
}

pub async fn batch_import(store: SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = tokio::fs::read_to_string(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let blocks = batch::parse(&raw)?;
  let report = batch::ingest(&store, &blocks).await?;
  println!(
    "persisted: {}\nalready judged: {}\nincomplete: {}",
    report.persisted, report.already_judged, report.incomplete
  );
  Ok(())
}

// ─── Catalog ─────────────────────────────────────────────────────────────────

/// Articles in `file` replace catalog entries with the same id; judgments are
/// carried over unchanged.
pub async fn seed_articles(store: SqliteStore, file: &Path) -> anyhow::Result<()> {
  let raw = tokio::fs::read(file)
    .await
    .with_context(|| format!("failed to read {file:?}"))?;
  let incoming: Vec<Article> =
    serde_json::from_slice(&raw).with_context(|| format!("{file:?} is not an article array"))?;

  let snapshot = store.export_all().await?;
  let mut articles: BTreeMap<String, Article> =
    snapshot.articles.into_iter().map(|a| (a.id.clone(), a)).collect();
  let added = incoming.len();
  for article in incoming {
    articles.insert(article.id.clone(), article);
  }

  let counts = store
    .replace_all(ReplaceSet {
      articles:     articles.into_values().collect(),
      descriptions: snapshot
        .descriptions
        .into_iter()
        .map(|d| NewDescriptionJudgment { description: d.description, article_ids: d.article_ids })
        .collect(),
      locations:    snapshot
        .locations
        .into_iter()
        .map(|l| NewLocationJudgment {
          jurisdiction_id:    l.jurisdiction_id,
          location:           l.location,
          canonical_location: l.canonical_location,
          point:              l.point,
          is_electronic:      l.is_electronic,
          method:             l.method,
          confidence:         l.confidence,
          notes:              l.notes,
          cells:              l.cells,
        })
        .collect(),
    })
    .await?;

  info!(seeded = added, articles = counts.articles, "seeded article catalog; export to save it");
  Ok(())
}

//! Handler for `GET /map`.
//!
//! `?cell=<quadkey>` selects the parent cell to drill into; every other query
//! parameter is a filter dimension (see [`MapFilters::KEYS`]). Unknown
//! dimensions are rejected rather than ignored.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use axum::{
  body::Body,
  extract::{Query, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use multa_core::{cell::CellId, map::MapFilters, store::JudgmentStore};
use tracing::debug;

use crate::{AppState, error::ApiError, etag};

const GEOJSON: &str = "application/geo+json";

// ─── Cache ───────────────────────────────────────────────────────────────────

/// A rendered map response.
#[derive(Debug)]
pub struct CachedMap {
  pub body: Vec<u8>,
  pub etag: String,
}

/// Rendered map responses keyed by `(filters, cell)`.
#[derive(Debug, Default)]
pub struct MapCache {
  entries: Mutex<HashMap<String, Arc<CachedMap>>>,
}

impl MapCache {
  fn key(filters: &MapFilters, cell: Option<&CellId>) -> String {
    format!("{}|{}", filters.cache_key(), cell.map(CellId::as_str).unwrap_or(""))
  }

  fn get(&self, key: &str) -> Option<Arc<CachedMap>> {
    self.entries.lock().ok()?.get(key).cloned()
  }

  fn insert(&self, key: String, value: Arc<CachedMap>) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.insert(key, value);
    }
  }

  pub fn len(&self) -> usize { self.entries.lock().map(|e| e.len()).unwrap_or(0) }

  pub fn is_empty(&self) -> bool { self.len() == 0 }

  /// Drop every cached response.
  pub fn clear(&self) {
    if let Ok(mut entries) = self.entries.lock() {
      entries.clear();
    }
  }
}

// ─── Handler ─────────────────────────────────────────────────────────────────

/// `GET /map[?cell=...][&jurisdiction=...][&from=...][&to=...][&article=...][&electronic=...]`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError>
where
  S: JudgmentStore + Clone,
{
  let mut cell = None;
  let mut pairs = Vec::with_capacity(params.len());
  for (key, value) in &params {
    if key == "cell" {
      cell = Some(CellId::parse(value)?);
    } else {
      pairs.push((key.as_str(), value.as_str()));
    }
  }
  let filters = MapFilters::from_pairs(pairs)?;

  let key = MapCache::key(&filters, cell.as_ref());
  let rendered = match state.cache.get(&key) {
    Some(hit) => hit,
    None => {
      let view = state.aggregator.map_view(&*state.store, &filters, cell.as_ref()).await?;
      let body = serde_json::to_vec(&view).map_err(ApiError::internal)?;
      let rendered = Arc::new(CachedMap { etag: etag::compute_etag(&body), body });
      debug!(key = %key, features = view.len(), "rendered map view");
      state.cache.insert(key, rendered.clone());
      rendered
    }
  };

  let etag_value = HeaderValue::from_str(&rendered.etag).map_err(ApiError::internal)?;
  let not_modified = headers
    .get(header::IF_NONE_MATCH)
    .and_then(|v| v.to_str().ok())
    .is_some_and(|v| etag::matches(v, &rendered.etag));
  if not_modified {
    return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag_value)]).into_response());
  }

  Ok(
    (
      [
        (header::CONTENT_TYPE, HeaderValue::from_static(GEOJSON)),
        (header::ETAG, etag_value),
      ],
      Body::from(rendered.body.clone()),
    )
      .into_response(),
  )
}

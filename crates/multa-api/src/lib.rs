//! JSON REST API for Multa.
//!
//! Exposes an axum [`Router`] backed by any [`JudgmentStore`]: the map,
//! classifier suggestions, curation writes and queues, location resolution,
//! and reconciliation. Auth and TLS are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", multa_api::api_router(state))
//! ```

pub mod classify;
pub mod curation;
pub mod error;
pub mod etag;
pub mod judgments;
pub mod locations;
pub mod maintenance;
pub mod map;

use std::{
  path::PathBuf,
  sync::{Arc, RwLock},
};

use axum::{
  Router,
  routing::{get, post, put},
};
use multa_classify::Classifier;
use multa_core::store::JudgmentStore;
use multa_geocode::LocationResolver;
use multa_spatial::MapAggregator;
use multa_sync::ReconcileController;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
use map::MapCache;

/// Similarity threshold used when a request does not pass one.
pub const DEFAULT_THRESHOLD: f64 = 0.3;

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
///
/// Reads go straight to the store. Every write takes the controller lock, so
/// there is a single writer at a time.
pub struct AppState<S> {
  pub store:      Arc<S>,
  /// Immutable snapshot, swapped only after a reconciliation.
  pub classifier: Arc<RwLock<Arc<Classifier>>>,
  pub controller: Arc<Mutex<ReconcileController<S>>>,
  pub aggregator: Arc<MapAggregator>,
  pub resolver:   Arc<LocationResolver>,
  pub cache:      Arc<MapCache>,
  pub threshold:  f64,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      classifier: self.classifier.clone(),
      controller: self.controller.clone(),
      aggregator: self.aggregator.clone(),
      resolver:   self.resolver.clone(),
      cache:      self.cache.clone(),
      threshold:  self.threshold,
    }
  }
}

impl<S: JudgmentStore + Clone> AppState<S> {
  /// Wire up state around `store`, exporting to `export_path`. The
  /// classifier starts empty until the first reconciliation.
  pub fn new(
    store: S,
    export_path: impl Into<PathBuf>,
    aggregator: MapAggregator,
    resolver: LocationResolver,
  ) -> Self {
    let controller =
      ReconcileController::new(store.clone(), export_path, aggregator.indexer().clone());
    Self {
      store:      Arc::new(store),
      classifier: Arc::new(RwLock::new(Arc::new(Classifier::empty()))),
      controller: Arc::new(Mutex::new(controller)),
      aggregator: Arc::new(aggregator),
      resolver:   Arc::new(resolver),
      cache:      Arc::new(MapCache::default()),
      threshold:  DEFAULT_THRESHOLD,
    }
  }

  pub fn with_threshold(mut self, threshold: f64) -> Self {
    self.threshold = threshold;
    self
  }

  /// The current classifier snapshot.
  pub fn classifier(&self) -> Arc<Classifier> {
    match self.classifier.read() {
      Ok(guard) => guard.clone(),
      Err(poisoned) => poisoned.into_inner().clone(),
    }
  }

  /// Replace the classifier snapshot.
  pub fn set_classifier(&self, next: Classifier) {
    let mut guard = match self.classifier.write() {
      Ok(guard) => guard,
      Err(poisoned) => poisoned.into_inner(),
    };
    *guard = Arc::new(next);
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: JudgmentStore + Clone + 'static,
{
  Router::new()
    // Map
    .route("/map", get(map::handler::<S>))
    // Classifier
    .route("/classify/suggest", get(classify::suggest::<S>))
    .route("/classify/breakdown", get(classify::breakdown::<S>))
    // Curation writes
    .route("/judgments/descriptions", put(judgments::put_description::<S>))
    .route("/judgments/locations/canonical", put(judgments::put_canonical::<S>))
    .route("/locations/resolve", post(locations::resolve::<S>))
    // Curation queues
    .route("/curation/descriptions", get(curation::descriptions::<S>))
    .route("/curation/locations", get(curation::locations::<S>))
    // Reconciliation
    .route("/maintenance/reconcile", post(maintenance::reconcile::<S>))
    .route("/maintenance/export", post(maintenance::export::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

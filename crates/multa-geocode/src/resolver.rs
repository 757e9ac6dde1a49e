//! [`LocationResolver`]: the provider chain and its write-back.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tracing::{info, warn};

use multa_core::{
  judgment::{ConfidenceTier, LocationJudgment, NewLocationJudgment},
  point::Bounds,
  store::JudgmentStore,
  text::normalize,
};
use multa_spatial::SpatialIndexer;

use crate::{Candidate, Error, GeocodeQuery, GeocodingProvider, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The outcome of resolving one `(jurisdiction, text)` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
  /// A judgment with a point already exists; nothing was queried.
  Stored(LocationJudgment),
  /// The best candidate the provider chain produced.
  Resolved(Candidate),
  /// Nothing usable; a curator has to place this one by hand.
  NeedsManual { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingReport {
  pub resolved:     usize,
  pub needs_manual: usize,
}

pub struct LocationResolver {
  providers:     Vec<Arc<dyn GeocodingProvider>>,
  indexer:       SpatialIndexer,
  bounds:        Bounds,
  timeout:       Duration,
  jurisdictions: HashMap<i64, String>,
}

impl LocationResolver {
  /// A resolver with no providers, world bounds, and a 10 s timeout.
  pub fn new(indexer: SpatialIndexer) -> Self {
    Self {
      providers: Vec::new(),
      indexer,
      bounds: Bounds::WORLD,
      timeout: DEFAULT_TIMEOUT,
      jurisdictions: HashMap::new(),
    }
  }

  /// Append a provider; providers are tried in insertion order.
  pub fn with_provider(mut self, provider: Arc<dyn GeocodingProvider>) -> Self {
    self.providers.push(provider);
    self
  }

  pub fn with_bounds(mut self, bounds: Bounds) -> Self {
    self.bounds = bounds;
    self
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = timeout;
    self
  }

  /// Jurisdiction names appended to external queries for disambiguation.
  pub fn with_jurisdictions(mut self, names: HashMap<i64, String>) -> Self {
    self.jurisdictions = names;
    self
  }

  pub fn indexer(&self) -> &SpatialIndexer { &self.indexer }

  // ── Resolution ────────────────────────────────────────────────────────────

  /// Resolve a location, answering from the store when it already has a
  /// point for the pair.
  pub async fn resolve<S: JudgmentStore>(
    &self,
    store: &S,
    jurisdiction_id: i64,
    text: &str,
  ) -> Result<Resolution> {
    if let Some(existing) = store
      .get_location_judgment(jurisdiction_id, text)
      .await
      .map_err(Error::store)?
    {
      if existing.is_resolved() {
        return Ok(Resolution::Stored(existing));
      }
    }
    Ok(self.query_providers(jurisdiction_id, text).await)
  }

  /// Run the provider chain without consulting the store.
  ///
  /// Keeps the single highest-tier in-bounds candidate; earlier providers win
  /// ties, and an exact hit ends the chain. Provider errors and timeouts are
  /// logged and folded into the needs-manual reason.
  pub async fn query_providers(&self, jurisdiction_id: i64, text: &str) -> Resolution {
    if normalize(text).is_empty() {
      return Resolution::NeedsManual { reason: "empty location".into() };
    }

    let query = GeocodeQuery {
      jurisdiction_id,
      jurisdiction_name: self.jurisdictions.get(&jurisdiction_id).map(String::as_str),
      text,
    };

    let mut best: Option<Candidate> = None;
    let mut reasons: Vec<String> = Vec::new();

    for provider in &self.providers {
      let name = provider.name();
      let candidates = match tokio::time::timeout(self.timeout, provider.geocode(query)).await {
        Ok(Ok(candidates)) => candidates,
        Ok(Err(e)) => {
          warn!(provider = name, location = text, error = %e, "geocoding provider failed");
          reasons.push(format!("{name}: {e}"));
          continue;
        }
        Err(_) => {
          warn!(provider = name, location = text, timeout = ?self.timeout, "geocoding provider timed out");
          reasons.push(format!("{name}: timed out"));
          continue;
        }
      };

      for candidate in candidates {
        if let Err(e) = self.bounds.check(candidate.point) {
          warn!(provider = name, location = text, error = %e, "rejecting candidate");
          reasons.push(format!("{name}: {e}"));
          continue;
        }
        if best.as_ref().map_or(true, |b| candidate.tier > b.tier) {
          best = Some(candidate);
        }
      }

      if best.as_ref().is_some_and(|b| b.tier == ConfidenceTier::Exact) {
        break;
      }
    }

    match best {
      Some(candidate) => Resolution::Resolved(candidate),
      None if reasons.is_empty() => Resolution::NeedsManual { reason: "no provider match".into() },
      None => Resolution::NeedsManual { reason: reasons.join("; ") },
    }
  }

  // ── Write-back ────────────────────────────────────────────────────────────

  /// Persist `resolution` for the pair and return the stored judgment.
  ///
  /// A needs-manual outcome records a pending judgment, but never replaces
  /// one that already has a point.
  pub async fn record<S: JudgmentStore>(
    &self,
    store: &S,
    jurisdiction_id: i64,
    text: &str,
    resolution: &Resolution,
  ) -> Result<LocationJudgment> {
    let input = match resolution {
      Resolution::Stored(judgment) => return Ok(judgment.clone()),
      Resolution::Resolved(c) => NewLocationJudgment {
        jurisdiction_id,
        location: text.to_owned(),
        canonical_location: None,
        point: Some(c.point),
        is_electronic: c.is_electronic,
        method: c.method,
        confidence: Some(c.tier),
        notes: c.label.clone(),
        cells: self.indexer.index(c.point)?,
      },
      Resolution::NeedsManual { reason } => {
        if let Some(existing) = store
          .get_location_judgment(jurisdiction_id, text)
          .await
          .map_err(Error::store)?
        {
          if existing.is_resolved() {
            return Ok(existing);
          }
        }
        NewLocationJudgment::pending(jurisdiction_id, text, reason.as_str())
      }
    };

    store.upsert_location_judgment(input).await.map_err(Error::store)
  }

  /// Resolve and record every location in the unresolved queue, most
  /// affected first.
  pub async fn resolve_pending<S: JudgmentStore>(
    &self,
    store: &S,
    limit: Option<usize>,
  ) -> Result<PendingReport> {
    let queue = store.unresolved_locations(limit).await.map_err(Error::store)?;
    let mut report = PendingReport::default();

    for item in queue {
      let resolution = self.resolve(store, item.jurisdiction_id, &item.location).await?;
      let judgment = self.record(store, item.jurisdiction_id, &item.location, &resolution).await?;
      if judgment.is_resolved() {
        report.resolved += 1;
      } else {
        report.needs_manual += 1;
      }
    }

    info!(
      resolved = report.resolved,
      needs_manual = report.needs_manual,
      "resolved pending locations"
    );
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use async_trait::async_trait;
  use chrono::Utc;
  use multa_core::{
    judgment::ResolutionMethod, offense::NewOffense, point::Point, store::JudgmentStore as _,
  };
  use multa_store_sqlite::SqliteStore;

  use super::*;
  use crate::{Gazetteer, GazetteerEntry, ProviderError};

  /// A provider that answers with fixed candidates and counts its calls.
  struct Fake {
    name:       &'static str,
    candidates: Vec<Candidate>,
    delay:      Option<Duration>,
    calls:      AtomicUsize,
  }

  impl Fake {
    fn new(name: &'static str, candidates: Vec<Candidate>) -> Arc<Self> {
      Arc::new(Self { name, candidates, delay: None, calls: AtomicUsize::new(0) })
    }

    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  #[async_trait]
  impl GeocodingProvider for Fake {
    fn name(&self) -> &'static str { self.name }

    async fn geocode(&self, _: GeocodeQuery<'_>) -> Result<Vec<Candidate>, ProviderError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if let Some(d) = self.delay {
        tokio::time::sleep(d).await;
      }
      Ok(self.candidates.clone())
    }
  }

  fn candidate(lat: f64, tier: ConfidenceTier) -> Candidate {
    Candidate {
      point: Point::new(lat, -58.0),
      tier,
      method: ResolutionMethod::Geocoder,
      is_electronic: false,
      label: None,
    }
  }

  fn indexer() -> SpatialIndexer { SpatialIndexer::new(vec![4, 8, 12]).unwrap() }

  fn gazetteer() -> Arc<Gazetteer> {
    Arc::new(
      Gazetteer::from_entries(vec![GazetteerEntry {
        route:         5,
        progressive:   "038K131".into(),
        lat:           -34.9,
        lng:           -57.9,
        is_electronic: true,
        label:         Some("Radar R5 km 38".into()),
      }])
      .unwrap(),
    )
  }

  #[tokio::test]
  async fn gazetteer_hit_skips_the_external_provider() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let external = Fake::new("external", vec![candidate(-34.0, ConfidenceTier::Interpolated)]);
    let resolver = LocationResolver::new(indexer())
      .with_provider(gazetteer())
      .with_provider(external.clone());

    let text = "RUTA 005 Y 038K131_D";
    let resolution = resolver.resolve(&store, 1, text).await.unwrap();
    let Resolution::Resolved(c) = &resolution else { panic!("expected a resolution") };
    assert_eq!(c.tier, ConfidenceTier::Exact);
    assert_eq!(c.method, ResolutionMethod::Gazetteer);
    assert_eq!(external.calls(), 0);

    let stored = resolver.record(&store, 1, text, &resolution).await.unwrap();
    assert_eq!(stored.cells.len(), 3);
    assert!(stored.is_electronic);

    // Resolving again answers from the store.
    let again = resolver.resolve(&store, 1, "ruta 005 y 038k131_d").await.unwrap();
    assert!(matches!(again, Resolution::Stored(j) if j.id == stored.id));
    assert_eq!(external.calls(), 0);
  }

  #[tokio::test]
  async fn highest_tier_wins_regardless_of_order() {
    let approx = || Fake::new("a", vec![candidate(-34.1, ConfidenceTier::Approximate)]);
    let interp = || Fake::new("i", vec![candidate(-34.2, ConfidenceTier::Interpolated)]);

    for flipped in [false, true] {
      let (first, second) = if flipped { (interp(), approx()) } else { (approx(), interp()) };
      let resolver =
        LocationResolver::new(indexer()).with_provider(first).with_provider(second);
      let Resolution::Resolved(c) = resolver.query_providers(1, "Av. Mitre 100").await else {
        panic!("expected a resolution");
      };
      assert_eq!(c.tier, ConfidenceTier::Interpolated);
      assert_eq!(c.point.lat, -34.2);
    }
  }

  #[tokio::test]
  async fn ties_keep_the_earlier_provider() {
    let resolver = LocationResolver::new(indexer())
      .with_provider(Fake::new("first", vec![candidate(-34.1, ConfidenceTier::Interpolated)]))
      .with_provider(Fake::new("second", vec![candidate(-34.2, ConfidenceTier::Interpolated)]));
    let Resolution::Resolved(c) = resolver.query_providers(1, "x").await else {
      panic!("expected a resolution");
    };
    assert_eq!(c.point.lat, -34.1);
  }

  #[tokio::test]
  async fn timeouts_and_out_of_bounds_need_manual() {
    let slow = Arc::new(Fake {
      name:       "slow",
      candidates: vec![candidate(-34.0, ConfidenceTier::Exact)],
      delay:      Some(Duration::from_secs(5)),
      calls:      AtomicUsize::new(0),
    });
    let far = Fake::new("far", vec![candidate(10.0, ConfidenceTier::Exact)]);
    let resolver = LocationResolver::new(indexer())
      .with_provider(slow)
      .with_provider(far)
      .with_timeout(Duration::from_millis(20))
      .with_bounds(Bounds { min_lat: -56.0, max_lat: -21.0, min_lng: -74.0, max_lng: -53.0 });

    let Resolution::NeedsManual { reason } = resolver.query_providers(1, "somewhere").await else {
      panic!("expected needs-manual");
    };
    assert!(reason.contains("slow: timed out"), "{reason}");
    assert!(reason.contains("far: coordinates out of bounds"), "{reason}");
  }

  #[tokio::test]
  async fn needs_manual_never_overwrites_a_point() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let resolver = LocationResolver::new(indexer());

    let placed = resolver
      .record(&store, 1, "Plaza", &Resolution::Resolved(candidate(-34.5, ConfidenceTier::Exact)))
      .await
      .unwrap();
    let after = resolver
      .record(&store, 1, "plaza", &Resolution::NeedsManual { reason: "quota".into() })
      .await
      .unwrap();
    assert_eq!(after.id, placed.id);
    assert!(after.is_resolved());

    let pending = resolver
      .record(&store, 1, "Nowhere", &Resolution::NeedsManual { reason: "quota".into() })
      .await
      .unwrap();
    assert_eq!(pending.method, ResolutionMethod::Pending);
    assert_eq!(pending.notes.as_deref(), Some("quota"));
  }

  #[tokio::test]
  async fn resolve_pending_walks_the_queue() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    for location in ["RUTA 5 038K131", "RUTA 5 038K131", "Calle Falsa 123"] {
      store
        .insert_offense(NewOffense {
          jurisdiction_id: 1,
          description: "exceso".into(),
          location: location.into(),
          occurred_at: Utc::now(),
          amount: 10.0,
        })
        .await
        .unwrap();
    }

    let resolver = LocationResolver::new(indexer()).with_provider(gazetteer());
    let report = resolver.resolve_pending(&store, None).await.unwrap();
    assert_eq!(report, PendingReport { resolved: 1, needs_manual: 1 });

    // The pending one stays in the queue; the resolved one is gone.
    let queue = store.unresolved_locations(None).await.unwrap();
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].location, "Calle Falsa 123");
  }
}

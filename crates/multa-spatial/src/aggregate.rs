//! [`MapAggregator`]: budgeted cluster/location views over stored cells.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use multa_core::{
  cell::CellId,
  map::{MapFilters, MapLocation},
  point::Point,
  store::JudgmentStore,
};

use crate::{Error, Feature, FeatureCollection, Result, SpatialIndexer};

#[derive(Debug, Clone)]
pub struct MapAggregator {
  indexer:         SpatialIndexer,
  budget:          usize,
  safety_multiple: f64,
}

/// Record-weighted mean of the member points.
fn centroid(members: &[MapLocation]) -> Point {
  let weight: f64 = members.iter().map(|m| m.records as f64).sum();
  if weight == 0.0 {
    let n = members.len().max(1) as f64;
    return Point::new(
      members.iter().map(|m| m.point.lat).sum::<f64>() / n,
      members.iter().map(|m| m.point.lng).sum::<f64>() / n,
    );
  }
  Point::new(
    members.iter().map(|m| m.point.lat * m.records as f64).sum::<f64>() / weight,
    members.iter().map(|m| m.point.lng * m.records as f64).sum::<f64>() / weight,
  )
}

fn cluster_feature(cell: &CellId, members: &[MapLocation]) -> Feature {
  Feature::cluster(
    cell.as_str(),
    centroid(members),
    members.iter().map(|m| m.records).sum(),
    members.len() as u64,
  )
}

fn location_feature(loc: &MapLocation) -> Feature {
  Feature::location(loc.jurisdiction_id, &loc.label, loc.point, loc.records)
}

impl MapAggregator {
  /// Validate the budget against the indexer's fan-out: the root view has up
  /// to `4^coarsest` clusters and every drill-down step up to `4^gap`, and
  /// each must fit in `budget` so that a view never exceeds twice the budget.
  pub fn new(indexer: SpatialIndexer, budget: usize, safety_multiple: f64) -> Result<Self> {
    if budget == 0 {
      return Err(Error::InvalidBudget("budget must be positive".into()));
    }
    if !(safety_multiple.is_finite() && safety_multiple >= 1.0) {
      return Err(Error::InvalidBudget(format!(
        "safety multiple {safety_multiple} must be at least 1"
      )));
    }

    let mut steps = vec![indexer.coarsest()];
    steps.extend(indexer.resolutions().windows(2).map(|w| w[1] - w[0]));
    for gap in steps {
      let fan_out = 4u64.checked_pow(u32::from(gap)).unwrap_or(u64::MAX);
      if fan_out > budget as u64 {
        return Err(Error::InvalidBudget(format!(
          "a step of {gap} levels fans out to {fan_out} cells, above the budget of {budget}"
        )));
      }
    }

    Ok(Self { indexer, budget, safety_multiple })
  }

  pub fn indexer(&self) -> &SpatialIndexer { &self.indexer }

  pub fn budget(&self) -> usize { self.budget }

  /// Render the records matching `filters` inside `parent` (or everywhere).
  ///
  /// At the finest resolution every distinct location is its own feature.
  /// Above it, locations are grouped by their stored cell one configured
  /// level finer, and the smallest clusters are exploded into locations for
  /// as long as the visible feature count stays within the budget.
  pub async fn map_view<S: JudgmentStore>(
    &self,
    store: &S,
    filters: &MapFilters,
    parent: Option<&CellId>,
  ) -> Result<FeatureCollection> {
    if let Some(p) = parent {
      if !self.indexer.is_configured(p.resolution()) {
        return Err(Error::UnknownResolution {
          cell:       p.to_string(),
          resolution: p.resolution(),
        });
      }
    }

    let group_resolution = match parent {
      None => Some(self.indexer.coarsest()),
      Some(p) => self.indexer.next_finer(p.resolution()),
    };

    let Some(group_resolution) = group_resolution else {
      let locations =
        store.map_locations(filters, parent, None).await.map_err(Error::store)?;
      return Ok(FeatureCollection::new(locations.iter().map(location_feature).collect()));
    };

    let locations = store
      .map_locations(filters, parent, Some(group_resolution))
      .await
      .map_err(Error::store)?;

    let mut ungrouped = Vec::new();
    let mut by_cell: BTreeMap<CellId, Vec<MapLocation>> = BTreeMap::new();
    for loc in locations {
      match loc.group_cell.clone() {
        Some(cell) => by_cell.entry(cell).or_default().push(loc),
        None => ungrouped.push(loc),
      }
    }

    let mut clusters: Vec<(CellId, Vec<MapLocation>)> = by_cell.into_iter().collect();
    clusters.sort_by(|a, b| a.1.len().cmp(&b.1.len()).then_with(|| a.0.cmp(&b.0)));

    let mut visible = clusters.len() + ungrouped.len();
    let mut features: Vec<Feature> = ungrouped.iter().map(location_feature).collect();

    for (cell, members) in &clusters {
      let extra = members.len().saturating_sub(1);
      if visible + extra > self.budget {
        features.push(cluster_feature(cell, members));
        continue;
      }

      // The stored child cell of a location need not nest under its stored
      // parent cell; check the cell's real contents before flooding the view.
      let actual = store.map_locations(filters, Some(cell), None).await.map_err(Error::store)?;
      if actual.len() as f64 > self.safety_multiple * members.len() as f64 {
        warn!(
          cell = %cell,
          expected = members.len(),
          actual = actual.len(),
          "cell hierarchy mismatch; emitting corrective aggregate"
        );
        features.push(cluster_feature(cell, members));
        continue;
      }

      features.extend(members.iter().map(location_feature));
      visible += extra;
    }

    debug!(
      parent = parent.map(CellId::as_str),
      group_resolution,
      clusters = clusters.len(),
      features = features.len(),
      "rendered map view"
    );
    Ok(FeatureCollection::new(features))
  }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use multa_core::{
    judgment::{ConfidenceTier, NewLocationJudgment, ResolutionMethod},
    offense::NewOffense,
  };
  use multa_store_sqlite::SqliteStore;

  use super::*;
  use crate::FeatureKind;

  async fn add_location(store: &SqliteStore, name: &str, point: Point, cells: Vec<CellId>, n: u64) {
    store
      .upsert_location_judgment(NewLocationJudgment {
        jurisdiction_id: 1,
        location: name.into(),
        canonical_location: None,
        point: Some(point),
        is_electronic: false,
        method: ResolutionMethod::Manual,
        confidence: Some(ConfidenceTier::Exact),
        notes: None,
        cells,
      })
      .await
      .unwrap();
    for _ in 0..n {
      store
        .insert_offense(NewOffense {
          jurisdiction_id: 1,
          description: "exceso".into(),
          location: name.into(),
          occurred_at: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
          amount: 50.0,
        })
        .await
        .unwrap();
    }
  }

  /// 48 locations spread over the globe with 1..=3 records each.
  async fn seeded(indexer: &SpatialIndexer) -> (SqliteStore, u64) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut total = 0;
    for i in 0..48u64 {
      let p = Point::new(-70.0 + (i % 8) as f64 * 19.0 + 0.3, -170.0 + (i / 8) as f64 * 61.0 + 0.7);
      let n = i % 3 + 1;
      total += n;
      add_location(&store, &format!("loc {i}"), p, indexer.index(p).unwrap(), n).await;
    }
    store.backfill_locations().await.unwrap();
    (store, total)
  }

  fn cell(s: &str) -> CellId { CellId::parse(s).unwrap() }

  #[test]
  fn budget_must_cover_fan_out() {
    let indexer = SpatialIndexer::new(vec![2, 4]).unwrap();
    assert!(MapAggregator::new(indexer.clone(), 15, 2.0).is_err());
    assert!(MapAggregator::new(indexer.clone(), 16, 2.0).is_ok());
    assert!(MapAggregator::new(indexer.clone(), 16, 0.5).is_err());
    assert!(MapAggregator::new(SpatialIndexer::new(vec![1, 4]).unwrap(), 16, 2.0).is_err());
  }

  #[tokio::test]
  async fn every_view_is_bounded_and_conserves_records() {
    let indexer = SpatialIndexer::new(vec![1, 2, 3]).unwrap();
    let (store, total) = seeded(&indexer).await;
    let budget = 6;
    let agg = MapAggregator::new(indexer, budget, 3.0).unwrap();
    let filters = MapFilters::default();

    let root = agg.map_view(&store, &filters, None).await.unwrap();
    assert!(root.len() <= 2 * budget);
    assert_eq!(root.records(), total);

    // Drill into every cluster down to the finest level.
    let mut pending: Vec<CellId> = root
      .features
      .iter()
      .filter_map(|f| f.properties.cell.as_deref().map(cell))
      .collect();
    while let Some(c) = pending.pop() {
      let parent = c.parent();
      let expected: u64 = agg
        .map_view(&store, &filters, parent.as_ref())
        .await
        .unwrap()
        .features
        .iter()
        .filter(|f| f.properties.cell.as_deref() == Some(c.as_str()))
        .map(|f| f.properties.records)
        .sum();

      let view = agg.map_view(&store, &filters, Some(&c)).await.unwrap();
      if c.resolution() < 3 {
        assert!(view.len() <= 2 * budget);
      }
      assert_eq!(view.records(), expected, "records conserved inside {c}");
      pending.extend(view.features.iter().filter_map(|f| f.properties.cell.as_deref().map(cell)));
    }
  }

  #[tokio::test]
  async fn small_sets_explode_into_locations() {
    let indexer = SpatialIndexer::new(vec![1, 2, 3]).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    for (i, p) in [Point::new(10.0, 10.0), Point::new(11.0, 11.0), Point::new(-10.0, -10.0)]
      .into_iter()
      .enumerate()
    {
      add_location(&store, &format!("p{i}"), p, indexer.index(p).unwrap(), 2).await;
    }
    store.backfill_locations().await.unwrap();

    let agg = MapAggregator::new(indexer, 16, 2.0).unwrap();
    let view = agg.map_view(&store, &MapFilters::default(), None).await.unwrap();
    assert_eq!(view.len(), 3);
    assert!(view.features.iter().all(|f| f.properties.kind == FeatureKind::Location));
    assert_eq!(view.records(), 6);
  }

  #[tokio::test]
  async fn cluster_centroid_is_record_weighted() {
    let indexer = SpatialIndexer::new(vec![1, 2]).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let a = Point::new(10.0, 10.0);
    let b = Point::new(20.0, 20.0);
    add_location(&store, "a", a, indexer.index(a).unwrap(), 3).await;
    for name in ["b1", "b2", "b3", "b4"] {
      add_location(&store, name, b, indexer.index(b).unwrap(), 1).await;
    }
    store.backfill_locations().await.unwrap();

    // Exploding five locations would exceed a budget of 4.
    let agg = MapAggregator::new(indexer, 4, 2.0).unwrap();
    let mut view = agg.map_view(&store, &MapFilters::default(), None).await.unwrap();
    assert_eq!(view.len(), 1);
    let f = view.features.remove(0);
    assert_eq!(f.properties.kind, FeatureKind::Cluster);
    assert_eq!(f.properties.locations, Some(5));
    assert_eq!(f.properties.records, 7);
    let expected = (3.0 * 10.0 + 4.0 * 20.0) / 7.0;
    assert!((f.point().lat - expected).abs() < 1e-9);
    assert!((f.point().lng - expected).abs() < 1e-9);
  }

  #[tokio::test]
  async fn finest_cell_lists_locations() {
    let indexer = SpatialIndexer::new(vec![1, 2]).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let p = Point::new(10.0, 10.0);
    let cells = indexer.index(p).unwrap();
    add_location(&store, "a", p, cells.clone(), 2).await;
    store.backfill_locations().await.unwrap();

    let agg = MapAggregator::new(indexer, 16, 2.0).unwrap();
    let view = agg.map_view(&store, &MapFilters::default(), Some(&cells[1])).await.unwrap();
    assert_eq!(view.len(), 1);
    assert_eq!(view.features[0].properties.label.as_deref(), Some("a"));
    assert_eq!(view.features[0].properties.records, 2);
  }

  #[tokio::test]
  async fn unconfigured_resolution_is_rejected() {
    let indexer = SpatialIndexer::new(vec![1, 3]).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let agg = MapAggregator::new(indexer, 16, 2.0).unwrap();
    let err = agg.map_view(&store, &MapFilters::default(), Some(&cell("01"))).await.unwrap_err();
    assert!(matches!(err, Error::UnknownResolution { resolution: 2, .. }));
  }

  #[tokio::test]
  async fn hierarchy_mismatch_yields_corrective_aggregate() {
    let indexer = SpatialIndexer::new(vec![1, 2]).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();

    // "a" nests properly; the others claim child cell "00" under parent "1".
    add_location(&store, "a", Point::new(60.0, -120.0), vec![cell("0"), cell("00")], 2).await;
    for name in ["b", "c", "d"] {
      add_location(&store, name, Point::new(60.0, 60.0), vec![cell("1"), cell("00")], 1).await;
    }
    store.backfill_locations().await.unwrap();

    let agg = MapAggregator::new(indexer, 16, 2.0).unwrap();
    let view = agg.map_view(&store, &MapFilters::default(), Some(&cell("0"))).await.unwrap();
    assert_eq!(view.len(), 1);
    let f = &view.features[0];
    assert_eq!(f.properties.kind, FeatureKind::Cluster);
    assert_eq!(f.properties.cell.as_deref(), Some("00"));
    assert_eq!(f.properties.records, 2);
  }
}

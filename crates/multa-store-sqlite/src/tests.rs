//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{TimeZone, Utc};
use multa_core::{
  article::Article,
  cell::CellId,
  judgment::{ConfidenceTier, NewDescriptionJudgment, NewLocationJudgment, ResolutionMethod},
  map::MapFilters,
  offense::NewOffense,
  point::Point,
  store::{JudgmentStore, ReplaceSet},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn article(id: &str, code: i64) -> Article {
  Article {
    id:         id.into(),
    group_code: code,
    title:      format!("Article {id}"),
    text:       format!("text of {id}"),
  }
}

async fn seed_articles(s: &SqliteStore) {
  s.replace_all(ReplaceSet {
    articles: vec![article("13.1", 13), article("13.3.A", 13), article("27.2", 27)],
    ..Default::default()
  })
  .await
  .unwrap();
}

fn resolved(jurisdiction_id: i64, location: &str, lat: f64, lng: f64) -> NewLocationJudgment {
  NewLocationJudgment {
    jurisdiction_id,
    location: location.into(),
    canonical_location: None,
    point: Some(Point::new(lat, lng)),
    is_electronic: false,
    method: ResolutionMethod::Manual,
    confidence: Some(ConfidenceTier::Exact),
    notes: None,
    cells: vec![CellId::parse("2").unwrap(), CellId::parse("213").unwrap()],
  }
}

fn offense(jurisdiction_id: i64, description: &str, location: &str) -> NewOffense {
  NewOffense {
    jurisdiction_id,
    description: description.into(),
    location: location.into(),
    occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    amount: 100.0,
  }
}

// ─── Description judgments ───────────────────────────────────────────────────

#[tokio::test]
async fn description_upsert_derives_group_codes() {
  let s = store().await;
  seed_articles(&s).await;

  let j = s
    .upsert_description_judgment(NewDescriptionJudgment {
      description: "Exceso de velocidad".into(),
      article_ids: vec!["13.3.A".into(), "27.2".into()],
    })
    .await
    .unwrap();
  assert_eq!(j.group_codes, vec![13, 27]);

  // Lookup is on the normalized key.
  let fetched = s.get_description_judgment("  EXCESO de   velocidad ").await.unwrap();
  assert_eq!(fetched.unwrap().article_ids, vec!["13.3.A", "27.2"]);
}

#[tokio::test]
async fn description_upsert_rejects_unknown_article() {
  let s = store().await;
  seed_articles(&s).await;

  let err = s
    .upsert_description_judgment(NewDescriptionJudgment {
      description: "algo".into(),
      article_ids: vec!["99.9".into()],
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownArticle(id) if id == "99.9"));
  assert!(s.list_description_judgments().await.unwrap().is_empty());
}

#[tokio::test]
async fn description_upsert_replaces_existing() {
  let s = store().await;
  seed_articles(&s).await;

  for ids in [vec!["13.1".to_owned()], vec![]] {
    s.upsert_description_judgment(NewDescriptionJudgment {
      description: "Estacionar".into(),
      article_ids: ids,
    })
    .await
    .unwrap();
  }

  let all = s.list_description_judgments().await.unwrap();
  assert_eq!(all.len(), 1);
  assert!(all[0].is_no_article());
}

#[tokio::test]
async fn empty_description_key_is_rejected() {
  let s = store().await;
  let err = s
    .upsert_description_judgment(NewDescriptionJudgment {
      description: "   ".into(),
      article_ids: vec![],
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::EmptyKey));
}

// ─── Location judgments ──────────────────────────────────────────────────────

#[tokio::test]
async fn location_upsert_keeps_id_and_canonical() {
  let s = store().await;

  let first = s.upsert_location_judgment(resolved(1, "Ruta 5 km 10", -34.0, -58.0)).await.unwrap();
  s.set_canonical_location(1, "ruta 5 KM 10", Some("RN5 km 10".into()))
    .await
    .unwrap()
    .unwrap();

  // A later upsert without a canonical string must not clear it.
  let second =
    s.upsert_location_judgment(resolved(1, "RUTA 5 KM 10", -34.5, -58.5)).await.unwrap();
  assert_eq!(second.id, first.id);
  assert_eq!(second.created_at, first.created_at);
  assert_eq!(second.canonical_location.as_deref(), Some("RN5 km 10"));
  assert_eq!(second.point, Some(Point::new(-34.5, -58.5)));
  assert_eq!(second.cells.len(), 2);
  assert_eq!(second.display(), "RN5 km 10");
}

#[tokio::test]
async fn set_canonical_on_missing_location_returns_none() {
  let s = store().await;
  let out = s.set_canonical_location(1, "nowhere", Some("x".into())).await.unwrap();
  assert!(out.is_none());
}

#[tokio::test]
async fn pending_location_has_no_cells() {
  let s = store().await;
  let mut input = NewLocationJudgment::pending(2, "Calle sin nombre", "no provider match");
  input.cells = vec![CellId::parse("1").unwrap()];
  let j = s.upsert_location_judgment(input).await.unwrap();
  assert!(!j.is_resolved());
  assert!(j.cells.is_empty());
  assert_eq!(j.method, ResolutionMethod::Pending);
}

#[tokio::test]
async fn location_upsert_rejects_out_of_range_point() {
  let s = store().await;
  let err = s.upsert_location_judgment(resolved(1, "Mars", 120.0, 0.0)).await.unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

// ─── Bulk replace ────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_all_reports_counts() {
  let s = store().await;
  let counts = s
    .replace_all(ReplaceSet {
      articles:     vec![article("13.1", 13), article("27.2", 27)],
      descriptions: vec![
        NewDescriptionJudgment { description: "a".into(), article_ids: vec!["13.1".into()] },
        NewDescriptionJudgment { description: "b".into(), article_ids: vec![] },
        NewDescriptionJudgment { description: "c".into(), article_ids: vec!["27.2".into()] },
      ],
      locations:    vec![resolved(1, "x", 1.0, 1.0), resolved(1, "y", 2.0, 2.0)],
    })
    .await
    .unwrap();

  assert_eq!((counts.locations, counts.descriptions, counts.articles), (2, 3, 2));
  assert_eq!(s.counts().await.unwrap(), counts);
}

#[tokio::test]
async fn replace_all_with_unknown_article_leaves_store_untouched() {
  let s = store().await;
  seed_articles(&s).await;

  let err = s
    .replace_all(ReplaceSet {
      articles:     vec![article("1.1", 1)],
      descriptions: vec![NewDescriptionJudgment {
        description: "a".into(),
        article_ids: vec!["13.1".into()],
      }],
      locations:    vec![],
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UnknownArticle(_)));
  assert_eq!(s.counts().await.unwrap().articles, 3);
}

#[tokio::test]
async fn replace_all_repoints_applied_locations() {
  let s = store().await;
  s.upsert_location_judgment(resolved(1, "x", 1.0, 1.0)).await.unwrap();
  let o = s.insert_offense(offense(1, "d", "X")).await.unwrap();
  assert_eq!(s.backfill_locations().await.unwrap(), 1);

  let counts = s
    .replace_all(ReplaceSet { locations: vec![resolved(1, "x", 1.0, 1.0)], ..Default::default() })
    .await
    .unwrap();
  assert_eq!(counts.locations, 1);

  let j = s.get_location_judgment(1, "x").await.unwrap().unwrap();
  let o = s.get_offense(o.id).await.unwrap().unwrap();
  assert_eq!(o.location_id, Some(j.id));
}

#[tokio::test]
async fn replace_all_refreshes_applied_enrichment() {
  let s = store().await;
  seed_articles(&s).await;
  s.upsert_description_judgment(NewDescriptionJudgment {
    description: "velocidad".into(),
    article_ids: vec!["13.1".into()],
  })
  .await
  .unwrap();
  s.upsert_location_judgment(resolved(1, "calle 0", -34.0, -58.0)).await.unwrap();
  s.upsert_location_judgment(resolved(1, "calle 1", -35.0, -59.0)).await.unwrap();
  let moved = s.insert_offense(offense(1, "velocidad", "Calle 0")).await.unwrap();
  let dropped = s.insert_offense(offense(1, "otra", "Calle 1")).await.unwrap();
  s.upsert_description_judgment(NewDescriptionJudgment {
    description: "otra".into(),
    article_ids: vec!["27.2".into()],
  })
  .await
  .unwrap();
  assert_eq!(s.backfill_descriptions().await.unwrap(), 2);
  assert_eq!(s.backfill_locations().await.unwrap(), 2);

  // The reloaded set moves "calle 0", re-judges "velocidad", and no longer
  // has "otra" or "calle 1".
  s.replace_all(ReplaceSet {
    articles:     vec![article("13.1", 13), article("27.2", 27)],
    descriptions: vec![NewDescriptionJudgment {
      description: "velocidad".into(),
      article_ids: vec!["27.2".into()],
    }],
    locations:    vec![resolved(1, "calle 0", -31.0, -64.0), resolved(1, "calle 9", 1.0, 1.0)],
  })
  .await
  .unwrap();

  let o = s.get_offense(moved.id).await.unwrap().unwrap();
  assert_eq!(o.point, Some(Point::new(-31.0, -64.0)));
  assert_eq!(o.article_ids, Some(vec!["27.2".to_owned()]));
  assert_eq!(o.article_codes, Some(vec![27]));

  let o = s.get_offense(dropped.id).await.unwrap().unwrap();
  assert_eq!((o.location_id, o.point), (None, None));
  assert_eq!(o.article_ids, None);

  let rows = s.map_locations(&MapFilters::default(), None, None).await.unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0].point, Point::new(-31.0, -64.0));
}

// ─── Backfill ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn backfill_applies_only_matching_judgments() {
  let s = store().await;
  seed_articles(&s).await;

  s.insert_offense(offense(1, "Exceso de velocidad", "Ruta 5")).await.unwrap();
  s.insert_offense(offense(1, "exceso de velocidad", "Ruta 6")).await.unwrap();
  s.insert_offense(offense(1, "Semáforo en rojo", "Ruta 5")).await.unwrap();
  s.insert_offense(offense(2, "Semaforo en rojo", "Ruta 5")).await.unwrap();

  s.upsert_description_judgment(NewDescriptionJudgment {
    description: "EXCESO DE VELOCIDAD".into(),
    article_ids: vec!["13.3.A".into()],
  })
  .await
  .unwrap();
  s.upsert_location_judgment(resolved(1, "ruta 5", -34.0, -58.0)).await.unwrap();
  s.upsert_location_judgment(NewLocationJudgment::pending(1, "ruta 6", "no provider match"))
    .await
    .unwrap();

  let pending = s.pending_counts().await.unwrap();
  assert_eq!(pending.descriptions.unapplied, 2);
  assert_eq!(pending.descriptions.unjudged, 2);
  // The pending judgment for "ruta 6" counts as judged but cannot be applied.
  assert_eq!(pending.locations.unapplied, 3);
  assert_eq!(pending.locations.unjudged, 1);

  assert_eq!(s.backfill_descriptions().await.unwrap(), 2);
  assert_eq!(s.backfill_locations().await.unwrap(), 2);
  // A second pass finds nothing new.
  assert_eq!(s.backfill_descriptions().await.unwrap(), 0);
  assert_eq!(s.backfill_locations().await.unwrap(), 0);

  let first = s.get_offense(1).await.unwrap().unwrap();
  assert_eq!(first.article_codes, Some(vec![13]));
  assert_eq!(first.point, Some(Point::new(-34.0, -58.0)));
}

// ─── Queues ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn queues_are_ordered_by_affected_records() {
  let s = store().await;
  for _ in 0..3 {
    s.insert_offense(offense(1, "Giro prohibido", "Av. Siempreviva")).await.unwrap();
  }
  s.insert_offense(offense(1, "Luces apagadas", "Calle 1")).await.unwrap();
  s.insert_offense(offense(1, "", "")).await.unwrap();

  let descriptions = s.unjudged_descriptions(None).await.unwrap();
  assert_eq!(descriptions.len(), 2);
  assert_eq!(descriptions[0].description, "Giro prohibido");
  assert_eq!(descriptions[0].records, 3);

  let locations = s.unresolved_locations(Some(1)).await.unwrap();
  assert_eq!(locations.len(), 1);
  assert_eq!(locations[0].location, "Av. Siempreviva");
}

// ─── Map ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn map_locations_respects_filters_and_cells() {
  let s = store().await;
  seed_articles(&s).await;

  s.upsert_description_judgment(NewDescriptionJudgment {
    description: "velocidad".into(),
    article_ids: vec!["13.3.A".into()],
  })
  .await
  .unwrap();
  s.upsert_location_judgment(resolved(1, "a", -34.0, -58.0)).await.unwrap();
  let mut far = resolved(1, "b", 10.0, 10.0);
  far.cells = vec![CellId::parse("1").unwrap(), CellId::parse("120").unwrap()];
  s.upsert_location_judgment(far).await.unwrap();

  s.insert_offense(offense(1, "velocidad", "a")).await.unwrap();
  s.insert_offense(offense(1, "velocidad", "a")).await.unwrap();
  s.insert_offense(offense(1, "otra", "b")).await.unwrap();
  s.backfill_descriptions().await.unwrap();
  s.backfill_locations().await.unwrap();

  let all = s.map_locations(&MapFilters::default(), None, Some(1)).await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].records, 2);
  assert_eq!(all[0].group_cell, Some(CellId::parse("2").unwrap()));

  let within = CellId::parse("1").unwrap();
  let inside = s.map_locations(&MapFilters::default(), Some(&within), Some(3)).await.unwrap();
  assert_eq!(inside.len(), 1);
  assert_eq!(inside[0].label, "b");
  assert_eq!(inside[0].group_cell, Some(CellId::parse("120").unwrap()));

  let filters = MapFilters { article_id: Some("13.3.A".into()), ..Default::default() };
  let by_article = s.map_locations(&filters, None, None).await.unwrap();
  assert_eq!(by_article.len(), 1);
  assert_eq!(by_article[0].records, 2);
  assert!(by_article[0].group_cell.is_none());
}

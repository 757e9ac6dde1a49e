//! [`SqliteStore`]: the SQLite implementation of [`JudgmentStore`].

use std::{collections::HashMap, path::Path};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value};

use multa_core::{
  article::Article,
  cell::CellId,
  judgment::{
    DescriptionJudgment, LocationJudgment, NewDescriptionJudgment, NewLocationJudgment,
  },
  map::{MapFilters, MapLocation},
  offense::{NewOffense, OffenseRecord},
  point::Point,
  store::{
    DescriptionQueueItem, EntityCounts, JudgmentSnapshot, JudgmentStore, LocationQueueItem,
    PendingCounts, PendingSplit, ReplaceSet,
  },
  text::normalize,
};

use crate::{
  Error, Result,
  encode::{
    RawDescription, RawLocation, RawOffense, encode_codes, encode_dt, encode_ids, group_cells,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Multa judgment store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store: useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn cells_of(
  conn: &rusqlite::Connection,
  location_id: i64,
) -> rusqlite::Result<Vec<(u8, String)>> {
  let mut stmt =
    conn.prepare("SELECT resolution, cell FROM location_cells WHERE location_id = ?1")?;
  stmt
    .query_map(rusqlite::params![location_id], |r| Ok((r.get(0)?, r.get(1)?)))?
    .collect()
}

fn location_by_id(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<(RawLocation, Vec<(u8, String)>)>> {
  let raw = conn
    .query_row(
      &format!("SELECT {} FROM location_judgments WHERE id = ?1", RawLocation::COLUMNS),
      rusqlite::params![id],
      RawLocation::from_row,
    )
    .optional()?;
  match raw {
    Some(raw) => Ok(Some((raw, cells_of(conn, id)?))),
    None => Ok(None),
  }
}

/// Upsert one location judgment and its cells; returns the row id.
fn write_location(
  conn:  &rusqlite::Connection,
  input: &NewLocationJudgment,
  key:   &str,
  now:   &str,
) -> rusqlite::Result<i64> {
  let lat = input.point.map(|p| p.lat);
  let lng = input.point.map(|p| p.lng);

  conn.execute(
    "INSERT INTO location_judgments (
       jurisdiction_id, location, location_key, canonical_location,
       lat, lng, is_electronic, method, confidence, notes,
       created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
     ON CONFLICT (jurisdiction_id, location_key) DO UPDATE SET
       canonical_location = COALESCE(excluded.canonical_location,
                                     location_judgments.canonical_location),
       lat           = excluded.lat,
       lng           = excluded.lng,
       is_electronic = excluded.is_electronic,
       method        = excluded.method,
       confidence    = excluded.confidence,
       notes         = excluded.notes,
       updated_at    = excluded.updated_at",
    rusqlite::params![
      input.jurisdiction_id,
      input.location,
      key,
      input.canonical_location,
      lat,
      lng,
      input.is_electronic,
      input.method.to_string(),
      input.confidence.map(|c| c.to_string()),
      input.notes,
      now,
    ],
  )?;

  let id: i64 = conn.query_row(
    "SELECT id FROM location_judgments WHERE jurisdiction_id = ?1 AND location_key = ?2",
    rusqlite::params![input.jurisdiction_id, key],
    |r| r.get(0),
  )?;

  conn.execute("DELETE FROM location_cells WHERE location_id = ?1", rusqlite::params![id])?;
  if input.point.is_some() {
    for cell in &input.cells {
      conn.execute(
        "INSERT INTO location_cells (location_id, resolution, cell) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, cell.resolution(), cell.as_str()],
      )?;
    }
  }
  Ok(id)
}

fn count_rows(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<u64> {
  conn.query_row(sql, [], |r| r.get::<_, i64>(0)).map(|n| n as u64)
}

fn entity_counts(conn: &rusqlite::Connection) -> rusqlite::Result<EntityCounts> {
  Ok(EntityCounts {
    locations:    count_rows(conn, "SELECT COUNT(*) FROM location_judgments")?,
    descriptions: count_rows(conn, "SELECT COUNT(*) FROM description_judgments")?,
    articles:     count_rows(conn, "SELECT COUNT(*) FROM articles")?,
  })
}

fn sql_limit(limit: Option<usize>) -> i64 { limit.map_or(-1, |l| l as i64) }

// ─── JudgmentStore impl ──────────────────────────────────────────────────────

impl JudgmentStore for SqliteStore {
  type Error = Error;

  // ── Catalog ───────────────────────────────────────────────────────────────

  async fn list_articles(&self) -> Result<Vec<Article>> {
    let articles = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, group_code, title, text FROM articles ORDER BY id")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(Article {
              id:         row.get(0)?,
              group_code: row.get(1)?,
              title:      row.get(2)?,
              text:       row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(articles)
  }

  async fn get_article(&self, id: &str) -> Result<Option<Article>> {
    let id = id.to_owned();
    let article = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, group_code, title, text FROM articles WHERE id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(Article {
                  id:         row.get(0)?,
                  group_code: row.get(1)?,
                  title:      row.get(2)?,
                  text:       row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(article)
  }

  // ── Description judgments ─────────────────────────────────────────────────

  async fn get_description_judgment(
    &self,
    description: &str,
  ) -> Result<Option<DescriptionJudgment>> {
    let key = normalize(description);
    if key.is_empty() {
      return Ok(None);
    }

    let raw: Option<RawDescription> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM description_judgments WHERE description_key = ?1",
                RawDescription::COLUMNS
              ),
              rusqlite::params![key],
              RawDescription::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDescription::into_judgment).transpose()
  }

  async fn list_description_judgments(&self) -> Result<Vec<DescriptionJudgment>> {
    let raws: Vec<RawDescription> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM description_judgments ORDER BY description_key",
          RawDescription::COLUMNS
        ))?;
        let rows = stmt
          .query_map([], RawDescription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDescription::into_judgment).collect()
  }

  async fn upsert_description_judgment(
    &self,
    input: NewDescriptionJudgment,
  ) -> Result<DescriptionJudgment> {
    let key = normalize(&input.description);
    if key.is_empty() {
      return Err(Error::EmptyKey);
    }
    let ids_json = encode_ids(&input.article_ids)?;
    let now_str = encode_dt(Utc::now());

    // The inner `Err` carries an unknown article id; returning it drops the
    // transaction without committing.
    let outcome: std::result::Result<RawDescription, String> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let mut codes = Vec::with_capacity(input.article_ids.len());
        for id in &input.article_ids {
          let code: Option<i64> = tx
            .query_row(
              "SELECT group_code FROM articles WHERE id = ?1",
              rusqlite::params![id],
              |r| r.get(0),
            )
            .optional()?;
          match code {
            Some(c) => codes.push(c),
            None => return Ok(Err(id.clone())),
          }
        }
        let codes_json = encode_codes(&codes)
          .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

        tx.execute(
          "INSERT INTO description_judgments (
             description_key, description, article_ids, group_codes, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (description_key) DO UPDATE SET
             article_ids = excluded.article_ids,
             group_codes = excluded.group_codes,
             updated_at  = excluded.updated_at",
          rusqlite::params![key, input.description, ids_json, codes_json, now_str],
        )?;

        let raw = tx.query_row(
          &format!(
            "SELECT {} FROM description_judgments WHERE description_key = ?1",
            RawDescription::COLUMNS
          ),
          rusqlite::params![key],
          RawDescription::from_row,
        )?;
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await?;

    outcome.map_err(Error::UnknownArticle)?.into_judgment()
  }

  // ── Location judgments ────────────────────────────────────────────────────

  async fn get_location_judgment(
    &self,
    jurisdiction_id: i64,
    location: &str,
  ) -> Result<Option<LocationJudgment>> {
    let key = normalize(location);
    if key.is_empty() {
      return Ok(None);
    }

    let found = self
      .conn
      .call(move |conn| {
        let id: Option<i64> = conn
          .query_row(
            "SELECT id FROM location_judgments
             WHERE jurisdiction_id = ?1 AND location_key = ?2",
            rusqlite::params![jurisdiction_id, key],
            |r| r.get(0),
          )
          .optional()?;
        match id {
          Some(id) => Ok(location_by_id(conn, id)?),
          None => Ok(None),
        }
      })
      .await?;

    found.map(|(raw, cells)| raw.into_judgment(cells)).transpose()
  }

  async fn list_location_judgments(&self) -> Result<Vec<LocationJudgment>> {
    let (raws, cell_rows) = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM location_judgments ORDER BY jurisdiction_id, location_key",
          RawLocation::COLUMNS
        ))?;
        let raws = stmt
          .query_map([], RawLocation::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt =
          conn.prepare("SELECT location_id, resolution, cell FROM location_cells")?;
        let cells = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<rusqlite::Result<Vec<(i64, u8, String)>>>()?;
        Ok((raws, cells))
      })
      .await?;

    let mut cells = group_cells(cell_rows);
    raws
      .into_iter()
      .map(|raw| {
        let own = cells.remove(&raw.id).unwrap_or_default();
        raw.into_judgment(own)
      })
      .collect()
  }

  async fn upsert_location_judgment(
    &self,
    input: NewLocationJudgment,
  ) -> Result<LocationJudgment> {
    let key = normalize(&input.location);
    if key.is_empty() {
      return Err(Error::EmptyKey);
    }
    if let Some(p) = input.point {
      p.validate()?;
    }
    let now = encode_dt(Utc::now());

    let (raw, cells) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let id = write_location(&tx, &input, &key, &now)?;
        let written = location_by_id(&tx, id)?.ok_or(rusqlite::Error::QueryReturnedNoRows)?;
        tx.commit()?;
        Ok(written)
      })
      .await?;

    raw.into_judgment(cells)
  }

  async fn set_canonical_location(
    &self,
    jurisdiction_id: i64,
    location: &str,
    canonical: Option<String>,
  ) -> Result<Option<LocationJudgment>> {
    let key = normalize(location);
    let canonical = canonical
      .map(|c| c.trim().to_owned())
      .filter(|c| !c.is_empty());
    let now = encode_dt(Utc::now());

    let found = self
      .conn
      .call(move |conn| {
        let changed = conn.execute(
          "UPDATE location_judgments SET canonical_location = ?3, updated_at = ?4
           WHERE jurisdiction_id = ?1 AND location_key = ?2",
          rusqlite::params![jurisdiction_id, key, canonical, now],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let id: i64 = conn.query_row(
          "SELECT id FROM location_judgments WHERE jurisdiction_id = ?1 AND location_key = ?2",
          rusqlite::params![jurisdiction_id, key],
          |r| r.get(0),
        )?;
        Ok(location_by_id(conn, id)?)
      })
      .await?;

    found.map(|(raw, cells)| raw.into_judgment(cells)).transpose()
  }

  // ── Bulk ──────────────────────────────────────────────────────────────────

  async fn counts(&self) -> Result<EntityCounts> {
    Ok(self.conn.call(|conn| Ok(entity_counts(conn)?)).await?)
  }

  async fn replace_all(&self, set: ReplaceSet) -> Result<EntityCounts> {
    // Validate and encode everything before touching the database so that a
    // bad import leaves the store exactly as it was.
    let codes: HashMap<&str, i64> =
      set.articles.iter().map(|a| (a.id.as_str(), a.group_code)).collect();

    let mut descriptions = Vec::with_capacity(set.descriptions.len());
    for d in &set.descriptions {
      let key = normalize(&d.description);
      if key.is_empty() {
        return Err(Error::EmptyKey);
      }
      let group_codes = d
        .article_ids
        .iter()
        .map(|id| codes.get(id.as_str()).copied().ok_or_else(|| Error::UnknownArticle(id.clone())))
        .collect::<Result<Vec<_>>>()?;
      descriptions.push((
        key,
        d.description.clone(),
        encode_ids(&d.article_ids)?,
        encode_codes(&group_codes)?,
      ));
    }

    let mut locations = Vec::with_capacity(set.locations.len());
    for l in set.locations {
      let key = normalize(&l.location);
      if key.is_empty() {
        return Err(Error::EmptyKey);
      }
      if let Some(p) = l.point {
        p.validate()?;
      }
      locations.push((key, l));
    }

    let articles = set.articles;
    let now = encode_dt(Utc::now());

    let counts = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute_batch(
          "DELETE FROM location_cells;
           DELETE FROM location_judgments;
           DELETE FROM description_judgments;
           DELETE FROM articles;",
        )?;

        for a in &articles {
          tx.execute(
            "INSERT OR REPLACE INTO articles (id, group_code, title, text)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![a.id, a.group_code, a.title, a.text],
          )?;
        }

        for (key, description, ids, codes) in &descriptions {
          tx.execute(
            "INSERT OR REPLACE INTO description_judgments (
               description_key, description, article_ids, group_codes, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![key, description, ids, codes, now],
          )?;
        }

        for (key, input) in &locations {
          write_location(&tx, input, key, &now)?;
        }

        // Row ids and points may have changed. Refresh already-applied
        // enrichment from the reloaded judgments; a judgment that no longer
        // resolves clears it so backfill can pick the record up again.
        tx.execute_batch(
          "UPDATE offenses SET
             article_ids   = (SELECT dj.article_ids FROM description_judgments dj
                              WHERE dj.description_key = offenses.description_key),
             article_codes = (SELECT dj.group_codes FROM description_judgments dj
                              WHERE dj.description_key = offenses.description_key)
           WHERE article_ids IS NOT NULL;
           UPDATE offenses SET
             location_id = (SELECT lj.id FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key
                              AND lj.lat IS NOT NULL),
             lat         = (SELECT lj.lat FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key
                              AND lj.lat IS NOT NULL),
             lng         = (SELECT lj.lng FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key
                              AND lj.lat IS NOT NULL)
           WHERE location_id IS NOT NULL;",
        )?;

        let counts = entity_counts(&tx)?;
        tx.commit()?;
        Ok(counts)
      })
      .await?;

    Ok(counts)
  }

  async fn export_all(&self) -> Result<JudgmentSnapshot> {
    Ok(JudgmentSnapshot {
      articles:     self.list_articles().await?,
      descriptions: self.list_description_judgments().await?,
      locations:    self.list_location_judgments().await?,
    })
  }

  // ── Offenses ──────────────────────────────────────────────────────────────

  async fn insert_offense(&self, input: NewOffense) -> Result<OffenseRecord> {
    let description_key = normalize(&input.description);
    let location_key = normalize(&input.location);
    let occurred_at = encode_dt(input.occurred_at);

    let id: i64 = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO offenses (
             jurisdiction_id, description, description_key,
             location, location_key, occurred_at, amount
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            input.jurisdiction_id,
            input.description,
            description_key,
            input.location,
            location_key,
            occurred_at,
            input.amount,
          ],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    self
      .get_offense(id)
      .await?
      .ok_or(Error::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::QueryReturnedNoRows,
      )))
  }

  async fn get_offense(&self, id: i64) -> Result<Option<OffenseRecord>> {
    let raw: Option<RawOffense> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {} FROM offenses WHERE id = ?1", RawOffense::COLUMNS),
              rusqlite::params![id],
              RawOffense::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawOffense::into_record).transpose()
  }

  async fn backfill_descriptions(&self) -> Result<u64> {
    let updated = self
      .conn
      .call(|conn| {
        let n = conn.execute(
          "UPDATE offenses SET
             article_ids   = (SELECT dj.article_ids FROM description_judgments dj
                              WHERE dj.description_key = offenses.description_key),
             article_codes = (SELECT dj.group_codes FROM description_judgments dj
                              WHERE dj.description_key = offenses.description_key)
           WHERE article_ids IS NULL
             AND description_key IN (SELECT description_key FROM description_judgments)",
          [],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(updated)
  }

  async fn backfill_locations(&self) -> Result<u64> {
    let updated = self
      .conn
      .call(|conn| {
        let n = conn.execute(
          "UPDATE offenses SET
             location_id = (SELECT lj.id FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key),
             lat         = (SELECT lj.lat FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key),
             lng         = (SELECT lj.lng FROM location_judgments lj
                            WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                              AND lj.location_key    = offenses.location_key)
           WHERE location_id IS NULL
             AND EXISTS (SELECT 1 FROM location_judgments lj
                         WHERE lj.jurisdiction_id = offenses.jurisdiction_id
                           AND lj.location_key    = offenses.location_key
                           AND lj.lat IS NOT NULL)",
          [],
        )?;
        Ok(n as u64)
      })
      .await?;
    Ok(updated)
  }

  async fn pending_counts(&self) -> Result<PendingCounts> {
    let counts = self
      .conn
      .call(|conn| {
        let desc_judged = "EXISTS (SELECT 1 FROM description_judgments dj
                                   WHERE dj.description_key = o.description_key)";
        let loc_judged = "EXISTS (SELECT 1 FROM location_judgments lj
                                  WHERE lj.jurisdiction_id = o.jurisdiction_id
                                    AND lj.location_key    = o.location_key)";
        let count = |cond: String| {
          count_rows(conn, &format!("SELECT COUNT(*) FROM offenses o WHERE {cond}"))
        };
        Ok(PendingCounts {
          descriptions: PendingSplit {
            unjudged:  count(format!("o.article_ids IS NULL AND NOT {desc_judged}"))?,
            unapplied: count(format!("o.article_ids IS NULL AND {desc_judged}"))?,
          },
          locations:    PendingSplit {
            unjudged:  count(format!("o.location_id IS NULL AND NOT {loc_judged}"))?,
            unapplied: count(format!("o.location_id IS NULL AND {loc_judged}"))?,
          },
        })
      })
      .await?;
    Ok(counts)
  }

  // ── Curation queues ───────────────────────────────────────────────────────

  async fn unjudged_descriptions(
    &self,
    limit: Option<usize>,
  ) -> Result<Vec<DescriptionQueueItem>> {
    let limit = sql_limit(limit);
    let items = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT MIN(o.description), COUNT(*) AS n
           FROM offenses o
           WHERE o.description_key != ''
             AND NOT EXISTS (SELECT 1 FROM description_judgments dj
                             WHERE dj.description_key = o.description_key)
           GROUP BY o.description_key
           ORDER BY n DESC, o.description_key
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |r| {
            Ok(DescriptionQueueItem {
              description: r.get(0)?,
              records:     r.get::<_, i64>(1)? as u64,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(items)
  }

  async fn unresolved_locations(
    &self,
    limit: Option<usize>,
  ) -> Result<Vec<LocationQueueItem>> {
    let limit = sql_limit(limit);
    let items = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT o.jurisdiction_id, MIN(o.location), COUNT(*) AS n
           FROM offenses o
           WHERE o.location_key != ''
             AND NOT EXISTS (SELECT 1 FROM location_judgments lj
                             WHERE lj.jurisdiction_id = o.jurisdiction_id
                               AND lj.location_key    = o.location_key
                               AND lj.lat IS NOT NULL)
           GROUP BY o.jurisdiction_id, o.location_key
           ORDER BY n DESC, o.jurisdiction_id, o.location_key
           LIMIT ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![limit], |r| {
            Ok(LocationQueueItem {
              jurisdiction_id: r.get(0)?,
              location:        r.get(1)?,
              records:         r.get::<_, i64>(2)? as u64,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(items)
  }

  // ── Map ───────────────────────────────────────────────────────────────────

  async fn map_locations(
    &self,
    filters: &MapFilters,
    within: Option<&CellId>,
    group_resolution: Option<u8>,
  ) -> Result<Vec<MapLocation>> {
    // Parameters are positional (`?`) and pushed in textual order.
    let mut params: Vec<Value> =
      vec![group_resolution.map_or(Value::Null, |r| Value::Integer(i64::from(r)))];
    let mut conds: Vec<&'static str> = vec!["o.lat IS NOT NULL", "o.lng IS NOT NULL"];

    if let Some(cell) = within {
      conds.push(
        "EXISTS (SELECT 1 FROM location_cells w
                 WHERE w.location_id = lj.id AND w.resolution = ? AND w.cell = ?)",
      );
      params.push(Value::Integer(i64::from(cell.resolution())));
      params.push(Value::Text(cell.as_str().to_owned()));
    }
    if let Some(j) = filters.jurisdiction_id {
      conds.push("o.jurisdiction_id = ?");
      params.push(Value::Integer(j));
    }
    if let Some(from) = filters.from {
      conds.push("o.occurred_at >= ?");
      params.push(Value::Text(encode_dt(from)));
    }
    if let Some(to) = filters.to {
      conds.push("o.occurred_at < ?");
      params.push(Value::Text(encode_dt(to)));
    }
    if let Some(article) = &filters.article_id {
      conds.push("EXISTS (SELECT 1 FROM json_each(o.article_ids) WHERE json_each.value = ?)");
      params.push(Value::Text(article.clone()));
    }
    if let Some(electronic) = filters.electronic {
      conds.push("lj.is_electronic = ?");
      params.push(Value::Integer(i64::from(electronic)));
    }

    let sql = format!(
      "SELECT lj.jurisdiction_id,
              COALESCE(lj.canonical_location, lj.location) AS label,
              AVG(o.lat), AVG(o.lng), COUNT(*), MIN(g.cell)
       FROM offenses o
       JOIN location_judgments lj
         ON lj.jurisdiction_id = o.jurisdiction_id AND lj.location_key = o.location_key
       LEFT JOIN location_cells g
         ON g.location_id = lj.id AND g.resolution = ?
       WHERE {}
       GROUP BY lj.jurisdiction_id, label
       ORDER BY lj.jurisdiction_id, label",
      conds.join(" AND ")
    );

    let rows: Vec<(i64, String, f64, f64, i64, Option<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), |r| {
            Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(jurisdiction_id, label, lat, lng, n, cell)| {
        Ok::<_, Error>(MapLocation {
          jurisdiction_id,
          label,
          point: Point::new(lat, lng),
          records: n as u64,
          group_cell: cell.as_deref().map(CellId::parse).transpose()?,
        })
      })
      .collect()
  }
}

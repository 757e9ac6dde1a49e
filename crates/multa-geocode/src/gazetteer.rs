//! [`Gazetteer`]: the local table of fixed enforcement installations.
//!
//! Highway locations are written in a route-plus-progressive shorthand such
//! as `RUTA 005 Y 038K131_D` (route 5, kilometre 38 + 131 m, direction D).
//! The route number and the progressive token identify an installation
//! exactly; the direction suffix is ignored.

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use multa_core::{
  judgment::{ConfidenceTier, ResolutionMethod},
  point::Point,
  text::normalize,
};

use crate::{Candidate, Error, GeocodeQuery, GeocodingProvider, ProviderError, Result};

const SHORTHAND: &str = r"\bruta\s+0*(\d+)\b.*?\b0*(\d+)k0*(\d+)(?:_[a-z]+)?\b";
const PROGRESSIVE: &str = r"^0*(\d+)k0*(\d+)$";

/// One row of the gazetteer file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GazetteerEntry {
  pub route:         u32,
  /// `<km>K<m>`, e.g. `038K131`.
  pub progressive:   String,
  pub lat:           f64,
  pub lng:           f64,
  #[serde(default)]
  pub is_electronic: bool,
  #[serde(default)]
  pub label:         Option<String>,
}

/// `(route, km, m)`.
type Key = (u32, u32, u32);

#[derive(Debug, Clone)]
pub struct Gazetteer {
  entries:   HashMap<Key, GazetteerEntry>,
  shorthand: Regex,
}

fn number(s: &str) -> Option<u32> { s.parse().ok() }

impl Gazetteer {
  pub fn from_entries(entries: Vec<GazetteerEntry>) -> Result<Self> {
    let shorthand = Regex::new(SHORTHAND).map_err(|e| Error::Gazetteer(e.to_string()))?;
    let progressive = Regex::new(PROGRESSIVE).map_err(|e| Error::Gazetteer(e.to_string()))?;

    let mut table = HashMap::with_capacity(entries.len());
    for entry in entries {
      Point::new(entry.lat, entry.lng).validate()?;
      let token = entry.progressive.trim().to_lowercase();
      let (km, m) = progressive
        .captures(&token)
        .and_then(|c| Some((number(&c[1])?, number(&c[2])?)))
        .ok_or_else(|| {
          Error::Gazetteer(format!(
            "route {}: bad progressive {:?}",
            entry.route, entry.progressive
          ))
        })?;
      table.insert((entry.route, km, m), entry);
    }

    Ok(Self { entries: table, shorthand })
  }

  /// Read a JSON array of [`GazetteerEntry`] from `path`.
  pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await?;
    let entries: Vec<GazetteerEntry> = serde_json::from_str(&raw)?;
    let gazetteer = Self::from_entries(entries)?;
    info!(path = %path.display(), entries = gazetteer.len(), "loaded gazetteer");
    Ok(gazetteer)
  }

  pub fn len(&self) -> usize { self.entries.len() }

  pub fn is_empty(&self) -> bool { self.entries.is_empty() }

  /// The installation named by `text`, if it uses the route shorthand.
  pub fn lookup(&self, text: &str) -> Option<&GazetteerEntry> {
    let normalized = normalize(text);
    let caps = self.shorthand.captures(&normalized)?;
    let key = (number(&caps[1])?, number(&caps[2])?, number(&caps[3])?);
    self.entries.get(&key)
  }
}

#[async_trait]
impl GeocodingProvider for Gazetteer {
  fn name(&self) -> &'static str { "gazetteer" }

  async fn geocode(&self, query: GeocodeQuery<'_>) -> Result<Vec<Candidate>, ProviderError> {
    Ok(
      self
        .lookup(query.text)
        .map(|e| Candidate {
          point:         Point::new(e.lat, e.lng),
          tier:          ConfidenceTier::Exact,
          method:        ResolutionMethod::Gazetteer,
          is_electronic: e.is_electronic,
          label:         e.label.clone(),
        })
        .into_iter()
        .collect(),
    )
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  fn entry(route: u32, progressive: &str) -> GazetteerEntry {
    GazetteerEntry {
      route,
      progressive: progressive.into(),
      lat: -34.9,
      lng: -57.9,
      is_electronic: true,
      label: Some(format!("R{route} {progressive}")),
    }
  }

  #[test]
  fn matches_route_shorthand() {
    let g = Gazetteer::from_entries(vec![entry(5, "038K131"), entry(5, "38K200")]).unwrap();
    let hit = g.lookup("RUTA 005 Y 038K131_D").unwrap();
    assert_eq!(hit.progressive, "038K131");
    assert!(g.lookup("ruta 5 km 38k200").is_some());
    assert!(g.lookup("Ruta 5, 038K131").is_some());
    assert!(g.lookup("RUTA 006 Y 038K131_D").is_none());
    assert!(g.lookup("Av. Corrientes 1234").is_none());
  }

  #[test]
  fn rejects_bad_entries() {
    assert!(Gazetteer::from_entries(vec![entry(5, "38.131")]).is_err());
    let mut far = entry(5, "1K0");
    far.lat = 123.0;
    assert!(Gazetteer::from_entries(vec![far]).is_err());
  }

  #[tokio::test]
  async fn answers_with_an_exact_candidate() {
    let g = Gazetteer::from_entries(vec![entry(5, "038K131")]).unwrap();
    let q = GeocodeQuery { jurisdiction_id: 1, jurisdiction_name: None, text: "RUTA 005 Y 038K131_D" };
    let c = g.geocode(q).await.unwrap();
    assert_eq!(c.len(), 1);
    assert_eq!(c[0].tier, ConfidenceTier::Exact);
    assert_eq!(c[0].method, ResolutionMethod::Gazetteer);
    assert!(c[0].is_electronic);
  }

  #[tokio::test]
  async fn loads_from_json_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"[{{"route": 2, "progressive": "100K000", "lat": -35.0, "lng": -58.0, "label": "Peaje"}}]"#
    )
    .unwrap();
    let g = Gazetteer::load(file.path()).await.unwrap();
    assert_eq!(g.len(), 1);
    assert!(!g.lookup("RUTA 2 100K000").unwrap().is_electronic);
  }
}

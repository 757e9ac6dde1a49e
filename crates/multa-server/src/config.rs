//! Runtime configuration, deserialised from `multa.toml` and `MULTA_*`
//! environment variables.

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use multa_core::point::Bounds;
use multa_geocode::{Gazetteer, HttpGeocoder, HttpGeocoderConfig, LocationResolver};
use multa_spatial::{MapAggregator, SpatialIndexer};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  /// The portable export file reconciliation loads from and stores to.
  pub export_path:      PathBuf,
  /// Strictly ascending quadkey resolutions, coarsest first.
  pub resolutions:      Vec<u8>,
  /// Maximum features per map response.
  pub map_budget:       usize,
  pub safety_multiple:  f64,
  /// Default similarity threshold for suggestions.
  pub threshold:        f64,
  pub gazetteer_path:   Option<PathBuf>,
  pub geocoder:         Option<GeocoderConfig>,
  pub provider_timeout: u64,
  /// Candidates outside this box are rejected.
  pub bounds:           Option<Bounds>,
  pub jurisdictions:    Vec<JurisdictionName>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
  pub endpoint: String,
  pub api_key:  Option<String>,
  pub region:   Option<String>,
}

/// Display name appended to external geocoding queries.
#[derive(Debug, Clone, Deserialize)]
pub struct JurisdictionName {
  pub id:   i64,
  pub name: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".into(),
      port:             8080,
      store_path:       PathBuf::from("~/.local/share/multa/multa.db"),
      export_path:      PathBuf::from("judgments.json"),
      resolutions:      vec![4, 7, 10, 13, 16],
      map_budget:       256,
      safety_multiple:  2.0,
      threshold:        multa_api::DEFAULT_THRESHOLD,
      gazetteer_path:   None,
      geocoder:         None,
      provider_timeout: 10,
      bounds:           None,
      jurisdictions:    Vec::new(),
    }
  }
}

impl ServerConfig {
  /// Layer `path` (optional) under `MULTA_`-prefixed environment variables.
  /// Nested keys use a double underscore, e.g. `MULTA_GEOCODER__API_KEY`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("MULTA")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;

    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.export_path = expand_tilde(&cfg.export_path);
    cfg.gazetteer_path = cfg.gazetteer_path.as_deref().map(expand_tilde);
    Ok(cfg)
  }

  pub fn indexer(&self) -> anyhow::Result<SpatialIndexer> {
    SpatialIndexer::new(self.resolutions.clone()).context("invalid `resolutions`")
  }

  pub fn aggregator(&self) -> anyhow::Result<MapAggregator> {
    MapAggregator::new(self.indexer()?, self.map_budget, self.safety_multiple)
      .context("invalid map aggregation settings")
  }

  /// The provider chain: the gazetteer first (if configured), then the
  /// external geocoder (if configured).
  pub async fn resolver(&self) -> anyhow::Result<LocationResolver> {
    let mut resolver = LocationResolver::new(self.indexer()?)
      .with_timeout(Duration::from_secs(self.provider_timeout))
      .with_jurisdictions(
        self
          .jurisdictions
          .iter()
          .map(|j| (j.id, j.name.clone()))
          .collect::<HashMap<_, _>>(),
      );

    if let Some(bounds) = self.bounds {
      resolver = resolver.with_bounds(bounds);
    }

    if let Some(path) = &self.gazetteer_path {
      let gazetteer = Gazetteer::load(path)
        .await
        .with_context(|| format!("failed to load gazetteer from {path:?}"))?;
      resolver = resolver.with_provider(Arc::new(gazetteer));
    }

    if let Some(geocoder) = &self.geocoder {
      let client = HttpGeocoder::new(HttpGeocoderConfig {
        endpoint: geocoder.endpoint.clone(),
        api_key:  geocoder.api_key.clone(),
        region:   geocoder.region.clone(),
        timeout:  Duration::from_secs(self.provider_timeout),
      })
      .context("failed to build geocoder client")?;
      info!(endpoint = %geocoder.endpoint, "external geocoder enabled");
      resolver = resolver.with_provider(Arc::new(client));
    }

    Ok(resolver)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/") {
    if let Ok(home) = std::env::var("HOME") {
      return PathBuf::from(home).join(rest);
    }
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use std::io::Write as _;

  use super::*;

  #[test]
  fn defaults_form_a_valid_map_config() {
    let cfg = ServerConfig::default();
    assert!(cfg.aggregator().is_ok());
  }

  #[test]
  fn reads_toml_over_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(
      file,
      r#"
        port = 9000
        export_path = "/srv/multa/judgments.json"
        resolutions = [2, 4, 6]
        map_budget = 16

        [bounds]
        min_lat = -56.0
        max_lat = -21.0
        min_lng = -74.0
        max_lng = -53.0

        [[jurisdictions]]
        id = 1
        name = "La Plata"
      "#
    )
    .unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.export_path, PathBuf::from("/srv/multa/judgments.json"));
    assert_eq!(cfg.resolutions, vec![2, 4, 6]);
    assert_eq!(cfg.bounds.unwrap().min_lat, -56.0);
    assert_eq!(cfg.jurisdictions[0].name, "La Plata");
    assert!(cfg.aggregator().is_ok());
  }

  #[test]
  fn expands_home() {
    let home = std::env::var("HOME").unwrap_or_default();
    if home.is_empty() {
      return;
    }
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(&home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs.db")), PathBuf::from("/abs.db"));
  }
}

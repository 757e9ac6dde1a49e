//! [`HttpGeocoder`]: the external geocoding service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use multa_core::{
  judgment::{ConfidenceTier, ResolutionMethod},
  point::Point,
};

use crate::{Candidate, GeocodeQuery, GeocodingProvider, ProviderError, Result};

#[derive(Debug, Clone)]
pub struct HttpGeocoderConfig {
  /// Full endpoint URL, e.g. `https://maps.googleapis.com/maps/api/geocode/json`.
  pub endpoint: String,
  pub api_key:  Option<String>,
  /// Region bias passed through to the service.
  pub region:   Option<String>,
  pub timeout:  Duration,
}

/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpGeocoder {
  client: Client,
  config: HttpGeocoderConfig,
}

// ─── Wire format ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct GeocodeResponse {
  status:        String,
  #[serde(default)]
  error_message: Option<String>,
  #[serde(default)]
  results:       Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
  geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
  location:      LatLng,
  location_type: String,
}

#[derive(Debug, Deserialize)]
struct LatLng {
  lat: f64,
  lng: f64,
}

/// Only rooftop and interpolated-range precision is usable; city-level and
/// approximate results are dropped.
fn tier_of(location_type: &str) -> Option<ConfidenceTier> {
  match location_type {
    "ROOFTOP" => Some(ConfidenceTier::Exact),
    "RANGE_INTERPOLATED" => Some(ConfidenceTier::Interpolated),
    _ => None,
  }
}

pub(crate) fn candidates(response: GeocodeResponse) -> Result<Vec<Candidate>, ProviderError> {
  match response.status.as_str() {
    "OK" => {}
    "ZERO_RESULTS" => return Ok(Vec::new()),
    _ => {
      return Err(ProviderError::Status {
        status:  response.status,
        message: response.error_message.unwrap_or_default(),
      });
    }
  }

  Ok(
    response
      .results
      .into_iter()
      .filter_map(|r| {
        let Some(tier) = tier_of(&r.geometry.location_type) else {
          debug!(location_type = %r.geometry.location_type, "dropping low-precision result");
          return None;
        };
        Some(Candidate {
          point: Point::new(r.geometry.location.lat, r.geometry.location.lng),
          tier,
          method: ResolutionMethod::Geocoder,
          is_electronic: false,
          label: None,
        })
      })
      .collect(),
  )
}

impl HttpGeocoder {
  pub fn new(config: HttpGeocoderConfig) -> Result<Self> {
    let client = Client::builder().timeout(config.timeout).build()?;
    Ok(Self { client, config })
  }
}

#[async_trait]
impl GeocodingProvider for HttpGeocoder {
  fn name(&self) -> &'static str { "geocoder" }

  async fn geocode(&self, query: GeocodeQuery<'_>) -> Result<Vec<Candidate>, ProviderError> {
    let address = match query.jurisdiction_name {
      Some(name) => format!("{}, {}", query.text.trim(), name),
      None => query.text.trim().to_owned(),
    };

    let mut params: Vec<(&str, &str)> = vec![("address", address.as_str())];
    if let Some(key) = &self.config.api_key {
      params.push(("key", key.as_str()));
    }
    if let Some(region) = &self.config.region {
      params.push(("region", region.as_str()));
    }

    debug!(address = %address, "querying external geocoder");
    let resp = self.client.get(&self.config.endpoint).query(&params).send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(ProviderError::Server { status: status.as_u16(), body });
    }

    candidates(resp.json().await?)
  }
}

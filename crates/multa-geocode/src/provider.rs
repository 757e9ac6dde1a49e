//! The [`GeocodingProvider`] seam.

use async_trait::async_trait;

use multa_core::{
  judgment::{ConfidenceTier, ResolutionMethod},
  point::Point,
};

use crate::ProviderError;

/// What a provider is asked to resolve.
#[derive(Debug, Clone, Copy)]
pub struct GeocodeQuery<'a> {
  pub jurisdiction_id:   i64,
  /// Human-readable jurisdiction name, appended to external queries.
  pub jurisdiction_name: Option<&'a str>,
  pub text:              &'a str,
}

/// One proposed point for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub point:         Point,
  pub tier:          ConfidenceTier,
  pub method:        ResolutionMethod,
  pub is_electronic: bool,
  pub label:         Option<String>,
}

/// A source of candidate points for free-text locations.
///
/// Providers are tried in a fixed order by the
/// [`LocationResolver`](crate::LocationResolver); each call is bounded by the
/// resolver's timeout.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
  /// Short name used in logs and needs-manual reasons.
  fn name(&self) -> &'static str;

  async fn geocode(&self, query: GeocodeQuery<'_>) -> Result<Vec<Candidate>, ProviderError>;
}

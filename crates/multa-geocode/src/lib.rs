//! Location Resolver for the Multa enrichment core.
//!
//! Free-text infraction locations are resolved by a fixed-priority chain of
//! [`GeocodingProvider`]s (the local [`Gazetteer`] first, then the external
//! [`HttpGeocoder`]). The chain keeps the single best-tier candidate; an exact
//! hit short-circuits the rest. Outcomes are written back through the
//! [`JudgmentStore`](multa_core::store::JudgmentStore) with their spatial
//! cells.

pub mod error;
mod gazetteer;
mod http;
mod provider;
mod resolver;

pub use error::{Error, ProviderError, Result};
pub use gazetteer::{Gazetteer, GazetteerEntry};
pub use http::{HttpGeocoder, HttpGeocoderConfig};
pub use provider::{Candidate, GeocodeQuery, GeocodingProvider};
pub use resolver::{LocationResolver, PendingReport, Resolution};

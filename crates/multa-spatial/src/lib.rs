//! Spatial indexing and bounded map aggregation.
//!
//! [`SpatialIndexer`] assigns every resolved point one quadtree cell per
//! configured resolution. [`MapAggregator`] uses those stored cells to render
//! any filtered record set as a GeoJSON-shaped [`FeatureCollection`] whose
//! size stays within a fixed feature budget.

mod aggregate;
pub mod error;
mod geojson;
mod indexer;

pub use aggregate::MapAggregator;
pub use error::{Error, Result};
pub use geojson::{Feature, FeatureCollection, FeatureKind, FeatureProperties, Geometry};
pub use indexer::SpatialIndexer;

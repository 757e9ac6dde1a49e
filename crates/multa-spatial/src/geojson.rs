//! GeoJSON-shaped map output.

use serde::{Deserialize, Serialize};

use multa_core::point::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum CollectionTag {
  #[default]
  FeatureCollection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum FeatureTag {
  #[default]
  Feature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
enum GeometryTag {
  #[default]
  Point,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
  #[serde(rename = "type")]
  tag:          CollectionTag,
  pub features: Vec<Feature>,
}

impl FeatureCollection {
  pub fn new(features: Vec<Feature>) -> Self { Self { tag: CollectionTag::default(), features } }

  pub fn len(&self) -> usize { self.features.len() }

  pub fn is_empty(&self) -> bool { self.features.is_empty() }

  /// Sum of record counts over every feature.
  pub fn records(&self) -> u64 { self.features.iter().map(|f| f.properties.records).sum() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
  #[serde(rename = "type")]
  tag:             GeometryTag,
  /// `[lng, lat]`, GeoJSON axis order.
  pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
  Cluster,
  Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
  pub kind:            FeatureKind,
  pub records:         u64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub locations:       Option<u64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cell:            Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label:           Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub jurisdiction_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
  #[serde(rename = "type")]
  tag:            FeatureTag,
  pub geometry:   Geometry,
  pub properties: FeatureProperties,
}

impl Feature {
  fn at(point: Point, properties: FeatureProperties) -> Self {
    Self {
      tag: FeatureTag::default(),
      geometry: Geometry { tag: GeometryTag::default(), coordinates: [point.lng, point.lat] },
      properties,
    }
  }

  pub fn cluster(cell: &str, centroid: Point, records: u64, locations: u64) -> Self {
    Self::at(centroid, FeatureProperties {
      kind: FeatureKind::Cluster,
      records,
      locations: Some(locations),
      cell: Some(cell.to_owned()),
      label: None,
      jurisdiction_id: None,
    })
  }

  pub fn location(jurisdiction_id: i64, label: &str, point: Point, records: u64) -> Self {
    Self::at(point, FeatureProperties {
      kind: FeatureKind::Location,
      records,
      locations: None,
      cell: None,
      label: Some(label.to_owned()),
      jurisdiction_id: Some(jurisdiction_id),
    })
  }

  pub fn point(&self) -> Point {
    Point::new(self.geometry.coordinates[1], self.geometry.coordinates[0])
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn serializes_as_geojson() {
    let fc = FeatureCollection::new(vec![
      Feature::cluster("21", Point::new(-34.5, -58.5), 12, 3),
      Feature::location(1, "Ruta 5 km 10", Point::new(-34.0, -58.0), 4),
    ]);
    let v = serde_json::to_value(&fc).unwrap();
    assert_eq!(v["type"], "FeatureCollection");
    assert_eq!(v["features"][0]["type"], "Feature");
    assert_eq!(v["features"][0]["geometry"], json!({"type": "Point", "coordinates": [-58.5, -34.5]}));
    assert_eq!(v["features"][0]["properties"]["kind"], "cluster");
    assert_eq!(v["features"][0]["properties"]["locations"], 3);
    assert!(v["features"][1]["properties"].get("cell").is_none());
    assert_eq!(fc.records(), 16);

    let back: FeatureCollection = serde_json::from_value(v).unwrap();
    assert_eq!(back, fc);
  }
}

//! The normative article catalog.

use serde::{Deserialize, Serialize};

/// A normative article. The catalog is seeded by bulk import and never
/// mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
  /// Hierarchical code, e.g. `13.3.A`.
  pub id:         String,
  pub group_code: i64,
  pub title:      String,
  /// Normative text.
  pub text:       String,
}

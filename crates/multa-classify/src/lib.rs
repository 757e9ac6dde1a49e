//! Description Classifier for the Multa enrichment core.
//!
//! A [`Classifier`] is an immutable snapshot built from the article catalog
//! and every confirmed description judgment. It scores free text against
//! both by cosine similarity over term-frequency vectors, decomposes
//! comma-joined narratives into parts, and renders/ingests the line-oriented
//! batch exchange format in [`batch`].

pub mod batch;
mod classifier;
pub mod error;
mod vector;

pub use classifier::{Classifier, MultiArticle, SegmentSuggestions, Suggestion};
pub use error::{Error, Result};

//! Core types and trait definitions for the Multa enrichment core.
//!
//! Judgments, offense records, spatial cells, map filters, the portable
//! export document, and the [`store::JudgmentStore`] trait. No HTTP or
//! database code lives here.

pub mod article;
pub mod cell;
pub mod error;
pub mod export;
pub mod judgment;
pub mod map;
pub mod offense;
pub mod point;
pub mod store;
pub mod text;

pub use error::{Error, Result};

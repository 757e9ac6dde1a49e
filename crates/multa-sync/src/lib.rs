//! Reconciliation between the judgment store and its portable export file.
//!
//! The export file is the shared source of truth; the store is a working
//! copy. [`ReconcileController`] refuses any load that would drop judgments
//! the file does not yet have.

mod controller;
pub mod error;

pub use controller::{
  BackfillReport, EnrichmentReport, LoadOutcome, Maintenance, ReconcileController, SyncState,
};
pub use error::{Error, Result};

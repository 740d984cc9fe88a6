//! Reconciliation module
//!
//! Fact specifications, the reconciler and its output types.

pub mod fact_spec;
pub mod models;
pub mod reconciler;

pub use fact_spec::{FactCatalog, FactSpec, UntaggedCurrency};
pub use models::{ProvenanceEntry, ResolvedFact, SourceObservation};
pub use reconciler::Reconciler;

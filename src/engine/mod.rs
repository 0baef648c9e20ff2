//! Pure listing engines: reconciliation of extracted candidates and batch-relative scoring.
//!
//! Neither engine performs I/O or suspends. Callers must serialize passes over a
//! given listing set.

pub mod reconcile;
pub mod scoring;

pub use reconcile::{insert_manual, reconcile, PriceUpdate, Reconciliation, SkipReason, Skipped};
pub use scoring::score;

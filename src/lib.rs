//! Rental listing tracker: reconciles freshly extracted listings into the known
//! set and ranks them by a weighted price / comfort / proximity score.

pub mod activity;
pub mod config;
pub mod engine;
pub mod extraction;
pub mod filter;
pub mod models;
pub mod store;
pub mod tracker;

pub use engine::{reconcile, score, Reconciliation};
pub use models::{CandidateRecord, Listing, Weights};
pub use tracker::{Tracker, TrackerError};

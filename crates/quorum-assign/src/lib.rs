//! Reviewer assignment engine.
//!
//! Picks reviewers for new pull requests, swaps individual reviewers, and
//! repairs open pull requests when a whole team leaves review duty. Every
//! operation runs inside one store transaction.
//!
//! - [`selection`]: uniform random choice of reviewers from a candidate pool
//! - [`cascade`]: team deactivation and per-PR repair
//! - [`engine`]: [`ReviewEngine`], the entry point for all operations

pub mod cascade;
pub mod engine;
mod lifecycle;
mod roster;
pub mod selection;

pub use cascade::{repair_pr, PrRepair};
pub use engine::ReviewEngine;
pub use selection::{select_one, select_reviewers};

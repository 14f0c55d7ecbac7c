//! Commit history mining and PaC maintenance classification.
//!
//! Walks a repository's history with git2, classifies every touched file as
//! Policy-as-Code or not using a registry-backed membership index, and folds
//! the classified commits into per-repository maintenance statistics.

pub mod aggregate;
pub mod classify;
pub mod maintenance;
pub mod membership;
pub mod mining;
pub mod pipeline;

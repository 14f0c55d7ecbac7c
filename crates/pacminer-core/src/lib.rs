//! Core types, configuration, and error handling for pacminer.
//!
//! This crate provides the shared foundation used by all other pacminer crates:
//! - [`PacError`]: unified error type using `thiserror`
//! - [`PacConfig`]: configuration loaded from `.pacminer.toml`
//! - Shared records: [`ChangeRecord`], [`RawCommit`], [`Commit`],
//!   [`RepositoryAnalysis`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{AggregateConfig, CollectConfig, InspectConfig, MiningConfig, PacConfig};
pub use error::PacError;
pub use types::{
    ratio, ChangeRecord, ChangeStatus, Commit, OutputFormat, RawCommit, RepositoryAnalysis,
    RepositoryId, RepositoryStatistics,
};

/// A convenience `Result` type for pacminer operations.
pub type Result<T> = std::result::Result<T, PacError>;

//! Co-change analysis between PaC files and the files changed with them.
//!
//! Commits are reduced to sets of file extensions ([`extension`]), counted
//! ([`stats`]) and mined for PaC → other association rules ([`rules`]).

pub mod extension;
pub mod report;
pub mod rules;
pub mod stats;

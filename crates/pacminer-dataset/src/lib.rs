//! Dataset assembly: merging per-repository results, validating them and
//! exporting PaC commits for inspection.
//!
//! - [`merge`] folds result files into one [`merge::AnalysisDataset`]
//! - [`validate`] discovers result files and checks their shape
//! - [`inspect`] samples PaC commits into a CSV file

pub mod inspect;
pub mod merge;
pub mod validate;

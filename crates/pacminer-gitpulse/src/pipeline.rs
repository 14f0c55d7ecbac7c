//! Per-repository pipeline: extract, classify, aggregate.
//!
//! Each repository is analyzed independently against a shared read-only
//! [`MembershipIndex`]. A failing repository becomes a [`RepositoryFailure`]
//! value and the run moves on.

use std::io::Read;
use std::path::{Path, PathBuf};

use pacminer_core::{PacError, RepositoryAnalysis, RepositoryId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate_repository;
use crate::classify::classify_commit;
use crate::membership::MembershipIndex;
use crate::mining::{extract_history, ExtractOptions};

/// One repository to analyze.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryJob {
    /// Identifier matching the registry's `repo_id` column.
    pub id: RepositoryId,
    /// `owner/name`.
    pub full_name: String,
    /// Local clone to read history from.
    pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RepositoryRow {
    id: RepositoryId,
    full_name: String,
}

/// A repository whose analysis was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryFailure {
    /// Identifier from the repository list.
    pub repository_id: RepositoryId,
    /// `owner/name` as listed.
    pub full_name: String,
    /// Rendered error that aborted the analysis.
    pub reason: String,
}

/// Everything a batch run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Successful analyses, in job order.
    pub results: Vec<RepositoryAnalysis>,
    /// Aborted repositories, in job order.
    pub failures: Vec<RepositoryFailure>,
}

impl RunOutcome {
    /// Whether no repository was analyzed successfully.
    pub fn is_total_failure(&self) -> bool {
        self.results.is_empty() && !self.failures.is_empty()
    }
}

/// Load the repository list CSV at `path`, resolving clones under `repos_dir`.
///
/// `repository_no` selects a single 1-based row.
///
/// # Errors
///
/// Returns [`PacError::FileNotFound`] if the list does not exist,
/// [`PacError::Csv`] if a row cannot be parsed, or [`PacError::Config`] if
/// `repository_no` is out of range.
pub fn load_repository_list(
    path: &Path,
    repos_dir: &Path,
    repository_no: Option<usize>,
) -> Result<Vec<RepositoryJob>, PacError> {
    if !path.exists() {
        return Err(PacError::FileNotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path)?;
    let jobs = parse_repository_list(file, repos_dir)?;
    select_repository(jobs, repository_no)
}

/// Parse a repository list with `id` and `full_name` columns.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pacminer_gitpulse::pipeline::parse_repository_list;
///
/// let csv = "id,full_name,stars\n7,acme/policies,12\n";
/// let jobs = parse_repository_list(csv.as_bytes(), Path::new("repos")).unwrap();
/// assert_eq!(jobs[0].id, 7);
/// assert_eq!(jobs[0].path, Path::new("repos/acme/policies"));
/// ```
pub fn parse_repository_list<R: Read>(
    reader: R,
    repos_dir: &Path,
) -> Result<Vec<RepositoryJob>, PacError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut jobs = Vec::new();
    for (row, record) in csv_reader.deserialize::<RepositoryRow>().enumerate() {
        let record = record.map_err(|e| PacError::Csv(format!("row {}: {e}", row + 1)))?;
        jobs.push(RepositoryJob {
            id: record.id,
            path: repos_dir.join(&record.full_name),
            full_name: record.full_name,
        });
    }
    Ok(jobs)
}

fn select_repository(
    jobs: Vec<RepositoryJob>,
    repository_no: Option<usize>,
) -> Result<Vec<RepositoryJob>, PacError> {
    let Some(number) = repository_no else {
        return Ok(jobs);
    };
    let total = jobs.len();
    match number.checked_sub(1).and_then(|idx| jobs.into_iter().nth(idx)) {
        Some(job) => Ok(vec![job]),
        None => Err(PacError::Config(format!(
            "repository number {number} out of range (1..={total})"
        ))),
    }
}

/// Run extraction, classification and aggregation for one repository.
///
/// Everything logged while the repository is analyzed carries its
/// `repository_id` and `repository` through a span.
///
/// # Errors
///
/// Returns [`PacError::Git`] if the history cannot be read, or
/// [`PacError::InvalidRecord`] if a commit fails classification.
pub fn analyze_repository(
    job: &RepositoryJob,
    index: &MembershipIndex,
) -> Result<RepositoryAnalysis, PacError> {
    let span = tracing::info_span!(
        "repository",
        repository_id = job.id,
        repository = %job.full_name
    );
    let _entered = span.enter();

    let raw_commits = extract_history(&job.path, &ExtractOptions::default())?;
    let commits = raw_commits
        .into_iter()
        .map(|raw| classify_commit(raw, job.id, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate_repository(job.id, &job.full_name, commits))
}

/// Analyze every job, optionally on the rayon thread pool.
///
/// `on_done` is called once per finished job, from whichever thread ran it.
pub fn analyze_repositories<F>(
    jobs: &[RepositoryJob],
    index: &MembershipIndex,
    parallel: bool,
    on_done: F,
) -> RunOutcome
where
    F: Fn(&RepositoryJob) + Sync,
{
    let run_one = |job: &RepositoryJob| {
        let result = analyze_repository(job, index);
        on_done(job);
        result
    };

    let results: Vec<Result<RepositoryAnalysis, PacError>> = if parallel {
        jobs.par_iter().map(run_one).collect()
    } else {
        jobs.iter().map(run_one).collect()
    };

    let mut outcome = RunOutcome::default();
    for (job, result) in jobs.iter().zip(results) {
        match result {
            Ok(analysis) => outcome.results.push(analysis),
            Err(e) => {
                tracing::error!(
                    repository_id = job.id,
                    repository = %job.full_name,
                    error = %e,
                    "repository analysis failed"
                );
                outcome.failures.push(RepositoryFailure {
                    repository_id: job.id,
                    full_name: job.full_name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        succeeded = outcome.results.len(),
        failed = outcome.failures.len(),
        "analysis run finished"
    );
    outcome
}

//! Cross-repository merge.
//!
//! Folds per-repository result files into one [`AnalysisDataset`] with a
//! recomputed summary. Malformed sources are recorded as failures and left
//! out; repositories are concatenated as they come.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pacminer_core::{ratio, PacError, RepositoryAnalysis, RepositoryId};
use serde::{Deserialize, Serialize};

/// The persisted dataset: run metadata plus every repository's analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDataset {
    /// How the dataset was produced and its summary.
    pub metadata: DatasetMetadata,
    /// Every repository, in source order.
    pub repositories: Vec<RepositoryAnalysis>,
}

/// Run metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// When the dataset was written.
    pub generated_at: DateTime<Utc>,
    /// Wall-clock time of the collect run, absent for merged datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    /// Every source considered, accepted or not.
    #[serde(default)]
    pub source_files: Vec<String>,
    /// Sources left out and why.
    #[serde(default)]
    pub failed_files: Vec<SourceFailure>,
    #[serde(default)]
    pub total_source_files: usize,
    #[serde(default)]
    pub successful_files: usize,
    /// Length of `repositories`, duplicates included.
    #[serde(default)]
    pub total_repositories: usize,
    /// Repository ids present more than once in `repositories`.
    #[serde(default)]
    pub duplicate_repositories: Vec<RepositoryId>,
    /// Totals recomputed over `repositories`.
    #[serde(default)]
    pub summary: DatasetSummary,
}

/// A source left out of the dataset and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFailure {
    /// File path, or `owner/name` for a failed repository.
    pub source: String,
    pub reason: String,
}

/// Totals and ratios over every repository in the dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_commits: usize,
    /// Counted PaC file changes.
    pub total_pac_changes: usize,
    /// Commits with at least one counted PaC change.
    pub total_pac_commits: usize,
    /// `total_pac_changes / total_commits`.
    pub pac_change_ratio: f64,
    /// `total_pac_commits / total_commits`.
    pub pac_commit_ratio: f64,
}

impl DatasetSummary {
    /// Recompute totals over `repositories`.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacminer_dataset::merge::DatasetSummary;
    ///
    /// let summary = DatasetSummary::from_repositories(&[]);
    /// assert_eq!(summary.total_commits, 0);
    /// assert_eq!(summary.pac_change_ratio, 0.0);
    /// ```
    pub fn from_repositories(repositories: &[RepositoryAnalysis]) -> Self {
        let total_commits = repositories.iter().map(|r| r.total_commits).sum();
        let total_pac_changes = repositories.iter().map(|r| r.pac_changes_count).sum();
        let total_pac_commits = repositories.iter().map(|r| r.pac_commits_count).sum();
        Self {
            total_commits,
            total_pac_changes,
            total_pac_commits,
            pac_change_ratio: ratio(total_pac_changes, total_commits),
            pac_commit_ratio: ratio(total_pac_commits, total_commits),
        }
    }
}

impl AnalysisDataset {
    /// Dataset for a single collection run.
    ///
    /// `failures` are repositories that could not be analyzed; each shows up
    /// in `failed_files` under its own name.
    pub fn from_run(
        repositories: Vec<RepositoryAnalysis>,
        failures: Vec<SourceFailure>,
        duration: Option<Duration>,
    ) -> Self {
        let source_files = repositories
            .iter()
            .map(|r| r.project_name.clone())
            .chain(failures.iter().map(|f| f.source.clone()))
            .collect();
        let mut dataset = build(source_files, failures, repositories);
        dataset.metadata.duration_secs = duration.map(|d| d.as_secs_f64());
        dataset
    }

    /// Parse a dataset or per-repository result document.
    ///
    /// Only the presence of `metadata` is checked; its content is not
    /// interpreted, so files written by older runs still load.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::InvalidRecord`] if either top-level field is
    /// missing, or [`PacError::Serialization`] if the repositories do not
    /// parse.
    pub fn repositories_from_json(json: &str) -> Result<Vec<RepositoryAnalysis>, PacError> {
        let document: ResultDocument = serde_json::from_str(json)?;
        if document.metadata.is_none() {
            return Err(PacError::InvalidRecord("missing 'metadata' field".into()));
        }
        let repositories = document
            .repositories
            .ok_or_else(|| PacError::InvalidRecord("missing 'repositories' field".into()))?;
        Ok(serde_json::from_value(repositories)?)
    }

    /// Load the repositories of a dataset file.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::FileNotFound`] if `path` does not exist, plus the
    /// errors of [`AnalysisDataset::repositories_from_json`].
    pub fn load_repositories(path: &Path) -> Result<Vec<RepositoryAnalysis>, PacError> {
        if !path.exists() {
            return Err(PacError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::repositories_from_json(&content)
    }

    /// Write the dataset as pretty JSON, creating parent directories.
    pub fn write_to(&self, path: &Path) -> Result<(), PacError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl fmt::Display for DatasetMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Dataset Summary")?;
        writeln!(f, "===============")?;
        writeln!(f, "Generated:        {}", self.generated_at.to_rfc3339())?;
        if let Some(secs) = self.duration_secs {
            writeln!(f, "Duration:         {secs:.1}s")?;
        }
        writeln!(
            f,
            "Sources:          {} ({} ok, {} failed)",
            self.total_source_files,
            self.successful_files,
            self.failed_files.len()
        )?;
        writeln!(f, "Repositories:     {}", self.total_repositories)?;
        writeln!(f, "Commits:          {}", s.total_commits)?;
        writeln!(
            f,
            "PaC changes:      {} (ratio {:.4})",
            s.total_pac_changes, s.pac_change_ratio
        )?;
        writeln!(
            f,
            "PaC commits:      {} (ratio {:.4})",
            s.total_pac_commits, s.pac_commit_ratio
        )?;
        if !self.duplicate_repositories.is_empty() {
            writeln!(f, "Duplicate ids:    {:?}", self.duplicate_repositories)?;
        }
        for failure in &self.failed_files {
            writeln!(f, "  failed: {} ({})", failure.source, failure.reason)?;
        }
        Ok(())
    }
}

impl DatasetMetadata {
    /// Render the summary as a markdown string.
    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        out.push_str("# Dataset Summary\n\n");
        out.push_str("| Metric | Value |\n|--------|-------|\n");
        out.push_str(&format!("| Sources | {} |\n", self.total_source_files));
        out.push_str(&format!("| Failed sources | {} |\n", self.failed_files.len()));
        out.push_str(&format!("| Repositories | {} |\n", self.total_repositories));
        out.push_str(&format!("| Commits | {} |\n", s.total_commits));
        out.push_str(&format!("| PaC changes | {} |\n", s.total_pac_changes));
        out.push_str(&format!("| PaC commits | {} |\n", s.total_pac_commits));
        out.push_str(&format!("| PaC change ratio | {:.4} |\n", s.pac_change_ratio));
        out.push_str(&format!("| PaC commit ratio | {:.4} |\n", s.pac_commit_ratio));
        if !self.failed_files.is_empty() {
            out.push_str("\n## Failed sources\n\n");
            for failure in &self.failed_files {
                out.push_str(&format!("- `{}`: {}\n", failure.source, failure.reason));
            }
        }
        out
    }
}

/// Loose view of a result document used to check its top-level shape.
#[derive(Deserialize)]
struct ResultDocument {
    metadata: Option<serde_json::Value>,
    repositories: Option<serde_json::Value>,
}

/// Accumulates result sources into a dataset.
///
/// # Examples
///
/// ```
/// use pacminer_dataset::merge::DatasetMerger;
///
/// let mut merger = DatasetMerger::new();
/// merger.add_json("good.json", r#"{"metadata": {}, "repositories": []}"#);
/// merger.add_json("bad.json", r#"{"repositories": []}"#);
/// let dataset = merger.finish().unwrap();
/// assert_eq!(dataset.metadata.successful_files, 1);
/// assert_eq!(dataset.metadata.failed_files[0].source, "bad.json");
/// ```
#[derive(Debug, Default)]
pub struct DatasetMerger {
    sources: Vec<String>,
    failures: Vec<SourceFailure>,
    repositories: Vec<RepositoryAnalysis>,
}

impl DatasetMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one parsed source.
    pub fn add_repositories(&mut self, source: &str, repositories: Vec<RepositoryAnalysis>) {
        tracing::debug!(source, repositories = repositories.len(), "merged source");
        self.sources.push(source.to_string());
        self.repositories.extend(repositories);
    }

    /// Add another dataset's repositories.
    pub fn add_dataset(&mut self, source: &str, dataset: AnalysisDataset) {
        self.add_repositories(source, dataset.repositories);
    }

    /// Parse and add a JSON source. Returns whether it was accepted.
    pub fn add_json(&mut self, source: &str, json: &str) -> bool {
        match AnalysisDataset::repositories_from_json(json) {
            Ok(repositories) => {
                self.add_repositories(source, repositories);
                true
            }
            Err(e) => {
                self.reject(source, e.to_string());
                false
            }
        }
    }

    /// Read and add a JSON file. Returns whether it was accepted.
    pub fn add_file(&mut self, path: &Path) -> bool {
        let source = path.display().to_string();
        match std::fs::read_to_string(path) {
            Ok(json) => self.add_json(&source, &json),
            Err(e) => {
                self.reject(&source, format!("failed to read: {e}"));
                false
            }
        }
    }

    fn reject(&mut self, source: &str, reason: String) {
        tracing::warn!(source, reason = %reason, "skipping malformed result source");
        self.sources.push(source.to_string());
        self.failures.push(SourceFailure {
            source: source.to_string(),
            reason,
        });
    }

    /// Build the merged dataset.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::NoValidSources`] if sources were added and every
    /// one of them failed.
    pub fn finish(self) -> Result<AnalysisDataset, PacError> {
        if !self.sources.is_empty() && self.failures.len() == self.sources.len() {
            return Err(PacError::NoValidSources {
                failed: self.failures.len(),
            });
        }
        let dataset = build(self.sources, self.failures, self.repositories);
        tracing::info!(
            sources = dataset.metadata.total_source_files,
            failed = dataset.metadata.failed_files.len(),
            repositories = dataset.metadata.total_repositories,
            "merged result sources"
        );
        Ok(dataset)
    }
}

fn build(
    source_files: Vec<String>,
    failed_files: Vec<SourceFailure>,
    repositories: Vec<RepositoryAnalysis>,
) -> AnalysisDataset {
    let duplicate_repositories = find_duplicates(&repositories);
    let metadata = DatasetMetadata {
        generated_at: Utc::now(),
        duration_secs: None,
        total_source_files: source_files.len(),
        successful_files: source_files.len() - failed_files.len(),
        total_repositories: repositories.len(),
        summary: DatasetSummary::from_repositories(&repositories),
        source_files,
        failed_files,
        duplicate_repositories,
    };
    AnalysisDataset {
        metadata,
        repositories,
    }
}

/// Ids that occur more than once, ascending. They are reported, not removed.
fn find_duplicates(repositories: &[RepositoryAnalysis]) -> Vec<RepositoryId> {
    let mut seen: BTreeMap<RepositoryId, usize> = BTreeMap::new();
    for repo in repositories {
        *seen.entry(repo.repository_id).or_default() += 1;
    }
    let duplicates: Vec<RepositoryId> = seen
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(id, _)| id)
        .collect();
    for id in &duplicates {
        tracing::warn!(repository_id = id, "repository appears in more than one source");
    }
    duplicates
}

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PacError;

/// Identifier of a repository in the input registry.
pub type RepositoryId = u64;

/// Status of a file change within a commit.
///
/// # Examples
///
/// ```
/// use pacminer_core::ChangeStatus;
///
/// assert!(ChangeStatus::Modified.is_maintenance());
/// assert!(!ChangeStatus::Added.is_maintenance());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// New file.
    Added,
    /// File removed.
    Deleted,
    /// Existing file modified.
    Modified,
    /// File renamed from another path.
    Renamed,
    /// File copied from another path.
    Copied,
}

impl ChangeStatus {
    /// Returns `true` for edits of a pre-existing file.
    ///
    /// Introductions (`Added`) and removals (`Deleted`) are not maintenance.
    pub fn is_maintenance(self) -> bool {
        matches!(
            self,
            ChangeStatus::Modified | ChangeStatus::Renamed | ChangeStatus::Copied
        )
    }
}

impl fmt::Display for ChangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeStatus::Added => write!(f, "added"),
            ChangeStatus::Deleted => write!(f, "deleted"),
            ChangeStatus::Modified => write!(f, "modified"),
            ChangeStatus::Renamed => write!(f, "renamed"),
            ChangeStatus::Copied => write!(f, "copied"),
        }
    }
}

/// A single file touched by a commit.
///
/// # Examples
///
/// ```
/// use pacminer_core::{ChangeRecord, ChangeStatus};
///
/// let change = ChangeRecord {
///     file_path: "policy/main.rego".into(),
///     additions: 5,
///     deletions: 1,
///     status: ChangeStatus::Modified,
/// };
/// assert_eq!(change.total_changes(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// File path relative to the repository root.
    #[serde(rename = "file", alias = "file_path")]
    pub file_path: String,
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// Type of change.
    pub status: ChangeStatus,
}

impl ChangeRecord {
    /// `additions + deletions`.
    pub fn total_changes(&self) -> u64 {
        self.additions + self.deletions
    }
}

/// A commit as extracted from history, before classification.
///
/// # Examples
///
/// ```
/// use pacminer_core::RawCommit;
///
/// let raw = RawCommit {
///     commit_id: "3f2a9c1d".into(),
///     author: "alice".into(),
///     author_email: "alice@example.com".into(),
///     message: "tighten policy".into(),
///     timestamp: 1_700_000_000,
///     files: vec![],
///     changes: vec![],
/// };
/// assert!(raw.files.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCommit {
    /// Full hex object id.
    pub commit_id: String,
    /// Author name.
    pub author: String,
    /// Author email.
    pub author_email: String,
    /// Full commit message.
    pub message: String,
    /// Commit time in Unix seconds.
    pub timestamp: i64,
    /// Paths touched, in diff order.
    pub files: Vec<String>,
    /// One record per touched path.
    pub changes: Vec<ChangeRecord>,
}

/// A classified commit.
///
/// The PaC and other partitions are fixed at construction; the type exposes
/// no way to change them afterwards. Both partitions are disjoint and hold
/// only maintenance changes (see [`ChangeStatus::is_maintenance`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CommitRecord", into = "CommitRecord")]
pub struct Commit {
    commit_id: String,
    author: String,
    author_email: String,
    message: String,
    timestamp: i64,
    files: Vec<String>,
    changes: Vec<ChangeRecord>,
    pac_changes: Vec<ChangeRecord>,
    other_changes: Vec<ChangeRecord>,
    total_added_lines: u64,
    total_deleted_lines: u64,
}

impl Commit {
    /// Build a classified commit from its extracted form and both partitions.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::InvalidRecord`] if a path appears in both partitions
    /// or a partition holds an `Added`/`Deleted` change.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacminer_core::{ChangeRecord, ChangeStatus, Commit, RawCommit};
    ///
    /// let change = ChangeRecord {
    ///     file_path: "main.rego".into(),
    ///     additions: 2,
    ///     deletions: 1,
    ///     status: ChangeStatus::Modified,
    /// };
    /// let raw = RawCommit {
    ///     commit_id: "abc".into(),
    ///     author: "alice".into(),
    ///     author_email: "alice@example.com".into(),
    ///     message: "edit".into(),
    ///     timestamp: 0,
    ///     files: vec!["main.rego".into()],
    ///     changes: vec![change.clone()],
    /// };
    /// let commit = Commit::new(raw, vec![change], vec![]).unwrap();
    /// assert!(commit.has_pac_changes());
    /// assert_eq!(commit.pac_added_lines(), 2);
    /// ```
    pub fn new(
        raw: RawCommit,
        pac_changes: Vec<ChangeRecord>,
        other_changes: Vec<ChangeRecord>,
    ) -> Result<Self, PacError> {
        let total_added_lines = raw.changes.iter().map(|c| c.additions).sum();
        let total_deleted_lines = raw.changes.iter().map(|c| c.deletions).sum();
        let commit = Self {
            commit_id: raw.commit_id,
            author: raw.author,
            author_email: raw.author_email,
            message: raw.message,
            timestamp: raw.timestamp,
            files: raw.files,
            changes: raw.changes,
            pac_changes,
            other_changes,
            total_added_lines,
            total_deleted_lines,
        };
        commit.check_partitions()?;
        Ok(commit)
    }

    fn check_partitions(&self) -> Result<(), PacError> {
        let mut seen = HashSet::new();
        for change in self.pac_changes.iter().chain(&self.other_changes) {
            if !change.status.is_maintenance() {
                return Err(PacError::InvalidRecord(format!(
                    "commit {}: {} change to {} cannot be counted",
                    self.commit_id, change.status, change.file_path
                )));
            }
            if !seen.insert(change.file_path.as_str()) {
                return Err(PacError::InvalidRecord(format!(
                    "commit {}: {} is counted twice",
                    self.commit_id, change.file_path
                )));
            }
        }
        Ok(())
    }

    /// Full hex object id.
    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }

    /// Author name.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Author email.
    pub fn author_email(&self) -> &str {
        &self.author_email
    }

    /// Full commit message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Commit time in Unix seconds.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Paths touched, in diff order.
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Every change record, counted or not.
    pub fn changes(&self) -> &[ChangeRecord] {
        &self.changes
    }

    /// Maintenance changes to PaC files.
    pub fn pac_changes(&self) -> &[ChangeRecord] {
        &self.pac_changes
    }

    /// Maintenance changes to all other files.
    pub fn other_changes(&self) -> &[ChangeRecord] {
        &self.other_changes
    }

    /// Whether at least one PaC file was maintained.
    pub fn has_pac_changes(&self) -> bool {
        !self.pac_changes.is_empty()
    }

    /// Lines added across counted PaC changes.
    pub fn pac_added_lines(&self) -> u64 {
        self.pac_changes.iter().map(|c| c.additions).sum()
    }

    /// Lines deleted across counted PaC changes.
    pub fn pac_deleted_lines(&self) -> u64 {
        self.pac_changes.iter().map(|c| c.deletions).sum()
    }

    /// Lines added across every touched file.
    pub fn total_added_lines(&self) -> u64 {
        self.total_added_lines
    }

    /// Lines deleted across every touched file.
    pub fn total_deleted_lines(&self) -> u64 {
        self.total_deleted_lines
    }
}

/// On-disk shape of a [`Commit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CommitRecord {
    commit_id: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    author_email: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    date: i64,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    changes: Vec<ChangeRecord>,
    #[serde(default)]
    pac_changes: Vec<ChangeRecord>,
    #[serde(default)]
    other_changes: Vec<ChangeRecord>,
    #[serde(default)]
    has_pac_changes: bool,
    #[serde(default)]
    pac_added_lines: u64,
    #[serde(default)]
    pac_deleted_lines: u64,
    #[serde(default)]
    total_added_lines: u64,
    #[serde(default)]
    total_deleted_lines: u64,
}

impl From<Commit> for CommitRecord {
    fn from(commit: Commit) -> Self {
        Self {
            has_pac_changes: commit.has_pac_changes(),
            pac_added_lines: commit.pac_added_lines(),
            pac_deleted_lines: commit.pac_deleted_lines(),
            total_added_lines: commit.total_added_lines,
            total_deleted_lines: commit.total_deleted_lines,
            commit_id: commit.commit_id,
            author: commit.author,
            author_email: commit.author_email,
            message: commit.message,
            date: commit.timestamp,
            files: commit.files,
            changes: commit.changes,
            pac_changes: commit.pac_changes,
            other_changes: commit.other_changes,
        }
    }
}

impl TryFrom<CommitRecord> for Commit {
    type Error = PacError;

    fn try_from(record: CommitRecord) -> Result<Self, Self::Error> {
        // Older files omit `changes`; keep their stored totals in that case.
        let (total_added_lines, total_deleted_lines) = if record.changes.is_empty() {
            (record.total_added_lines, record.total_deleted_lines)
        } else {
            (
                record.changes.iter().map(|c| c.additions).sum(),
                record.changes.iter().map(|c| c.deletions).sum(),
            )
        };
        let commit = Self {
            commit_id: record.commit_id,
            author: record.author,
            author_email: record.author_email,
            message: record.message,
            timestamp: record.date,
            files: record.files,
            changes: record.changes,
            pac_changes: record.pac_changes,
            other_changes: record.other_changes,
            total_added_lines,
            total_deleted_lines,
        };
        commit.check_partitions()?;
        Ok(commit)
    }
}

/// Line totals for one repository.
///
/// Missing from older result files, hence `Default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatistics {
    /// Lines added across every change.
    pub total_added_lines: u64,
    /// Lines deleted across every change.
    pub total_deleted_lines: u64,
    /// `total_added_lines + total_deleted_lines`.
    pub total_modified_lines: u64,
    /// Lines added across counted PaC changes.
    pub pac_added_lines: u64,
    /// Lines deleted across counted PaC changes.
    pub pac_deleted_lines: u64,
    /// `pac_added_lines + pac_deleted_lines`.
    pub pac_modified_lines: u64,
}

/// Maintenance summary for one repository.
///
/// # Examples
///
/// ```
/// use pacminer_core::{RepositoryAnalysis, RepositoryStatistics};
///
/// let analysis = RepositoryAnalysis {
///     repository_id: 7,
///     project_name: "open-policy-agent/opa".into(),
///     owner_name: Some("open-policy-agent".into()),
///     repository_name: Some("opa".into()),
///     total_commits: 0,
///     pac_changes_count: 0,
///     pac_commits_count: 0,
///     pac_change_ratio: 0.0,
///     commits: vec![],
///     statistics: RepositoryStatistics::default(),
/// };
/// assert_eq!(analysis.pac_change_ratio, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryAnalysis {
    /// Identifier from the repository list.
    pub repository_id: RepositoryId,
    /// `owner/name` as listed.
    pub project_name: String,
    /// Owner half of `project_name`, if it has one.
    #[serde(default)]
    pub owner_name: Option<String>,
    /// Name half of `project_name`, if it has one.
    #[serde(default)]
    pub repository_name: Option<String>,
    /// Number of non-merge commits analyzed.
    pub total_commits: usize,
    /// Counted PaC file changes across all commits.
    pub pac_changes_count: usize,
    /// Commits with at least one counted PaC change.
    pub pac_commits_count: usize,
    /// `pac_changes_count / total_commits`, or 0 with no commits.
    pub pac_change_ratio: f64,
    /// Classified commits.
    #[serde(default)]
    pub commits: Vec<Commit>,
    /// Line totals.
    #[serde(default)]
    pub statistics: RepositoryStatistics,
}

/// Divide, defining `x / 0` as `0`.
///
/// # Examples
///
/// ```
/// use pacminer_core::ratio;
///
/// assert_eq!(ratio(1, 4), 0.25);
/// assert_eq!(ratio(3, 0), 0.0);
/// ```
pub fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use pacminer_core::OutputFormat;
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, status: ChangeStatus) -> ChangeRecord {
        ChangeRecord {
            file_path: path.into(),
            additions: 3,
            deletions: 1,
            status,
        }
    }

    fn raw(changes: Vec<ChangeRecord>) -> RawCommit {
        RawCommit {
            commit_id: "c0ffee".into(),
            author: "alice".into(),
            author_email: "alice@example.com".into(),
            message: "update".into(),
            timestamp: 1_700_000_000,
            files: changes.iter().map(|c| c.file_path.clone()).collect(),
            changes,
        }
    }

    #[test]
    fn maintenance_statuses() {
        assert!(ChangeStatus::Modified.is_maintenance());
        assert!(ChangeStatus::Renamed.is_maintenance());
        assert!(ChangeStatus::Copied.is_maintenance());
        assert!(!ChangeStatus::Added.is_maintenance());
        assert!(!ChangeStatus::Deleted.is_maintenance());
    }

    #[test]
    fn commit_rejects_added_change_in_partition() {
        let added = change("policy.rego", ChangeStatus::Added);
        let err = Commit::new(raw(vec![added.clone()]), vec![added], vec![]).unwrap_err();
        assert!(matches!(err, PacError::InvalidRecord(_)));
    }

    #[test]
    fn commit_rejects_overlapping_partitions() {
        let modified = change("policy.rego", ChangeStatus::Modified);
        let result = Commit::new(
            raw(vec![modified.clone()]),
            vec![modified.clone()],
            vec![modified],
        );
        assert!(result.is_err());
    }

    #[test]
    fn commit_totals_cover_every_change() {
        let changes = vec![
            change("a.rego", ChangeStatus::Modified),
            change("b.go", ChangeStatus::Added),
        ];
        let pac = vec![changes[0].clone()];
        let commit = Commit::new(raw(changes), pac, vec![]).unwrap();
        assert_eq!(commit.total_added_lines(), 6);
        assert_eq!(commit.total_deleted_lines(), 2);
        assert_eq!(commit.pac_added_lines(), 3);
        assert_eq!(commit.pac_deleted_lines(), 1);
    }

    #[test]
    fn commit_serializes_derived_fields() {
        let modified = change("policy.rego", ChangeStatus::Modified);
        let commit = Commit::new(raw(vec![modified.clone()]), vec![modified], vec![]).unwrap();
        let json = serde_json::to_value(&commit).unwrap();
        assert_eq!(json["has_pac_changes"], true);
        assert_eq!(json["pac_added_lines"], 3);
        assert_eq!(json["date"], 1_700_000_000);
        assert_eq!(json["pac_changes"][0]["file"], "policy.rego");
        assert_eq!(json["pac_changes"][0]["status"], "modified");
    }

    #[test]
    fn commit_without_changes_keeps_stored_totals() {
        let json = serde_json::json!({
            "commit_id": "abc",
            "author": "bob",
            "date": 10,
            "files": ["main.go"],
            "other_changes": [
                {"file": "main.go", "additions": 4, "deletions": 2, "status": "modified"}
            ],
            "total_added_lines": 4,
            "total_deleted_lines": 2
        });
        let commit: Commit = serde_json::from_value(json).unwrap();
        assert_eq!(commit.total_added_lines(), 4);
        assert!(!commit.has_pac_changes());
        assert_eq!(commit.other_changes().len(), 1);
    }

    #[test]
    fn deserializing_invalid_partition_fails() {
        let json = serde_json::json!({
            "commit_id": "abc",
            "pac_changes": [
                {"file": "p.rego", "additions": 1, "deletions": 0, "status": "deleted"}
            ]
        });
        assert!(serde_json::from_value::<Commit>(json).is_err());
    }

    #[test]
    fn ratio_never_divides_by_zero() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(5, 0), 0.0);
        assert!((ratio(1, 3) - 1.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("sarif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn repository_without_statistics_defaults_to_zero() {
        let json = serde_json::json!({
            "repository_id": 1,
            "project_name": "acme/policies",
            "total_commits": 0,
            "pac_changes_count": 0,
            "pac_commits_count": 0,
            "pac_change_ratio": 0.0
        });
        let repo: RepositoryAnalysis = serde_json::from_value(json).unwrap();
        assert_eq!(repo.statistics, RepositoryStatistics::default());
        assert!(repo.commits.is_empty());
        assert!(repo.owner_name.is_none());
    }
}

//! Result file discovery and validation.

use std::fmt;
use std::path::{Path, PathBuf};

use pacminer_core::{ratio, PacError, RepositoryId};
use serde::Serialize;

use crate::merge::AnalysisDataset;

/// File name of the merged dataset, never treated as an input.
pub const AGGREGATED_FILE_NAME: &str = "aggregated_results.json";

/// Find every `*.json` result file under `dir`, sorted by path.
///
/// The merged dataset file is skipped wherever it appears.
///
/// # Errors
///
/// Returns [`PacError::FileNotFound`] if `dir` does not exist.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use pacminer_dataset::validate::find_result_files;
///
/// for path in find_result_files(Path::new("outputs")).unwrap() {
///     println!("{}", path.display());
/// }
/// ```
pub fn find_result_files(dir: &Path) -> Result<Vec<PathBuf>, PacError> {
    if !dir.is_dir() {
        return Err(PacError::FileNotFound(dir.to_path_buf()));
    }

    let pattern = dir.join("**").join("*.json");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern)
        .map_err(|e| PacError::Config(format!("invalid search pattern {pattern}: {e}")))?;

    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => {
                if path.file_name().is_some_and(|name| name == AGGREGATED_FILE_NAME) {
                    continue;
                }
                if path.is_file() {
                    files.push(path);
                }
            }
            Err(e) => {
                tracing::warn!(path = %e.path().display(), error = %e.error(), "unreadable entry");
            }
        }
    }
    files.sort();

    tracing::info!(dir = %dir.display(), files = files.len(), "found result files");
    Ok(files)
}

/// Outcome of checking one result document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ValidationStatus {
    Valid {
        repository_count: usize,
        total_commits: usize,
        pac_changes: usize,
    },
    Invalid {
        reason: String,
    },
    /// An expected result file does not exist.
    Missing,
}

impl ValidationStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

/// Validation outcome for a named source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    /// Path of the checked file.
    pub source: String,
    #[serde(flatten)]
    pub status: ValidationStatus,
}

/// Check that `json` is a usable result document with at least one
/// repository.
///
/// # Examples
///
/// ```
/// use pacminer_dataset::validate::{validate_result, ValidationStatus};
///
/// let status = validate_result("a.json", r#"{"metadata": {}, "repositories": []}"#);
/// assert_eq!(
///     status,
///     ValidationStatus::Invalid { reason: "no repository data found".into() }
/// );
/// ```
pub fn validate_result(source: &str, json: &str) -> ValidationStatus {
    let status = match AnalysisDataset::repositories_from_json(json) {
        Ok(repositories) if repositories.is_empty() => ValidationStatus::Invalid {
            reason: "no repository data found".into(),
        },
        Ok(repositories) => ValidationStatus::Valid {
            repository_count: repositories.len(),
            total_commits: repositories.iter().map(|r| r.total_commits).sum(),
            pac_changes: repositories.iter().map(|r| r.pac_changes_count).sum(),
        },
        Err(PacError::InvalidRecord(reason)) => ValidationStatus::Invalid { reason },
        Err(e) => ValidationStatus::Invalid {
            reason: e.to_string(),
        },
    };
    if let ValidationStatus::Invalid { reason } = &status {
        tracing::debug!(source, reason = %reason, "invalid result file");
    }
    status
}

/// Validate the file at `path`.
pub fn validate_file(path: &Path) -> ValidationReport {
    let source = path.display().to_string();
    let status = match std::fs::read_to_string(path) {
        Ok(json) => validate_result(&source, &json),
        Err(e) => ValidationStatus::Invalid {
            reason: format!("failed to read: {e}"),
        },
    };
    ValidationReport { source, status }
}

/// Where a single-repository collect run writes `owner/name`:
/// `<output_dir>/<owner>/<name>.json`.
///
/// Characters other than alphanumerics, `_`, `-` and `.` become `_`. Returns
/// `None` unless `full_name` has a non-empty owner and name.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pacminer_dataset::validate::repository_output_path;
///
/// assert_eq!(
///     repository_output_path(Path::new("outputs"), "acme/policy kit"),
///     Some(Path::new("outputs/acme/policy_kit.json").to_path_buf())
/// );
/// assert_eq!(repository_output_path(Path::new("outputs"), "no-owner"), None);
/// ```
pub fn repository_output_path(output_dir: &Path, full_name: &str) -> Option<PathBuf> {
    let (owner, name) = full_name.split_once('/')?;
    let owner = safe_file_name(owner)?;
    let name = safe_file_name(name)?;
    Some(output_dir.join(owner).join(format!("{name}.json")))
}

fn safe_file_name(part: &str) -> Option<String> {
    let safe: String = part
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Empty, `.` and `..` would not stay inside the output directory.
    if safe.chars().all(|c| c == '.') {
        None
    } else {
        Some(safe)
    }
}

/// Output state of one listed repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryCheck {
    /// Identifier from the repository list.
    pub repository_id: RepositoryId,
    /// `owner/name` as listed.
    pub full_name: String,
    /// Expected result file, if the name maps to one.
    pub output_file: Option<String>,
    #[serde(flatten)]
    pub status: ValidationStatus,
}

/// Counts and rates over a [`CoverageReport`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageSummary {
    pub total_repositories: usize,
    /// Repositories whose result file exists.
    pub processed_repositories: usize,
    pub valid_outputs: usize,
    pub missing_outputs: usize,
    /// Existing result files that failed validation.
    pub invalid_outputs: usize,
    /// `processed / total`, 0 with no repositories.
    pub processing_rate: f64,
    /// `valid / processed`, 0 with nothing processed.
    pub validation_rate: f64,
}

/// Which listed repositories have a usable result file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub summary: CoverageSummary,
    /// One entry per listed repository, in list order.
    pub repositories: Vec<RepositoryCheck>,
}

/// Check the result file of every `(id, owner/name)` in `expected` under
/// `output_dir`, laid out as [`repository_output_path`] describes.
pub fn check_repository_outputs<'a, I>(expected: I, output_dir: &Path) -> CoverageReport
where
    I: IntoIterator<Item = (RepositoryId, &'a str)>,
{
    let repositories: Vec<RepositoryCheck> = expected
        .into_iter()
        .map(|(repository_id, full_name)| {
            let path = repository_output_path(output_dir, full_name);
            let status = match &path {
                Some(path) if path.is_file() => validate_file(path).status,
                _ => ValidationStatus::Missing,
            };
            RepositoryCheck {
                repository_id,
                full_name: full_name.to_string(),
                output_file: path.map(|p| p.display().to_string()),
                status,
            }
        })
        .collect();

    let total = repositories.len();
    let missing = repositories
        .iter()
        .filter(|r| r.status == ValidationStatus::Missing)
        .count();
    let valid = repositories.iter().filter(|r| r.status.is_valid()).count();
    let processed = total - missing;
    let summary = CoverageSummary {
        total_repositories: total,
        processed_repositories: processed,
        valid_outputs: valid,
        missing_outputs: missing,
        invalid_outputs: processed - valid,
        processing_rate: ratio(processed, total),
        validation_rate: ratio(valid, processed),
    };
    tracing::info!(
        total,
        processed,
        valid,
        missing,
        "checked repository outputs"
    );
    CoverageReport {
        summary,
        repositories,
    }
}

/// Missing repositories listed before the rest are elided.
const MISSING_SHOWN: usize = 10;

impl CoverageReport {
    fn missing(&self) -> impl Iterator<Item = &RepositoryCheck> {
        self.repositories
            .iter()
            .filter(|r| r.status == ValidationStatus::Missing)
    }

    fn invalid(&self) -> impl Iterator<Item = (&RepositoryCheck, &str)> {
        self.repositories.iter().filter_map(|r| match &r.status {
            ValidationStatus::Invalid { reason } => Some((r, reason.as_str())),
            _ => None,
        })
    }

    /// Render the report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let share = |n: usize| ratio(n, s.total_repositories) * 100.0;
        let mut out = String::new();
        out.push_str("# Output Coverage\n\n");
        out.push_str("| | Repositories | Share |\n");
        out.push_str("|---|---|---|\n");
        for (label, n) in [
            ("Listed", s.total_repositories),
            ("Processed", s.processed_repositories),
            ("Valid", s.valid_outputs),
            ("Missing", s.missing_outputs),
            ("Invalid", s.invalid_outputs),
        ] {
            out.push_str(&format!("| {label} | {n} | {:.1}% |\n", share(n)));
        }
        out.push_str(&format!(
            "\nValidation rate: **{:.1}%**\n",
            s.validation_rate * 100.0
        ));

        if s.missing_outputs > 0 {
            out.push_str("\n## Missing\n\n");
            for check in self.missing() {
                out.push_str(&format!(
                    "- `{}` (id {})\n",
                    check.full_name, check.repository_id
                ));
            }
        }
        if s.invalid_outputs > 0 {
            out.push_str("\n## Invalid\n\n");
            for (check, reason) in self.invalid() {
                out.push_str(&format!("- `{}`: {reason}\n", check.full_name));
            }
        }
        out
    }
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        let share = |n: usize| ratio(n, s.total_repositories) * 100.0;
        writeln!(f, "Output Coverage")?;
        writeln!(f, "===============")?;
        writeln!(f, "Listed repositories:  {}", s.total_repositories)?;
        writeln!(
            f,
            "Processed:            {} ({:.1}%)",
            s.processed_repositories,
            share(s.processed_repositories)
        )?;
        writeln!(
            f,
            "Valid outputs:        {} ({:.1}%)",
            s.valid_outputs,
            share(s.valid_outputs)
        )?;
        writeln!(
            f,
            "Missing outputs:      {} ({:.1}%)",
            s.missing_outputs,
            share(s.missing_outputs)
        )?;
        writeln!(
            f,
            "Invalid outputs:      {} ({:.1}%)",
            s.invalid_outputs,
            share(s.invalid_outputs)
        )?;
        writeln!(f, "Validation rate:      {:.1}%", s.validation_rate * 100.0)?;

        if s.missing_outputs > 0 {
            writeln!(f, "\nMissing repositories")?;
            for check in self.missing().take(MISSING_SHOWN) {
                writeln!(f, "  {} (id {})", check.full_name, check.repository_id)?;
            }
            if s.missing_outputs > MISSING_SHOWN {
                writeln!(f, "  ... and {} more", s.missing_outputs - MISSING_SHOWN)?;
            }
        }
        if s.invalid_outputs > 0 {
            writeln!(f, "\nInvalid outputs")?;
            for (check, reason) in self.invalid() {
                writeln!(f, "  {}: {reason}", check.full_name)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "metadata": {},
        "repositories": [
            {"repository_id": 1, "project_name": "acme/a", "total_commits": 10,
             "pac_changes_count": 3, "pac_commits_count": 2, "pac_change_ratio": 0.3},
            {"repository_id": 2, "project_name": "acme/b", "total_commits": 5,
             "pac_changes_count": 1, "pac_commits_count": 1, "pac_change_ratio": 0.2}
        ]
    }"#;

    #[test]
    fn valid_result_reports_totals() {
        assert_eq!(
            validate_result("x.json", VALID),
            ValidationStatus::Valid {
                repository_count: 2,
                total_commits: 15,
                pac_changes: 4,
            }
        );
    }

    #[test]
    fn missing_fields_are_named() {
        let status = validate_result("x.json", r#"{"repositories": []}"#);
        assert_eq!(
            status,
            ValidationStatus::Invalid {
                reason: "missing 'metadata' field".into()
            }
        );
        let status = validate_result("x.json", r#"{"metadata": {}}"#);
        assert_eq!(
            status,
            ValidationStatus::Invalid {
                reason: "missing 'repositories' field".into()
            }
        );
    }

    #[test]
    fn parse_errors_are_invalid() {
        assert!(!validate_result("x.json", "{").is_valid());
    }

    #[test]
    fn discovery_is_recursive_sorted_and_skips_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("acme_b")).unwrap();
        std::fs::write(dir.path().join("acme_b/b.json"), VALID).unwrap();
        std::fs::write(dir.path().join("a.json"), VALID).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        std::fs::write(dir.path().join(AGGREGATED_FILE_NAME), VALID).unwrap();

        let files = find_result_files(dir.path()).unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a.json"), dir.path().join("acme_b/b.json")]
        );
    }

    #[test]
    fn empty_directory_yields_no_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_result_files(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_result_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, PacError::FileNotFound(_)));
    }

    #[test]
    fn unreadable_file_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let report = validate_file(&dir.path().join("gone.json"));
        assert!(!report.status.is_valid());
        assert!(report.source.ends_with("gone.json"));
    }

    #[test]
    fn output_path_sanitizes_owner_and_name() {
        let dir = Path::new("out");
        assert_eq!(
            repository_output_path(dir, "my org/repo:v2"),
            Some(dir.join("my_org").join("repo_v2.json"))
        );
        // Extra slashes stay inside the name.
        assert_eq!(
            repository_output_path(dir, "acme/a/b"),
            Some(dir.join("acme").join("a_b.json"))
        );
        assert_eq!(repository_output_path(dir, "acme/"), None);
        assert_eq!(repository_output_path(dir, "../x"), None);
    }

    #[test]
    fn coverage_reports_valid_invalid_and_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("acme")).unwrap();
        std::fs::write(dir.path().join("acme/a.json"), VALID).unwrap();
        std::fs::write(dir.path().join("acme/b.json"), "{").unwrap();

        let report = check_repository_outputs(
            [(1, "acme/a"), (2, "acme/b"), (3, "acme/c"), (4, "no-owner")],
            dir.path(),
        );

        let statuses: Vec<&ValidationStatus> =
            report.repositories.iter().map(|r| &r.status).collect();
        assert!(statuses[0].is_valid());
        assert!(matches!(statuses[1], ValidationStatus::Invalid { .. }));
        assert_eq!(statuses[2], &ValidationStatus::Missing);
        assert_eq!(statuses[3], &ValidationStatus::Missing);
        assert_eq!(report.repositories[3].output_file, None);

        let s = &report.summary;
        assert_eq!(s.total_repositories, 4);
        assert_eq!(s.processed_repositories, 2);
        assert_eq!(s.valid_outputs, 1);
        assert_eq!(s.missing_outputs, 2);
        assert_eq!(s.invalid_outputs, 1);
        assert_eq!(s.processing_rate, 0.5);
        assert_eq!(s.validation_rate, 0.5);

        let text = report.to_string();
        assert!(text.contains("acme/c (id 3)"), "{text}");
        assert!(text.contains("Invalid outputs:      1 (25.0%)"), "{text}");
        assert!(report.to_markdown().contains("- `acme/c` (id 3)"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["repositories"][2]["status"], "missing");
    }

    #[test]
    fn coverage_of_empty_list_has_zero_rates() {
        let dir = tempfile::tempdir().unwrap();
        let report = check_repository_outputs(std::iter::empty::<(RepositoryId, &str)>(), dir.path());
        assert_eq!(report.summary, CoverageSummary::default());
    }
}

//! Export of PaC commits for manual inspection.
//!
//! [`extract_pac_commits`] flattens every commit with a counted PaC change into
//! one [`InspectionRecord`], [`sample_commits`] draws a reproducible subset and
//! [`write_csv`] writes it with one row per commit.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use chrono::DateTime;
use pacminer_core::{ratio, PacError, RepositoryAnalysis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

/// Projects listed in the statistics.
const TOP_PROJECTS: usize = 10;

/// One CSV row. Field order is column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectionRecord {
    pub project_name: String,
    pub commit_sha: String,
    /// Message on a single line.
    pub commit_message: String,
    pub author: String,
    /// Commit time as RFC 3339 UTC.
    pub date: String,
    /// Empty unless the project is `owner/name` and the sha is known.
    pub github_url: String,
    pub pac_files_count: usize,
    pub other_files_count: usize,
    pub pac_added_lines: u64,
    pub pac_deleted_lines: u64,
    pub total_added_lines: u64,
    pub total_deleted_lines: u64,
    /// PaC paths joined with `"; "`.
    pub pac_files: String,
    /// PaC paths with line counts, as `path (+a/-d)`.
    pub pac_files_detailed: String,
    #[serde(skip)]
    timestamp: i64,
}

/// GitHub web URL of a commit.
///
/// # Examples
///
/// ```
/// use pacminer_dataset::inspect::github_commit_url;
///
/// assert_eq!(
///     github_commit_url("acme/policies", "3f2a9c1d"),
///     "https://github.com/acme/policies/commit/3f2a9c1d"
/// );
/// assert_eq!(github_commit_url("policies", "3f2a9c1d"), "");
/// ```
pub fn github_commit_url(project_name: &str, commit_sha: &str) -> String {
    if project_name.contains('/') && !commit_sha.is_empty() {
        format!("https://github.com/{project_name}/commit/{commit_sha}")
    } else {
        String::new()
    }
}

/// Every commit with at least one counted PaC change, in dataset order.
pub fn extract_pac_commits(repositories: &[RepositoryAnalysis]) -> Vec<InspectionRecord> {
    repositories
        .iter()
        .flat_map(|repo| {
            repo.commits
                .iter()
                .filter(|c| c.has_pac_changes())
                .map(move |commit| {
                    let pac = commit.pac_changes();
                    let pac_files: Vec<&str> = pac.iter().map(|c| c.file_path.as_str()).collect();
                    let pac_files_detailed: Vec<String> = pac
                        .iter()
                        .map(|c| format!("{} (+{}/-{})", c.file_path, c.additions, c.deletions))
                        .collect();
                    let date = DateTime::from_timestamp(commit.timestamp(), 0)
                        .map(|d| d.to_rfc3339())
                        .unwrap_or_default();
                    InspectionRecord {
                        project_name: repo.project_name.clone(),
                        commit_sha: commit.commit_id().to_string(),
                        commit_message: commit.message().replace(['\r', '\n'], " "),
                        author: commit.author().to_string(),
                        date,
                        github_url: github_commit_url(&repo.project_name, commit.commit_id()),
                        pac_files_count: pac.len(),
                        other_files_count: commit.other_changes().len(),
                        pac_added_lines: commit.pac_added_lines(),
                        pac_deleted_lines: commit.pac_deleted_lines(),
                        total_added_lines: commit.total_added_lines(),
                        total_deleted_lines: commit.total_deleted_lines(),
                        pac_files: pac_files.join("; "),
                        pac_files_detailed: pac_files_detailed.join("; "),
                        timestamp: commit.timestamp(),
                    }
                })
        })
        .collect()
}

/// Draw `sample_size` records with a generator seeded from `seed`, then sort
/// by project and commit time.
///
/// A `sample_size` of 0, or one not smaller than the input, keeps every
/// record. The same input and seed always give the same sample.
pub fn sample_commits(
    records: &[InspectionRecord],
    sample_size: usize,
    seed: u64,
) -> Vec<InspectionRecord> {
    let mut sample: Vec<InspectionRecord> = if sample_size == 0 || sample_size >= records.len() {
        records.to_vec()
    } else {
        let mut rng = StdRng::seed_from_u64(seed);
        records
            .choose_multiple(&mut rng, sample_size)
            .cloned()
            .collect()
    };
    sample.sort_by(|a, b| {
        a.project_name
            .cmp(&b.project_name)
            .then(a.timestamp.cmp(&b.timestamp))
    });
    sample
}

/// Write `records` as CSV with a header row, creating parent directories.
///
/// Nothing is written when `records` is empty.
///
/// # Errors
///
/// Returns [`PacError::Io`] if the directory or file cannot be created and
/// [`PacError::Csv`] if a row cannot be written.
pub fn write_csv(records: &[InspectionRecord], path: &Path) -> Result<(), PacError> {
    if records.is_empty() {
        tracing::warn!(path = %path.display(), "no PaC commits to write");
        return Ok(());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path).map_err(|e| PacError::Csv(e.to_string()))?;
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| PacError::Csv(e.to_string()))?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = records.len(), "wrote PaC commits");
    Ok(())
}

/// Commits per project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectCount {
    pub project_name: String,
    pub commits: usize,
}

/// Shape of a set of PaC commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommitStatistics {
    pub total_commits: usize,
    pub unique_projects: usize,
    pub avg_pac_files_per_commit: f64,
    pub avg_other_files_per_commit: f64,
    /// Mean of PaC added plus deleted lines.
    pub avg_pac_line_changes: f64,
    /// Mean of all added plus deleted lines.
    pub avg_total_line_changes: f64,
    /// Commits that touched no other file.
    pub commits_with_only_pac: usize,
    pub commits_with_mixed_changes: usize,
    /// Projects with the most PaC commits, most first.
    pub top_projects: Vec<ProjectCount>,
}

impl CommitStatistics {
    /// Summarize `records`; all zero when empty.
    pub fn from_records(records: &[InspectionRecord]) -> Self {
        let n = records.len();
        if n == 0 {
            return Self::default();
        }
        let mean = |sum: u64| sum as f64 / n as f64;

        let mut per_project: HashMap<&str, usize> = HashMap::new();
        for record in records {
            *per_project.entry(record.project_name.as_str()).or_default() += 1;
        }
        let mut top_projects: Vec<ProjectCount> = per_project
            .iter()
            .map(|(name, &commits)| ProjectCount {
                project_name: (*name).to_string(),
                commits,
            })
            .collect();
        top_projects.sort_by(|a, b| {
            b.commits
                .cmp(&a.commits)
                .then_with(|| a.project_name.cmp(&b.project_name))
        });
        top_projects.truncate(TOP_PROJECTS);

        let only_pac = records.iter().filter(|r| r.other_files_count == 0).count();
        Self {
            total_commits: n,
            unique_projects: records
                .iter()
                .map(|r| r.project_name.as_str())
                .collect::<HashSet<_>>()
                .len(),
            avg_pac_files_per_commit: mean(records.iter().map(|r| r.pac_files_count as u64).sum()),
            avg_other_files_per_commit: mean(
                records.iter().map(|r| r.other_files_count as u64).sum(),
            ),
            avg_pac_line_changes: mean(
                records
                    .iter()
                    .map(|r| r.pac_added_lines + r.pac_deleted_lines)
                    .sum(),
            ),
            avg_total_line_changes: mean(
                records
                    .iter()
                    .map(|r| r.total_added_lines + r.total_deleted_lines)
                    .sum(),
            ),
            commits_with_only_pac: only_pac,
            commits_with_mixed_changes: n - only_pac,
            top_projects,
        }
    }

    fn share(&self, count: usize) -> f64 {
        ratio(count, self.total_commits) * 100.0
    }

    /// Render the statistics as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# PaC Commit Statistics\n\n");
        out.push_str(&format!(
            "**{}** PaC commits across **{}** projects\n\n",
            self.total_commits, self.unique_projects
        ));
        out.push_str("| Composition | Commits | Share |\n");
        out.push_str("|---|---|---|\n");
        out.push_str(&format!(
            "| Only PaC files | {} | {:.1}% |\n",
            self.commits_with_only_pac,
            self.share(self.commits_with_only_pac)
        ));
        out.push_str(&format!(
            "| Mixed changes | {} | {:.1}% |\n",
            self.commits_with_mixed_changes,
            self.share(self.commits_with_mixed_changes)
        ));
        out.push_str("\n| Average per commit | |\n");
        out.push_str("|---|---|\n");
        out.push_str(&format!(
            "| PaC files | {:.2} |\n",
            self.avg_pac_files_per_commit
        ));
        out.push_str(&format!(
            "| Other files | {:.2} |\n",
            self.avg_other_files_per_commit
        ));
        out.push_str(&format!(
            "| PaC line changes | {:.0} |\n",
            self.avg_pac_line_changes
        ));
        out.push_str(&format!(
            "| Total line changes | {:.0} |\n",
            self.avg_total_line_changes
        ));
        if !self.top_projects.is_empty() {
            out.push_str("\n## Top projects\n\n");
            out.push_str("| Project | PaC commits |\n");
            out.push_str("|---|---|\n");
            for project in &self.top_projects {
                out.push_str(&format!(
                    "| `{}` | {} |\n",
                    project.project_name, project.commits
                ));
            }
        }
        out
    }
}

impl fmt::Display for CommitStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PaC Commit Statistics")?;
        writeln!(f, "=====================")?;
        writeln!(f, "Total PaC commits:  {}", self.total_commits)?;
        writeln!(f, "Unique projects:    {}", self.unique_projects)?;
        writeln!(f, "\nCommit composition")?;
        writeln!(
            f,
            "  Only PaC files:   {} ({:.1}%)",
            self.commits_with_only_pac,
            self.share(self.commits_with_only_pac)
        )?;
        writeln!(
            f,
            "  Mixed changes:    {} ({:.1}%)",
            self.commits_with_mixed_changes,
            self.share(self.commits_with_mixed_changes)
        )?;
        writeln!(f, "\nAverage per commit")?;
        writeln!(f, "  PaC files:          {:.2}", self.avg_pac_files_per_commit)?;
        writeln!(f, "  Other files:        {:.2}", self.avg_other_files_per_commit)?;
        writeln!(f, "  PaC line changes:   {:.0}", self.avg_pac_line_changes)?;
        writeln!(f, "  Total line changes: {:.0}", self.avg_total_line_changes)?;
        if !self.top_projects.is_empty() {
            writeln!(f, "\nTop projects by PaC commits")?;
            for project in &self.top_projects {
                writeln!(f, "  {}: {} commits", project.project_name, project.commits)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pacminer_core::{ChangeRecord, ChangeStatus, Commit, RawCommit, RepositoryStatistics};

    fn change(path: &str, additions: u64, deletions: u64) -> ChangeRecord {
        ChangeRecord {
            file_path: path.into(),
            additions,
            deletions,
            status: ChangeStatus::Modified,
        }
    }

    fn commit(id: &str, timestamp: i64, pac: Vec<ChangeRecord>, other: Vec<ChangeRecord>) -> Commit {
        let changes: Vec<ChangeRecord> = pac.iter().chain(&other).cloned().collect();
        let raw = RawCommit {
            commit_id: id.into(),
            author: "alice".into(),
            author_email: "alice@example.com".into(),
            message: "tighten\npolicy".into(),
            timestamp,
            files: changes.iter().map(|c| c.file_path.clone()).collect(),
            changes,
        };
        Commit::new(raw, pac, other).unwrap()
    }

    fn repo(name: &str, commits: Vec<Commit>) -> RepositoryAnalysis {
        RepositoryAnalysis {
            repository_id: 1,
            project_name: name.into(),
            owner_name: None,
            repository_name: None,
            total_commits: commits.len(),
            pac_changes_count: 0,
            pac_commits_count: 0,
            pac_change_ratio: 0.0,
            commits,
            statistics: RepositoryStatistics::default(),
        }
    }

    fn records(n: usize) -> Vec<InspectionRecord> {
        let commits = (0..n)
            .map(|i| commit(&format!("c{i}"), i as i64, vec![change("a.rego", 1, 0)], vec![]))
            .collect();
        extract_pac_commits(&[repo("acme/policies", commits)])
    }

    #[test]
    fn only_pac_commits_are_extracted() {
        let repositories = [repo(
            "acme/policies",
            vec![
                commit(
                    "abc",
                    1_700_000_000,
                    vec![change("a.rego", 3, 1), change("b.rego", 0, 2)],
                    vec![change("main.go", 5, 5)],
                ),
                commit("def", 1_700_000_060, vec![], vec![change("main.go", 1, 1)]),
            ],
        )];

        let records = extract_pac_commits(&repositories);
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.commit_sha, "abc");
        assert_eq!(r.commit_message, "tighten policy");
        assert_eq!(r.date, "2023-11-14T22:13:20+00:00");
        assert_eq!(r.github_url, "https://github.com/acme/policies/commit/abc");
        assert_eq!(r.pac_files_count, 2);
        assert_eq!(r.other_files_count, 1);
        assert_eq!((r.pac_added_lines, r.pac_deleted_lines), (3, 3));
        assert_eq!((r.total_added_lines, r.total_deleted_lines), (8, 8));
        assert_eq!(r.pac_files, "a.rego; b.rego");
        assert_eq!(r.pac_files_detailed, "a.rego (+3/-1); b.rego (+0/-2)");
    }

    #[test]
    fn csv_has_columns_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/commits.csv");
        write_csv(&records(2), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "project_name,commit_sha,commit_message,author,date,github_url,\
             pac_files_count,other_files_count,pac_added_lines,pac_deleted_lines,\
             total_added_lines,total_deleted_lines,pac_files,pac_files_detailed"
        );
        assert!(lines.next().unwrap().starts_with("acme/policies,c0,tighten policy,alice,"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn empty_export_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commits.csv");
        write_csv(&[], &path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sampling_is_reproducible_and_sorted() {
        let all = records(50);
        let first = sample_commits(&all, 10, 42);
        let again = sample_commits(&all, 10, 42);
        assert_eq!(first.len(), 10);
        assert_eq!(first, again);
        assert!(first.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

        let shas: HashSet<&str> = first.iter().map(|r| r.commit_sha.as_str()).collect();
        assert_eq!(shas.len(), 10);
        let other = sample_commits(&all, 10, 7);
        assert_ne!(first, other);
    }

    #[test]
    fn oversized_or_zero_sample_keeps_everything() {
        let all = records(5);
        assert_eq!(sample_commits(&all, 0, 42).len(), 5);
        assert_eq!(sample_commits(&all, 5, 42).len(), 5);
        assert_eq!(sample_commits(&all, 100, 42).len(), 5);
    }

    #[test]
    fn statistics_describe_composition_and_projects() {
        let repositories = [
            repo(
                "acme/a",
                vec![
                    commit("1", 1, vec![change("a.rego", 2, 2)], vec![]),
                    commit("2", 2, vec![change("a.rego", 1, 1)], vec![change("x.go", 4, 0)]),
                ],
            ),
            repo("acme/b", vec![commit("3", 3, vec![change("b.rego", 0, 0)], vec![])]),
        ];
        let stats = CommitStatistics::from_records(&extract_pac_commits(&repositories));

        assert_eq!(stats.total_commits, 3);
        assert_eq!(stats.unique_projects, 2);
        assert_eq!(stats.commits_with_only_pac, 2);
        assert_eq!(stats.commits_with_mixed_changes, 1);
        assert_eq!(stats.avg_pac_files_per_commit, 1.0);
        assert_eq!(stats.avg_pac_line_changes, 2.0);
        assert_eq!(stats.avg_total_line_changes, 10.0 / 3.0);
        assert_eq!(stats.top_projects[0].project_name, "acme/a");
        assert_eq!(stats.top_projects[0].commits, 2);

        let text = stats.to_string();
        assert!(text.contains("Only PaC files:   2 (66.7%)"), "{text}");
        assert!(text.contains("acme/b: 1 commits"), "{text}");
        assert!(stats.to_markdown().contains("| `acme/a` | 2 |"));
    }

    #[test]
    fn empty_statistics_are_zero() {
        assert_eq!(CommitStatistics::from_records(&[]), CommitStatistics::default());
    }
}

//! Per-repository maintenance summary.
//!
//! Folds classified commits into counts, ratios and line totals.

use pacminer_core::{ratio, Commit, RepositoryAnalysis, RepositoryId, RepositoryStatistics};

/// Summarize the classified commits of one repository.
///
/// `pac_changes_count` counts PaC *files* across commits while
/// `pac_commits_count` counts commits with at least one of them.
/// `pac_change_ratio` is defined as 0 for a repository without commits.
///
/// # Examples
///
/// ```
/// use pacminer_gitpulse::aggregate::aggregate_repository;
///
/// let analysis = aggregate_repository(4, "acme/guardrails", vec![]);
/// assert_eq!(analysis.owner_name.as_deref(), Some("acme"));
/// assert_eq!(analysis.repository_name.as_deref(), Some("guardrails"));
/// assert_eq!(analysis.total_commits, 0);
/// assert_eq!(analysis.pac_change_ratio, 0.0);
/// ```
pub fn aggregate_repository(
    repository_id: RepositoryId,
    project_name: &str,
    commits: Vec<Commit>,
) -> RepositoryAnalysis {
    let total_commits = commits.len();
    let pac_changes_count: usize = commits.iter().map(|c| c.pac_changes().len()).sum();
    let pac_commits_count = commits.iter().filter(|c| c.has_pac_changes()).count();

    let statistics = summarize_lines(&commits);

    let (owner_name, repository_name) = match project_name.split_once('/') {
        Some((owner, name)) => (Some(owner.to_string()), Some(name.to_string())),
        None => (None, None),
    };

    let analysis = RepositoryAnalysis {
        repository_id,
        project_name: project_name.to_string(),
        owner_name,
        repository_name,
        total_commits,
        pac_changes_count,
        pac_commits_count,
        pac_change_ratio: ratio(pac_changes_count, total_commits),
        commits,
        statistics,
    };

    tracing::info!(
        repository_id,
        project = project_name,
        pac_changes = pac_changes_count,
        pac_commits = pac_commits_count,
        total_commits,
        "{}: {} PaC changes in {} commits out of {} ({:.2}%)",
        project_name,
        pac_changes_count,
        pac_commits_count,
        total_commits,
        analysis.pac_change_ratio * 100.0
    );

    analysis
}

fn summarize_lines(commits: &[Commit]) -> RepositoryStatistics {
    let mut stats = RepositoryStatistics::default();
    for commit in commits {
        stats.total_added_lines += commit.total_added_lines();
        stats.total_deleted_lines += commit.total_deleted_lines();
        stats.pac_added_lines += commit.pac_added_lines();
        stats.pac_deleted_lines += commit.pac_deleted_lines();
    }
    stats.total_modified_lines = stats.total_added_lines + stats.total_deleted_lines;
    stats.pac_modified_lines = stats.pac_added_lines + stats.pac_deleted_lines;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_commit;
    use crate::membership::MembershipIndex;
    use pacminer_core::{ChangeRecord, ChangeStatus, RawCommit};

    fn make_commit(id: &str, changes: Vec<(&str, u64, u64, ChangeStatus)>) -> RawCommit {
        let changes: Vec<ChangeRecord> = changes
            .into_iter()
            .map(|(path, added, deleted, status)| ChangeRecord {
                file_path: path.into(),
                additions: added,
                deletions: deleted,
                status,
            })
            .collect();
        RawCommit {
            commit_id: id.into(),
            author: "alice".into(),
            author_email: "alice@example.com".into(),
            message: "test".into(),
            timestamp: 1000,
            files: changes.iter().map(|c| c.file_path.clone()).collect(),
            changes,
        }
    }

    #[test]
    fn three_commit_scenario() {
        let index = MembershipIndex::from_entries([(1, "policy.rego")]);
        let raws = vec![
            make_commit("c1", vec![("policy.rego", 12, 0, ChangeStatus::Added)]),
            make_commit(
                "c2",
                vec![
                    ("policy.rego", 5, 1, ChangeStatus::Modified),
                    ("main.go", 2, 0, ChangeStatus::Modified),
                ],
            ),
            make_commit("c3", vec![("main.go", 1, 1, ChangeStatus::Modified)]),
        ];
        let commits = raws
            .into_iter()
            .map(|raw| classify_commit(raw, 1, &index).unwrap())
            .collect();

        let analysis = aggregate_repository(1, "acme/policies", commits);
        assert_eq!(analysis.total_commits, 3);
        assert_eq!(analysis.pac_changes_count, 1);
        assert_eq!(analysis.pac_commits_count, 1);
        assert!((analysis.pac_change_ratio - 1.0 / 3.0).abs() < f64::EPSILON);
        assert_eq!(analysis.statistics.pac_added_lines, 5);
        assert_eq!(analysis.statistics.pac_deleted_lines, 1);
        assert_eq!(analysis.statistics.pac_modified_lines, 6);
        assert_eq!(analysis.statistics.total_added_lines, 20);
        assert_eq!(analysis.statistics.total_deleted_lines, 2);
        assert_eq!(analysis.statistics.total_modified_lines, 22);
    }

    #[test]
    fn pac_changes_count_counts_files_not_commits() {
        let index = MembershipIndex::from_entries([(1, "a.rego"), (1, "b.rego")]);
        let raw = make_commit(
            "c1",
            vec![
                ("a.rego", 1, 0, ChangeStatus::Modified),
                ("b.rego", 1, 0, ChangeStatus::Modified),
            ],
        );
        let commit = classify_commit(raw, 1, &index).unwrap();
        let analysis = aggregate_repository(1, "acme/policies", vec![commit]);
        assert_eq!(analysis.pac_changes_count, 2);
        assert_eq!(analysis.pac_commits_count, 1);
        assert_eq!(analysis.pac_change_ratio, 2.0);
    }

    #[test]
    fn empty_repository_has_zero_ratio() {
        let analysis = aggregate_repository(9, "acme/empty", vec![]);
        assert_eq!(analysis.total_commits, 0);
        assert_eq!(analysis.pac_change_ratio, 0.0);
        assert_eq!(analysis.statistics, RepositoryStatistics::default());
    }

    #[test]
    fn project_without_owner_has_no_split() {
        let analysis = aggregate_repository(2, "standalone", vec![]);
        assert!(analysis.owner_name.is_none());
        assert!(analysis.repository_name.is_none());
        assert_eq!(analysis.project_name, "standalone");
    }
}

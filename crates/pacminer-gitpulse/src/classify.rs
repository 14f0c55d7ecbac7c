//! Commit classification.
//!
//! Splits the files a commit touched into PaC and other maintenance changes.
//! Only edits of pre-existing files count: added and deleted files are left
//! out of both partitions.

use std::collections::HashMap;

use pacminer_core::{ChangeRecord, Commit, PacError, RawCommit, RepositoryId};

use crate::membership::MembershipIndex;

/// Classify one extracted commit against the membership index.
///
/// Every path in `raw.files` goes to `pac_changes` if it is a registered PaC
/// file of `repository_id`, otherwise to `other_changes`, but only when its
/// change status is modified, renamed, or copied. A path without a matching
/// change record is skipped.
///
/// # Errors
///
/// Returns [`PacError::InvalidRecord`] if `raw.files` lists the same path
/// twice with a counted status.
///
/// # Examples
///
/// ```
/// use pacminer_core::{ChangeRecord, ChangeStatus, RawCommit};
/// use pacminer_gitpulse::classify::classify_commit;
/// use pacminer_gitpulse::membership::MembershipIndex;
///
/// let index = MembershipIndex::from_entries([(1, "policy.rego")]);
/// let raw = RawCommit {
///     commit_id: "abc".into(),
///     author: "alice".into(),
///     author_email: "alice@example.com".into(),
///     message: "tweak".into(),
///     timestamp: 0,
///     files: vec!["policy.rego".into(), "main.go".into()],
///     changes: vec![
///         ChangeRecord { file_path: "policy.rego".into(), additions: 5, deletions: 1, status: ChangeStatus::Modified },
///         ChangeRecord { file_path: "main.go".into(), additions: 2, deletions: 0, status: ChangeStatus::Added },
///     ],
/// };
/// let commit = classify_commit(raw, 1, &index).unwrap();
/// assert_eq!(commit.pac_changes().len(), 1);
/// assert!(commit.other_changes().is_empty());
/// ```
pub fn classify_commit(
    raw: RawCommit,
    repository_id: RepositoryId,
    index: &MembershipIndex,
) -> Result<Commit, PacError> {
    let (pac_changes, other_changes) = partition(&raw, repository_id, index);
    Commit::new(raw, pac_changes, other_changes)
}

fn partition(
    raw: &RawCommit,
    repository_id: RepositoryId,
    index: &MembershipIndex,
) -> (Vec<ChangeRecord>, Vec<ChangeRecord>) {
    let mut by_path: HashMap<&str, &ChangeRecord> = HashMap::with_capacity(raw.changes.len());
    for change in &raw.changes {
        by_path.entry(change.file_path.as_str()).or_insert(change);
    }

    let mut pac_changes = Vec::new();
    let mut other_changes = Vec::new();

    for path in &raw.files {
        let is_pac = index.is_member(repository_id, path);

        let Some(change) = by_path.get(path.as_str()) else {
            tracing::debug!(
                repository_id,
                commit_id = %raw.commit_id,
                path = %path,
                "no change record for touched file, skipping"
            );
            continue;
        };

        if !change.status.is_maintenance() {
            tracing::debug!(
                repository_id,
                commit_id = %raw.commit_id,
                path = %path,
                status = %change.status,
                pac = is_pac,
                "skipping introduction or removal"
            );
            continue;
        }

        if is_pac {
            pac_changes.push((*change).clone());
        } else {
            other_changes.push((*change).clone());
        }
    }

    (pac_changes, other_changes)
}

//! Git history extraction via git2.
//!
//! Walks a repository's history in topological order and turns every
//! non-merge commit into a [`RawCommit`] with one [`ChangeRecord`] per
//! touched file.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use git2::{
    Delta, DiffFindOptions, DiffOptions, ObjectType, Oid, Patch, Repository, TreeWalkMode,
    TreeWalkResult,
};
use pacminer_core::{ChangeRecord, ChangeStatus, PacError, RawCommit};

/// Options for history extraction.
///
/// # Examples
///
/// ```
/// use pacminer_gitpulse::mining::ExtractOptions;
///
/// let opts = ExtractOptions::default();
/// assert!(opts.reference.is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Revision to start from (branch, tag or SHA). `None` means HEAD.
    pub reference: Option<String>,
}

/// Extract per-commit change records from the repository at `repo_path`.
///
/// Commits come out parents-first; among commits whose ancestors have all
/// been emitted, the smaller commit id goes first. Merge commits (two or more
/// parents) are left out. A root commit reports every file in its tree as
/// [`ChangeStatus::Added`] with its line count as additions.
///
/// Files whose path cannot be read as UTF-8 are skipped with a warning.
///
/// # Errors
///
/// Returns [`PacError::Git`] if the repository or the start reference cannot
/// be read, or if a commit's tree or diff cannot be loaded.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use pacminer_gitpulse::mining::{extract_history, ExtractOptions};
///
/// let commits = extract_history(Path::new("."), &ExtractOptions::default()).unwrap();
/// for c in &commits {
///     println!("{}: {} files", &c.commit_id[..8], c.changes.len());
/// }
/// ```
pub fn extract_history(
    repo_path: &Path,
    options: &ExtractOptions,
) -> Result<Vec<RawCommit>, PacError> {
    let repo = Repository::open(repo_path)
        .map_err(|e| PacError::Git(format!("failed to open repository: {e}")))?;

    let start = resolve_start(&repo, options.reference.as_deref())?;
    let order = topological_order(&repo, start)?;

    let mut commits = Vec::with_capacity(order.len());
    for oid in order {
        let commit = repo
            .find_commit(oid)
            .map_err(|e| PacError::Git(format!("failed to find commit {oid}: {e}")))?;

        let changes = match commit.parent_count() {
            0 => root_changes(&repo, &commit)?,
            1 => parent_changes(&repo, &commit)?,
            _ => continue,
        };

        let author = commit.author();
        commits.push(RawCommit {
            commit_id: oid.to_string(),
            author: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("unknown").to_string(),
            message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            timestamp: commit.time().seconds(),
            files: changes.iter().map(|c| c.file_path.clone()).collect(),
            changes,
        });
    }

    tracing::debug!(
        path = %repo_path.display(),
        commits = commits.len(),
        "extracted history"
    );
    Ok(commits)
}

fn resolve_start(repo: &Repository, reference: Option<&str>) -> Result<Oid, PacError> {
    match reference {
        Some(spec) => repo
            .revparse_single(spec)
            .and_then(|obj| obj.peel_to_commit())
            .map(|c| c.id())
            .map_err(|e| PacError::Git(format!("failed to resolve '{spec}': {e}"))),
        None => repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map(|c| c.id())
            .map_err(|e| PacError::Git(format!("failed to resolve HEAD: {e}"))),
    }
}

/// Kahn's algorithm over every commit reachable from `start`, with ready
/// commits taken in commit-id order.
fn topological_order(repo: &Repository, start: Oid) -> Result<Vec<Oid>, PacError> {
    let mut revwalk = repo
        .revwalk()
        .map_err(|e| PacError::Git(format!("failed to create revwalk: {e}")))?;
    revwalk
        .push(start)
        .map_err(|e| PacError::Git(format!("failed to push {start}: {e}")))?;

    let mut parents: HashMap<Oid, Vec<Oid>> = HashMap::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(|e| PacError::Git(format!("revwalk error: {e}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|e| PacError::Git(format!("failed to find commit {oid}: {e}")))?;
        parents.insert(oid, commit.parent_ids().collect());
    }

    let mut pending: HashMap<Oid, usize> = HashMap::with_capacity(parents.len());
    let mut children: HashMap<Oid, Vec<Oid>> = HashMap::new();
    for (oid, parent_ids) in &parents {
        // Shallow clones may reference parents that were never fetched.
        let known: Vec<&Oid> = parent_ids.iter().filter(|p| parents.contains_key(p)).collect();
        pending.insert(*oid, known.len());
        for parent in known {
            children.entry(*parent).or_default().push(*oid);
        }
    }

    // Oid orders by raw bytes, which matches hex commit-id order.
    let mut ready: BTreeSet<Oid> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(oid, _)| *oid)
        .collect();

    let mut order = Vec::with_capacity(parents.len());
    while let Some(oid) = ready.pop_first() {
        if let Some(kids) = children.get(&oid) {
            for child in kids {
                if let Some(count) = pending.get_mut(child) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
        order.push(oid);
    }

    Ok(order)
}

fn parent_changes(
    repo: &Repository,
    commit: &git2::Commit,
) -> Result<Vec<ChangeRecord>, PacError> {
    let commit_tree = commit
        .tree()
        .map_err(|e| PacError::Git(format!("failed to get commit tree: {e}")))?;
    let parent_tree = commit
        .parent(0)
        .and_then(|parent| parent.tree())
        .map_err(|e| PacError::Git(format!("failed to get parent tree: {e}")))?;

    let mut diff_opts = DiffOptions::new();
    let mut diff = repo
        .diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), Some(&mut diff_opts))
        .map_err(|e| PacError::Git(format!("failed to compute diff: {e}")))?;

    let mut find_opts = DiffFindOptions::new();
    find_opts.renames(true).copies(true);
    diff.find_similar(Some(&mut find_opts))
        .map_err(|e| PacError::Git(format!("failed to find renames: {e}")))?;

    let commit_id = commit.id();
    let mut changes = Vec::with_capacity(diff.deltas().len());

    for (idx, delta) in diff.deltas().enumerate() {
        let Some(status) = map_status(delta.status()) else {
            tracing::debug!(commit_id = %commit_id, status = ?delta.status(), "ignoring delta");
            continue;
        };

        let raw_path = delta.new_file().path().or_else(|| delta.old_file().path());
        let Some(path) = raw_path.and_then(Path::to_str) else {
            tracing::warn!(
                commit_id = %commit_id,
                path = ?raw_path,
                "skipping file with unresolvable path"
            );
            continue;
        };

        let (additions, deletions) = match Patch::from_diff(&diff, idx) {
            Ok(Some(patch)) => match patch.line_stats() {
                Ok((_, added, deleted)) => (added as u64, deleted as u64),
                Err(e) => {
                    tracing::warn!(commit_id = %commit_id, path, error = %e, "no line stats");
                    (0, 0)
                }
            },
            Ok(None) => (0, 0),
            Err(e) => {
                tracing::warn!(commit_id = %commit_id, path, error = %e, "failed to build patch");
                (0, 0)
            }
        };

        changes.push(ChangeRecord {
            file_path: path.to_string(),
            additions,
            deletions,
            status,
        });
    }

    Ok(changes)
}

fn map_status(delta: Delta) -> Option<ChangeStatus> {
    match delta {
        Delta::Added => Some(ChangeStatus::Added),
        Delta::Deleted => Some(ChangeStatus::Deleted),
        Delta::Modified | Delta::Typechange => Some(ChangeStatus::Modified),
        Delta::Renamed => Some(ChangeStatus::Renamed),
        Delta::Copied => Some(ChangeStatus::Copied),
        _ => None,
    }
}

fn root_changes(
    repo: &Repository,
    commit: &git2::Commit,
) -> Result<Vec<ChangeRecord>, PacError> {
    let tree = commit
        .tree()
        .map_err(|e| PacError::Git(format!("failed to get commit tree: {e}")))?;

    let commit_id = commit.id();
    let mut changes = Vec::new();

    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() != Some(ObjectType::Blob) {
            return TreeWalkResult::Ok;
        }
        let Some(name) = entry.name() else {
            tracing::warn!(commit_id = %commit_id, root, "skipping entry with unresolvable name");
            return TreeWalkResult::Ok;
        };
        let path = format!("{root}{name}");

        let additions = match repo.find_blob(entry.id()) {
            Ok(blob) => count_text_lines(blob.content(), blob.is_binary()),
            Err(e) => {
                tracing::warn!(commit_id = %commit_id, path = %path, error = %e, "failed to read blob");
                0
            }
        };

        changes.push(ChangeRecord {
            file_path: path,
            additions,
            deletions: 0,
            status: ChangeStatus::Added,
        });
        TreeWalkResult::Ok
    })
    .map_err(|e| PacError::Git(format!("failed to walk root tree: {e}")))?;

    Ok(changes)
}

/// Newline count of `content`, or 0 for binary or non-UTF-8 data.
fn count_text_lines(content: &[u8], is_binary: bool) -> u64 {
    if is_binary {
        return 0;
    }
    match std::str::from_utf8(content) {
        Ok(text) => text.matches('\n').count() as u64,
        Err(_) => 0,
    }
}

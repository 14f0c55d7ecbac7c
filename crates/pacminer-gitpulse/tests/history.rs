//! Integration tests: extraction and analysis against throwaway git repositories.

use std::fs;
use std::path::Path;

use git2::{Oid, Repository, Signature, Time};
use pacminer_core::ChangeStatus;
use pacminer_gitpulse::membership::MembershipIndex;
use pacminer_gitpulse::mining::{extract_history, ExtractOptions};
use pacminer_gitpulse::pipeline::{analyze_repositories, analyze_repository, RepositoryJob};

struct TestRepo {
    dir: tempfile::TempDir,
    repo: Repository,
    clock: i64,
}

impl TestRepo {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self {
            dir,
            repo,
            clock: 1_700_000_000,
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn write(&self, name: &str, content: &str) {
        let full = self.path().join(name);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    fn remove(&self, name: &str) {
        fs::remove_file(self.path().join(name)).unwrap();
        let mut index = self.repo.index().unwrap();
        index.remove_path(Path::new(name)).unwrap();
        index.write().unwrap();
    }

    /// Commit the current index. `update_head` false leaves a side commit.
    fn commit(&mut self, message: &str, parents: &[Oid], update_head: bool) -> Oid {
        self.clock += 60;
        let sig = Signature::new("alice", "alice@example.com", &Time::new(self.clock, 0)).unwrap();
        let mut index = self.repo.index().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let update_ref = if update_head { Some("HEAD") } else { None };
        self.repo
            .commit(update_ref, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    fn job(&self, id: u64) -> RepositoryJob {
        RepositoryJob {
            id,
            full_name: "acme/policies".into(),
            path: self.path().to_path_buf(),
        }
    }
}

#[test]
fn root_commit_reports_every_file_as_added() {
    let mut repo = TestRepo::new();
    repo.write("policy.rego", "package authz\n\ndefault allow = false\n");
    repo.write("src/main.go", "package main\n");
    repo.write("empty.txt", "");
    repo.commit("initial", &[], true);

    let commits = extract_history(repo.path(), &ExtractOptions::default()).unwrap();
    assert_eq!(commits.len(), 1);

    let root = &commits[0];
    assert_eq!(root.changes.len(), 3);
    for change in &root.changes {
        assert_eq!(change.status, ChangeStatus::Added);
        assert_eq!(change.deletions, 0);
    }
    let policy = root
        .changes
        .iter()
        .find(|c| c.file_path == "policy.rego")
        .unwrap();
    assert_eq!(policy.additions, 3);
    assert!(root.files.contains(&"src/main.go".to_string()));
    assert_eq!(root.author, "alice");
    assert_eq!(root.message, "initial");
}

#[test]
fn modifications_carry_line_stats() {
    let mut repo = TestRepo::new();
    repo.write("policy.rego", "a\nb\nc\n");
    let c1 = repo.commit("initial", &[], true);
    repo.write("policy.rego", "a\nB\nc\nd\n");
    repo.commit("tweak", &[c1], true);

    let commits = extract_history(repo.path(), &ExtractOptions::default()).unwrap();
    assert_eq!(commits.len(), 2);
    let change = &commits[1].changes[0];
    assert_eq!(change.file_path, "policy.rego");
    assert_eq!(change.status, ChangeStatus::Modified);
    assert_eq!(change.additions, 2);
    assert_eq!(change.deletions, 1);
}

#[test]
fn deletions_and_renames_are_detected() {
    let mut repo = TestRepo::new();
    let body = "package rules\n\ndeny[msg] {\n  input.kind == \"Pod\"\n  msg := \"no pods\"\n}\n";
    repo.write("rules/a.rego", body);
    repo.write("obsolete.txt", "gone\n");
    let c1 = repo.commit("initial", &[], true);

    repo.remove("rules/a.rego");
    repo.write("rules/b.rego", body);
    repo.remove("obsolete.txt");
    repo.commit("move", &[c1], true);

    let commits = extract_history(repo.path(), &ExtractOptions::default()).unwrap();
    let changes = &commits[1].changes;
    let renamed = changes
        .iter()
        .find(|c| c.file_path == "rules/b.rego")
        .unwrap();
    assert_eq!(renamed.status, ChangeStatus::Renamed);
    let deleted = changes
        .iter()
        .find(|c| c.file_path == "obsolete.txt")
        .unwrap();
    assert_eq!(deleted.status, ChangeStatus::Deleted);
    assert_eq!(deleted.deletions, 1);
}

#[test]
fn merge_commits_are_skipped_and_parents_come_first() {
    let mut repo = TestRepo::new();
    repo.write("base.txt", "base\n");
    let c1 = repo.commit("base", &[], true);

    repo.write("side.txt", "side\n");
    let side = repo.commit("side", &[c1], false);

    repo.write("main.txt", "main\n");
    let c2 = repo.commit("main", &[c1], true);

    let merge = repo.commit("merge", &[c2, side], true);

    let commits = extract_history(repo.path(), &ExtractOptions::default()).unwrap();
    let ids: Vec<&str> = commits.iter().map(|c| c.commit_id.as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(!ids.contains(&merge.to_string().as_str()));

    let pos = |oid: Oid| ids.iter().position(|id| *id == oid.to_string()).unwrap();
    assert_eq!(pos(c1), 0);
    // Siblings are ordered by commit id.
    let (first, second) = if side < c2 { (side, c2) } else { (c2, side) };
    assert_eq!(pos(first), 1);
    assert_eq!(pos(second), 2);
}

#[test]
fn start_reference_limits_the_walk() {
    let mut repo = TestRepo::new();
    repo.write("a.txt", "a\n");
    let c1 = repo.commit("one", &[], true);
    repo.write("a.txt", "a\nb\n");
    repo.commit("two", &[c1], true);

    let options = ExtractOptions {
        reference: Some(c1.to_string()),
    };
    let commits = extract_history(repo.path(), &options).unwrap();
    assert_eq!(commits.len(), 1);
    assert_eq!(commits[0].commit_id, c1.to_string());
}

#[test]
fn three_commit_repository_end_to_end() {
    let mut repo = TestRepo::new();
    repo.write("policy.rego", "l1\nl2\nl3\n");
    repo.write("main.go", "package main\n");
    let c1 = repo.commit("add policy", &[], true);

    repo.write("policy.rego", "l1\nX\nl3\nn1\nn2\nn3\nn4\n");
    repo.write("main.go", "package main\n\nfunc main() {}\n");
    let c2 = repo.commit("edit policy and code", &[c1], true);

    repo.write("main.go", "package main\n\nfunc main() { run() }\n");
    repo.commit("edit code", &[c2], true);

    let index = MembershipIndex::from_entries([(1, "policy.rego")]);
    let analysis = analyze_repository(&repo.job(1), &index).unwrap();

    assert_eq!(analysis.total_commits, 3);
    assert_eq!(analysis.pac_changes_count, 1);
    assert_eq!(analysis.pac_commits_count, 1);
    assert!((analysis.pac_change_ratio - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(analysis.statistics.pac_added_lines, 5);
    assert_eq!(analysis.statistics.pac_deleted_lines, 1);
    assert_eq!(analysis.owner_name.as_deref(), Some("acme"));

    // The root commit adds both files but counts as no maintenance.
    let root = &analysis.commits[0];
    assert!(root.pac_changes().is_empty());
    assert!(root.other_changes().is_empty());
    assert_eq!(root.total_added_lines(), 4);
}

#[test]
fn parallel_run_keeps_job_order_and_isolates_failures() {
    let mut good = TestRepo::new();
    good.write("policy.rego", "a\n");
    good.commit("initial", &[], true);

    let missing = tempfile::tempdir().unwrap();
    let jobs = vec![
        RepositoryJob {
            id: 10,
            full_name: "acme/missing".into(),
            path: missing.path().join("nope"),
        },
        good.job(11),
        good.job(12),
    ];

    let index = MembershipIndex::default();
    let outcome = analyze_repositories(&jobs, &index, true, |_| {});
    let ids: Vec<u64> = outcome.results.iter().map(|r| r.repository_id).collect();
    assert_eq!(ids, vec![11, 12]);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].full_name, "acme/missing");
    assert!(!outcome.is_total_failure());
}

#[derive(Clone, Default)]
struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn skipped_files_are_logged_with_their_repository() {
    use std::os::unix::ffi::OsStrExt;

    let repo = TestRepo::new();
    let blob = repo.repo.blob(b"package main\n").unwrap();
    let mut builder = repo.repo.treebuilder(None).unwrap();
    builder
        .insert(std::ffi::OsStr::from_bytes(b"bad\xff.go"), blob, 0o100644)
        .unwrap();
    builder.insert("ok.rego", blob, 0o100644).unwrap();
    let tree = repo.repo.find_tree(builder.write().unwrap()).unwrap();
    let sig = Signature::new("alice", "alice@example.com", &Time::new(1_700_000_000, 0)).unwrap();
    repo.repo
        .commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .unwrap();

    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let index = MembershipIndex::default();
    let analysis = tracing::subscriber::with_default(subscriber, || {
        analyze_repository(&repo.job(42), &index).unwrap()
    });

    assert_eq!(analysis.commits[0].files(), ["ok.rego".to_string()]);
    let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
    let line = output
        .lines()
        .find(|l| l.contains("unresolvable name"))
        .unwrap_or_else(|| panic!("no skip warning in {output:?}"));
    assert!(line.contains("repository_id=42"), "{line}");
    assert!(line.contains("acme/policies"), "{line}");
}

//! PaC membership lookup.
//!
//! A read-only index of `(repository id, path)` pairs built once per run from
//! the registry of known Policy-as-Code files.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use pacminer_core::{PacError, RepositoryId};
use serde::Deserialize;

/// Exact, case-sensitive set of registered PaC files per repository.
///
/// # Examples
///
/// ```
/// use pacminer_gitpulse::membership::MembershipIndex;
///
/// let index = MembershipIndex::from_entries([(1, "policy/main.rego")]);
/// assert!(index.is_member(1, "policy/main.rego"));
/// assert!(!index.is_member(1, "policy/Main.rego"));
/// assert!(!index.is_member(2, "policy/main.rego"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MembershipIndex {
    files: HashMap<RepositoryId, HashSet<String>>,
}

#[derive(Debug, Deserialize)]
struct RegistryRow {
    repo_id: RepositoryId,
    path: String,
}

impl MembershipIndex {
    /// Build an index from `(repository id, path)` pairs.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (RepositoryId, S)>,
        S: Into<String>,
    {
        let mut files: HashMap<RepositoryId, HashSet<String>> = HashMap::new();
        for (repo_id, path) in entries {
            files.entry(repo_id).or_default().insert(path.into());
        }
        Self { files }
    }

    /// Load the registry CSV at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::FileNotFound`] if the file does not exist, or
    /// [`PacError::Registry`] if it cannot be read or parsed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::path::Path;
    /// use pacminer_gitpulse::membership::MembershipIndex;
    ///
    /// let index = MembershipIndex::from_csv_path(Path::new("inputs/pac_filenames.csv")).unwrap();
    /// println!("{} PaC files registered", index.len());
    /// ```
    pub fn from_csv_path(path: &Path) -> Result<Self, PacError> {
        if !path.exists() {
            return Err(PacError::FileNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)
            .map_err(|e| PacError::Registry(format!("failed to open {}: {e}", path.display())))?;
        let index = Self::from_csv_reader(file)?;
        tracing::info!(
            path = %path.display(),
            entries = index.len(),
            "loaded PaC registry"
        );
        Ok(index)
    }

    /// Parse a registry CSV with a header row containing `repo_id` and `path`.
    ///
    /// Extra columns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::Registry`] naming the first row that fails to parse.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacminer_gitpulse::membership::MembershipIndex;
    ///
    /// let csv = "repo_id,path,language\n3,deploy/policy.rego,rego\n";
    /// let index = MembershipIndex::from_csv_reader(csv.as_bytes()).unwrap();
    /// assert!(index.is_member(3, "deploy/policy.rego"));
    /// ```
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, PacError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for (row, record) in csv_reader.deserialize::<RegistryRow>().enumerate() {
            let record = record
                .map_err(|e| PacError::Registry(format!("row {}: {e}", row + 1)))?;
            entries.push((record.repo_id, record.path));
        }
        Ok(Self::from_entries(entries))
    }

    /// Whether `file_path` is a registered PaC file of `repository_id`.
    pub fn is_member(&self, repository_id: RepositoryId, file_path: &str) -> bool {
        self.files
            .get(&repository_id)
            .is_some_and(|paths| paths.contains(file_path))
    }

    /// Number of registered `(repository, path)` pairs.
    pub fn len(&self) -> usize {
        self.files.values().map(HashSet::len).sum()
    }

    /// Whether the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.files.values().all(HashSet::is_empty)
    }

    /// Number of registered PaC files for one repository.
    pub fn files_for(&self, repository_id: RepositoryId) -> usize {
        self.files.get(&repository_id).map_or(0, HashSet::len)
    }
}

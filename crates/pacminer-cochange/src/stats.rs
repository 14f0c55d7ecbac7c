//! Co-change records and extension frequencies.

use std::collections::{BTreeMap, BTreeSet};

use pacminer_core::RepositoryAnalysis;
use serde::Serialize;

use crate::extension::file_extension;

/// Extensions touched together in one commit with PaC changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoChange {
    pub repository: String,
    pub commit_id: String,
    /// Distinct PaC-side extensions, sorted.
    pub pac_extensions: Vec<String>,
    /// Distinct other-side extensions, sorted.
    pub other_extensions: Vec<String>,
    pub num_pac_files: usize,
    pub num_other_files: usize,
}

/// One record per commit with PaC changes, in dataset order.
///
/// # Examples
///
/// ```
/// use pacminer_cochange::stats::extract_cochanges;
///
/// assert!(extract_cochanges(&[]).is_empty());
/// ```
pub fn extract_cochanges(repositories: &[RepositoryAnalysis]) -> Vec<CoChange> {
    let mut cochanges = Vec::new();
    for repo in repositories {
        for commit in repo.commits.iter().filter(|c| c.has_pac_changes()) {
            let pac: BTreeSet<String> = commit
                .pac_changes()
                .iter()
                .map(|c| file_extension(&c.file_path))
                .collect();
            let other: BTreeSet<String> = commit
                .other_changes()
                .iter()
                .map(|c| file_extension(&c.file_path))
                .collect();
            cochanges.push(CoChange {
                repository: repo.project_name.clone(),
                commit_id: commit.commit_id().to_string(),
                pac_extensions: pac.into_iter().collect(),
                other_extensions: other.into_iter().collect(),
                num_pac_files: commit.pac_changes().len(),
                num_other_files: commit.other_changes().len(),
            });
        }
    }
    tracing::debug!(records = cochanges.len(), "extracted co-change records");
    cochanges
}

/// Occurrence counts keyed by extension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtensionCounter(BTreeMap<String, usize>);

impl ExtensionCounter {
    fn add(&mut self, extension: &str) {
        *self.0.entry(extension.to_string()).or_default() += 1;
    }

    pub fn get(&self, extension: &str) -> usize {
        self.0.get(extension).copied().unwrap_or(0)
    }

    /// Number of distinct extensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The `n` most frequent extensions, count descending then name ascending.
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> =
            self.0.iter().map(|(ext, count)| (ext.as_str(), *count)).collect();
        // Stable sort over the name-ordered map keeps names ascending on ties.
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries.truncate(n);
        entries
    }
}

/// Extension frequencies over a set of co-change records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionStatistics {
    pub pac_extensions: ExtensionCounter,
    pub other_extensions: ExtensionCounter,
    /// `(pac, other)` extension pairs touched in the same commit.
    pub cochange_pairs: BTreeMap<(String, String), usize>,
    /// Records counted, i.e. commits with PaC changes.
    pub total_commits: usize,
    pub commits_with_other_files: usize,
}

impl ExtensionStatistics {
    /// Count extensions and pairs over `cochanges`.
    pub fn from_cochanges(cochanges: &[CoChange]) -> Self {
        let mut stats = Self {
            total_commits: cochanges.len(),
            ..Self::default()
        };
        for record in cochanges {
            for ext in &record.pac_extensions {
                stats.pac_extensions.add(ext);
            }
            for ext in &record.other_extensions {
                stats.other_extensions.add(ext);
            }
            if !record.other_extensions.is_empty() {
                stats.commits_with_other_files += 1;
            }
            for pac in &record.pac_extensions {
                for other in &record.other_extensions {
                    *stats
                        .cochange_pairs
                        .entry((pac.clone(), other.clone()))
                        .or_default() += 1;
                }
            }
        }
        stats
    }

    /// Share of PaC commits that also changed other files, in `[0, 1]`.
    pub fn cochange_rate(&self) -> f64 {
        pacminer_core::ratio(self.commits_with_other_files, self.total_commits)
    }

    /// The `n` most frequent pairs, count descending then pair ascending.
    pub fn most_common_pairs(&self, n: usize) -> Vec<(&str, &str, usize)> {
        let mut pairs: Vec<(&str, &str, usize)> = self
            .cochange_pairs
            .iter()
            .map(|((pac, other), count)| (pac.as_str(), other.as_str(), *count))
            .collect();
        pairs.sort_by(|a, b| b.2.cmp(&a.2));
        pairs.truncate(n);
        pairs
    }
}

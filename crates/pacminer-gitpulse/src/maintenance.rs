//! Maintenance metrics over classified repositories.
//!
//! Frequency of PaC maintenance, commit sizes, the share of authors who
//! touch PaC files, and how much of a PaC commit is PaC code.

use std::collections::HashSet;
use std::fmt;

use pacminer_core::RepositoryAnalysis;
use serde::Serialize;

/// Metrics for one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepositoryMetrics {
    pub repository: String,
    pub total_commits: usize,
    pub pac_commits: usize,
    /// Percentage of commits with PaC changes; `None` without commits.
    pub pac_maintenance_frequency: Option<f64>,
    pub pac_commit_median_size: f64,
    pub non_pac_commit_median_size: f64,
    pub total_authors: usize,
    pub pac_authors: usize,
    pub pac_maintainer_percentage: f64,
    pub pac_code: ChangeSizes,
    pub non_pac_code: ChangeSizes,
}

/// Line-change sizes collected inside PaC commits.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSizes {
    /// Commits that contributed a positive size.
    pub commits: usize,
    pub median: f64,
    pub min: u64,
    pub max: u64,
}

impl ChangeSizes {
    fn from_sizes(mut sizes: Vec<u64>) -> Self {
        sizes.retain(|&s| s > 0);
        Self {
            commits: sizes.len(),
            median: median(&sizes),
            min: sizes.iter().copied().min().unwrap_or(0),
            max: sizes.iter().copied().max().unwrap_or(0),
        }
    }
}

/// Cross-repository medians of the per-repository metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceSummary {
    pub repositories: usize,
    pub median_pac_maintenance_frequency: f64,
    pub median_pac_maintainer_percentage: f64,
    pub median_pac_commit_size: f64,
    pub median_non_pac_commit_size: f64,
    pub median_pac_code_changes: f64,
    /// Median over repositories whose non-PaC median is positive.
    pub median_non_pac_code_changes: f64,
    pub repositories_with_pac_changes: usize,
}

/// Per-repository metrics plus their summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaintenanceReport {
    pub repositories: Vec<RepositoryMetrics>,
    pub summary: MaintenanceSummary,
}

/// Compute maintenance metrics for one repository.
///
/// # Examples
///
/// ```
/// use pacminer_gitpulse::aggregate::aggregate_repository;
/// use pacminer_gitpulse::maintenance::measure_repository;
///
/// let analysis = aggregate_repository(1, "acme/empty", vec![]);
/// let metrics = measure_repository(&analysis);
/// assert_eq!(metrics.pac_maintenance_frequency, None);
/// assert_eq!(metrics.pac_maintainer_percentage, 0.0);
/// ```
pub fn measure_repository(analysis: &RepositoryAnalysis) -> RepositoryMetrics {
    let commits = &analysis.commits;
    let total_commits = commits.len();
    let pac_commits = commits.iter().filter(|c| c.has_pac_changes()).count();

    let mut pac_sizes = Vec::new();
    let mut non_pac_sizes = Vec::new();
    let mut pac_code = Vec::new();
    let mut non_pac_code = Vec::new();
    let mut authors = HashSet::new();
    let mut pac_authors = HashSet::new();

    for commit in commits {
        let size = commit.total_added_lines() + commit.total_deleted_lines();
        let author = commit.author();
        if !author.is_empty() {
            authors.insert(author);
        }

        if commit.has_pac_changes() {
            pac_sizes.push(size);
            if !author.is_empty() {
                pac_authors.insert(author);
            }
            let pac = commit.pac_added_lines() + commit.pac_deleted_lines();
            pac_code.push(pac);
            non_pac_code.push(size.saturating_sub(pac));
        } else {
            non_pac_sizes.push(size);
        }
    }

    let pac_maintenance_frequency =
        (total_commits > 0).then(|| percentage(pac_commits, total_commits));

    RepositoryMetrics {
        repository: analysis.project_name.clone(),
        total_commits,
        pac_commits,
        pac_maintenance_frequency,
        pac_commit_median_size: median(&pac_sizes),
        non_pac_commit_median_size: median(&non_pac_sizes),
        total_authors: authors.len(),
        pac_authors: pac_authors.len(),
        pac_maintainer_percentage: percentage(pac_authors.len(), authors.len()),
        pac_code: ChangeSizes::from_sizes(pac_code),
        non_pac_code: ChangeSizes::from_sizes(non_pac_code),
    }
}

/// Compute metrics for every repository and summarize them.
pub fn measure_all(repositories: &[RepositoryAnalysis]) -> MaintenanceReport {
    let metrics: Vec<RepositoryMetrics> = repositories.iter().map(measure_repository).collect();

    let frequencies: Vec<f64> = metrics
        .iter()
        .filter_map(|m| m.pac_maintenance_frequency)
        .collect();
    let column = |f: fn(&RepositoryMetrics) -> f64| -> Vec<f64> { metrics.iter().map(f).collect() };
    let non_pac_code: Vec<f64> = metrics
        .iter()
        .map(|m| m.non_pac_code.median)
        .filter(|&v| v > 0.0)
        .collect();

    let summary = MaintenanceSummary {
        repositories: metrics.len(),
        median_pac_maintenance_frequency: median_f64(frequencies),
        median_pac_maintainer_percentage: median_f64(column(|m| m.pac_maintainer_percentage)),
        median_pac_commit_size: median_f64(column(|m| m.pac_commit_median_size)),
        median_non_pac_commit_size: median_f64(column(|m| m.non_pac_commit_median_size)),
        median_pac_code_changes: median_f64(column(|m| m.pac_code.median)),
        median_non_pac_code_changes: median_f64(non_pac_code),
        repositories_with_pac_changes: metrics.iter().filter(|m| m.pac_code.commits > 0).count(),
    };

    tracing::debug!(repositories = summary.repositories, "computed maintenance metrics");

    MaintenanceReport {
        repositories: metrics,
        summary,
    }
}

impl fmt::Display for MaintenanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PaC Maintenance Report")?;
        writeln!(f, "======================")?;
        writeln!(
            f,
            "{:<40} {:>8} {:>6} {:>8} {:>10} {:>10}",
            "Repository", "Commits", "PaC", "Freq %", "Authors %", "Median PaC"
        )?;
        writeln!(f, "{}", "-".repeat(87))?;
        for m in &self.repositories {
            let freq = m
                .pac_maintenance_frequency
                .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
            writeln!(
                f,
                "{:<40} {:>8} {:>6} {:>8} {:>10.1} {:>10.1}",
                m.repository,
                m.total_commits,
                m.pac_commits,
                freq,
                m.pac_maintainer_percentage,
                m.pac_code.median
            )?;
        }

        let s = &self.summary;
        writeln!(f, "\nMedians over {} repositories", s.repositories)?;
        writeln!(f, "  PaC maintenance frequency: {:.1}%", s.median_pac_maintenance_frequency)?;
        writeln!(f, "  PaC maintainer share:      {:.1}%", s.median_pac_maintainer_percentage)?;
        writeln!(f, "  PaC commit size:           {:.1}", s.median_pac_commit_size)?;
        writeln!(f, "  Non-PaC commit size:       {:.1}", s.median_non_pac_commit_size)?;
        writeln!(f, "  PaC code changes:          {:.1}", s.median_pac_code_changes)?;
        writeln!(f, "  Non-PaC code changes:      {:.1}", s.median_non_pac_code_changes)?;
        writeln!(
            f,
            "  Repositories with PaC changes: {}",
            s.repositories_with_pac_changes
        )
    }
}

impl MaintenanceReport {
    /// Render the report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# PaC Maintenance Report\n\n");
        if !self.repositories.is_empty() {
            out.push_str("| Repository | Commits | PaC commits | Frequency | Maintainers | Median PaC lines |\n");
            out.push_str("|------------|---------|-------------|-----------|-------------|------------------|\n");
            for m in &self.repositories {
                let freq = m
                    .pac_maintenance_frequency
                    .map_or_else(|| "-".to_string(), |v| format!("{v:.1}%"));
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {:.1}% | {:.1} |\n",
                    m.repository,
                    m.total_commits,
                    m.pac_commits,
                    freq,
                    m.pac_maintainer_percentage,
                    m.pac_code.median
                ));
            }
            out.push('\n');
        }
        let s = &self.summary;
        out.push_str(&format!(
            "**Medians over {} repositories:** frequency {:.1}%, maintainers {:.1}%, \
             PaC commit size {:.1}, non-PaC commit size {:.1}\n",
            s.repositories,
            s.median_pac_maintenance_frequency,
            s.median_pac_maintainer_percentage,
            s.median_pac_commit_size,
            s.median_non_pac_commit_size
        ));
        out
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Median with the mean of the middle pair for even lengths; 0 when empty.
fn median(values: &[u64]) -> f64 {
    median_f64(values.iter().map(|&v| v as f64).collect())
}

fn median_f64(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PacError;

/// Top-level configuration loaded from `.pacminer.toml`.
///
/// Resolution order: CLI flags > config file > defaults.
///
/// # Examples
///
/// ```
/// use pacminer_core::PacConfig;
///
/// let config = PacConfig::default();
/// assert_eq!(config.mining.min_confidence, 0.1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PacConfig {
    /// History collection settings.
    #[serde(default)]
    pub collect: CollectConfig,
    /// Result aggregation settings.
    #[serde(default)]
    pub aggregate: AggregateConfig,
    /// Co-change rule mining thresholds.
    #[serde(default)]
    pub mining: MiningConfig,
    /// Commit export for manual inspection.
    #[serde(default)]
    pub inspect: InspectConfig,
}

impl PacConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::Io`] if the file cannot be read, [`PacError::Toml`]
    /// if the content is not valid TOML, or [`PacError::Config`] if a value is
    /// out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use pacminer_core::PacConfig;
    /// use std::path::Path;
    ///
    /// let config = PacConfig::from_file(Path::new(".pacminer.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, PacError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::Toml`] if parsing fails or [`PacError::Config`] if
    /// validation fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use pacminer_core::PacConfig;
    ///
    /// let toml = r#"
    /// [mining]
    /// min_support = 0.01
    /// "#;
    /// let config = PacConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.mining.min_support, 0.01);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, PacError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every threshold lies in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::Config`] naming the offending key.
    pub fn validate(&self) -> Result<(), PacError> {
        self.mining.validate()
    }
}

/// Settings for the `collect` stage.
///
/// # Examples
///
/// ```
/// use pacminer_core::CollectConfig;
///
/// let config = CollectConfig::default();
/// assert!(config.parallel);
/// assert_eq!(config.repos_dir.to_str(), Some("repos"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// CSV registry of known PaC files (`repo_id`, `path`).
    #[serde(default = "default_registry")]
    pub registry: PathBuf,
    /// CSV list of repositories to analyze (`id`, `full_name`).
    #[serde(default = "default_repositories")]
    pub repositories: PathBuf,
    /// Directory holding local clones laid out as `<owner>/<name>`.
    #[serde(default = "default_repos_dir")]
    pub repos_dir: PathBuf,
    /// Where the collected dataset is written.
    #[serde(default = "default_collect_output")]
    pub output: PathBuf,
    /// Analyze repositories on worker threads (default: true).
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_registry() -> PathBuf {
    PathBuf::from("inputs/pac_filenames.csv")
}

fn default_repositories() -> PathBuf {
    PathBuf::from("inputs/repos.csv")
}

fn default_repos_dir() -> PathBuf {
    PathBuf::from("repos")
}

fn default_collect_output() -> PathBuf {
    PathBuf::from("outputs/results.json")
}

fn default_parallel() -> bool {
    true
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            repositories: default_repositories(),
            repos_dir: default_repos_dir(),
            output: default_collect_output(),
            parallel: default_parallel(),
        }
    }
}

/// Settings for the `aggregate` stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateConfig {
    /// Directory searched recursively for per-repository result files.
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,
    /// Where the merged dataset is written.
    #[serde(default = "default_aggregate_output")]
    pub output: PathBuf,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_aggregate_output() -> PathBuf {
    PathBuf::from("outputs/aggregated_results.json")
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output: default_aggregate_output(),
        }
    }
}

/// Association-rule thresholds.
///
/// # Examples
///
/// ```
/// use pacminer_core::MiningConfig;
///
/// let config = MiningConfig::default();
/// assert_eq!(config.min_support, 0.005);
/// assert_eq!(config.min_confidence, 0.1);
/// assert_eq!(config.top_rules, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Minimum fraction of transactions a rule must cover (default: 0.005).
    #[serde(default = "default_min_support")]
    pub min_support: f64,
    /// Minimum `P(other | pac)` for a rule to be kept (default: 0.1).
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Number of rules shown in reports (default: 20).
    #[serde(default = "default_top_rules")]
    pub top_rules: usize,
}

fn default_min_support() -> f64 {
    0.005
}

fn default_min_confidence() -> f64 {
    0.1
}

fn default_top_rules() -> usize {
    20
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            min_support: default_min_support(),
            min_confidence: default_min_confidence(),
            top_rules: default_top_rules(),
        }
    }
}

impl MiningConfig {
    /// Check that both thresholds are fractions.
    ///
    /// # Errors
    ///
    /// Returns [`PacError::Config`] if either value is outside `[0, 1]` or NaN.
    pub fn validate(&self) -> Result<(), PacError> {
        for (name, value) in [
            ("min_support", self.min_support),
            ("min_confidence", self.min_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PacError::Config(format!(
                    "mining.{name} must be between 0 and 1, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the `inspect` export.
///
/// # Examples
///
/// ```
/// use pacminer_core::InspectConfig;
///
/// let config = InspectConfig::default();
/// assert_eq!(config.sample_size, 100);
/// assert_eq!(config.seed, 42);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectConfig {
    /// CSV file the sampled commits are written to.
    #[serde(default = "default_inspect_output")]
    pub output: PathBuf,
    /// Commits to sample; 0 exports every PaC commit (default: 100).
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Seed for the sampler, so repeated exports pick the same commits.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_inspect_output() -> PathBuf {
    PathBuf::from("pac_commits_for_inspection.csv")
}

fn default_sample_size() -> usize {
    100
}

fn default_seed() -> u64 {
    42
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            output: default_inspect_output(),
            sample_size: default_sample_size(),
            seed: default_seed(),
        }
    }
}

use std::path::PathBuf;

/// Errors that can occur across the pacminer pipeline.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary surfaces it through `miette` at the boundary.
///
/// # Examples
///
/// ```
/// use pacminer_core::PacError;
///
/// let err = PacError::Registry("missing column `path`".into());
/// assert!(err.to_string().contains("missing column"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum PacError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("check the values in .pacminer.toml or the matching CLI flags"))]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// The PaC membership registry could not be loaded.
    #[error("registry error: {0}")]
    #[diagnostic(help("the registry must be a CSV file with `repo_id` and `path` columns"))]
    Registry(String),

    /// A tabular input (repository list) could not be read.
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A record violates an invariant of the data model.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Every merge input was malformed.
    #[error("no valid result sources ({failed} failed)")]
    #[diagnostic(help("run `pacminer validate` to see why each source was rejected"))]
    NoValidSources {
        /// Number of sources that were rejected.
        failed: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PacError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = PacError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = PacError::FileNotFound(PathBuf::from("/tmp/outputs"));
        assert!(err.to_string().contains("/tmp/outputs"));
    }

    #[test]
    fn no_valid_sources_reports_failure_count() {
        let err = PacError::NoValidSources { failed: 3 };
        assert_eq!(err.to_string(), "no valid result sources (3 failed)");
    }
}

//! File extension tokens used as co-change items.

/// Token for paths without a suffix.
pub const NO_EXTENSION: &str = "no_extension";

/// Lower-cased suffix of `path`, including the leading dot.
///
/// The suffix is taken from the last path component only. A leading dot
/// alone (`.gitignore`) or a trailing dot (`notes.`) is no suffix. When the
/// rest of the name ends in `.tar`, the token becomes `.tar<suffix>`.
///
/// # Examples
///
/// ```
/// use pacminer_cochange::extension::file_extension;
///
/// assert_eq!(file_extension("policies/Deny.REGO"), ".rego");
/// assert_eq!(file_extension("dist/bundle.tar.gz"), ".tar.gz");
/// assert_eq!(file_extension("Makefile"), "no_extension");
/// assert_eq!(file_extension(".gitignore"), "no_extension");
/// ```
pub fn file_extension(path: &str) -> String {
    let name = path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let (stem, suffix) = match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    };

    let mut extension = suffix.to_lowercase();
    if !stem.is_empty() && stem.ends_with(".tar") {
        extension.insert_str(0, ".tar");
    }

    if extension.is_empty() {
        NO_EXTENSION.to_string()
    } else {
        extension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_is_lowercased() {
        assert_eq!(file_extension("a/b/Policy.YAML"), ".yaml");
        assert_eq!(file_extension("main.go"), ".go");
    }

    #[test]
    fn only_last_suffix_counts() {
        assert_eq!(file_extension("chart.values.yaml"), ".yaml");
        assert_eq!(file_extension("dir.d/README"), NO_EXTENSION);
    }

    #[test]
    fn tar_double_suffix_collapses() {
        assert_eq!(file_extension("x.tar.gz"), ".tar.gz");
        assert_eq!(file_extension("x.tar.BZ2"), ".tar.bz2");
        assert_eq!(file_extension("x.tar"), ".tar");
        // The stem check is case-sensitive.
        assert_eq!(file_extension("X.TAR.GZ"), ".gz");
    }

    #[test]
    fn dot_edges() {
        assert_eq!(file_extension(".env"), NO_EXTENSION);
        assert_eq!(file_extension("notes."), NO_EXTENSION);
        assert_eq!(file_extension(".tar"), ".tar");
        assert_eq!(file_extension(""), NO_EXTENSION);
        assert_eq!(file_extension("policies/"), NO_EXTENSION);
    }
}

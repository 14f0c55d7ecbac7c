//! Co-change report: statistics plus the strongest rules.

use std::fmt;

use pacminer_core::{MiningConfig, RepositoryAnalysis};
use serde::Serialize;

use crate::rules::{mine_association_rules, AssociationRule};
use crate::stats::{extract_cochanges, ExtensionCounter, ExtensionStatistics};

/// Extensions listed per side in a report.
const TOP_EXTENSIONS: usize = 10;

/// Rules listed by lift in a report.
const TOP_LIFT_RULES: usize = 3;

/// Extension pairs listed in a report.
const TOP_PAIRS: usize = 10;

/// An extension and how many commits touched it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionCount {
    /// Extension token, e.g. `.rego` or `no_extension`.
    pub extension: String,
    /// Commits that touched the extension.
    pub count: usize,
    /// Percentage of the relevant commit population.
    pub percentage: f64,
}

/// A PaC extension and an other extension changed in the same commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionPair {
    pub pac_extension: String,
    pub other_extension: String,
    /// Commits that touched both.
    pub count: usize,
}

/// Everything `pacminer cochange` prints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoChangeReport {
    /// Support threshold the rules were mined with.
    pub min_support: f64,
    /// Confidence threshold the rules were mined with.
    pub min_confidence: f64,
    /// Commits with PaC changes.
    pub total_commits: usize,
    /// Commits with PaC changes that also changed other files.
    pub commits_with_other_files: usize,
    /// Percentage of PaC commits that also changed other files.
    pub cochange_rate: f64,
    /// Distinct PaC-side extensions.
    pub unique_pac_extensions: usize,
    /// Distinct other-side extensions.
    pub unique_other_extensions: usize,
    /// Most frequent PaC-side extensions, share of `total_commits`.
    pub top_pac_extensions: Vec<ExtensionCount>,
    /// Most frequent other-side extensions, share of `commits_with_other_files`.
    pub top_other_extensions: Vec<ExtensionCount>,
    /// Most frequent extension pairs.
    pub top_pairs: Vec<ExtensionPair>,
    /// Rules retained before truncation to `rules`.
    pub total_rules: usize,
    /// Strongest rules by confidence then support.
    pub rules: Vec<AssociationRule>,
    /// Strongest rules by lift.
    pub top_lift_rules: Vec<AssociationRule>,
}

/// Extract co-changes from `repositories`, count them and mine rules.
///
/// # Examples
///
/// ```
/// use pacminer_core::MiningConfig;
/// use pacminer_cochange::report::build_report;
///
/// let report = build_report(&[], &MiningConfig::default());
/// assert_eq!(report.total_commits, 0);
/// assert_eq!(report.cochange_rate, 0.0);
/// assert!(report.rules.is_empty());
/// ```
pub fn build_report(repositories: &[RepositoryAnalysis], config: &MiningConfig) -> CoChangeReport {
    let cochanges = extract_cochanges(repositories);
    let stats = ExtensionStatistics::from_cochanges(&cochanges);
    let mut rules = mine_association_rules(&cochanges, config.min_support, config.min_confidence);

    let mut by_lift = rules.clone();
    by_lift.sort_by(|a, b| b.lift.total_cmp(&a.lift));
    by_lift.truncate(TOP_LIFT_RULES);

    let total_rules = rules.len();
    rules.truncate(config.top_rules);

    let top = |counter: &ExtensionCounter, population: usize| -> Vec<ExtensionCount> {
        counter
            .most_common(TOP_EXTENSIONS)
            .into_iter()
            .map(|(extension, count)| ExtensionCount {
                extension: extension.to_string(),
                count,
                percentage: pacminer_core::ratio(count, population) * 100.0,
            })
            .collect()
    };

    let top_pairs = stats
        .most_common_pairs(TOP_PAIRS)
        .into_iter()
        .map(|(pac, other, count)| ExtensionPair {
            pac_extension: pac.to_string(),
            other_extension: other.to_string(),
            count,
        })
        .collect();

    tracing::info!(
        commits = stats.total_commits,
        rules = total_rules,
        "built co-change report"
    );

    CoChangeReport {
        min_support: config.min_support,
        min_confidence: config.min_confidence,
        total_commits: stats.total_commits,
        commits_with_other_files: stats.commits_with_other_files,
        cochange_rate: stats.cochange_rate() * 100.0,
        unique_pac_extensions: stats.pac_extensions.len(),
        unique_other_extensions: stats.other_extensions.len(),
        top_pac_extensions: top(&stats.pac_extensions, stats.total_commits),
        top_other_extensions: top(&stats.other_extensions, stats.commits_with_other_files),
        top_pairs,
        total_rules,
        rules,
        top_lift_rules: by_lift,
    }
}

impl fmt::Display for CoChangeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Co-Change Report")?;
        writeln!(f, "================")?;
        writeln!(f, "Commits with PaC changes: {}", self.total_commits)?;
        writeln!(f, "Commits with co-changes:  {}", self.commits_with_other_files)?;
        writeln!(f, "Co-change rate:           {:.1}%", self.cochange_rate)?;
        writeln!(f, "Unique PaC extensions:    {}", self.unique_pac_extensions)?;
        writeln!(f, "Unique other extensions:  {}", self.unique_other_extensions)?;

        for (title, rows) in [
            ("Top PaC extensions", &self.top_pac_extensions),
            ("Top co-changed extensions", &self.top_other_extensions),
        ] {
            writeln!(f, "\n{title}")?;
            writeln!(f, "{:<15} {:>8} {:>10}", "Extension", "Count", "Share")?;
            writeln!(f, "{}", "-".repeat(35))?;
            for row in rows {
                writeln!(
                    f,
                    "{:<15} {:>8} {:>9.1}%",
                    row.extension, row.count, row.percentage
                )?;
            }
        }

        if !self.top_pairs.is_empty() {
            writeln!(f, "\nTop co-change pairs")?;
            writeln!(f, "{:<30} {:>8}", "Pair", "Commits")?;
            writeln!(f, "{}", "-".repeat(39))?;
            for pair in &self.top_pairs {
                writeln!(
                    f,
                    "{:<30} {:>8}",
                    format!("{} + {}", pair.pac_extension, pair.other_extension),
                    pair.count
                )?;
            }
        }

        writeln!(
            f,
            "\nTop {} of {} rules (min support {}, min confidence {})",
            self.rules.len(),
            self.total_rules,
            self.min_support,
            self.min_confidence
        )?;
        writeln!(
            f,
            "{:<30} {:>9} {:>11} {:>8} {:>7}",
            "Rule", "Support", "Confidence", "Lift", "Count"
        )?;
        writeln!(f, "{}", "-".repeat(69))?;
        write_rule_rows(f, &self.rules)?;

        if !self.top_lift_rules.is_empty() {
            writeln!(f, "\nTop rules by lift")?;
            writeln!(f, "{}", "-".repeat(69))?;
            write_rule_rows(f, &self.top_lift_rules)?;
        }
        Ok(())
    }
}

fn write_rule_rows(f: &mut fmt::Formatter<'_>, rules: &[AssociationRule]) -> fmt::Result {
    for rule in rules {
        writeln!(
            f,
            "{:<30} {:>9.3} {:>11.3} {:>8.2} {:>7}",
            format!("{} -> {}", rule.antecedent, rule.consequent),
            rule.support,
            rule.confidence,
            rule.lift,
            rule.count
        )?;
    }
    Ok(())
}

fn push_rule_table(out: &mut String, rules: &[AssociationRule]) {
    out.push_str("| Rule | Support | Confidence | Lift | Count |\n");
    out.push_str("|------|---------|------------|------|-------|\n");
    for rule in rules {
        out.push_str(&format!(
            "| `{}` → `{}` | {:.3} | {:.3} | {:.2} | {} |\n",
            rule.antecedent, rule.consequent, rule.support, rule.confidence, rule.lift, rule.count
        ));
    }
}

impl CoChangeReport {
    /// Render the report as a markdown string.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Co-Change Report\n\n");
        out.push_str(&format!(
            "**{}** commits with PaC changes, **{}** with co-changes ({:.1}%)\n\n",
            self.total_commits, self.commits_with_other_files, self.cochange_rate
        ));

        for (title, rows) in [
            ("PaC extensions", &self.top_pac_extensions),
            ("Co-changed extensions", &self.top_other_extensions),
        ] {
            if rows.is_empty() {
                continue;
            }
            out.push_str(&format!("## {title}\n\n"));
            out.push_str("| Extension | Count | Share |\n");
            out.push_str("|-----------|-------|-------|\n");
            for row in rows {
                out.push_str(&format!(
                    "| `{}` | {} | {:.1}% |\n",
                    row.extension, row.count, row.percentage
                ));
            }
            out.push('\n');
        }

        if !self.top_pairs.is_empty() {
            out.push_str("## Co-change pairs\n\n");
            out.push_str("| PaC | Other | Commits |\n");
            out.push_str("|-----|-------|---------|\n");
            for pair in &self.top_pairs {
                out.push_str(&format!(
                    "| `{}` | `{}` | {} |\n",
                    pair.pac_extension, pair.other_extension, pair.count
                ));
            }
            out.push('\n');
        }

        out.push_str(&format!(
            "## Rules ({} of {})\n\n",
            self.rules.len(),
            self.total_rules
        ));
        if !self.rules.is_empty() {
            push_rule_table(&mut out, &self.rules);
        }
        if !self.top_lift_rules.is_empty() {
            out.push_str("\n## Top rules by lift\n\n");
            push_rule_table(&mut out, &self.top_lift_rules);
        }
        out
    }
}

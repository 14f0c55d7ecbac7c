use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result, WrapErr};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use pacminer_core::{OutputFormat, PacConfig};
use pacminer_dataset::inspect::{
    extract_pac_commits, sample_commits, write_csv, CommitStatistics,
};
use pacminer_dataset::merge::{AnalysisDataset, DatasetMerger, SourceFailure};
use pacminer_dataset::validate::{
    check_repository_outputs, find_result_files, repository_output_path, validate_file,
    ValidationStatus,
};
use pacminer_gitpulse::membership::MembershipIndex;
use pacminer_gitpulse::pipeline::{analyze_repositories, load_repository_list};

#[derive(Parser)]
#[command(
    name = "pacminer",
    version,
    about = "Mine how Policy-as-Code files are maintained across git histories",
    long_about = "pacminer walks repository histories, classifies every changed file as\n\
                   Policy-as-Code (PaC) or not, and reports how PaC files are maintained\n\
                   and which other files change with them.\n\n\
                   Examples:\n  \
                     pacminer collect                     Analyze every listed repository\n  \
                     pacminer collect --repository-no 3   Analyze only the third listed repository\n  \
                     pacminer aggregate                   Merge result files into one dataset\n  \
                     pacminer validate                    Check result files before merging\n  \
                     pacminer inspect --sample 50         Export sampled PaC commits to CSV\n  \
                     pacminer maintenance                 Maintenance frequency and size metrics\n  \
                     pacminer cochange --top 10           Extensions that change with PaC files"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .pacminer.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable tables and summaries (default)\n  \
                         json      Machine-readable JSON\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Mine and classify the history of every listed repository
    #[command(long_about = "Mine and classify the history of every listed repository.\n\n\
        Loads the PaC registry, walks each repository's history with git2, classifies\n\
        every changed file, and writes one dataset with a summary per repository.\n\
        Repositories that fail are recorded and skipped.\n\n\
        With --repository-no and no --output, the result goes to <output dir>/<owner>/<name>.json\n\
        and the run is skipped when that file already exists.\n\n\
        Examples:\n  pacminer collect\n  pacminer collect --repository-no 3")]
    Collect {
        /// PaC registry CSV with `repo_id` and `path` columns
        #[arg(long)]
        registry: Option<PathBuf>,
        /// Repository list CSV with `id` and `full_name` columns
        #[arg(long)]
        repositories: Option<PathBuf>,
        /// Directory holding clones laid out as <owner>/<name>
        #[arg(long)]
        repos_dir: Option<PathBuf>,
        /// Output dataset path
        #[arg(long)]
        output: Option<PathBuf>,
        /// Analyze only this 1-based row of the repository list
        #[arg(long)]
        repository_no: Option<usize>,
        /// Analyze repositories one at a time
        #[arg(long)]
        sequential: bool,
    },
    /// Merge result files into one dataset
    #[command(long_about = "Merge result files into one dataset.\n\n\
        Searches the input directory recursively for *.json result files, skips\n\
        malformed ones, and writes the merged dataset with a recomputed summary.\n\n\
        Examples:\n  pacminer aggregate\n  pacminer aggregate --input-dir outputs --output merged.json")]
    Aggregate {
        /// Directory searched for result files
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Merged dataset path
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check which result files are usable
    #[command(long_about = "Check which result files are usable.\n\n\
        Without --repositories, every *.json file under the input directory is checked.\n\
        With --repositories, each listed repository is looked up as <input dir>/<owner>/<name>.json\n\
        and reported as valid, invalid or missing, with processing and validation rates.\n\n\
        Examples:\n  pacminer validate\n  pacminer validate --repositories inputs/repos.csv")]
    Validate {
        /// Directory searched for result files
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Repository list CSV whose expected outputs are checked
        #[arg(long)]
        repositories: Option<PathBuf>,
    },
    /// Report PaC maintenance frequency, commit sizes and maintainers
    Maintenance {
        /// Dataset to analyze (default: the aggregate output)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Mine association rules between PaC and co-changed file extensions
    #[command(
        long_about = "Mine association rules between PaC and co-changed file extensions.\n\n\
        Every commit that changed PaC files and other files is one transaction.\n\
        Rules PaC-extension -> other-extension are kept when they reach both thresholds.\n\n\
        Examples:\n  pacminer cochange\n  pacminer cochange --min-support 0.01 --min-confidence 0.2 --top 10"
    )]
    Cochange {
        /// Dataset to analyze (default: the aggregate output)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Minimum support (default: 0.005)
        #[arg(long)]
        min_support: Option<f64>,
        /// Minimum confidence (default: 0.1)
        #[arg(long)]
        min_confidence: Option<f64>,
        /// Number of rules to show (default: 20)
        #[arg(long)]
        top: Option<usize>,
    },
    /// Export a sample of PaC commits to CSV for manual review
    #[command(long_about = "Export a sample of PaC commits to CSV for manual review.\n\n\
        Every commit with a counted PaC change becomes one row with its GitHub URL,\n\
        file counts, line counts and touched PaC files. A seeded sample keeps the\n\
        selection reproducible. Statistics cover every PaC commit, not just the sample.\n\n\
        Examples:\n  pacminer inspect\n  pacminer inspect --sample 369 --seed 7\n  pacminer inspect --all --output review.csv")]
    Inspect {
        /// Dataset to read (default: the aggregate output)
        #[arg(long)]
        input: Option<PathBuf>,
        /// CSV file to write (default: pac_commits_for_inspection.csv)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Number of commits to sample (default: 100)
        #[arg(long, conflicts_with = "all")]
        sample: Option<usize>,
        /// Export every PaC commit
        #[arg(long)]
        all: bool,
        /// Sampler seed (default: 42)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Create a default .pacminer.toml configuration file
    #[command(long_about = "Create a default .pacminer.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .pacminer.toml already exists.")]
    Init,
}

const CONFIG_FILE: &str = ".pacminer.toml";

const DEFAULT_CONFIG: &str = r#"# pacminer configuration

[collect]
# registry = "inputs/pac_filenames.csv"
# repositories = "inputs/repos.csv"
# repos_dir = "repos"
# output = "outputs/results.json"
# parallel = true

[aggregate]
# input_dir = "outputs"
# output = "outputs/aggregated_results.json"

[mining]
# min_support = 0.005
# min_confidence = 0.1
# top_rules = 20

[inspect]
# output = "pac_commits_for_inspection.csv"
# sample_size = 100
# seed = 42
"#;

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,pacminer=debug"
    } else {
        "warn,pacminer=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_ansi(std::io::stderr().is_terminal());
    Registry::default().with(filter).with(layer).init();
}

fn load_config(path: Option<&Path>) -> Result<PacConfig> {
    let config = match path {
        Some(path) => PacConfig::from_file(path)?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                PacConfig::from_file(default_path)?
            } else {
                PacConfig::default()
            }
        }
    };
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn progress_bar(len: usize) -> Result<indicatif::ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return Ok(indicatif::ProgressBar::hidden());
    }
    let pb = indicatif::ProgressBar::new(len as u64);
    pb.set_style(
        indicatif::ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg} ({elapsed})",
        )
        .into_diagnostic()?,
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Ok(pb)
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help().into_diagnostic()?;
        }
        Some(Command::Collect {
            registry,
            repositories,
            repos_dir,
            output,
            repository_no,
            sequential,
        }) => {
            let collect = &mut config.collect;
            let explicit_output = output.is_some();
            if let Some(registry) = registry {
                collect.registry = registry;
            }
            if let Some(repositories) = repositories {
                collect.repositories = repositories;
            }
            if let Some(repos_dir) = repos_dir {
                collect.repos_dir = repos_dir;
            }
            if let Some(output) = output {
                collect.output = output;
            }
            if sequential {
                collect.parallel = false;
            }

            // A missing registry is fatal.
            let index = MembershipIndex::from_csv_path(&collect.registry)?;
            let jobs =
                load_repository_list(&collect.repositories, &collect.repos_dir, repository_no)?;
            if jobs.is_empty() {
                return Err(miette::miette!(
                    help = "add rows with `id` and `full_name` columns",
                    "no repositories listed in {}",
                    collect.repositories.display()
                ));
            }

            // One numbered repository gets its own file unless --output says otherwise.
            let repository_output = match (&jobs[..], repository_no, explicit_output) {
                ([job], Some(_), false) => {
                    let output_dir = collect.output.parent().unwrap_or(Path::new(""));
                    repository_output_path(output_dir, &job.full_name)
                }
                _ => None,
            };
            if let Some(path) = &repository_output {
                if path.exists() {
                    tracing::info!(path = %path.display(), "result already exists, skipping");
                    if cli.format == OutputFormat::Text {
                        println!("Skipping {}: {} already exists", jobs[0].full_name, path.display());
                    }
                    return Ok(());
                }
            }

            let started = Instant::now();
            let pb = progress_bar(jobs.len())?;
            let outcome = analyze_repositories(&jobs, &index, collect.parallel, |job| {
                pb.set_message(job.full_name.clone());
                pb.inc(1);
            });
            pb.finish_and_clear();

            let all_failed = outcome.is_total_failure();
            let failures = outcome
                .failures
                .into_iter()
                .map(|f| SourceFailure {
                    source: f.full_name,
                    reason: f.reason,
                })
                .collect();
            let dataset =
                AnalysisDataset::from_run(outcome.results, failures, Some(started.elapsed()));
            // A failed run must not claim the per-repository slot, or a retry would skip it.
            let output = match repository_output {
                Some(path) if !all_failed => path,
                _ => collect.output.clone(),
            };
            dataset
                .write_to(&output)
                .wrap_err_with(|| format!("failed to write {}", output.display()))?;
            tracing::info!(path = %output.display(), "wrote dataset");

            match cli.format {
                OutputFormat::Json => print_json(&dataset.metadata)?,
                OutputFormat::Markdown => print!("{}", dataset.metadata.to_markdown()),
                OutputFormat::Text => print!("{}", dataset.metadata),
            }

            if all_failed {
                miette::bail!("no repository was analyzed successfully");
            }
        }
        Some(Command::Aggregate { input_dir, output }) => {
            let aggregate = &mut config.aggregate;
            if let Some(input_dir) = input_dir {
                aggregate.input_dir = input_dir;
            }
            if let Some(output) = output {
                aggregate.output = output;
            }

            let mut files = find_result_files(&aggregate.input_dir)?;
            files.retain(|f| f != &aggregate.output);
            if files.is_empty() {
                return Err(miette::miette!(
                    help = "run `pacminer collect` first",
                    "no result files found in {}",
                    aggregate.input_dir.display()
                ));
            }

            let mut merger = DatasetMerger::new();
            for file in &files {
                merger.add_file(file);
            }
            let dataset = merger.finish()?;
            dataset
                .write_to(&aggregate.output)
                .wrap_err_with(|| format!("failed to write {}", aggregate.output.display()))?;
            tracing::info!(path = %aggregate.output.display(), "wrote merged dataset");

            match cli.format {
                OutputFormat::Json => print_json(&dataset.metadata)?,
                OutputFormat::Markdown => print!("{}", dataset.metadata.to_markdown()),
                OutputFormat::Text => print!("{}", dataset.metadata),
            }
        }
        Some(Command::Validate {
            input_dir,
            repositories: Some(repositories),
        }) => {
            let input_dir = input_dir.unwrap_or(config.aggregate.input_dir);
            let jobs = load_repository_list(&repositories, &config.collect.repos_dir, None)?;
            let report = check_repository_outputs(
                jobs.iter().map(|job| (job.id, job.full_name.as_str())),
                &input_dir,
            );

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", report.to_markdown()),
                OutputFormat::Text => print!("{report}"),
            }
        }
        Some(Command::Validate {
            input_dir,
            repositories: None,
        }) => {
            let input_dir = input_dir.unwrap_or(config.aggregate.input_dir);
            let files = find_result_files(&input_dir)?;
            let reports: Vec<_> = files.iter().map(|f| validate_file(f)).collect();
            let valid = reports.iter().filter(|r| r.status.is_valid()).count();

            match cli.format {
                OutputFormat::Json => print_json(&reports)?,
                OutputFormat::Markdown => {
                    println!("# Result Files\n");
                    println!("| File | Status | Repositories | Commits | PaC changes |");
                    println!("|------|--------|--------------|---------|-------------|");
                    for report in &reports {
                        match &report.status {
                            ValidationStatus::Valid {
                                repository_count,
                                total_commits,
                                pac_changes,
                            } => println!(
                                "| `{}` | valid | {repository_count} | {total_commits} | {pac_changes} |",
                                report.source
                            ),
                            ValidationStatus::Invalid { reason } => {
                                println!("| `{}` | {reason} | - | - | - |", report.source)
                            }
                            ValidationStatus::Missing => {
                                println!("| `{}` | missing | - | - | - |", report.source)
                            }
                        }
                    }
                    println!("\n**{valid}** of **{}** files valid", reports.len());
                }
                OutputFormat::Text => {
                    for report in &reports {
                        match &report.status {
                            ValidationStatus::Valid {
                                repository_count,
                                total_commits,
                                pac_changes,
                            } => println!(
                                "ok       {}  ({repository_count} repositories, {total_commits} commits, {pac_changes} PaC changes)",
                                report.source
                            ),
                            ValidationStatus::Invalid { reason } => {
                                println!("invalid  {}  ({reason})", report.source)
                            }
                            ValidationStatus::Missing => {
                                println!("missing  {}", report.source)
                            }
                        }
                    }
                    println!("\n{valid} of {} files valid", reports.len());
                }
            }
        }
        Some(Command::Maintenance { input }) => {
            let input = input.unwrap_or(config.aggregate.output);
            let repositories = AnalysisDataset::load_repositories(&input)
                .wrap_err_with(|| format!("failed to load dataset {}", input.display()))?;
            let report = pacminer_gitpulse::maintenance::measure_all(&repositories);

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", report.to_markdown()),
                OutputFormat::Text => print!("{report}"),
            }
        }
        Some(Command::Cochange {
            input,
            min_support,
            min_confidence,
            top,
        }) => {
            let mining = &mut config.mining;
            if let Some(min_support) = min_support {
                mining.min_support = min_support;
            }
            if let Some(min_confidence) = min_confidence {
                mining.min_confidence = min_confidence;
            }
            if let Some(top) = top {
                mining.top_rules = top;
            }
            mining.validate()?;

            let input = input.unwrap_or(config.aggregate.output);
            let repositories = AnalysisDataset::load_repositories(&input)
                .wrap_err_with(|| format!("failed to load dataset {}", input.display()))?;
            let report = pacminer_cochange::report::build_report(&repositories, &config.mining);

            match cli.format {
                OutputFormat::Json => print_json(&report)?,
                OutputFormat::Markdown => print!("{}", report.to_markdown()),
                OutputFormat::Text => print!("{report}"),
            }
        }
        Some(Command::Inspect {
            input,
            output,
            sample,
            all,
            seed,
        }) => {
            let inspect = &mut config.inspect;
            if let Some(output) = output {
                inspect.output = output;
            }
            if let Some(sample) = sample {
                inspect.sample_size = sample;
            }
            if all {
                inspect.sample_size = 0;
            }
            if let Some(seed) = seed {
                inspect.seed = seed;
            }

            let input = input.unwrap_or(config.aggregate.output);
            let repositories = AnalysisDataset::load_repositories(&input)
                .wrap_err_with(|| format!("failed to load dataset {}", input.display()))?;
            let records = extract_pac_commits(&repositories);
            let statistics = CommitStatistics::from_records(&records);
            let sample = sample_commits(&records, inspect.sample_size, inspect.seed);
            write_csv(&sample, &inspect.output)
                .wrap_err_with(|| format!("failed to write {}", inspect.output.display()))?;

            match cli.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "output": inspect.output,
                    "sampled_commits": sample.len(),
                    "statistics": statistics,
                }))?,
                OutputFormat::Markdown => print!("{}", statistics.to_markdown()),
                OutputFormat::Text => {
                    print!("{statistics}");
                    if sample.is_empty() {
                        println!("\nNo PaC commits to write");
                    } else {
                        println!(
                            "\nWrote {} commits to {}",
                            sample.len(),
                            inspect.output.display()
                        );
                    }
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
    }

    Ok(())
}

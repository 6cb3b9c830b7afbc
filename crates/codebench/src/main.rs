use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use codebench_core::analyzer::CodeAnalyzer;
use codebench_core::attempt::{AttemptParser, ParseOptions};
use codebench_core::config::{Config, ExtractConfig, CONFIG_FILE_NAME};
use codebench_core::dataset::read_text;
use codebench_core::pipeline::ExtractionPipeline;

use codebench_python::PythonAnalyzer;
use codebench_report::{json, text, write_all, ExtractionSummary, OutputSelection};

#[derive(Parser)]
#[command(name = "codebench")]
#[command(about = "Extract attempt and code-metric datasets from programming-exercise logs")]
#[command(version)]
struct Cli {
    /// Log more (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Traverse a dataset and write one CSV file per record category
    Extract(ExtractArgs),
    /// Parse one execution log and print its attempts as JSON
    Parse {
        /// Path to the execution log
        log: PathBuf,
        /// Compute metrics for attempts that ended in an error too
        #[arg(long)]
        metrics_on_error: bool,
    },
    /// Compute the code metrics of one Python source file and print them as JSON
    Metrics {
        /// Path to the source file
        source: PathBuf,
    },
    /// Create a default .codebench.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// Dataset root (contains one directory per period)
    dataset: PathBuf,
    /// Config file path (defaults to .codebench.toml in the dataset root or an ancestor)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output directory for the CSV files
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Worker threads (0 = one per CPU)
    #[arg(short, long)]
    jobs: Option<usize>,
    #[command(flatten)]
    toggles: CategoryToggles,
    /// Run summary format
    #[arg(long, value_enum, default_value_t = SummaryFormat::Text)]
    summary: SummaryFormat,
}

#[derive(Args)]
struct CategoryToggles {
    /// Extract semester and course records
    #[arg(long, overrides_with = "no_courses")]
    courses: bool,
    #[arg(long, overrides_with = "courses", hide = true)]
    no_courses: bool,
    /// Extract assignment descriptions
    #[arg(long, overrides_with = "no_assignments")]
    assignments: bool,
    #[arg(long, overrides_with = "assignments", hide = true)]
    no_assignments: bool,
    /// Extract student questionnaires
    #[arg(long, overrides_with = "no_users")]
    users: bool,
    #[arg(long, overrides_with = "users", hide = true)]
    no_users: bool,
    /// Extract attempts from execution logs
    #[arg(long, overrides_with = "no_executions")]
    executions: bool,
    #[arg(long, overrides_with = "executions", hide = true)]
    no_executions: bool,
    /// Extract metrics of persisted solution files
    #[arg(long, overrides_with = "no_solutions")]
    solutions: bool,
    #[arg(long, overrides_with = "solutions", hide = true)]
    no_solutions: bool,
    /// Extract login events
    #[arg(long, overrides_with = "no_logins")]
    logins: bool,
    #[arg(long, overrides_with = "logins", hide = true)]
    no_logins: bool,
    /// Extract assignment grades
    #[arg(long, overrides_with = "no_grades")]
    grades: bool,
    #[arg(long, overrides_with = "grades", hide = true)]
    no_grades: bool,
    /// Extract editor events
    #[arg(long, overrides_with = "no_codemirror")]
    codemirror: bool,
    #[arg(long, overrides_with = "codemirror", hide = true)]
    no_codemirror: bool,
}

impl CategoryToggles {
    fn apply(&self, extract: &mut ExtractConfig) {
        extract.courses = toggle(self.courses, self.no_courses, extract.courses);
        extract.assignments = toggle(self.assignments, self.no_assignments, extract.assignments);
        extract.users = toggle(self.users, self.no_users, extract.users);
        extract.executions = toggle(self.executions, self.no_executions, extract.executions);
        extract.solutions = toggle(self.solutions, self.no_solutions, extract.solutions);
        extract.logins = toggle(self.logins, self.no_logins, extract.logins);
        extract.grades = toggle(self.grades, self.no_grades, extract.grades);
        extract.codemirror = toggle(self.codemirror, self.no_codemirror, extract.codemirror);
    }
}

fn toggle(on: bool, off: bool, current: bool) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        current
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SummaryFormat {
    Text,
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Extract(args) => cmd_extract(&args),
        Commands::Parse {
            log,
            metrics_on_error,
        } => cmd_parse(&log, metrics_on_error),
        Commands::Metrics { source } => cmd_metrics(&source),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(2);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_extract(args: &ExtractArgs) -> Result<()> {
    let mut config = load_config(&args.dataset, args.config.as_deref())?;
    args.toggles.apply(&mut config.extract);
    if let Some(dir) = &args.output {
        config.output.dir = dir.clone();
    }
    if let Some(jobs) = args.jobs {
        config.runtime.jobs = jobs;
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        tracing::warn!("interrupt received, finishing files already in progress");
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let started_at = Utc::now();
    let timer = Instant::now();

    let pipeline =
        ExtractionPipeline::new(Box::new(PythonAnalyzer::new()), config).with_cancel_flag(cancel);
    let result = pipeline.extract(&args.dataset)?;

    let config = pipeline.config();
    let selection = OutputSelection {
        courses: config.extract.courses,
        assignments: config.extract.assignments,
        users: config.extract.users,
        attempts: config.extract.executions,
        solutions: config.extract.solutions,
        logins: config.extract.logins,
        grades: config.extract.grades,
        codemirror: config.extract.codemirror,
    };
    let outputs = write_all(&config.output.dir, &result, selection)
        .context("failed to write output files")?;
    for path in &outputs {
        tracing::info!(path = %path.display(), "wrote output");
    }

    let summary = ExtractionSummary::new(
        args.dataset.clone(),
        &result,
        started_at,
        timer.elapsed(),
        outputs,
    );
    match args.summary {
        SummaryFormat::Text => print!("{}", text::format_summary(&summary)),
        SummaryFormat::Json => println!(
            "{}",
            json::format_summary(&summary, false).context("failed to serialize summary")?
        ),
    }

    if summary.interrupted {
        process::exit(1);
    }
    Ok(())
}

fn cmd_parse(log: &Path, metrics_on_error: bool) -> Result<()> {
    let raw = read_text(log)?;
    let analyzer = PythonAnalyzer::new();
    let parser =
        AttemptParser::new(&analyzer)?.with_options(ParseOptions { metrics_on_error });
    let parsed = parser.parse_with_diagnostics(&raw);
    for diagnostic in &parsed.diagnostics {
        tracing::warn!(path = %log.display(), "{diagnostic}");
    }
    let json =
        serde_json::to_string_pretty(&parsed.attempts).context("failed to serialize attempts")?;
    println!("{json}");
    Ok(())
}

fn cmd_metrics(source: &Path) -> Result<()> {
    let code = read_text(source)?;
    let outcome = PythonAnalyzer::new().analyze(&code);
    for failure in &outcome.failures {
        tracing::warn!(
            path = %source.display(),
            metric = %failure.metric,
            "metric not computed: {}",
            failure.reason
        );
    }
    let json =
        serde_json::to_string_pretty(&outcome.record).context("failed to serialize metrics")?;
    println!("{json}");
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE_NAME);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {CONFIG_FILE_NAME}"))?;
    println!("Created {CONFIG_FILE_NAME} with default configuration.");
    Ok(())
}

fn load_config(dataset: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(p) => Config::load(p),
        None => Ok(Config::load_or_default(dataset)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_toggle_precedence() {
        assert!(toggle(true, false, false));
        assert!(!toggle(false, true, true));
        assert!(toggle(false, false, true));
        assert!(!toggle(false, false, false));
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "codebench",
            "extract",
            "data",
            "--no-solutions",
            "--logins",
            "--jobs",
            "2",
        ])
        .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        let mut extract = ExtractConfig::default();
        args.toggles.apply(&mut extract);
        assert!(extract.executions);
        assert!(!extract.solutions);
        assert!(extract.logins);
        assert!(!extract.grades);
        assert!(!extract.courses);
        assert!(!extract.codemirror);
        assert_eq!(args.jobs, Some(2));
    }

    #[test]
    fn test_metadata_toggles() {
        let cli = Cli::try_parse_from([
            "codebench",
            "extract",
            "data",
            "--courses",
            "--users",
            "--codemirror",
            "--no-codemirror",
        ])
        .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        let mut extract = ExtractConfig::default();
        extract.assignments = true;
        args.toggles.apply(&mut extract);
        assert!(extract.courses);
        assert!(extract.assignments, "untouched flags keep the config value");
        assert!(extract.users);
        assert!(!extract.codemirror);
    }

    #[test]
    fn test_last_toggle_wins() {
        let cli =
            Cli::try_parse_from(["codebench", "extract", "data", "--grades", "--no-grades"])
                .unwrap();
        let Commands::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        let mut extract = ExtractConfig::default();
        args.toggles.apply(&mut extract);
        assert!(!extract.grades);
    }
}

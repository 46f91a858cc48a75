use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use is_terminal::IsTerminal;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schemadocs_catalog::{Connect, WarehouseConnect};
use schemadocs_core::{Config, ConfigError};
use schemadocs_engine::{
    remove_unused_databases, resolve_accessors, sync_databases, ReconcileError, Reporter, SyncEvent,
    SyncSummary, TaskId, TracingReporter,
};

/// schemadocs - Markdown documentation for database schemas
#[derive(Parser)]
#[command(name = "schemadocs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, default_value = "schemadocs.toml")]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync every configured database, then remove unused output
    Sync {
        /// Output directory (overrides output_dir from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep output of databases that are no longer configured
        #[arg(long)]
        no_clean: bool,
    },

    /// Remove output of databases that are no longer configured
    Clean {
        /// Output directory (overrides output_dir from the config)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check the configuration without connecting anywhere
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Credentials referenced from the config usually live in .env
    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;
    tracing::debug!(
        config = %cli.config.display(),
        output = %config.output_path().display(),
        "loaded configuration"
    );

    if cli.verbose {
        eprintln!(
            "{} {} ({} databases)",
            "Using config".cyan(),
            cli.config.display(),
            config.databases.len()
        );
    }

    let ok = match cli.command {
        Commands::Sync { output, no_clean } => {
            sync_command(&config, output.as_deref(), no_clean, cli.verbose).await?
        }
        Commands::Clean { output } => clean_command(&config, output.as_deref(), cli.verbose)?,
        Commands::Validate => validate_command(&config),
    };

    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the config file; a missing file is an error so `clean` can never run
/// against an empty database list by accident
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "Config file not found at {}. Create one or pass --config.",
            path.display()
        );
    }

    Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn output_dir(config: &Config, output: Option<&Path>) -> PathBuf {
    output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.output_path())
}

/// Sync command - write documentation for all databases
async fn sync_command(
    config: &Config,
    output: Option<&Path>,
    no_clean: bool,
    verbose: bool,
) -> Result<bool> {
    let base = output_dir(config, output);

    if verbose {
        eprintln!("{} {}", "Writing documentation to:".cyan(), base.display());
    }

    let mut reporter = reporter_for_stderr(verbose);
    let (summary, cleaned) =
        run_sync(config, &base, no_clean, &WarehouseConnect, reporter.as_mut()).await;

    // The report is printed even when cleaning fails
    print_sync_summary(&summary, &base);
    cleaned.context("Failed to remove unused output")?;

    Ok(summary.failed_backends().is_empty())
}

/// Sync, then clean unless disabled; the clean result is returned alongside
/// the summary instead of replacing it
async fn run_sync(
    config: &Config,
    base: &Path,
    no_clean: bool,
    connect: &dyn Connect,
    reporter: &mut dyn Reporter,
) -> (SyncSummary, Result<(), ReconcileError>) {
    let summary = sync_databases(&config.databases, base, connect, reporter).await;

    let cleaned = if no_clean {
        Ok(())
    } else {
        remove_unused_databases(&config.databases, base, reporter).map(|_| ())
    };

    (summary, cleaned)
}

/// Clean command - prune output no configured database produces
fn clean_command(config: &Config, output: Option<&Path>, verbose: bool) -> Result<bool> {
    let base = output_dir(config, output);

    if verbose {
        eprintln!("{} {}", "Cleaning:".cyan(), base.display());
    }

    let mut reporter = reporter_for_stderr(verbose);
    let report = remove_unused_databases(&config.databases, &base, reporter.as_mut())
        .context("Failed to remove unused output")?;

    if report.removed.is_empty() {
        println!("{}", "✓ Nothing to clean".green());
    } else {
        println!(
            "{} {} unused directories",
            "✓ Removed".green().bold(),
            report.removed.len()
        );
    }

    Ok(true)
}

/// Validate command - report every configuration problem
fn validate_command(config: &Config) -> bool {
    let problems = collect_problems(config);

    if config.databases.is_empty() {
        println!("{}", "⚠ No databases configured".yellow());
    }

    for db in &config.databases {
        let own: Vec<&ConfigError> = problems.iter().filter(|p| mentions(p, &db.name)).collect();
        if own.is_empty() {
            println!("  {} {} ({})", "✓".green(), db.name, db.database_type);
        } else {
            println!("  {} {} ({})", "✗".red(), db.name, db.database_type);
            for problem in own {
                println!("      {}", problem);
            }
        }
    }

    println!();
    if problems.is_empty() {
        println!("{}", "✓ Configuration is valid".green().bold());
        true
    } else {
        println!(
            "{} {} problems found",
            "✗".red().bold(),
            format!("{}", problems.len()).red().bold()
        );
        false
    }
}

/// Locator, pattern and accessor problems of every database entry
fn collect_problems(config: &Config) -> Vec<ConfigError> {
    let mut problems = Vec::new();

    for db in &config.databases {
        if let Err(err) = db.validate() {
            problems.push(err);
        }
        if let Err(err) = resolve_accessors(db) {
            problems.push(err);
        }
    }

    problems
}

fn mentions(problem: &ConfigError, name: &str) -> bool {
    match problem {
        ConfigError::MissingField { database, .. }
        | ConfigError::UnsupportedType { database, .. }
        | ConfigError::InvalidIdentifier { database, .. }
        | ConfigError::InvalidPattern { database, .. }
        | ConfigError::UnknownAccessor { database, .. } => database == name,
        ConfigError::IoError(_) | ConfigError::ParseError(_) => false,
    }
}

/// Print sync totals and contained failures
fn print_sync_summary(summary: &SyncSummary, base: &Path) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Sync Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Output:         {}", base.display());
    println!("Schemas synced: {}", summary.schemas_synced);
    println!("Tables synced:  {}", summary.tables_synced);

    if summary.failures.is_empty() {
        println!("Failures:       {}", "0".green());
    } else {
        println!(
            "Failures:       {}",
            format!("{}", summary.failures.len()).red().bold()
        );
    }
    println!();

    let failed = summary.failed_backends();
    if summary.is_clean() {
        println!("{}", "✓ All databases synced!".green().bold());
    } else if failed.is_empty() {
        println!("{}", "⚠ Synced with partial failures".yellow().bold());
    } else {
        println!("{} {}", "✗ Failed databases:".red().bold(), failed.join(", "));
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Colored console output on a terminal, plain log lines otherwise
fn reporter_for_stderr(verbose: bool) -> Box<dyn Reporter> {
    if std::io::stderr().is_terminal() {
        Box::new(ConsoleReporter::new(verbose))
    } else {
        Box::new(TracingReporter::new())
    }
}

/// Reporter that prints progress to stderr
struct ConsoleReporter {
    verbose: bool,
    tasks: Vec<(String, usize, usize)>,
}

impl ConsoleReporter {
    fn new(verbose: bool) -> Self {
        Self {
            verbose,
            tasks: Vec::new(),
        }
    }
}

impl Reporter for ConsoleReporter {
    fn begin_task(&mut self, label: &str, total: usize) -> TaskId {
        self.tasks.push((label.to_string(), total, 0));
        if self.verbose {
            eprintln!("  {} {} ({} items)", "→".cyan(), label, total);
        }
        TaskId(self.tasks.len() - 1)
    }

    fn advance(&mut self, task: TaskId) {
        if let Some((label, total, done)) = self.tasks.get_mut(task.0) {
            *done += 1;
            if self.verbose && *done == *total {
                eprintln!("  {} {} [{}/{}]", "✓".green(), label, done, total);
            }
        }
    }

    fn event(&mut self, event: SyncEvent) {
        match &event {
            SyncEvent::BackendStarted { .. } => {
                eprintln!("{} {}", "Syncing".cyan(), event);
            }
            SyncEvent::BackendFinished { .. } => {
                eprintln!("{} {}", "✓".green(), event);
            }
            SyncEvent::UnsupportedType { .. } | SyncEvent::SchemaSkipped { .. } => {
                eprintln!("{} {}", "⚠".yellow(), event);
            }
            SyncEvent::TableSkipped { .. } | SyncEvent::AccessorFailed { .. } => {
                eprintln!("  {} {}", "⚠".yellow(), event);
            }
            SyncEvent::BackendFailed { .. } => {
                eprintln!("{} {}", "✗".red(), event);
            }
            SyncEvent::Removed { .. } => {
                eprintln!("{} {}", "−".bright_black(), event);
            }
        }
    }
}

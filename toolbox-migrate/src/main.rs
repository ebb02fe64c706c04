//! Ledger migration tool
//!
//! Rewrites ledger INSERT dumps, runs the rewritten scripts against Postgres
//! and produces the matching document-store updates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use toolbox_core::{
    init_logging, ConsoleProgress, NoopProgress, PgStore, ProgressReporter, ToolboxConfig,
    DEFAULT_CONFIG_FILE,
};
use toolbox_migrate::paths::read_sql_file;
use toolbox_migrate::{
    filter_lines, remove_field_from_file, replace_text, InstructionGenerator, MigrationEngine,
    MigrationOptions, SqlExecutor,
};

#[derive(Parser)]
#[command(name = "toolbox-migrate")]
#[command(about = "Rewrite ledger INSERT dumps into dependency-safe migration scripts")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Postgres connection string (overrides the configuration file)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a dump into `<stem>_formatado<ext>`
    Rewrite {
        /// Input SQL file
        input: PathBuf,

        /// Only keep rows for these customer ids (comma separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,

        /// Columns to strip, replacing the configured list
        #[arg(long, value_delimiter = ',')]
        strip: Option<Vec<String>>,

        /// Target schema
        #[arg(long)]
        schema: Option<String>,

        /// Execute the rewritten script afterwards
        #[arg(long)]
        execute: bool,

        /// Generate document-store update instructions afterwards
        #[arg(long)]
        instructions: bool,

        /// Write the run diagnostics as JSON
        #[arg(long, value_name = "PATH")]
        report_json: Option<PathBuf>,
    },
    /// Execute a SQL file line by line
    Execute {
        /// SQL file, one statement per line
        input: PathBuf,
    },
    /// Generate document-store update instructions for the customers in a dump
    Instructions {
        /// Input SQL file
        input: PathBuf,
    },
    /// Remove a field from every statement in a file
    StripField {
        input: PathBuf,
        field: String,
    },
    /// Keep only lines containing any of the search strings
    Filter {
        input: PathBuf,

        #[arg(required = true)]
        needles: Vec<String>,
    },
    /// Replace text in every line of a file
    Replace {
        input: PathBuf,
        search: String,

        #[arg(default_value = "")]
        replacement: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = ToolboxConfig::load(&cli.config);
    let mut logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    if cli.verbose {
        logging = logging.verbose();
    }
    init_logging(&logging)?;

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    if cli.config.exists() {
        info!("Loaded configuration from {}", cli.config.display());
    } else {
        debug!("Config file {} not found, using defaults", cli.config.display());
    }
    if let Some(url) = cli.database_url.clone() {
        config.postgres.connection_string = Some(url);
    }

    info!("Ledger migration tool v{} starting", env!("CARGO_PKG_VERSION"));

    let mut progress: Box<dyn ProgressReporter> = if cli.quiet {
        Box::new(NoopProgress)
    } else {
        Box::new(ConsoleProgress::new())
    };

    match run(cli.command, config, progress.as_mut()).await {
        Ok(true) => {
            info!("Command completed successfully");
            Ok(())
        }
        Ok(false) => {
            warn!("Command completed with errors");
            std::process::exit(1);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(
    command: Commands,
    mut config: ToolboxConfig,
    progress: &mut dyn ProgressReporter,
) -> Result<bool> {
    match command {
        Commands::Rewrite {
            input,
            ids,
            strip,
            schema,
            execute,
            instructions,
            report_json,
        } => {
            if let Some(strip) = strip {
                config.migration.strip_fields = strip;
            }
            if let Some(schema) = schema {
                config.migration.target_schema = schema;
            }
            config.validate()?;

            let engine = MigrationEngine::new(MigrationOptions::from_settings(&config.migration), ids);
            let outcome = engine.process_file(&input, progress)?;
            outcome.diagnostics.print();
            println!("Output: {}", outcome.output_path.display());

            if let Some(path) = report_json {
                let json = serde_json::to_string_pretty(&outcome.diagnostics)?;
                std::fs::write(&path, json)
                    .with_context(|| format!("Failed to write report: {}", path.display()))?;
                info!("Diagnostics written to {}", path.display());
            }

            if !execute && !instructions {
                return Ok(true);
            }

            let store = connect(&config).await?;
            let mut success = true;

            if execute {
                let execution = SqlExecutor::new(&store)
                    .execute_file(&outcome.output_path, progress)
                    .await?;
                println!("Execution log: {}", execution.log_path.display());
                success = execution.success;
            }

            if instructions {
                if !success {
                    warn!("Skipping instruction generation because execution had failures");
                    return Ok(false);
                }
                let generator = InstructionGenerator::new(config.mongo, config.aggregate_view);
                let script = generator.generate(&store, &outcome.affected_keys).await?;
                let path = generator.write_script(&input, &script)?;
                println!("Instructions: {}", path.display());
            }

            Ok(success)
        }
        Commands::Execute { input } => {
            let store = connect(&config).await?;
            let execution = SqlExecutor::new(&store).execute_file(&input, progress).await?;
            println!(
                "Executed {} statements, {} failed, {} skipped",
                execution.executed, execution.failed, execution.skipped
            );
            println!("Execution log: {}", execution.log_path.display());
            Ok(execution.success)
        }
        Commands::Instructions { input } => {
            let keys = keys_in_file(&input, &config)?;
            info!("Found {} customer ids in {}", keys.len(), input.display());

            let store = connect(&config).await?;
            let generator = InstructionGenerator::new(config.mongo, config.aggregate_view);
            let script = generator.generate(&store, &keys).await?;
            let path = generator.write_script(&input, &script)?;
            if !script.missing_keys.is_empty() {
                println!("{} ids had no aggregate row", script.missing_keys.len());
            }
            println!("Instructions: {}", path.display());
            Ok(true)
        }
        Commands::StripField { input, field } => {
            let path = remove_field_from_file(&input, &field, progress)?;
            println!("Output: {}", path.display());
            Ok(true)
        }
        Commands::Filter { input, needles } => {
            let outcome = filter_lines(&input, &needles, progress)?;
            println!(
                "Kept {} of {} lines: {}",
                outcome.matched_lines,
                outcome.total_lines,
                outcome.output_path.display()
            );
            Ok(true)
        }
        Commands::Replace {
            input,
            search,
            replacement,
        } => {
            let outcome = replace_text(&input, &search, &replacement, progress)?;
            println!(
                "Replaced on {} of {} lines: {}",
                outcome.changed_lines,
                outcome.total_lines,
                outcome.output_path.display()
            );
            Ok(true)
        }
    }
}

async fn connect(config: &ToolboxConfig) -> Result<PgStore> {
    let url = config.connection_string()?;
    let timeout = Duration::from_secs(config.postgres.acquire_timeout_secs);
    PgStore::connect(url, timeout)
        .await
        .context("Failed to connect to Postgres")
}

fn keys_in_file(path: &Path, config: &ToolboxConfig) -> Result<BTreeSet<String>> {
    let content = read_sql_file(path)?;
    let lines: Vec<&str> = content.lines().collect();
    let engine = MigrationEngine::new(
        MigrationOptions::from_settings(&config.migration),
        Vec::<String>::new(),
    );
    Ok(engine.collect_keys(&lines))
}

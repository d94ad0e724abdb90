//! testrail-lake-sync - CLI tool to pull one TestRail project into the database
//!
//! Runs the collect, extract and convert subtasks for a (connection, project)
//! pair and reports what each one did.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/testrail-lake/data.db (~/.local/share/testrail-lake/data.db)
//! - Logs: $XDG_STATE_HOME/testrail-lake/testrail-lake.log (~/.local/state/testrail-lake/testrail-lake.log)
//! - Config: $XDG_CONFIG_HOME/testrail-lake/config.toml (~/.config/testrail-lake/config.toml)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{ArgAction, Parser};
use indicatif::{ProgressBar, ProgressStyle};
use testrail_lake_core::config::ParseErrorPolicy;
use testrail_lake_core::ingest::{
    IngestCoordinator, Phase, Subtask, SubtaskOutcome, SyncResult, TaskContext, TaskOptions,
};
use testrail_lake_core::{Config, Database, ScopeConfig, TestrailClient};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "testrail-lake-sync")]
#[command(about = "Collect, extract and convert a TestRail project into the QA data lake")]
#[command(version)]
struct Args {
    /// Connection id from config.toml
    #[arg(long, required_unless_present = "list")]
    connection: Option<i64>,

    /// TestRail project id
    #[arg(long, required_unless_present = "list")]
    project: Option<i64>,

    /// JSON file with the scope config (overrides the stored one)
    #[arg(long, value_name = "FILE")]
    scope_config: Option<PathBuf>,

    /// Only collect cases and runs created after this RFC 3339 instant
    #[arg(long, value_name = "RFC3339")]
    created_after: Option<String>,

    /// Run only the named subtask(s); repeatable
    #[arg(long = "subtask", value_name = "NAME")]
    subtasks: Vec<String>,

    /// Log and skip raw records that fail to parse instead of aborting
    #[arg(long)]
    skip_parse_errors: bool,

    /// List subtasks in run order and exit
    #[arg(long)]
    list: bool,

    /// Verbose output (-v per-subtask details)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.list {
        for subtask in Subtask::ALL {
            println!("{:<20} {}", subtask.name(), subtask.phase().as_str());
        }
        return Ok(());
    }

    // Validate everything the user passed before touching config, network or disk
    let options = task_options(&args)?;
    let coordinator = coordinator(&args.subtasks)?;

    // Load configuration
    let mut config = Config::load().context("failed to load configuration")?;
    if args.skip_parse_errors {
        config.pipeline.on_parse_error = ParseErrorPolicy::Skip;
    }

    // Initialize logging
    let _log_guard = testrail_lake_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!(
        connection_id = options.connection_id,
        project_id = options.project_id,
        "testrail-lake-sync starting"
    );

    let connection = config
        .connection(options.connection_id)
        .context("unknown connection")?;
    let client = TestrailClient::new(connection).context("failed to create TestRail client")?;

    // Open database at XDG-compliant path
    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());
    println!("TestRail: {}", client.base_url());
    println!(
        "Logs:     {}.*",
        testrail_lake_core::logging::log_file_path().display()
    );

    // Set up signal handler for graceful shutdown
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nCancelling...");
        token.cancel();
    })
    .context("failed to set Ctrl+C handler")?;

    let ctx = TaskContext::new(&db, &client, &options, &config.pipeline, cancel)
        .context("failed to prepare run")?;

    let pb = ProgressBar::new(coordinator.subtasks().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("invalid progress template")?
            .progress_chars("#>-"),
    );

    let result = coordinator
        .run_with_progress(&ctx, |current, _total, subtask| {
            pb.set_position(current as u64);
            pb.set_message(subtask.name());
        })
        .await;

    pb.finish_and_clear();

    let result = result.context("sync failed")?;
    print_sync_result(&result, args.verbose);

    tracing::info!(
        subtasks = result.reports.len(),
        domain_rows = result.domain_rows(),
        "testrail-lake-sync complete"
    );

    Ok(())
}

/// Build and validate run options from the command line
fn task_options(args: &Args) -> Result<TaskOptions> {
    let scope_config = match &args.scope_config {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read scope config {}", path.display()))?;
            let scope: ScopeConfig = serde_json::from_str(&content)
                .with_context(|| format!("invalid scope config {}", path.display()))?;
            Some(scope)
        }
        None => None,
    };

    let created_date_after = match &args.created_after {
        Some(value) => Some(
            DateTime::parse_from_rfc3339(value)
                .with_context(|| format!("--created-after {:?} is not RFC 3339", value))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let options = TaskOptions {
        connection_id: args.connection.unwrap_or_default(),
        project_id: args.project.unwrap_or_default(),
        name: None,
        title: None,
        scope_config,
        created_date_after,
    };
    options.validate().context("invalid run options")?;
    Ok(options)
}

fn coordinator(names: &[String]) -> Result<IngestCoordinator> {
    if names.is_empty() {
        return Ok(IngestCoordinator::new());
    }

    let mut subtasks = Vec::with_capacity(names.len());
    for name in names {
        match Subtask::from_name(name) {
            Some(subtask) => subtasks.push(subtask),
            None => bail!("unknown subtask {:?} (see --list)", name),
        }
    }
    Ok(IngestCoordinator::with_subtasks(subtasks))
}

/// Print sync result summary
fn print_sync_result(result: &SyncResult, verbose: u8) {
    let mut requests = 0;
    let mut records = 0;
    let mut tool_rows = 0;
    for report in &result.reports {
        match report.outcome {
            SubtaskOutcome::Collected(s) => {
                requests += s.requests;
                records += s.records;
            }
            SubtaskOutcome::Extracted(s) => tool_rows += s.rows,
            SubtaskOutcome::Converted(_) => {}
        }
    }

    println!("\nSync complete:");
    println!("  Subtasks run:     {}", result.reports.len());
    println!("  API requests:     {}", requests);
    println!("  Records staged:   {}", records);
    println!("  Tool rows:        {}", tool_rows);
    println!("  Domain rows:      {}", result.domain_rows());
    if result.skipped() > 0 {
        println!("  Records skipped:  {}", result.skipped());
    }

    // -v: Show per-subtask details
    if verbose >= 1 {
        println!("\nSubtasks:");
        for report in &result.reports {
            let detail = match report.outcome {
                SubtaskOutcome::Collected(s) => {
                    format!("{} records in {} requests", s.records, s.requests)
                }
                SubtaskOutcome::Extracted(s) => {
                    format!("{} rows from {} records", s.rows, s.records)
                }
                SubtaskOutcome::Converted(s) => {
                    format!("{} rows, {} filtered", s.rows, s.filtered)
                }
            };
            let marker = match report.subtask.phase() {
                Phase::Collect => "↓",
                Phase::Extract => "→",
                Phase::Convert => "⇒",
            };
            println!(
                "  {} {:<20} {} ({} ms)",
                marker,
                report.subtask.name(),
                detail,
                report.elapsed.as_millis()
            );
        }
    }
}

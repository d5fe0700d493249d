use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bulkrun::BulkError;
use bulkrun::domain::{BatchRun, ItemStatus};
use bulkrun::executor::CommandOperation;
use bulkrun::input;
use bulkrun::progress::ProgressReporter;
use bulkrun::runner::BatchOrchestrator;
use bulkrun::validation::{RequiredFields, validate_batch};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use config::Config;

fn setup_logging(default_filter: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bulkrun")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("bulkrun.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Runs the selected command. Returns false when the command should exit non-zero.
async fn run_application(cli: &Cli, config: &Config) -> Result<bool> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run(args) => handle_run_command(args, config).await,
        Commands::Validate { input, required } => handle_validate_command(input, required, config),
    }
}

/// Load a JSON array of records
fn load_records(path: &Path) -> Result<Vec<Value>> {
    let records = input::load_records(path).context(format!("Failed to load input {}", path.display()))?;
    info!("Loaded {} record(s) from {}", records.len(), path.display());
    Ok(records)
}

/// Config fields plus CLI fields, without duplicates
fn required_fields(config: &Config, extra: &[String]) -> RequiredFields {
    let mut fields = config.command.required_fields.clone();
    for field in extra {
        if !fields.contains(field) {
            fields.push(field.clone());
        }
    }
    RequiredFields::new(fields)
}

fn print_validation_errors(errors: &[String]) {
    println!("{} {} problem(s) found:", "Invalid input:".red(), errors.len());
    for error in errors {
        println!("  - {}", error);
    }
}

fn handle_validate_command(input: &Path, required: &[String], config: &Config) -> Result<bool> {
    info!("Validating {}", input.display());
    let records: Vec<Arc<Value>> = load_records(input)?.into_iter().map(Arc::new).collect();
    let validator = required_fields(config, required);

    let errors = validate_batch(&records, &validator);
    if errors.is_empty() {
        println!("{} {} record(s) ready to process", "Valid:".green(), records.len());
        Ok(true)
    } else {
        print_validation_errors(&errors);
        Ok(false)
    }
}

async fn handle_run_command(args: &RunArgs, config: &Config) -> Result<bool> {
    info!("Running '{}' over {}", args.command, args.input.display());
    let records = load_records(&args.input)?;

    let mut run_config = config.engine.to_run_config();
    if let Some(max_retries) = args.max_retries {
        run_config = run_config.with_max_retries(max_retries);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        if timeout_ms == 0 {
            eyre::bail!("--timeout-ms must be greater than zero");
        }
        run_config = run_config.with_timeout(Duration::from_millis(timeout_ms));
    }
    if let Some(delay_ms) = args.delay_ms {
        run_config = run_config.with_inter_item_delay(Duration::from_millis(delay_ms));
    }

    let terminal_exit_codes = if args.terminal_exit_codes.is_empty() {
        config.command.terminal_exit_codes.clone()
    } else {
        args.terminal_exit_codes.clone()
    };
    let mut operation = CommandOperation::new(&args.command).with_terminal_exit_codes(terminal_exit_codes);
    if let Some(dir) = &config.command.working_dir {
        operation = operation.with_working_dir(dir);
    }

    let orchestrator =
        Arc::new(BatchOrchestrator::new(operation, run_config).with_validator(required_fields(config, &args.required)));

    match orchestrator.submit(records) {
        Ok(()) => {}
        Err(BulkError::Validation(errors)) => {
            print_validation_errors(&errors);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }

    let progress = tokio::spawn(print_progress(orchestrator.subscribe()));

    let interrupt = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("{}", "Cancelling: finishing the current record...".yellow());
                orchestrator.cancel();
            }
        })
    };

    let outcome = orchestrator.start().await;
    interrupt.abort();
    let run = match outcome?.into_run() {
        Some(run) => run,
        None => eyre::bail!("Run was already started"),
    };
    if let Err(e) = progress.await {
        log::warn!("Progress printer stopped early: {}", e);
    }

    print_summary(&run);

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&run).context("Failed to serialize run report")?;
        fs::write(path, json).context(format!("Failed to write report to {}", path.display()))?;
        println!("{} {}", "Report written:".green(), path.display());
    }

    Ok(run.failed_count() == 0 && run.remaining_count() == 0)
}

/// Print one line each time an item finishes or the phase changes
async fn print_progress(mut reporter: ProgressReporter<Value>) {
    let mut last_finished = 0;
    while let Some(report) = reporter.changed().await {
        if report.finished() != last_finished || report.phase.is_terminal() {
            last_finished = report.finished();
            println!("{}", report.to_string().cyan());
        }
        if report.phase.is_terminal() {
            break;
        }
    }
}

fn print_summary(run: &BatchRun<Value>) {
    println!();
    for item in &run.items {
        let status = match item.status {
            ItemStatus::Succeeded => item.status.as_str().green(),
            ItemStatus::Failed => item.status.as_str().red(),
            _ => item.status.as_str().yellow(),
        };
        let retries = if item.attempt_count > 0 {
            format!(" ({} retr{})", item.attempt_count, if item.attempt_count == 1 { "y" } else { "ies" })
        } else {
            String::new()
        };
        match &item.last_error {
            Some(error) => println!("  #{:<4} {}{}: {}", item.index + 1, status, retries, error),
            None => println!("  #{:<4} {}{}", item.index + 1, status, retries),
        }
    }

    let line = format!(
        "{} succeeded, {} failed, {} not processed",
        run.succeeded_count(),
        run.failed_count(),
        run.remaining_count()
    );
    if run.failed_count() == 0 && run.remaining_count() == 0 {
        println!("{} {}", "Done:".green(), line);
    } else {
        println!("{} {}", "Done:".yellow(), line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration; it decides the default log level
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging before the application writes anything
    setup_logging(&config.log_filter(cli.is_verbose())).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let ok = run_application(&cli, &config).await.context("Application failed")?;
    if !ok {
        std::process::exit(1);
    }

    Ok(())
}

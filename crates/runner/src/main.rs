//! Simbatch - Main Entry Point
//! Runs a simulation parameter grid on a fixed-size pool of worker tasks

mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, ReportFormat};
use simbatch_core::application::RunSupervisor;
use simbatch_core::port::time_provider::SystemTimeProvider;
use simbatch_core::VERSION;
use simbatch_infra_system::SubprocessExecutor;

fn init_logging() -> Result<()> {
    let log_format = std::env::var("SIMBATCH_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("simbatch=info"))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init(),
        "compact" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().compact())
            .init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init(),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    init_logging()?;
    info!("Simbatch v{} starting...", VERSION);

    // 2. Load configuration (defaults -> file -> env -> flags)
    let mut settings = config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut settings);
    settings.batch.validate()?;

    // 3. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let mut executor = SubprocessExecutor::new(time_provider.clone());
    if let Some(dir) = settings.executor.working_dir {
        executor = executor.with_working_dir(dir);
    }
    if let Some(allowlist) = settings.executor.env_allowlist {
        info!(variables = ?allowlist, "Restricting simulator environment");
        executor = executor.with_env_allowlist(allowlist);
    }
    let supervisor = RunSupervisor::new(settings.batch, Arc::new(executor), time_provider);

    // 4. Dry run: list commands only
    if cli.dry_run {
        let jobs = supervisor.plan()?;
        match cli.report_format {
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&jobs)?),
            ReportFormat::Text => {
                for job in &jobs {
                    println!("{}", job.command_line());
                }
                println!("{} jobs", jobs.len());
            }
        }
        return Ok(());
    }

    // 5. Run the batch to drain
    let report = supervisor.run().await?;

    // 6. Report
    match cli.report_format {
        ReportFormat::Json => println!("{}", report.to_json_pretty()?),
        ReportFormat::Text => println!("{}", report.summary_line()),
    }

    Ok(())
}

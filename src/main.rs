use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use dupmon::api::DuplicatiClient;
use dupmon::config::AppConfig;
use dupmon::context::AppContext;
use dupmon::core::{BackupEndpoint, BackupMonitor, JobSnapshot, JobState, notifications};
use dupmon::logging::{self, LogConfig};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "dupmon")]
#[command(about = "Duplicati backup status monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the monitoring daemon
    Daemon(ServerArgs),
    /// List backups configured on the server
    List,
    /// Ask the server to start a backup now
    Run { backup_id: String },
    /// Poll once and print the state of every monitored backup
    Status,
}

#[derive(Args, Serialize)]
struct ServerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    server_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verify_ssl: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    poll_interval_secs: Option<u64>,

    /// Backup ids to monitor; may be given multiple times
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long = "backup")]
    backups: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Daemon(args) => AppConfig::new(Some(args))?,
        _ => AppConfig::new(None::<&ServerArgs>)?,
    };

    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });

    match &cli.command {
        Commands::Daemon(_) => {
            let ctx = build_context(config).await?;
            run_daemon(ctx).await.context("Daemon failed")?
        }
        Commands::List => run_list(config).await?,
        Commands::Run { backup_id } => run_trigger(config, backup_id).await?,
        Commands::Status => run_status(config).await?,
    }

    Ok(())
}

/// Connect to the server, verify the credential and assemble the shared
/// context for the daemon.
async fn build_context(config: AppConfig) -> Result<AppContext> {
    let client = DuplicatiClient::new(&config.profile())?;
    let host = client.host().to_string();

    let system_info = client
        .system_info()
        .await
        .with_context(|| format!("Failed to reach Duplicati server at '{host}'"))?;
    info!(
        host,
        version = system_info.server_version.as_deref().unwrap_or("unknown"),
        "connected to Duplicati server"
    );

    let endpoint: Arc<dyn BackupEndpoint> = Arc::new(client);
    let monitor = BackupMonitor::new(Arc::clone(&endpoint), config.backups.clone());

    // No explicit selection means monitor everything the server knows.
    if config.backups.is_empty() {
        let listing = monitor.list_available_backups().await?;
        for job in &listing {
            monitor.monitor(&job.id).await?;
        }
        info!(count = listing.len(), "monitoring all backups on server");
    }

    let notifier = notifications::create_notifier(&config.notifications);
    Ok(AppContext::new(config, monitor, notifier))
}

async fn run_daemon(ctx: AppContext) -> Result<()> {
    info!(
        interval_secs = ctx.config.poll_interval_secs,
        "starting poll loop"
    );

    let mut delay = Duration::ZERO;
    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                return Ok(());
            }
        }

        // An Err here is terminal (bad credential); transient problems are
        // reported inside the per-backup results and retried next tick.
        let report = ctx.monitor.refresh().await?;

        for (id, result) in &report.results {
            match result {
                Ok(snapshot) => {
                    debug!(backup_id = %id, state = snapshot.state.as_str(), "polled")
                }
                Err(err) => warn!(backup_id = %id, error = %err, "poll failed"),
            }
        }

        for event in &report.events {
            info!(backup_id = event.backup_id(), event = ?event, "backup event");
            if let Some(notifier) = &ctx.notifier {
                if let Err(err) = notifier.notify(event).await {
                    warn!(error = %err, "notification delivery failed");
                }
            }
        }

        let any_running = report
            .results
            .values()
            .any(|r| matches!(r, Ok(s) if s.state == JobState::Running));
        delay = if any_running {
            ctx.config.active_poll_interval()
        } else {
            ctx.config.poll_interval()
        };
    }
}

async fn run_list(config: AppConfig) -> Result<()> {
    let client = DuplicatiClient::new(&config.profile())?;
    let definitions = client.list_backups().await?;

    println!("{:<6} {:<30} {:<22} {:>12}", "ID", "NAME", "LAST RUN", "STORED");
    for def in &definitions {
        let meta = &def.backup.metadata;
        println!(
            "{:<6} {:<30} {:<22} {:>12}",
            def.backup.id,
            def.backup.name,
            format_time(meta.last_backup_finished()),
            format_size(meta.target_files_size()),
        );
    }
    Ok(())
}

async fn run_trigger(config: AppConfig, backup_id: &str) -> Result<()> {
    let client = DuplicatiClient::new(&config.profile())?;
    let endpoint: Arc<dyn BackupEndpoint> = Arc::new(client);
    let monitor = BackupMonitor::new(endpoint, config.backups.clone());

    monitor
        .trigger_backup(backup_id)
        .await
        .with_context(|| format!("Failed to start backup '{backup_id}'"))?;
    println!("Backup '{backup_id}' started; progress is visible on the next poll.");
    Ok(())
}

async fn run_status(config: AppConfig) -> Result<()> {
    let ctx = build_context(config).await?;
    let report = ctx.monitor.refresh().await?;

    for (id, result) in &report.results {
        match result {
            Ok(snapshot) => print_snapshot(id, snapshot),
            Err(err) => println!("{id}: ERROR - {err}"),
        }
    }
    Ok(())
}

fn print_snapshot(id: &str, snapshot: &JobSnapshot) {
    println!("{} ({})", snapshot.name, id);
    println!("  state:     {}", snapshot.state.as_str());
    println!("  last run:  {}", format_time(snapshot.last_run));
    if let Some(duration) = snapshot.last_duration {
        println!("  duration:  {}s", duration.as_secs());
    }
    if let Some(size) = snapshot.target_size {
        println!("  stored:    {}", format_size(Some(size)));
    }
    println!("  next run:  {}", format_time(snapshot.next_run));
    if let Some(error) = &snapshot.error_message {
        println!("  error:     {error}");
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_size(bytes: Option<u64>) -> String {
    match bytes {
        None => "-".to_string(),
        Some(b) if b >= 1024 * 1024 * 1024 => {
            format!("{:.1} GB", b as f64 / (1024.0 * 1024.0 * 1024.0))
        }
        Some(b) if b >= 1024 * 1024 => format!("{:.1} MB", b as f64 / (1024.0 * 1024.0)),
        Some(b) if b >= 1024 => format!("{:.1} KB", b as f64 / 1024.0),
        Some(b) => format!("{b} B"),
    }
}

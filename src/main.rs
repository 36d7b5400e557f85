use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tod_dispatch::metrics;
use tod_dispatch::Error;
use tod_dispatch::Hooks;
use tod_dispatch::Result;
use tod_dispatch::RosterFormat;
use tod_dispatch::Scheduler;
use tod_dispatch::Settings;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fans `"<vp> <destination>"` traceroute targets out to per vantage point
/// topology-on-demand clients and prints every completed trace.
#[derive(Debug, Parser)]
#[command(name = "tod-dispatch", version, about)]
struct Cli {
    /// TOML settings file (defaults to TOD_CONFIG_PATH, then built-in values)
    #[arg(short, long)]
    config: Option<String>,

    /// Monitor roster; overrides `roster.path`
    #[arg(short, long)]
    roster: Option<PathBuf>,

    /// Parse the roster as flat `name:ip` lines
    #[arg(long)]
    text_roster: bool,

    /// File with one `"<vp> <destination>"` target per line; stdin when omitted
    #[arg(short, long)]
    targets: Option<PathBuf>,

    /// Total traces in flight, split evenly across the vantage points used
    #[arg(long)]
    in_flight: Option<usize>,

    /// Per vantage point responsiveness timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = &cli.roster {
        settings.roster.path = Some(path.clone());
    }
    if cli.text_roster {
        settings.roster.format = RosterFormat::Text;
    }

    init_observability(&settings.monitoring.log_level);

    let targets = read_targets(cli.targets.as_ref()).await?;
    let scheduler = Arc::new(Scheduler::from_settings(&settings)?);

    let metrics_shutdown = CancellationToken::new();
    if settings.monitoring.metrics_enabled {
        tokio::spawn(metrics::start_server(
            settings.monitoring.prometheus_port,
            metrics_shutdown.clone(),
        ));
    }

    // Listen on Shutdown Signal
    let signal_target = scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = graceful_shutdown(&signal_target).await {
            error!("Failed to listen for shutdown signals: {:?}", e);
        }
    });

    let hooks = Hooks::new()
        .with_submit(|target| info!("submitted {}", target))
        .with_finish(|output, target| println!("{} {}", target, output));

    info!("Application started with {} targets", targets.len());
    let summary = scheduler
        .probe(hooks, targets.as_slice(), cli.in_flight, cli.timeout.map(Duration::from_secs))
        .await;
    metrics_shutdown.cancel();

    let summary = summary?;
    println!("------------");
    println!("{}", summary);
    for worker in &summary.workers {
        println!("{}", worker);
    }
    Ok(())
}

async fn read_targets(path: Option<&PathBuf>) -> Result<Vec<String>> {
    let content = match path {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Fatal(format!("cannot read targets from {}: {}", path.display(), e)))?,
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            let mut content = String::new();
            while let Some(line) = lines
                .next_line()
                .await
                .map_err(|e| Error::Fatal(format!("cannot read targets from stdin: {}", e)))?
            {
                content.push_str(&line);
                content.push('\n');
            }
            content
        }
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

async fn graceful_shutdown(scheduler: &Scheduler) -> Result<()> {
    let stopped = scheduler.shutdown_token();
    #[cfg(unix)]
    {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| Error::Fatal(format!("cannot install SIGTERM handler: {}", e)))?;
        tokio::select! {
            _ = sigterm.recv() => info!("SIGTERM detected."),
            r = tokio::signal::ctrl_c() => {
                r.map_err(|e| Error::Fatal(format!("cannot listen for Ctrl+C: {}", e)))?;
                info!("Ctrl+C detected.");
            }
            _ = stopped.cancelled() => return Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            r = tokio::signal::ctrl_c() => {
                r.map_err(|e| Error::Fatal(format!("cannot listen for Ctrl+C: {}", e)))?;
                info!("Ctrl+C detected.");
            }
            _ = stopped.cancelled() => return Ok(()),
        }
    }

    scheduler.exit();
    info!("Shutdown requested");
    Ok(())
}

fn init_observability(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

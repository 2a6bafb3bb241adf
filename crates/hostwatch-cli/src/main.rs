use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hostwatch_core::{
    EquipmentStore, FeedEvent, FeedPublisher, FileEquipmentStore, MemoryEquipmentStore,
    MonitorConfig, Prober, PropagationSink, ServiceRegistry, ServiceRequest, ServiceSnapshot,
    SystemPingProber, TcpProber,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod exporter;

#[derive(Debug, Parser)]
#[command(name = "hostwatchd")]
#[command(about = "Continuous host reachability monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long, value_enum, default_value = "icmp")]
    prober: ProberKind,

    #[arg(long, default_value_t = 80)]
    tcp_port: u16,

    #[arg(long, default_value_t = 1000)]
    probe_timeout_ms: u64,

    #[arg(long, default_value_t = 1000)]
    initial_interval_ms: u64,

    #[arg(long, default_value_t = 5000)]
    target_interval_ms: u64,

    #[arg(long, default_value_t = 10)]
    rolling_average: usize,

    #[arg(long, default_value_t = 5)]
    error_tolerance: u32,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe a host once and print the outcome.
    Probe { hostname: String },
    /// Monitor targets until ctrl-c.
    Run {
        /// `id=hostname`, or a bare hostname used as its own id.
        #[arg(long = "target", value_parser = parse_target)]
        targets: Vec<(String, String)>,

        /// JSON array of addService requests.
        #[arg(long)]
        targets_file: Option<PathBuf>,

        /// JSON array of equipment groups that receive status changes.
        #[arg(long)]
        equipment_file: Option<PathBuf>,

        #[arg(long, default_value = "./data/events")]
        events_dir: String,

        #[arg(long, default_value_t = 90)]
        retention_days: u64,

        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProberKind {
    Icmp,
    Tcp,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

fn parse_target(raw: &str) -> Result<(String, String), String> {
    let (id, host) = match raw.split_once('=') {
        Some((id, host)) => (id.trim(), host.trim()),
        None => (raw.trim(), raw.trim()),
    };
    if id.is_empty() || host.is_empty() {
        return Err(format!("invalid target {raw:?}, expected id=hostname"));
    }
    Ok((id.to_string(), host.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let prober = build_prober(&cli);

    match &cli.command {
        Command::Probe { hostname } => {
            let out = match prober.probe(hostname).await {
                Ok(outcome) => serde_json::json!({ "hostname": hostname, "outcome": outcome }),
                Err(err) => serde_json::json!({ "hostname": hostname, "error": err.to_string() }),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Command::Run {
            targets,
            targets_file,
            equipment_file,
            events_dir,
            retention_days,
            format,
        } => {
            let configs = collect_configs(&cli, targets, targets_file.as_ref())?;
            if configs.is_empty() {
                bail!("no targets given, use --target or --targets-file");
            }

            let store: Arc<dyn EquipmentStore> = match equipment_file {
                Some(path) => Arc::new(FileEquipmentStore::new(path)),
                None => Arc::new(MemoryEquipmentStore::default()),
            };
            let feed = FeedPublisher::default();
            let sink = PropagationSink::new(Arc::new(feed.clone()), store);
            let registry = ServiceRegistry::new(prober, sink);

            let exporter = tokio::spawn({
                let rx = feed.subscribe();
                let dir = events_dir.clone();
                let retention = *retention_days;
                async move { exporter::run_exporter(rx, &dir, retention).await }
            });

            run_loop(&registry, &feed, configs, *format).await?;

            registry.shutdown().await;
            drop(registry);
            drop(feed);
            match exporter.await {
                Ok(res) => res?,
                Err(err) => warn!(error = %err, "event exporter task failed"),
            }
        }
    }

    Ok(())
}

fn build_prober(cli: &Cli) -> Arc<dyn Prober> {
    let timeout = Duration::from_millis(cli.probe_timeout_ms);
    match cli.prober {
        ProberKind::Icmp => Arc::new(SystemPingProber::new(timeout)),
        ProberKind::Tcp => Arc::new(TcpProber::new(cli.tcp_port, timeout)),
    }
}

fn collect_configs(
    cli: &Cli,
    targets: &[(String, String)],
    targets_file: Option<&PathBuf>,
) -> Result<Vec<MonitorConfig>> {
    let mut requests: Vec<ServiceRequest> = targets
        .iter()
        .map(|(id, host)| ServiceRequest::new(id.clone(), host.clone()))
        .collect();

    if let Some(path) = targets_file {
        let raw = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let from_file: Vec<ServiceRequest> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        requests.extend(from_file);
    }

    requests
        .into_iter()
        .map(|mut req| {
            req.initial_ping_interval.get_or_insert(cli.initial_interval_ms);
            req.target_ping_interval.get_or_insert(cli.target_interval_ms);
            req.rolling_average.get_or_insert(cli.rolling_average);
            req.error_tolerance.get_or_insert(cli.error_tolerance);
            let id = req.service_id.clone();
            MonitorConfig::try_from(req).with_context(|| format!("invalid target {id:?}"))
        })
        .collect()
}

async fn run_loop(
    registry: &ServiceRegistry,
    feed: &FeedPublisher,
    configs: Vec<MonitorConfig>,
    format: OutputFormat,
) -> Result<()> {
    let mut rx = feed.subscribe();

    for config in configs {
        info!(service_id = %config.service_id, hostname = %config.hostname, "adding service");
        registry.add_service(config).await;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                break;
            }
            event = rx.recv() => match event {
                Ok(FeedEvent::Pong(snapshot)) => print_snapshot(&snapshot, format)?,
                Ok(FeedEvent::NewEventItem(entry)) => {
                    info!(category = %entry.category, title = %entry.title, "{}", entry.message);
                }
                Ok(FeedEvent::EquipmentGroups(_)) => {}
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "output lagged behind the feed"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &ServiceSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(snapshot)?);
        }
        OutputFormat::Ndjson => {
            println!("{}", serde_json::to_string(snapshot)?);
        }
        OutputFormat::Human => {
            let window = snapshot
                .ping_results
                .iter()
                .map(|ok| if *ok { '+' } else { '.' })
                .collect::<String>();
            let avg = if snapshot.average_response_time < 0.0 {
                "n/a".to_string()
            } else {
                format!("{:.1}ms", snapshot.average_response_time)
            };
            println!(
                "{} {:<16} {:<24} {:<12} avg={:<9} fails={} next={}ms [{}]",
                snapshot.last_updated.format("%H:%M:%S"),
                snapshot.service_id,
                snapshot.hostname,
                snapshot.status.label(),
                avg,
                snapshot.error_count,
                snapshot.current_interval,
                window,
            );
        }
    }

    Ok(())
}

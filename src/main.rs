use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use seatvisor::server::{Fleet, FleetOptions, InstanceState, edge_router, instance_router, serve};
use seatvisor::server::fleet::{random_requests, seed_catalog};
use seatvisor::{
    Config, CourseId, Dispatcher, DispatcherConfig, LogWriter, MemoryStore, Pipeline, Subscribe,
    wait_for_shutdown_signal,
};

#[derive(Parser)]
#[command(author, version, about = "Admission-controlled course enrollment fleet", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Address to bind
    #[arg(long, global = true, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one backend instance serving `/api`
    Instance {
        #[arg(short, long, default_value = "8081")]
        port: u16,
    },
    /// Run the round-robin edge serving `/lb`
    Dispatcher {
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Comma-separated backend URLs (overrides the config file)
        #[arg(long)]
        servers: Option<String>,
    },
    /// Run N instances and the edge in one process, optionally firing load
    Fleet {
        #[arg(long, default_value = "3")]
        instances: usize,

        #[arg(long, default_value = "8081")]
        base_port: u16,

        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Random enrollment requests to send once the fleet is up
        #[arg(long, default_value = "0")]
        requests: usize,

        /// Course targeted by the generated load
        #[arg(long, default_value = "3")]
        course: CourseId,

        /// Requests in flight at once while firing load
        #[arg(long, default_value = "64")]
        concurrency: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    match cli.command {
        Command::Instance { port } => run_instance(cfg, cli.host, port).await,
        Command::Dispatcher { port, servers } => run_dispatcher(cfg, cli.host, port, servers).await,
        Command::Fleet {
            instances,
            base_port,
            port,
            requests,
            course,
            concurrency,
        } => {
            let opts = FleetOptions {
                host: cli.host,
                instances,
                base_port,
                edge_port: port,
                load_concurrency: concurrency,
            };
            run_fleet(cfg, opts, requests, course).await
        }
    }
}

async fn run_instance(cfg: Config, host: IpAddr, port: u16) -> anyhow::Result<()> {
    let store = MemoryStore::new();
    seed_catalog(&store).await?;

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let pipeline = Pipeline::builder(cfg)
        .with_store(Arc::new(store))
        .with_subscribers(subs)
        .build();

    let listener = TcpListener::bind(SocketAddr::new(host, port))
        .await
        .with_context(|| format!("failed to bind instance on port {port}"))?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "instance listening");

    let app = instance_router(InstanceState {
        pipeline: pipeline.clone(),
        port: addr.port(),
    });
    serve(listener, app, shutdown_signal()).await?;

    pipeline.shutdown().await?;
    Ok(())
}

async fn run_dispatcher(
    cfg: Config,
    host: IpAddr,
    port: u16,
    servers: Option<String>,
) -> anyhow::Result<()> {
    let mut dcfg: DispatcherConfig = cfg.dispatcher;
    if let Some(raw) = servers {
        dcfg.servers = DispatcherConfig::parse_servers(&raw);
    }
    let dispatcher = Arc::new(Dispatcher::new(dcfg)?);

    let listener = TcpListener::bind(SocketAddr::new(host, port))
        .await
        .with_context(|| format!("failed to bind dispatcher on port {port}"))?;
    tracing::info!(addr = %listener.local_addr()?, servers = ?dispatcher.targets(), "edge listening");

    serve(listener, edge_router(dispatcher), shutdown_signal()).await?;
    Ok(())
}

async fn run_fleet(
    cfg: Config,
    opts: FleetOptions,
    requests: usize,
    course: CourseId,
) -> anyhow::Result<()> {
    let fleet = Fleet::start(&cfg, &opts)
        .await
        .context("failed to start fleet")?;
    tracing::info!(edge = %fleet.edge_url(), "fleet ready");

    if requests > 0 {
        let load = random_requests(requests, course, &mut rand::rng());
        fleet.fire(load).await;
        fleet.wait_idle().await;
        fleet.log_summary().await?;
    }

    shutdown_signal().await;
    fleet.log_summary().await?;
    fleet.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = wait_for_shutdown_signal().await {
        tracing::error!(error = %err, "failed to listen for shutdown signals");
    }
}

//! nodepool CLI: send requests through a failover pool and probe node health.
//!
//! # Commands
//! ```text
//! nodepool request    --url <URL>... [--strategy <NAME>] [--method <M>] [--path <P>] [--data <JSON>]
//! nodepool request    --config <cluster.json> --path /_cluster/health
//! nodepool status     --url <URL>... | --config <cluster.json>
//! nodepool strategies
//! nodepool --version
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nodepool_core::{
    Client, ClientConfig, Connection, DispatchError, Method, Request, StrategyKind,
    TransportError,
};
use nodepool_http::default_registry;

#[derive(Parser)]
#[command(
    name = "nodepool",
    about = "Send requests to a cluster of equivalent nodes with automatic failover",
    long_about = "
nodepool CLI: dispatch requests through a pool of interchangeable nodes.
A node that cannot be reached is disabled and the request moves on to the
next node picked by the selection strategy.

ENVIRONMENT VARIABLES:
  RUST_LOG    tracing filter (default: info, or debug with --verbose)
",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Dispatch one request through the pool and print the response body
    Request {
        #[command(flatten)]
        pool: PoolArgs,
        /// Request path, e.g. /_cluster/health
        #[arg(long, default_value = "/")]
        path: String,
        /// HTTP method (GET, POST, PUT, DELETE, HEAD)
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
        /// Query parameters as key=value, repeatable
        #[arg(short, long = "query")]
        query: Vec<String>,
        /// Print response metadata alongside the body
        #[arg(long)]
        info: bool,
    },

    /// Probe every node once and print pool health
    Status {
        #[command(flatten)]
        pool: PoolArgs,
        /// Path probed on each node
        #[arg(long, default_value = "/")]
        path: String,
    },

    /// List built-in connection strategies
    Strategies,
}

#[derive(Args)]
struct PoolArgs {
    /// Node base URL, repeatable
    #[arg(short, long = "url", conflicts_with = "config")]
    urls: Vec<String>,
    /// JSON cluster configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Connection strategy (overrides the configuration)
    #[arg(short, long)]
    strategy: Option<String>,
}

impl PoolArgs {
    fn load(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None if self.urls.is_empty() => bail!("either --url or --config is required"),
            None => ClientConfig::from_urls(self.urls.iter().cloned()),
        };
        if let Some(strategy) = &self.strategy {
            config.connection_strategy = Some(strategy.clone());
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Request { pool, path, method, data, query, info } => {
            cmd_request(&pool, &path, &method, data.as_deref(), &query, info).await
        }
        Commands::Status { pool, path } => cmd_status(&pool, &path).await,
        Commands::Strategies => {
            cmd_strategies();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_request(
    pool: &PoolArgs,
    path: &str,
    method: &str,
    data: Option<&str>,
    query: &[String],
    show_info: bool,
) -> Result<()> {
    let method: Method = method.parse().map_err(anyhow::Error::msg)?;
    let mut request = Request::new(path, method);
    if let Some(data) = data {
        let body = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.with_json(body);
    }
    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("query parameter '{pair}' is not key=value"))?;
        request = request.with_query(key, value);
    }

    let client = Client::new(pool.load()?, default_registry())?.with_failure_observer(
        |conn: &Connection, err: &TransportError| {
            tracing::warn!(node = %conn, error = %err, "node failed, trying next");
        },
    );

    let response = match client.send(&request).await {
        Ok(response) => response,
        Err(e) => {
            // Error responses still carry a body worth showing.
            if let Some(response) = e.response() {
                println!("{}", pretty(response.body()));
            }
            return Err(describe(e));
        }
    };

    if show_info {
        let transfer = response.transfer_info();
        println!("Status:     {}", response.status());
        if let Some(url) = &transfer.url {
            println!("URL:        {url}");
        }
        if let Some(sent) = transfer.method {
            println!("Method:     {sent}");
        }
        if let Some(elapsed) = response.query_time() {
            println!("Query time: {}ms", elapsed.as_millis());
        }
        println!();
    }
    println!("{}", pretty(response.body()));
    Ok(())
}

async fn cmd_status(pool: &PoolArgs, path: &str) -> Result<()> {
    let registry = default_registry();
    let client = Client::new(pool.load()?, registry.clone())?;
    let probe = Request::new(path, Method::Get);

    println!("Strategy: {}", client.connection_strategy().name());
    println!();
    for conn in client.connections().iter() {
        let transport = registry.resolve(conn.transport())?;
        let started = Instant::now();
        match transport.execute(conn, &probe).await {
            Ok(resp) => println!(
                "  {conn}  HTTP {}  {}ms",
                resp.status(),
                started.elapsed().as_millis()
            ),
            Err(e) => {
                client.pool().on_fail(conn);
                println!("  {conn}  failed: {e}");
            }
        }
    }

    println!();
    println!(
        "Pool: {} ({}/{} enabled)",
        client.health(),
        client.pool().enabled_count(),
        client.pool().len()
    );
    for (address, enabled) in client.pool().health_summary() {
        let state = if enabled { "enabled" } else { "disabled" };
        println!("  {state:<9} {address}");
    }
    Ok(())
}

fn cmd_strategies() {
    println!("Built-in connection strategies:\n");
    for kind in StrategyKind::ALL {
        let about = match kind {
            StrategyKind::Simple => "first enabled node in configured order",
            StrategyKind::RoundRobin => "cycle through enabled nodes, one per request",
        };
        println!("  {:<12} {about}", kind.as_str());
    }
}

fn describe(err: DispatchError) -> anyhow::Error {
    match &err {
        DispatchError::NoConnectionsAvailable => {
            anyhow::Error::new(err).context("every node in the pool is disabled")
        }
        _ => anyhow::Error::new(err),
    }
}

fn pretty(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| body.to_string())
}

//! `quayd`: the quay daemon.
//!
//! Binary entrypoint that wires the generated-key stores, secondary targets
//! and storage manager together behind the HTTP API.
//!
//! # Usage
//!
//! ```text
//! quayd start                          # start with defaults (V2, memstore)
//! quayd start -c quay.toml             # start with a config file
//! quayd start -l 127.0.0.1:3200 --v2=false   # issue V1 certificates
//! quayd check-config -c quay.toml      # validate wiring and exit
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quay_da::{MemDa, V1Store, V2Store};
use quay_http::{ApiServer, ApiServerConfig};
use quay_manager::{StorageManager, StorageManagerBuilder};
use quay_store::{FileStore, MemoryStore};
use quay_types::BackendTarget;
use tokio::sync::watch;
use tracing::{info, warn};

use config::QuaydConfig;

// -----------------------------------------------------------------------
// CLI definition
// -----------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "quayd", version, about = "quay blob storage proxy daemon")]
struct Cli {
    /// Path to TOML config file.
    #[arg(short, long, global = true, env = "QUAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the proxy.
    Start {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Build the storage manager from config, print its wiring and exit.
    CheckConfig {
        #[command(flatten)]
        overrides: Overrides,
    },
}

/// Flags that override config file values.
#[derive(clap::Args)]
struct Overrides {
    /// Override HTTP listen address (e.g. "127.0.0.1:3200").
    #[arg(short = 'l', long)]
    listen_addr: Option<String>,

    /// Issue V2 certificates (`--v2=false` issues V1).
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    v2: Option<bool>,

    /// Use the in-process simulated DA network.
    #[arg(long)]
    memstore: bool,
}

impl Overrides {
    fn apply(self, config: &mut QuaydConfig) {
        if let Some(addr) = self.listen_addr {
            config.server.listen_addr = addr;
        }
        if let Some(v2) = self.v2 {
            config.da.backend = if v2 { "v2" } else { "v1" }.to_string();
        }
        if self.memstore {
            config.da.memstore = true;
        }
    }
}

// -----------------------------------------------------------------------
// Entrypoint
// -----------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = QuaydConfig::load(cli.config.as_deref()).context("failed to load config")?;

    setup_tracing(&config.log.level);

    match cli.command {
        Commands::Start { overrides } => {
            overrides.apply(&mut config);
            cmd_start(config).await
        }
        Commands::CheckConfig { overrides } => {
            overrides.apply(&mut config);
            cmd_check_config(&config)
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

// -----------------------------------------------------------------------
// Wiring
// -----------------------------------------------------------------------

/// Construct every store named by `config` and build the manager.
///
/// All configuration errors surface here, before the listener binds.
fn build_manager(config: &QuaydConfig) -> Result<StorageManager> {
    let active = config.active_backend()?;
    anyhow::ensure!(
        config.da.memstore,
        "no DA network client is available; set da.memstore = true or pass --memstore"
    );

    let v1_config = config.v1_config()?;
    let v2_config = config.v2_config()?;
    let da = Arc::new(MemDa::new(config.memda_config()?));
    info!(
        verifier = %v2_config.cert_verifier_address,
        put_latency_ms = config.memstore.put_latency_ms,
        "using simulated DA network"
    );

    let v1 = V1Store::new(da.clone(), da.clone(), v1_config);
    let v2 = V2Store::new(da.clone(), da.clone(), da, v2_config);

    let mut builder = StorageManagerBuilder::new(active)
        .with_generated_store(Arc::new(v1))
        .with_generated_store(Arc::new(v2))
        .secondary_config(config.secondary_config());

    if config.storage.memory_max_bytes > 0 {
        info!(max_bytes = config.storage.memory_max_bytes, "memory target enabled");
        builder = builder.with_secondary(
            BackendTarget::Memory,
            Arc::new(MemoryStore::new(config.storage.memory_max_bytes)),
        );
    }
    if let Some(dir) = &config.storage.file_dir {
        info!(path = %dir.display(), "file target enabled");
        let store = FileStore::new(dir).context("failed to initialize file store")?;
        builder = builder.with_secondary(BackendTarget::File, Arc::new(store));
    }

    Ok(builder.build()?)
}

// -----------------------------------------------------------------------
// quayd start
// -----------------------------------------------------------------------

async fn cmd_start(config: QuaydConfig) -> Result<()> {
    info!(
        listen_addr = %config.server.listen_addr,
        backend = %config.da.backend,
        max_blob_size = config.max_blob_size(),
        "starting quayd"
    );

    let manager = Arc::new(build_manager(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let workers = manager.spawn_write_workers(shutdown_rx);

    let server = ApiServer::new(ApiServerConfig {
        manager,
        max_body_bytes: config.max_body_bytes(),
    });

    let served = server
        .serve_with_shutdown(&config.server.listen_addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(%e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await;

    // Stop the write workers whether or not the server exited cleanly.
    let _ = shutdown_tx.send(true);
    for worker in workers {
        if let Err(e) = worker.await {
            warn!(%e, "write worker panicked");
        }
    }

    served.context("HTTP server failed")?;
    info!("quayd stopped");
    Ok(())
}

// -----------------------------------------------------------------------
// quayd check-config
// -----------------------------------------------------------------------

fn cmd_check_config(config: &QuaydConfig) -> Result<()> {
    let manager = build_manager(config)?;
    let status = manager.status();

    println!("Active backend:   {}", status.active);
    let readable: Vec<String> = status.readable.iter().map(ToString::to_string).collect();
    println!("Readable certs:   {}", readable.join(", "));
    let caches: Vec<String> = status.caches.iter().map(ToString::to_string).collect();
    println!("Cache targets:    [{}]", caches.join(", "));
    let fallbacks: Vec<String> = status.fallbacks.iter().map(ToString::to_string).collect();
    println!("Fallback targets: [{}]", fallbacks.join(", "));
    println!("Write workers:    {}", manager.secondary().worker_count());
    println!("Listen address:   {}", config.server.listen_addr);

    Ok(())
}

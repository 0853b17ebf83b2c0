//! Management daemon: serves the admin API over a file-backed session.

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;
use tokio::net::TcpListener;

use proxy_mgmt::config::{load_config, watcher::ConfigWatcher, MgmtConfig};
use proxy_mgmt::http::{AdminServer, AppState};
use proxy_mgmt::lifecycle::{signals, Shutdown};
use proxy_mgmt::observability::{logging, metrics};
use proxy_mgmt::Session;

#[derive(Parser)]
#[command(name = "proxy-mgmt")]
#[command(about = "Configuration management daemon for the caching proxy", long_about = None)]
struct Args {
    /// Path to the daemon configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Watch the configuration file and apply changes
    #[arg(long)]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => MgmtConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("proxy-mgmt v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        config_dir = %config.storage.config_dir.display(),
        admin_enabled = config.admin.enabled,
        admin_address = %config.admin.bind_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let session = Session::open(&config.storage)?;
    let shared = Arc::new(ArcSwap::from_pointee(config.clone()));
    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    // Keep the watcher alive for the life of the daemon.
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let shared = Arc::clone(&shared);
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        update = updates.recv() => match update {
                            Some(new_config) => {
                                tracing::info!("Applying reloaded configuration");
                                shared.store(Arc::new(new_config));
                            }
                            None => break,
                        },
                        _ = stop.recv() => break,
                    }
                }
            });
            Some(watcher)
        }
        _ => None,
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let server = AdminServer::new(AppState::new(session.clone(), shared));
        server.run(listener, shutdown).await?;
    } else {
        tracing::info!("Admin API disabled; waiting for shutdown");
        shutdown.wait().await;
    }

    session.close();
    tracing::info!("Shutdown complete");
    Ok(())
}

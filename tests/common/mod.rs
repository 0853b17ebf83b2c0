//! Shared setup for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tempfile::TempDir;
use tokio::net::TcpListener;

use proxy_mgmt::config::{MgmtConfig, StorageConfig};
use proxy_mgmt::http::AppState;
use proxy_mgmt::{AdminServer, Session, Shutdown};

pub const API_KEY: &str = "test-admin-key";

/// Storage settings rooted in `dir`, with record overrides persisted there too.
pub fn storage_in(dir: &Path) -> StorageConfig {
    StorageConfig {
        config_dir: dir.join("config"),
        records_file: Some(dir.join("records.toml")),
    }
}

/// Place a configuration file by hand, as an operator would.
pub fn seed_file(dir: &Path, name: &str, lines: &[&str]) {
    let config_dir = dir.join("config");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join(name), lines.join("\n") + "\n").unwrap();
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub session: Session,
    pub shutdown: Shutdown,
    pub dir: TempDir,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Serve the admin API on an ephemeral port over a fresh temp directory.
/// `seed` runs against the directory before the session opens.
pub async fn spawn_admin(seed: impl FnOnce(&Path)) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    seed(dir.path());

    let mut config = MgmtConfig::default();
    config.admin.api_key = API_KEY.to_string();
    config.storage = storage_in(dir.path());

    let session = Session::open(&config.storage).unwrap();
    let state = AppState::new(session.clone(), Arc::new(ArcSwap::from_pointee(config)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = AdminServer::new(state);
    let stop = shutdown.clone();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestServer {
        addr,
        session,
        shutdown,
        dir,
    }
}

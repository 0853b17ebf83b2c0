//! Admin HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum Router with the admin handlers
//! - Wire up middleware (tracing, request ID, auth, metrics)
//! - Bind to a listener and serve until shutdown

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::admin::setup_admin_router;
use crate::config::MgmtConfig;
use crate::lifecycle::Shutdown;
use crate::session::Session;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: Session,
    /// Swapped on config reload; handlers always see a complete config.
    pub config: Arc<ArcSwap<MgmtConfig>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(session: Session, config: Arc<ArcSwap<MgmtConfig>>) -> Self {
        Self {
            session,
            config,
            started_at: Instant::now(),
        }
    }
}

/// HTTP server for the management API.
pub struct AdminServer {
    router: Router,
}

impl AdminServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        setup_admin_router(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin API listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        tracing::info!("Admin API stopped");
        Ok(())
    }
}

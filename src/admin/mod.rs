//! Management admin API.
//!
//! # Endpoints
//! - `GET  /mgmt/status`
//! - `GET  /mgmt/config/{file}` and `PUT /mgmt/config/{file}`
//! - `POST /mgmt/config/{file}/move`
//! - `POST /mgmt/records/get` and `POST /mgmt/records/set`
//! - `GET  /mgmt/records/match/{prefix}`
//! - `POST /mgmt/stats/reset`
//!
//! Every endpoint requires the bearer API key.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use self::auth::{admin_auth_middleware, track_requests};
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/mgmt/status", get(get_status))
        .route("/mgmt/config/{file}", get(get_config).put(put_config))
        .route("/mgmt/config/{file}/move", post(move_rule))
        .route("/mgmt/records/get", post(get_records))
        .route("/mgmt/records/set", post(set_records))
        .route("/mgmt/records/match/{prefix}", get(match_records))
        .route("/mgmt/stats/reset", post(reset_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .route_layer(middleware::from_fn(track_requests))
        .with_state(state)
}

/// Health check endpoints
///
/// `/health` is a lightweight liveness check. `/health/chains` probes every
/// registered chain and reports whether its runtime includes the identity
/// pallet, which also tells callers whether an empty lookup means "no
/// identity registered" or "chain has no identity support".

use crate::{
    context::AppContext,
    jobs::{self, tasks::ChainStatus},
    metrics,
};
use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use serde::Serialize;
use std::time::Instant;

/// Chain health response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainsHealth {
    /// Overall status: "healthy", "degraded", or "unhealthy"
    pub status: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub cached_queries: usize,
    pub chains: Vec<ChainStatus>,
}

/// Build health check routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health_basic))
        .route("/health/chains", get(health_chains))
}

/// Basic health check
pub async fn health_basic() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Probe every chain and report identity support
pub async fn health_chains(State(ctx): State<AppContext>) -> (StatusCode, Json<ChainsHealth>) {
    let start = Instant::now();

    let chains = jobs::tasks::probe_chains(&ctx).await;
    let status = determine_overall_status(&chains);

    let uptime = ctx.uptime_secs();
    metrics::set_uptime(uptime);

    let status_code = match status {
        "unhealthy" => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    tracing::info!(
        status = %status,
        duration_ms = start.elapsed().as_millis(),
        "chain_health_check_completed"
    );

    let health = ChainsHealth {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        cached_queries: ctx.queries.entry_count().await,
        chains,
    };

    (status_code, Json(health))
}

/// Unreachable chains degrade the service; all unreachable is unhealthy
fn determine_overall_status(chains: &[ChainStatus]) -> &'static str {
    let failed = chains.iter().filter(|c| c.error.is_some()).count();

    if failed == 0 {
        "healthy"
    } else if failed < chains.len() {
        "degraded"
    } else {
        "unhealthy"
    }
}

//! Monitor Control Routes

use alerting::{BreachKey, BreachState};
use axum::{
    extract::{Query, State},
    Json,
};
use monitor_scheduler::SweepReport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::AppState;

/// One tracked breach
#[derive(Debug, Serialize)]
pub struct BreachView {
    #[serde(flatten)]
    pub key: BreachKey,
    #[serde(flatten)]
    pub state: BreachState,
}

/// Response for monitor status endpoint
#[derive(Debug, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub tick_interval_secs: Option<u64>,
    pub breaches: Vec<BreachView>,
}

/// Query parameters for start endpoint
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// Overrides the configured tick interval
    pub interval_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub started: bool,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopped: bool,
}

/// Get monitor status and tracked breaches
pub async fn status(State(state): State<Arc<AppState>>) -> Json<MonitorStatus> {
    let breaches = state
        .monitor
        .breaches()
        .await
        .into_iter()
        .map(|(key, state)| BreachView { key, state })
        .collect();

    Json(MonitorStatus {
        running: state.monitor.is_running(),
        tick_interval_secs: state.monitor.tick_interval().await.map(|d| d.as_secs()),
        breaches,
    })
}

/// Start periodic sweeps
pub async fn start(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StartQuery>,
) -> Json<StartResponse> {
    let interval = params
        .interval_secs
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| state.monitor.config().tick_interval());

    info!(interval_secs = interval.as_secs(), "Monitor start requested");
    Json(StartResponse {
        started: state.monitor.start(interval).await,
    })
}

/// Stop periodic sweeps
pub async fn stop(State(state): State<Arc<AppState>>) -> Json<StopResponse> {
    info!("Monitor stop requested");
    Json(StopResponse {
        stopped: state.monitor.stop().await,
    })
}

/// Run one sweep immediately
pub async fn sweep(State(state): State<Arc<AppState>>) -> Json<SweepReport> {
    info!("Manual sweep requested");
    Json(state.monitor.run_sweep_once().await)
}

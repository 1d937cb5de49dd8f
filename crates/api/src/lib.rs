//! Threshold Monitor Service
//!
//! Wires the SQLite store, the threshold monitor, logging and metrics
//! together, and exposes a small operational HTTP surface.

use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use monitor_scheduler::{Collaborators, ThresholdMonitor};
use std::sync::Arc;
use std::time::Instant;
use storage::SqliteStore;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod routes;
pub mod settings;

pub use settings::Settings;

/// Application state shared across handlers
pub struct AppState {
    pub monitor: ThresholdMonitor,
    /// Version string
    pub version: String,
    pub start_time: Instant,
    /// Prometheus renderer, absent when no recorder was installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state
    pub fn new(monitor: ThresholdMonitor, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            monitor,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: Instant::now(),
            metrics,
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_handler))
        .route("/api/v1/monitor", get(routes::monitor::status))
        .route("/api/v1/monitor/start", post(routes::monitor::start))
        .route("/api/v1/monitor/stop", post(routes::monitor::stop))
        .route("/api/v1/monitor/sweep", post(routes::monitor::sweep))
        .route("/metrics", get(routes::health::metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging
pub fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
    } else {
        builder
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to set tracing subscriber: {}", e))
    }
}

/// Install the Prometheus recorder and describe the monitor's metrics
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("monitor_sweeps_total", "Completed threshold sweeps");
    metrics::describe_counter!("monitor_alerts_created_total", "Alerts raised by the monitor");
    metrics::describe_counter!(
        "monitor_alerts_resolved_total",
        "Alerts auto-resolved, by reason"
    );
    metrics::describe_counter!(
        "monitor_alerts_suppressed_total",
        "Breaching observations debounced as duplicates"
    );
    metrics::describe_counter!(
        "monitor_store_failures_total",
        "Store calls that failed or timed out, by operation"
    );
    metrics::describe_histogram!(
        "monitor_sweep_duration_seconds",
        metrics::Unit::Seconds,
        "Wall time of one sweep"
    );

    Ok(handle)
}

/// Run the service until Ctrl-C
pub async fn run_server(settings: Settings) -> anyhow::Result<()> {
    let metrics = init_metrics()?;

    let store = SqliteStore::connect(&settings.database.url, settings.database.max_connections)
        .await?;
    let monitor = ThresholdMonitor::new(
        Collaborators::from_store(Arc::new(store)),
        settings.monitor.monitor_config(),
        settings.tracker.clone(),
    );

    if settings.monitor.autostart {
        monitor.start(settings.monitor.tick_interval()).await;
    }

    let state = Arc::new(AppState::new(monitor.clone(), Some(metrics)));
    let app = create_router(state);

    info!("Starting API server on {}", settings.server.bind);

    let listener = tokio::net::TcpListener::bind(&settings.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use monitor_scheduler::MonitorConfig;
    use serde_json::Value;
    use storage::{AlertConfig, MemoryStore, Reading, Sensor};
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store
            .add_sensor(Sensor {
                id: 1,
                sensor_type: "humidity".to_string(),
                unit: "%".to_string(),
                description: String::new(),
            })
            .unwrap();
        store
            .upsert_config(AlertConfig {
                config_id: 1,
                user_id: 1,
                sensor_type: "Humidity".to_string(),
                min_value: 30.0,
                max_value: 70.0,
                is_active: true,
            })
            .unwrap();
        store
            .push_reading(Reading {
                sensor_id: 1,
                value: 82.0,
                recorded_at: Utc::now(),
            })
            .unwrap();

        let monitor = ThresholdMonitor::new(
            Collaborators::from_store(store.clone()),
            MonitorConfig::default(),
            Default::default(),
        );
        let state = Arc::new(AppState::new(monitor, None));
        (create_router(state), store)
    }

    async fn call(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let (status, body) = call(&app, "GET", "/api/v1/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["monitor"]["running"], false);
    }

    #[tokio::test]
    async fn test_manual_sweep() {
        let (app, store) = app();
        let (status, body) = call(&app, "POST", "/api/v1/monitor/sweep").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["alerts_created"], 1);
        assert_eq!(body["sensors_checked"], 1);
        assert_eq!(store.alerts().unwrap()[0].alert_type, "High humidity");

        let (_, body) = call(&app, "GET", "/api/v1/monitor").await;
        assert_eq!(body["running"], false);
        assert_eq!(body["breaches"][0]["sensor_id"], 1);
        assert_eq!(body["breaches"][0]["edge"], "high");
        assert_eq!(body["breaches"][0]["last_alerted_value"], 82.0);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let (app, _) = app();

        let (_, body) = call(&app, "POST", "/api/v1/monitor/start?interval_secs=120").await;
        assert_eq!(body["started"], true);
        let (_, body) = call(&app, "POST", "/api/v1/monitor/start").await;
        assert_eq!(body["started"], false);

        let (_, body) = call(&app, "GET", "/api/v1/monitor").await;
        assert_eq!(body["running"], true);
        assert_eq!(body["tick_interval_secs"], 120);

        let (_, body) = call(&app, "POST", "/api/v1/monitor/stop").await;
        assert_eq!(body["stopped"], true);
        let (_, body) = call(&app, "POST", "/api/v1/monitor/stop").await;
        assert_eq!(body["stopped"], false);
    }

    #[tokio::test]
    async fn test_start_clamps_interval() {
        let (app, _) = app();

        let (_, body) = call(
            &app,
            "POST",
            "/api/v1/monitor/start?interval_secs=18446744073709551615",
        )
        .await;
        assert_eq!(body["started"], true);

        let (_, body) = call(&app, "GET", "/api/v1/monitor").await;
        assert_eq!(body["running"], true);
        assert_eq!(
            body["tick_interval_secs"],
            monitor_scheduler::MAX_TICK_INTERVAL.as_secs()
        );

        let (_, body) = call(&app, "POST", "/api/v1/monitor/stop").await;
        assert_eq!(body["stopped"], true);
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let (app, _) = app();
        let (status, _) = call(&app, "GET", "/metrics").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

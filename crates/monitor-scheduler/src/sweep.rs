//! One sweep: evaluate every (sensor, config) pair, then reconcile pending
//! alerts against the breach map.

use crate::error::MonitorError;
use crate::scheduler::Inner;
use alerting::{
    alert_message, alert_type, evaluate, parse_edge, validate_band, BreachAction, BreachKey,
    BreachTracker, Edge,
};
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use storage::{AlertConfig, AlertId, DeviceId, NewAlert, Sensor, SensorId, StorageError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome counters of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Sensors with at least one matching config that were evaluated
    pub sensors_checked: usize,
    pub alerts_created: usize,
    /// Alerts resolved because their breach cleared or was superseded
    pub alerts_resolved: usize,
    /// Breaching observations debounced away
    pub suppressed: usize,
    /// Alerts resolved by reconciliation
    pub reconciled: usize,
    /// Store calls that failed or timed out
    pub failures: usize,
    /// Stopped early at a sensor boundary
    pub cancelled: bool,
}

impl Inner {
    pub(crate) async fn sweep(
        &self,
        tracker: &mut BreachTracker,
        cancel: &CancellationToken,
    ) -> SweepReport {
        let started = std::time::Instant::now();
        let suppressed_before = tracker.suppressed_count();
        let mut report = SweepReport::default();

        debug!("Checking sensor values against alert thresholds");

        match self
            .call("list_active_configs", self.stores.configs.list_active_configs())
            .await
        {
            Ok(configs) => self.evaluate_all(tracker, configs, cancel, &mut report).await,
            Err(e) => {
                error!(error = %e, "Cannot list active alert configurations");
                report.failures += 1;
            }
        }

        if !report.cancelled {
            self.reconcile(tracker, &mut report).await;
        }

        report.suppressed = (tracker.suppressed_count() - suppressed_before) as usize;

        counter!("monitor_sweeps_total").increment(1);
        counter!("monitor_alerts_suppressed_total").increment(report.suppressed as u64);
        histogram!("monitor_sweep_duration_seconds").record(started.elapsed().as_secs_f64());

        info!(
            sensors = report.sensors_checked,
            created = report.alerts_created,
            resolved = report.alerts_resolved,
            suppressed = report.suppressed,
            reconciled = report.reconciled,
            failures = report.failures,
            "Sweep finished"
        );
        report
    }

    async fn evaluate_all(
        &self,
        tracker: &mut BreachTracker,
        configs: Vec<AlertConfig>,
        cancel: &CancellationToken,
        report: &mut SweepReport,
    ) {
        let mut groups: HashMap<String, Vec<AlertConfig>> = HashMap::new();
        let mut active = HashSet::new();
        for config in configs {
            if let Err(e) = validate_band(&config) {
                warn!(error = %e, "Skipping invalid threshold config");
                continue;
            }
            active.insert(config.config_id);
            groups.entry(config.type_key()).or_default().push(config);
        }

        let pruned = tracker.retain_configs(&active);
        if !pruned.is_empty() {
            info!(count = pruned.len(), "Dropped breaches of inactive configs");
        }

        if groups.is_empty() {
            debug!("No active alert configurations found");
            return;
        }

        let sensors = match self.call("list_sensors", self.stores.sensors.list_sensors()).await {
            Ok(sensors) => sensors,
            Err(e) => {
                error!(error = %e, "Cannot list sensors");
                report.failures += 1;
                return;
            }
        };

        for sensor in &sensors {
            if cancel.is_cancelled() {
                info!("Sweep cancelled, remaining sensors skipped");
                report.cancelled = true;
                break;
            }

            let Some(group) = groups.get(&sensor.type_key()) else {
                continue;
            };
            self.check_sensor(tracker, sensor, group, report).await;
        }
    }

    async fn check_sensor(
        &self,
        tracker: &mut BreachTracker,
        sensor: &Sensor,
        group: &[AlertConfig],
        report: &mut SweepReport,
    ) {
        report.sensors_checked += 1;

        let reading = match self
            .call("latest_reading", self.stores.sensors.latest_reading(sensor.id))
            .await
        {
            Ok(Some(reading)) => reading,
            Ok(None) => {
                debug!(sensor_id = sensor.id, "No reading yet");
                return;
            }
            Err(e) => {
                warn!(sensor_id = sensor.id, error = %e, "Skipping sensor for this sweep");
                report.failures += 1;
                return;
            }
        };

        if !reading.value.is_finite() {
            warn!(sensor_id = sensor.id, value = reading.value, "Ignoring non-finite reading");
            return;
        }

        let now = self.clock.now();
        // Looked up at most once per sensor, and only when an alert is raised
        let mut device: Option<Option<DeviceId>> = None;

        for config in group {
            let state = evaluate(reading.value, config);
            for edge in Edge::ALL {
                let key = BreachKey::new(sensor.id, config.config_id, edge);
                match tracker.observe(key, state, reading.value, now) {
                    None => {}
                    Some(BreachAction::Create { key, value }) => {
                        let device_id = match device {
                            Some(device_id) => device_id,
                            None => {
                                let device_id = self.device_for(sensor.id).await;
                                device = Some(device_id);
                                device_id
                            }
                        };
                        self.create(tracker, sensor, config, key, value, device_id, now, report)
                            .await;
                    }
                    Some(BreachAction::Resolve { key, alert_id }) => {
                        self.resolve_cleared(tracker, key, alert_id, report).await;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn create(
        &self,
        tracker: &mut BreachTracker,
        sensor: &Sensor,
        config: &AlertConfig,
        key: BreachKey,
        value: f64,
        device_id: Option<DeviceId>,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) {
        let threshold = key.edge.threshold(config);
        let alert = NewAlert {
            device_id,
            sensor_id: sensor.id,
            alert_type: alert_type(key.edge, &sensor.sensor_type),
            message: alert_message(sensor, key.edge, value, threshold),
        };

        info!(
            sensor_id = sensor.id,
            config_id = config.config_id,
            message = %alert.message,
            "Creating alert"
        );

        let created = match self.call("create_alert", self.stores.alerts.create_alert(alert)).await {
            Ok(created) => created,
            Err(e) => {
                warn!(?key, error = %e, "Alert not created, will retry next sweep");
                report.failures += 1;
                return;
            }
        };

        report.alerts_created += 1;
        counter!("monitor_alerts_created_total").increment(1);

        if let Some(superseded) = tracker.record_created(key, created.alert_id, value, now) {
            match self
                .call("resolve_alert", self.stores.alerts.resolve_alert(superseded))
                .await
            {
                Ok(()) => {
                    debug!(alert_id = superseded, "Resolved superseded alert");
                    report.alerts_resolved += 1;
                    counter!("monitor_alerts_resolved_total", "reason" => "superseded").increment(1);
                }
                Err(e) => {
                    // Reconciliation picks it up as orphaned
                    warn!(alert_id = superseded, error = %e, "Superseded alert left pending");
                    report.failures += 1;
                }
            }
        }
    }

    async fn resolve_cleared(
        &self,
        tracker: &mut BreachTracker,
        key: BreachKey,
        alert_id: AlertId,
        report: &mut SweepReport,
    ) {
        match self
            .call("resolve_alert", self.stores.alerts.resolve_alert(alert_id))
            .await
        {
            Ok(()) => {
                info!(?key, alert_id, "Auto-resolved alert, value back within range");
                tracker.record_resolved(key);
                report.alerts_resolved += 1;
                counter!("monitor_alerts_resolved_total", "reason" => "cleared").increment(1);
            }
            Err(e) => {
                warn!(?key, alert_id, error = %e, "Alert not resolved, will retry next sweep");
                report.failures += 1;
            }
        }
    }

    async fn device_for(&self, sensor_id: SensorId) -> Option<DeviceId> {
        match self
            .call("find_device_for_sensor", self.stores.devices.find_device_for_sensor(sensor_id))
            .await
        {
            Ok(device_id) => {
                if device_id.is_none() {
                    debug!(sensor_id, "No device found for sensor");
                }
                device_id
            }
            Err(e) => {
                warn!(sensor_id, error = %e, "Device lookup failed, alert left unattributed");
                None
            }
        }
    }

    /// Resolve pending alerts no live breach attributes, and detach breaches
    /// whose alert was resolved elsewhere.
    async fn reconcile(&self, tracker: &mut BreachTracker, report: &mut SweepReport) {
        let pending = match self
            .call("list_pending_alerts", self.stores.alerts.list_pending_alerts())
            .await
        {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "Reconciliation skipped");
                report.failures += 1;
                return;
            }
        };

        let pending_ids: HashSet<AlertId> = pending.iter().map(|a| a.alert_id).collect();
        tracker.detach_resolved(&pending_ids);

        for alert in &pending {
            let Some(edge) = parse_edge(&alert.alert_type) else {
                debug!(alert_id = alert.alert_id, alert_type = %alert.alert_type, "Not a threshold alert");
                continue;
            };
            if !tracker.is_orphaned(alert.sensor_id, edge, alert.alert_id) {
                continue;
            }

            match self
                .call("resolve_alert", self.stores.alerts.resolve_alert(alert.alert_id))
                .await
            {
                Ok(()) => {
                    info!(
                        alert_id = alert.alert_id,
                        sensor_id = alert.sensor_id,
                        "Auto-resolved alert without live breach"
                    );
                    report.reconciled += 1;
                    counter!("monitor_alerts_resolved_total", "reason" => "reconciled").increment(1);
                }
                Err(e) => {
                    warn!(alert_id = alert.alert_id, error = %e, "Reconciliation resolve failed");
                    report.failures += 1;
                }
            }
        }
    }

    /// Run a store call under the per-call timeout
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, MonitorError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let budget = self.config.call_timeout();
        let result = match tokio::time::timeout(budget, fut).await {
            Ok(result) => result.map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout {
                operation,
                after_ms: budget.as_millis() as u64,
            }),
        };

        if result.is_err() {
            counter!("monitor_store_failures_total", "operation" => operation).increment(1);
        }
        result
    }
}

//! In-memory store implementation

use crate::model::{
    Alert, AlertConfig, AlertId, AlertStatus, ConfigId, DeviceId, NewAlert, Reading, Sensor,
    SensorId,
};
use crate::store::{AlertStore, ConfigStore, DeviceDirectory, SensorSource};
use crate::StorageError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Default)]
struct Tables {
    sensors: Vec<Sensor>,
    readings: HashMap<SensorId, Vec<Reading>>,
    configs: Vec<AlertConfig>,
    devices: HashMap<SensorId, DeviceId>,
    alerts: Vec<Alert>,
    next_alert_id: AlertId,
}

/// Process-local store implementing every monitor collaborator
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Max readings kept per sensor
    max_readings_per_sensor: usize,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        info!("Creating in-memory store");
        Self {
            tables: Mutex::new(Tables {
                next_alert_id: 1,
                ..Default::default()
            }),
            max_readings_per_sensor: 1_000,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::DatabaseError(format!("Lock error: {}", e)))
    }

    /// Provision a sensor, replacing any sensor with the same id
    pub fn add_sensor(&self, sensor: Sensor) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.sensors.retain(|s| s.id != sensor.id);
        tables.sensors.push(sensor);
        Ok(())
    }

    /// Append a reading
    pub fn push_reading(&self, reading: Reading) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let log = tables.readings.entry(reading.sensor_id).or_default();

        // Enforce retention
        if log.len() >= self.max_readings_per_sensor {
            log.remove(0);
        }

        log.push(reading);
        Ok(())
    }

    /// Add or replace a threshold config
    pub fn upsert_config(&self, config: AlertConfig) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        tables.configs.retain(|c| c.config_id != config.config_id);
        tables.configs.push(config);
        Ok(())
    }

    /// Toggle a config's active flag
    pub fn set_config_active(&self, config_id: ConfigId, active: bool) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        let config = tables
            .configs
            .iter_mut()
            .find(|c| c.config_id == config_id)
            .ok_or(StorageError::NotFound)?;
        config.is_active = active;
        Ok(())
    }

    /// Associate a sensor with the device it is mounted on
    pub fn link_device(&self, sensor_id: SensorId, device_id: DeviceId) -> Result<(), StorageError> {
        self.lock()?.devices.insert(sensor_id, device_id);
        Ok(())
    }

    /// Snapshot of every alert, oldest first
    pub fn alerts(&self) -> Result<Vec<Alert>, StorageError> {
        Ok(self.lock()?.alerts.clone())
    }

    /// Look up one alert
    pub fn alert(&self, alert_id: AlertId) -> Result<Alert, StorageError> {
        self.lock()?
            .alerts
            .iter()
            .find(|a| a.alert_id == alert_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SensorSource for MemoryStore {
    async fn list_sensors(&self) -> Result<Vec<Sensor>, StorageError> {
        Ok(self.lock()?.sensors.clone())
    }

    async fn latest_reading(&self, sensor_id: SensorId) -> Result<Option<Reading>, StorageError> {
        let tables = self.lock()?;
        Ok(tables
            .readings
            .get(&sensor_id)
            .and_then(|log| log.iter().max_by_key(|r| r.recorded_at))
            .copied())
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn list_active_configs(&self) -> Result<Vec<AlertConfig>, StorageError> {
        Ok(self
            .lock()?
            .configs
            .iter()
            .filter(|c| c.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn create_alert(&self, alert: NewAlert) -> Result<Alert, StorageError> {
        let mut tables = self.lock()?;
        let alert_id = tables.next_alert_id;
        tables.next_alert_id += 1;

        let record = Alert {
            alert_id,
            device_id: alert.device_id,
            sensor_id: alert.sensor_id,
            alert_type: alert.alert_type,
            message: alert.message,
            status: AlertStatus::Pending,
            created_at: Utc::now(),
        };
        tables.alerts.push(record.clone());
        debug!("Inserted alert with ID {}", alert_id);

        Ok(record)
    }

    async fn resolve_alert(&self, alert_id: AlertId) -> Result<(), StorageError> {
        let mut tables = self.lock()?;
        if let Some(alert) = tables.alerts.iter_mut().find(|a| a.alert_id == alert_id) {
            alert.status = AlertStatus::Resolved;
        }
        Ok(())
    }

    async fn list_pending_alerts(&self) -> Result<Vec<Alert>, StorageError> {
        Ok(self
            .lock()?
            .alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Pending)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl DeviceDirectory for MemoryStore {
    async fn find_device_for_sensor(
        &self,
        sensor_id: SensorId,
    ) -> Result<Option<DeviceId>, StorageError> {
        Ok(self.lock()?.devices.get(&sensor_id).copied())
    }
}

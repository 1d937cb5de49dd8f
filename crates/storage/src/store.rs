//! Collaborator contracts consumed by the threshold monitor

use crate::model::{Alert, AlertConfig, AlertId, DeviceId, NewAlert, Reading, Sensor, SensorId};
use crate::StorageError;
use async_trait::async_trait;

/// Provisioned sensors and their latest samples
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// All provisioned sensors
    async fn list_sensors(&self) -> Result<Vec<Sensor>, StorageError>;

    /// Most recent reading for a sensor, `None` if it has never reported
    async fn latest_reading(&self, sensor_id: SensorId) -> Result<Option<Reading>, StorageError>;
}

/// Source of user-defined threshold bands
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Configs with `is_active = true`
    async fn list_active_configs(&self) -> Result<Vec<AlertConfig>, StorageError>;
}

/// Durable alert log
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Append a new alert in `pending` status
    async fn create_alert(&self, alert: NewAlert) -> Result<Alert, StorageError>;

    /// Mark an alert resolved. Resolving an already-resolved alert is a no-op.
    async fn resolve_alert(&self, alert_id: AlertId) -> Result<(), StorageError>;

    /// All alerts still in `pending` status
    async fn list_pending_alerts(&self) -> Result<Vec<Alert>, StorageError>;
}

/// Sensor to device association used to attribute alerts
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Device the sensor is mounted on, if any
    async fn find_device_for_sensor(
        &self,
        sensor_id: SensorId,
    ) -> Result<Option<DeviceId>, StorageError>;
}

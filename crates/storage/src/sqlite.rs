//! SQLite-backed store

use crate::model::{
    Alert, AlertConfig, AlertId, AlertStatus, DeviceId, NewAlert, Reading, Sensor, SensorId,
};
use crate::store::{AlertStore, ConfigStore, DeviceDirectory, SensorSource};
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS sensor (
        sensor_id INTEGER PRIMARY KEY,
        sensor_type TEXT NOT NULL,
        unit TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT ''
    )",
    "CREATE TABLE IF NOT EXISTS sensor_data (
        data_id INTEGER PRIMARY KEY AUTOINCREMENT,
        sensor_id INTEGER NOT NULL REFERENCES sensor(sensor_id),
        svalue REAL NOT NULL,
        recorded_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_sensor_data_latest
        ON sensor_data (sensor_id, recorded_ms DESC)",
    "CREATE TABLE IF NOT EXISTS alert_config (
        config_id INTEGER PRIMARY KEY,
        user_id INTEGER NOT NULL,
        sensor_type TEXT NOT NULL,
        min_value REAL NOT NULL,
        max_value REAL NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS equipped_with (
        device_id INTEGER NOT NULL,
        sensor_id INTEGER NOT NULL,
        PRIMARY KEY (device_id, sensor_id)
    )",
    "CREATE TABLE IF NOT EXISTS alert (
        alert_id INTEGER PRIMARY KEY AUTOINCREMENT,
        device_id INTEGER,
        sensor_id INTEGER NOT NULL,
        alert_type TEXT NOT NULL,
        amessage TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        alerted_ms INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_alert_status ON alert (status)",
];

/// Store backed by a SQLite connection pool
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `url` and ensure the schema exists
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        info!("Connected to SQLite store at {}", url);
        Self::with_pool(pool).await
    }

    /// Private in-memory database. Pinned to a single connection so every
    /// query sees the same database.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Provision a sensor, replacing any sensor with the same id
    pub async fn insert_sensor(&self, sensor: &Sensor) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR REPLACE INTO sensor (sensor_id, sensor_type, unit, description)
             VALUES (?, ?, ?, ?)",
        )
        .bind(sensor.id)
        .bind(&sensor.sensor_type)
        .bind(&sensor.unit)
        .bind(&sensor.description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append a reading
    pub async fn insert_reading(&self, reading: &Reading) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO sensor_data (sensor_id, svalue, recorded_ms) VALUES (?, ?, ?)")
            .bind(reading.sensor_id)
            .bind(reading.value)
            .bind(reading.recorded_at.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Add or replace a threshold config
    pub async fn upsert_config(&self, config: &AlertConfig) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT OR REPLACE INTO alert_config
                (config_id, user_id, sensor_type, min_value, max_value, is_active)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(config.config_id)
        .bind(config.user_id)
        .bind(&config.sensor_type)
        .bind(config.min_value)
        .bind(config.max_value)
        .bind(config.is_active)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Associate a sensor with the device it is mounted on
    pub async fn link_device(
        &self,
        sensor_id: SensorId,
        device_id: DeviceId,
    ) -> Result<(), StorageError> {
        sqlx::query("INSERT OR IGNORE INTO equipped_with (device_id, sensor_id) VALUES (?, ?)")
            .bind(device_id)
            .bind(sensor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Look up one alert
    pub async fn alert(&self, alert_id: AlertId) -> Result<Alert, StorageError> {
        let row = sqlx::query(
            "SELECT alert_id, device_id, sensor_id, alert_type, amessage, status, alerted_ms
             FROM alert WHERE alert_id = ?",
        )
        .bind(alert_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StorageError::NotFound)?;

        alert_from_row(&row)
    }
}

fn timestamp(ms: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| StorageError::DatabaseError(format!("invalid timestamp {}", ms)))
}

fn alert_from_row(row: &SqliteRow) -> Result<Alert, StorageError> {
    let status: String = row.try_get("status")?;
    Ok(Alert {
        alert_id: row.try_get("alert_id")?,
        device_id: row.try_get("device_id")?,
        sensor_id: row.try_get("sensor_id")?,
        alert_type: row.try_get("alert_type")?,
        message: row.try_get("amessage")?,
        status: status.parse().map_err(StorageError::DatabaseError)?,
        created_at: timestamp(row.try_get("alerted_ms")?)?,
    })
}

#[async_trait]
impl SensorSource for SqliteStore {
    async fn list_sensors(&self) -> Result<Vec<Sensor>, StorageError> {
        let rows = sqlx::query(
            "SELECT sensor_id, sensor_type, unit, description FROM sensor ORDER BY sensor_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Sensor {
                    id: row.try_get("sensor_id")?,
                    sensor_type: row.try_get("sensor_type")?,
                    unit: row.try_get("unit")?,
                    description: row.try_get("description")?,
                })
            })
            .collect()
    }

    async fn latest_reading(&self, sensor_id: SensorId) -> Result<Option<Reading>, StorageError> {
        let row = sqlx::query(
            "SELECT sensor_id, svalue, recorded_ms FROM sensor_data
             WHERE sensor_id = ?
             ORDER BY recorded_ms DESC, data_id DESC
             LIMIT 1",
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(Reading {
                sensor_id: row.try_get("sensor_id")?,
                value: row.try_get("svalue")?,
                recorded_at: timestamp(row.try_get("recorded_ms")?)?,
            })),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ConfigStore for SqliteStore {
    async fn list_active_configs(&self) -> Result<Vec<AlertConfig>, StorageError> {
        let rows = sqlx::query(
            "SELECT config_id, user_id, sensor_type, min_value, max_value, is_active
             FROM alert_config
             WHERE is_active = 1
             ORDER BY config_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AlertConfig {
                    config_id: row.try_get("config_id")?,
                    user_id: row.try_get("user_id")?,
                    sensor_type: row.try_get("sensor_type")?,
                    min_value: row.try_get("min_value")?,
                    max_value: row.try_get("max_value")?,
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl AlertStore for SqliteStore {
    async fn create_alert(&self, alert: NewAlert) -> Result<Alert, StorageError> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO alert (device_id, sensor_id, alert_type, amessage, status, alerted_ms)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(alert.device_id)
        .bind(alert.sensor_id)
        .bind(&alert.alert_type)
        .bind(&alert.message)
        .bind(AlertStatus::Pending.as_str())
        .bind(created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        let alert_id = result.last_insert_rowid();
        debug!("Inserted alert with ID {}", alert_id);

        Ok(Alert {
            alert_id,
            device_id: alert.device_id,
            sensor_id: alert.sensor_id,
            alert_type: alert.alert_type,
            message: alert.message,
            status: AlertStatus::Pending,
            created_at,
        })
    }

    async fn resolve_alert(&self, alert_id: AlertId) -> Result<(), StorageError> {
        sqlx::query("UPDATE alert SET status = ? WHERE alert_id = ? AND status = ?")
            .bind(AlertStatus::Resolved.as_str())
            .bind(alert_id)
            .bind(AlertStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_pending_alerts(&self) -> Result<Vec<Alert>, StorageError> {
        let rows = sqlx::query(
            "SELECT alert_id, device_id, sensor_id, alert_type, amessage, status, alerted_ms
             FROM alert
             WHERE status = ?
             ORDER BY alert_id",
        )
        .bind(AlertStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(alert_from_row).collect()
    }
}

#[async_trait]
impl DeviceDirectory for SqliteStore {
    async fn find_device_for_sensor(
        &self,
        sensor_id: SensorId,
    ) -> Result<Option<DeviceId>, StorageError> {
        let device_id = sqlx::query_scalar::<_, i64>(
            "SELECT device_id FROM equipped_with WHERE sensor_id = ? LIMIT 1",
        )
        .bind(sensor_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(device_id)
    }
}

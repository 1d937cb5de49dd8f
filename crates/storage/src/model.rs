//! Record types shared by every store backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type SensorId = i64;
pub type ConfigId = i64;
pub type AlertId = i64;
pub type DeviceId = i64;
pub type UserId = i64;

/// A provisioned sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    /// Free-form type name, compared case-insensitively
    pub sensor_type: String,
    /// Display unit appended to alert text, may be empty
    pub unit: String,
    pub description: String,
}

impl Sensor {
    /// Lower-cased type, the key used to match threshold configs
    pub fn type_key(&self) -> String {
        self.sensor_type.to_lowercase()
    }
}

/// A single sensor sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: SensorId,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Threshold band configured by a user for a sensor type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub config_id: ConfigId,
    pub user_id: UserId,
    pub sensor_type: String,
    pub min_value: f64,
    pub max_value: f64,
    pub is_active: bool,
}

impl AlertConfig {
    /// Lower-cased sensor type this config applies to
    pub fn type_key(&self) -> String {
        self.sensor_type.to_lowercase()
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Pending => "pending",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AlertStatus::Pending),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status '{}'", other)),
        }
    }
}

/// Durable alert record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub alert_id: AlertId,
    pub device_id: Option<DeviceId>,
    pub sensor_id: SensorId,
    /// "High <type>" or "Low <type>"
    pub alert_type: String,
    pub message: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new alert; the store assigns id, status and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlert {
    pub device_id: Option<DeviceId>,
    pub sensor_id: SensorId,
    pub alert_type: String,
    pub message: String,
}

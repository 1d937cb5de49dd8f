//! Storage Layer
//!
//! Data model and collaborator contracts consumed by the threshold monitor,
//! with an in-memory backend and a SQLite backend.

mod memory;
mod model;
mod prediction;
mod sqlite;
mod store;

pub use memory::MemoryStore;
pub use model::{
    Alert, AlertConfig, AlertId, AlertStatus, ConfigId, DeviceId, NewAlert, Reading, Sensor,
    SensorId, UserId,
};
pub use prediction::{PredictedReadings, Prediction, Predictor};
pub use sqlite::SqliteStore;
pub use store::{AlertStore, ConfigStore, DeviceDirectory, SensorSource};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Record not found")]
    NotFound,
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StorageError::Unavailable(err.to_string())
            }
            other => StorageError::DatabaseError(other.to_string()),
        }
    }
}

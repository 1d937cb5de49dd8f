//! Forecast values exposed as a reading source
//!
//! The predictor itself (model, runtime) lives outside this workspace; the
//! monitor only sees its output through [`SensorSource`]. The service binary
//! monitors live readings; embedders that own a [`Predictor`] wrap their
//! sensor catalogue in [`PredictedReadings`] and pass it as the monitor's
//! sensor source.

use crate::model::{Reading, Sensor, SensorId};
use crate::store::SensorSource;
use crate::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Forecast for one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    /// Model confidence in [0, 1]
    pub confidence: f64,
    pub predicted_for: DateTime<Utc>,
}

/// Opaque forecasting collaborator
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Forecast the next value for a sensor, `None` if the model has no opinion
    async fn predict(&self, sensor_id: SensorId) -> Result<Option<Prediction>, StorageError>;
}

/// Wraps a sensor catalogue and a predictor so forecasts can be monitored
/// like live readings.
pub struct PredictedReadings<S, P> {
    sensors: S,
    predictor: P,
    min_confidence: f64,
}

impl<S, P> PredictedReadings<S, P> {
    pub fn new(sensors: S, predictor: P, min_confidence: f64) -> Self {
        Self {
            sensors,
            predictor,
            min_confidence,
        }
    }
}

#[async_trait]
impl<S, P> SensorSource for PredictedReadings<S, P>
where
    S: SensorSource,
    P: Predictor,
{
    async fn list_sensors(&self) -> Result<Vec<Sensor>, StorageError> {
        self.sensors.list_sensors().await
    }

    async fn latest_reading(&self, sensor_id: SensorId) -> Result<Option<Reading>, StorageError> {
        match self.predictor.predict(sensor_id).await? {
            Some(p) if p.confidence >= self.min_confidence => Ok(Some(Reading {
                sensor_id,
                value: p.value,
                recorded_at: p.predicted_for,
            })),
            Some(p) => {
                debug!(
                    sensor_id,
                    confidence = p.confidence,
                    "Prediction below confidence floor, ignored"
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use std::collections::HashMap;

    struct FixedPredictor(HashMap<SensorId, Prediction>);

    #[async_trait]
    impl Predictor for FixedPredictor {
        async fn predict(&self, sensor_id: SensorId) -> Result<Option<Prediction>, StorageError> {
            Ok(self.0.get(&sensor_id).copied())
        }
    }

    #[tokio::test]
    async fn test_confidence_floor() {
        let now = Utc::now();
        let mut forecasts = HashMap::new();
        forecasts.insert(1, Prediction { value: 31.4, confidence: 0.9, predicted_for: now });
        forecasts.insert(2, Prediction { value: 12.0, confidence: 0.4, predicted_for: now });

        let source = PredictedReadings::new(MemoryStore::new(), FixedPredictor(forecasts), 0.75);

        let reading = source.latest_reading(1).await.unwrap().unwrap();
        assert_eq!(reading.value, 31.4);
        assert_eq!(reading.recorded_at, now);

        assert!(source.latest_reading(2).await.unwrap().is_none());
        assert!(source.latest_reading(3).await.unwrap().is_none());
    }
}

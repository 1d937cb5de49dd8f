//! Alert type and text formatting

use crate::evaluator::Edge;
use storage::Sensor;

/// "High temperature", "Low humidity", ...
pub fn alert_type(edge: Edge, sensor_type: &str) -> String {
    format!("{} {}", edge.label(), sensor_type)
}

/// Recover the breached edge from an alert type written by [`alert_type`]
pub fn parse_edge(alert_type: &str) -> Option<Edge> {
    Edge::ALL.into_iter().find(|edge| {
        alert_type
            .strip_prefix(edge.label())
            .is_some_and(|rest| rest.starts_with(' '))
    })
}

/// Human-readable alert text
pub fn alert_message(sensor: &Sensor, edge: Edge, value: f64, threshold: f64) -> String {
    format!(
        "{} is {} at {:.1}{unit} (threshold: {}{unit})",
        sensor.sensor_type,
        edge,
        value,
        threshold,
        unit = sensor.unit,
    )
}

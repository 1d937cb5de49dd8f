//! Alerting System
//!
//! Maps sensor readings onto threshold bands and decides when a breach
//! should raise, suppress or resolve an alert.

mod error;
mod evaluator;
mod message;
mod tracker;

pub use error::BandError;
pub use evaluator::{evaluate, validate_band, Edge, EdgeState};
pub use message::{alert_message, alert_type, parse_edge};
pub use tracker::{BreachAction, BreachKey, BreachState, BreachTracker, TrackerConfig};

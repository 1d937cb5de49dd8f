//! Config Band Errors

use storage::ConfigId;
use thiserror::Error;

/// Reasons a threshold config cannot be evaluated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BandError {
    /// A bound is NaN or infinite
    #[error("config {config_id}: {bound} bound {value} is not finite")]
    NonFinite {
        config_id: ConfigId,
        bound: &'static str,
        value: f64,
    },

    /// Lower bound above upper bound
    #[error("config {config_id}: min {min} is greater than max {max}")]
    Inverted { config_id: ConfigId, min: f64, max: f64 },
}

//! Threshold Evaluator
//!
//! Stateless classification of a value against a config's `[min, max]` band.
//! Bounds are inclusive: a value exactly on a bound is normal.

use crate::error::BandError;
use serde::{Deserialize, Serialize};
use std::fmt;
use storage::AlertConfig;

/// Side of the band a breach is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Low,
    High,
}

impl Edge {
    pub const ALL: [Edge; 2] = [Edge::Low, Edge::High];

    /// Capitalised label used as the alert type prefix
    pub fn label(&self) -> &'static str {
        match self {
            Edge::Low => "Low",
            Edge::High => "High",
        }
    }

    /// Bound of `config` this edge is measured against
    pub fn threshold(&self, config: &AlertConfig) -> f64 {
        match self {
            Edge::Low => config.min_value,
            Edge::High => config.max_value,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Low => f.write_str("low"),
            Edge::High => f.write_str("high"),
        }
    }
}

/// Where a value sits relative to a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeState {
    Normal,
    Low,
    High,
}

impl EdgeState {
    /// The breached edge, if any
    pub fn edge(&self) -> Option<Edge> {
        match self {
            EdgeState::Normal => None,
            EdgeState::Low => Some(Edge::Low),
            EdgeState::High => Some(Edge::High),
        }
    }

    pub fn is_breach(&self) -> bool {
        !matches!(self, EdgeState::Normal)
    }
}

/// Classify `value` against `config`'s band
pub fn evaluate(value: f64, config: &AlertConfig) -> EdgeState {
    if value < config.min_value {
        EdgeState::Low
    } else if value > config.max_value {
        EdgeState::High
    } else {
        EdgeState::Normal
    }
}

/// Reject bands that cannot be evaluated meaningfully
pub fn validate_band(config: &AlertConfig) -> Result<(), BandError> {
    for (bound, value) in [("min", config.min_value), ("max", config.max_value)] {
        if !value.is_finite() {
            return Err(BandError::NonFinite {
                config_id: config.config_id,
                bound,
                value,
            });
        }
    }

    if config.min_value > config.max_value {
        return Err(BandError::Inverted {
            config_id: config.config_id,
            min: config.min_value,
            max: config.max_value,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn band(min: f64, max: f64) -> AlertConfig {
        AlertConfig {
            config_id: 1,
            user_id: 1,
            sensor_type: "temperature".to_string(),
            min_value: min,
            max_value: max,
            is_active: true,
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let config = band(18.0, 30.0);
        assert_eq!(evaluate(18.0, &config), EdgeState::Normal);
        assert_eq!(evaluate(30.0, &config), EdgeState::Normal);
        assert_eq!(evaluate(17.99, &config), EdgeState::Low);
        assert_eq!(evaluate(30.01, &config), EdgeState::High);
    }

    #[test]
    fn test_edge_helpers() {
        let config = band(18.0, 30.0);
        assert_eq!(Edge::Low.threshold(&config), 18.0);
        assert_eq!(Edge::High.threshold(&config), 30.0);
        assert_eq!(EdgeState::High.edge(), Some(Edge::High));
        assert_eq!(EdgeState::Normal.edge(), None);
        assert!(!EdgeState::Normal.is_breach());
        assert_eq!(Edge::Low.to_string(), "low");
    }

    #[test]
    fn test_validate_band() {
        assert!(validate_band(&band(18.0, 30.0)).is_ok());
        assert!(validate_band(&band(20.0, 20.0)).is_ok());
        assert!(matches!(
            validate_band(&band(31.0, 30.0)),
            Err(BandError::Inverted { .. })
        ));
        assert!(matches!(
            validate_band(&band(f64::NAN, 30.0)),
            Err(BandError::NonFinite { bound: "min", .. })
        ));
        assert!(matches!(
            validate_band(&band(0.0, f64::INFINITY)),
            Err(BandError::NonFinite { bound: "max", .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_inside_band_is_normal(min in -100.0f64..100.0, width in 0.0f64..100.0, t in 0.0f64..=1.0) {
            let config = band(min, min + width);
            let value = min + width * t;
            prop_assume!(value >= config.min_value && value <= config.max_value);
            prop_assert_eq!(evaluate(value, &config), EdgeState::Normal);
        }

        #[test]
        fn prop_below_min_is_low(min in -100.0f64..100.0, width in 0.0f64..100.0, below in 0.001f64..1000.0) {
            let config = band(min, min + width);
            prop_assert_eq!(evaluate(min - below, &config), EdgeState::Low);
        }

        #[test]
        fn prop_above_max_is_high(min in -100.0f64..100.0, width in 0.0f64..100.0, above in 0.001f64..1000.0) {
            let config = band(min, min + width);
            prop_assert_eq!(evaluate(config.max_value + above, &config), EdgeState::High);
        }
    }
}

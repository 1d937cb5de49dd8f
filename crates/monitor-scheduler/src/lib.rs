//! Threshold Monitor Scheduler
//!
//! Drives periodic sweeps over sensors and threshold configs, turns breaches
//! into alerts through the [`alerting::BreachTracker`], and reconciles
//! pending alerts that no longer have a live breach behind them.

mod clock;
mod error;
mod scheduler;
mod sweep;

pub use clock::{Clock, SystemClock};
pub use error::MonitorError;
pub use scheduler::{
    Collaborators, MonitorConfig, ThresholdMonitor, MAX_TICK_INTERVAL, MIN_TICK_INTERVAL,
};
pub use sweep::SweepReport;

//! Breach State Tracker
//!
//! Owns the in-memory map of active breaches and turns observations into
//! create/resolve actions under a dedup + debounce policy:
//!
//! - normal, no state: nothing to do
//! - normal, state with an attributed alert: resolve it
//! - breach, no state: create an alert
//! - breach, state: re-alert only if the value moved by at least
//!   `re_alert_delta` since the last alert, or `re_alert_cooldown` elapsed
//!
//! Decisions and bookkeeping are split. [`BreachTracker::observe`] never
//! records success; the caller reports back with
//! [`BreachTracker::record_created`] / [`BreachTracker::record_resolved`]
//! once the store call went through, so a failed call is retried next sweep.

use crate::evaluator::{Edge, EdgeState};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use storage::{AlertId, ConfigId, SensorId};
use tracing::{debug, info};

/// Debounce configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum value movement (sensor unit) that justifies a re-alert
    pub re_alert_delta: f64,
    /// Time after which an ongoing breach re-alerts regardless of movement (seconds)
    pub re_alert_cooldown_secs: u64,
}

impl TrackerConfig {
    pub fn re_alert_cooldown(&self) -> Duration {
        let secs = i64::try_from(self.re_alert_cooldown_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs.min(i64::MAX / 1_000))
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            re_alert_delta: 1.0,
            re_alert_cooldown_secs: 3600, // 1 hour
        }
    }
}

/// Identity of one monitored condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BreachKey {
    pub sensor_id: SensorId,
    pub config_id: ConfigId,
    pub edge: Edge,
}

impl BreachKey {
    pub fn new(sensor_id: SensorId, config_id: ConfigId, edge: Edge) -> Self {
        Self {
            sensor_id,
            config_id,
            edge,
        }
    }
}

/// Debounce bookkeeping for one ongoing breach
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreachState {
    /// Pending alert attributed to this breach; `None` once it was resolved
    /// outside the monitor
    pub active_alert_id: Option<AlertId>,
    pub last_alerted_value: Option<f64>,
    pub last_alerted_at: Option<DateTime<Utc>>,
}

/// Store call the tracker wants performed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreachAction {
    /// Raise a new alert for `key` at `value`
    Create { key: BreachKey, value: f64 },
    /// Resolve the alert attributed to `key`
    Resolve { key: BreachKey, alert_id: AlertId },
}

/// Tracker of active breaches
pub struct BreachTracker {
    config: TrackerConfig,
    states: BTreeMap<BreachKey, BreachState>,
    /// Breaching observations that did not warrant a new alert
    suppressed: u64,
}

impl BreachTracker {
    /// Create an empty tracker
    pub fn new(config: TrackerConfig) -> Self {
        info!("Creating breach tracker with config: {:?}", config);
        Self {
            config,
            states: BTreeMap::new(),
            suppressed: 0,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Decide what an observation of `key` requires.
    ///
    /// `state` is the band classification of `value` for the key's config;
    /// the key is breaching only when `state` is on the key's own edge.
    pub fn observe(
        &mut self,
        key: BreachKey,
        state: EdgeState,
        value: f64,
        now: DateTime<Utc>,
    ) -> Option<BreachAction> {
        let breaching = state.edge() == Some(key.edge);

        if !breaching {
            let active_alert_id = self.states.get(&key)?.active_alert_id;
            return match active_alert_id {
                Some(alert_id) => Some(BreachAction::Resolve { key, alert_id }),
                None => {
                    // Alert already resolved elsewhere, only bookkeeping left
                    debug!(?key, "Breach cleared without attributed alert");
                    self.states.remove(&key);
                    None
                }
            };
        }

        let Some(existing) = self.states.get(&key) else {
            return Some(BreachAction::Create { key, value });
        };

        if self.should_realert(existing, value, now) {
            Some(BreachAction::Create { key, value })
        } else {
            debug!(
                ?key,
                value,
                last_value = ?existing.last_alerted_value,
                "Alert suppressed: duplicate within cooldown"
            );
            self.suppressed += 1;
            None
        }
    }

    fn should_realert(&self, state: &BreachState, value: f64, now: DateTime<Utc>) -> bool {
        let moved = match state.last_alerted_value {
            Some(last) => (value - last).abs() >= self.config.re_alert_delta,
            None => true,
        };
        let expired = match state.last_alerted_at {
            Some(at) => now - at >= self.config.re_alert_cooldown(),
            None => true,
        };
        moved || expired
    }

    /// Record a successful create for `key`.
    ///
    /// Returns the alert the new one supersedes, which the caller should
    /// resolve to keep a single pending alert per key.
    pub fn record_created(
        &mut self,
        key: BreachKey,
        alert_id: AlertId,
        value: f64,
        now: DateTime<Utc>,
    ) -> Option<AlertId> {
        let previous = self.states.insert(
            key,
            BreachState {
                active_alert_id: Some(alert_id),
                last_alerted_value: Some(value),
                last_alerted_at: Some(now),
            },
        );

        info!(?key, alert_id, value, "Breach alert recorded");

        previous
            .and_then(|state| state.active_alert_id)
            .filter(|previous_id| *previous_id != alert_id)
    }

    /// Record a successful resolve for `key`, dropping its state
    pub fn record_resolved(&mut self, key: BreachKey) {
        if self.states.remove(&key).is_some() {
            info!(?key, "Breach cleared");
        }
    }

    /// Drop attribution of alerts that are no longer pending in the store.
    ///
    /// Debounce bookkeeping is kept so an operator resolve does not cause an
    /// immediate re-alert. Returns how many states were detached.
    pub fn detach_resolved(&mut self, pending: &HashSet<AlertId>) -> usize {
        let mut detached = 0;
        for (key, state) in self.states.iter_mut() {
            if let Some(alert_id) = state.active_alert_id {
                if !pending.contains(&alert_id) {
                    debug!(?key, alert_id, "Alert resolved externally, detaching");
                    state.active_alert_id = None;
                    detached += 1;
                }
            }
        }
        detached
    }

    /// Drop states whose config is no longer active
    pub fn retain_configs(&mut self, active: &HashSet<ConfigId>) -> Vec<BreachKey> {
        let stale: Vec<BreachKey> = self
            .states
            .keys()
            .filter(|key| !active.contains(&key.config_id))
            .copied()
            .collect();

        for key in &stale {
            debug!(?key, "Dropping breach for inactive config");
            self.states.remove(key);
        }
        stale
    }

    /// Whether a pending alert for `sensor_id`/`edge` lacks a live breach
    /// attributing it, either because the breach cleared, was lost on
    /// restart, or a newer alert superseded it.
    pub fn is_orphaned(&self, sensor_id: SensorId, edge: Edge, alert_id: AlertId) -> bool {
        !self.states.iter().any(|(key, state)| {
            key.sensor_id == sensor_id && key.edge == edge && state.active_alert_id == Some(alert_id)
        })
    }

    /// State for one key
    pub fn get(&self, key: &BreachKey) -> Option<&BreachState> {
        self.states.get(key)
    }

    /// All tracked breaches, ordered by key
    pub fn states(&self) -> impl Iterator<Item = (&BreachKey, &BreachState)> {
        self.states.iter()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Total suppressed duplicates since creation
    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// Forget every breach
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

impl Default for BreachTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

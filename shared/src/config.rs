//! Tunables shared by server and client

use crate::combat::SpeedDamageCurve;
use crate::error::ConfigError;
use crate::velocity::DEFAULT_SAMPLE_INTERVAL;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Seconds between logical hand updates on the network.
    pub network_update_rate: f32,
    /// Seconds between velocity samples of a tracked hand.
    pub velocity_sample_interval: f32,
    pub curve: SpeedDamageCurve,
    /// Health every combat entity spawns with.
    pub max_health: f32,
    /// Despawn entities when they die.
    pub destroy_on_death: bool,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            network_update_rate: 0.1,
            velocity_sample_interval: DEFAULT_SAMPLE_INTERVAL,
            curve: SpeedDamageCurve::default(),
            max_health: 100.0,
            destroy_on_death: true,
        }
    }
}

impl CombatConfig {
    /// Checked once at start-up so bad values never reach the simulation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("network_update_rate", self.network_update_rate),
            ("velocity_sample_interval", self.velocity_sample_interval),
            ("max_health", self.max_health),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::NotPositive { name, value });
            }
        }
        self.curve.validate()
    }
}

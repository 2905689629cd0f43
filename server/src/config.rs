//! Simulation settings.
//!
//! The defaults reproduce the live game; the server binary overrides a subset of
//! them from its command line.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Interval between player, projectile and crate ticks.
    pub tick: Duration,
    /// Interval between inactivity sweeps.
    pub sweep: Duration,
    /// Multiplier on simulated time per tick.
    pub time_speed: f64,
    /// Players idle for this long are dropped by the sweep.
    pub inactivity_timeout_ms: u64,
    /// Chat lines older than this are pruned.
    pub chat_lifetime_ms: u64,
    pub admin_name: String,
    pub spawn: (f64, f64),
    pub max_username_len: usize,
    pub max_money_crates: usize,
    pub max_component_crates: usize,
    /// Seed for crate placement and party colors; random when unset.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(10),
            sweep: Duration::from_secs(60),
            time_speed: 1.0,
            inactivity_timeout_ms: 10 * 60 * 1000,
            chat_lifetime_ms: 8000,
            admin_name: "Shluck".to_string(),
            spawn: (0.0, -400.0),
            max_username_len: 24,
            max_money_crates: 40,
            max_component_crates: 10,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Simulated seconds advanced per tick.
    pub fn delta_time(&self) -> f64 {
        0.01 * self.time_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick, Duration::from_millis(10));
        assert_eq!(config.sweep, Duration::from_secs(60));
        assert_eq!(config.inactivity_timeout_ms, 600_000);
        assert_eq!(config.admin_name, "Shluck");
        assert_eq!(config.spawn, (0.0, -400.0));
    }

    #[test]
    fn test_delta_time_follows_time_speed() {
        let mut config = SimConfig::default();
        assert_approx_eq!(config.delta_time(), 0.01, 1e-12);
        config.time_speed = 2.5;
        assert_approx_eq!(config.delta_time(), 0.025, 1e-12);
    }
}

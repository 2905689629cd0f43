//! Fixed-rate timers driving the simulation.

use crate::config::SimConfig;
use tokio::time::{interval, interval_at, Instant, Interval};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Players,
    Projectiles,
    Crates,
    /// Inactivity sweep and empty-party purge.
    Sweep,
}

/// Independent intervals for each simulation pass. Missed ticks burst, so a
/// late tick runs late instead of being dropped.
pub struct Scheduler {
    players: Interval,
    projectiles: Interval,
    crates: Interval,
    sweep: Interval,
}

impl Scheduler {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            players: interval(config.tick),
            projectiles: interval(config.tick),
            crates: interval(config.tick),
            // The first sweep is a full period away.
            sweep: interval_at(Instant::now() + config.sweep, config.sweep),
        }
    }

    /// Waits for the next due tick. Ticks due at the same instant come out
    /// players first, then projectiles, crates and the sweep.
    pub async fn next(&mut self) -> TickKind {
        tokio::select! {
            biased;
            _ = self.players.tick() => TickKind::Players,
            _ = self.projectiles.tick() => TickKind::Projectiles,
            _ = self.crates.tick() => TickKind::Crates,
            _ = self.sweep.tick() => TickKind::Sweep,
        }
    }
}

//! Stat blocks for the parts a plane is assembled from.
//!
//! Engines, chassis and wings are interchangeable through the inventory and are
//! wrapped in [`Component`] for that purpose. Guns are fixed at login and carry
//! their own runtime state (heat, cooldown, aim).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Engine {
    pub name: String,
    pub weight: f64,
    /// Current throttle.
    pub power: f64,
    pub max_power: f64,
    pub min_power: f64,
    /// Heat generated per unit of power per second.
    pub heat_efficiency: f64,
    pub heat: f64,
    pub max_heat: f64,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chassis {
    pub name: String,
    pub weight: f64,
    /// Speed above which the airframe starts to overheat.
    pub top_speed: f64,
    pub hull: f64,
    pub max_hull: f64,
    /// Heat dispersed per second.
    pub heat_dispersion: f64,
    pub buoyancy: f64,
    pub value: u64,
}

impl Chassis {
    /// Subtracts hull, never going below zero.
    pub fn take_damage(&mut self, amount: f64) {
        self.hull = (self.hull - amount).clamp(0.0, self.max_hull);
    }

    pub fn repair(&mut self, amount: f64) {
        self.hull = (self.hull + amount).clamp(0.0, self.max_hull);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wings {
    pub name: String,
    pub weight: f64,
    /// Turn rate at low speed.
    pub base_turn_speed: f64,
    /// Turn rate at and above `max_speed`.
    pub min_turn_speed: f64,
    pub max_speed: f64,
    pub lift_efficiency: f64,
    pub min_lift_speed: f64,
    /// Largest angle of attack that still produces lift.
    pub lift_angle: f64,
    pub air_brake: bool,
    pub air_brake_strength: f64,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gun {
    pub name: String,
    pub weight: f64,
    pub max_heat: f64,
    pub heat_efficiency: f64,
    pub damage: f64,
    /// Milliseconds between shots.
    pub cooldown_time: f64,
    pub projectile_speed: f64,
    pub projectile_size: f64,
    /// Full traverse of the mount; the gun may deviate half of it either side
    /// of the hull heading.
    pub max_angle: f64,
    pub value: u64,

    pub cooldown: f64,
    pub heat: f64,
    pub angle: f64,
}

impl Gun {
    pub fn reset(&mut self) {
        self.cooldown = 0.0;
        self.heat = 0.0;
        self.angle = 0.0;
    }

    pub fn half_traverse(&self) -> f64 {
        self.max_angle / 2.0
    }

    pub fn can_fire(&self) -> bool {
        self.cooldown == 0.0 && self.heat < self.max_heat - self.heat_efficiency
    }
}

/// A swappable part, as held in an inventory slot or a crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    Engine(Engine),
    Chassis(Chassis),
    Wings(Wings),
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Component::Engine(e) => &e.name,
            Component::Chassis(c) => &c.name,
            Component::Wings(w) => &w.name,
        }
    }

    pub fn value(&self) -> u64 {
        match self {
            Component::Engine(e) => e.value,
            Component::Chassis(c) => c.value,
            Component::Wings(w) => w.value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{create_chassis, create_engine, create_gun};

    #[test]
    fn test_take_damage_clamps_at_zero() {
        let mut chassis = create_chassis(0, 1);
        chassis.take_damage(chassis.max_hull * 3.0);
        assert_eq!(chassis.hull, 0.0);
    }

    #[test]
    fn test_repair_clamps_at_max() {
        let mut chassis = create_chassis(1, 1);
        chassis.take_damage(10.0);
        chassis.repair(500.0);
        assert_eq!(chassis.hull, chassis.max_hull);
    }

    #[test]
    fn test_gun_reset_clears_runtime_state() {
        let mut gun = create_gun(0, 1).unwrap();
        gun.cooldown = 40.0;
        gun.heat = 12.0;
        gun.angle = 1.2;
        gun.reset();
        assert_eq!(gun.cooldown, 0.0);
        assert_eq!(gun.heat, 0.0);
        assert_eq!(gun.angle, 0.0);
    }

    #[test]
    fn test_gun_cannot_fire_near_heat_limit() {
        let mut gun = create_gun(1, 1).unwrap();
        assert!(gun.can_fire());
        gun.heat = gun.max_heat - gun.heat_efficiency;
        assert!(!gun.can_fire());
        gun.heat = 0.0;
        gun.cooldown = 1.0;
        assert!(!gun.can_fire());
    }

    #[test]
    fn test_component_accessors() {
        let engine = create_engine(2, 1);
        let component = Component::Engine(engine.clone());
        assert_eq!(component.name(), engine.name);
        assert_eq!(component.value(), engine.value);
    }
}

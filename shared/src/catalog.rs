//! Component factory.
//!
//! Every part in the game comes out of this table: a manufacturer id and a
//! level map to a fixed stat block. Unknown manufacturers fall back to the
//! Pirate line; unknown gun selections are an error.

use crate::components::{Chassis, Engine, Gun, Wings};
use log::warn;
use std::f64::consts::PI;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("invalid gun selection {0}")]
    InvalidGunSelection(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Manufacturer {
    Pirate,
    Core,
    Kamen,
    Aero,
    Nova,
}

impl Manufacturer {
    pub const ALL: [Manufacturer; 5] = [
        Manufacturer::Pirate,
        Manufacturer::Core,
        Manufacturer::Kamen,
        Manufacturer::Aero,
        Manufacturer::Nova,
    ];

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Manufacturer::Pirate => "Pirate",
            Manufacturer::Core => "Core",
            Manufacturer::Kamen => "Kamen",
            Manufacturer::Aero => "Aero",
            Manufacturer::Nova => "Nova",
        }
    }

    fn resolve(id: u32, part: &str) -> Self {
        Self::from_id(id).unwrap_or_else(|| {
            warn!(
                "No {} variant available for selection {}, defaulting to Pirate Standard {}",
                part, id, part
            );
            Manufacturer::Pirate
        })
    }
}

struct EngineLine {
    weight: f64,
    max_power: (f64, f64),
    heat_efficiency: f64,
    max_heat: (f64, f64),
    value: (u64, u64),
}

struct ChassisLine {
    weight: (f64, f64),
    top_speed: (f64, f64),
    max_hull: (f64, f64),
    heat_dispersion: (f64, f64),
    buoyancy: f64,
    value: (u64, u64),
}

struct WingsLine {
    weight: f64,
    base_turn_speed: f64,
    min_turn_speed: f64,
    max_speed: (f64, f64),
    lift_efficiency: f64,
    min_lift_speed: f64,
    lift_angle: f64,
    air_brake_strength: (f64, f64),
    value: (u64, u64),
}

// (base, per level above 1)
fn engine_line(m: Manufacturer) -> EngineLine {
    match m {
        Manufacturer::Pirate => EngineLine {
            weight: 1.0,
            max_power: (350.0, 200.0),
            heat_efficiency: 0.06,
            max_heat: (80.0, 10.0),
            value: (20, 60),
        },
        Manufacturer::Core => EngineLine {
            weight: 1.5,
            max_power: (400.0, 200.0),
            heat_efficiency: 0.05,
            max_heat: (100.0, 10.0),
            value: (80, 200),
        },
        Manufacturer::Kamen => EngineLine {
            weight: 3.0,
            max_power: (600.0, 200.0),
            heat_efficiency: 0.04,
            max_heat: (200.0, 50.0),
            value: (100, 300),
        },
        Manufacturer::Aero => EngineLine {
            weight: 0.8,
            max_power: (400.0, 200.0),
            heat_efficiency: 0.05,
            max_heat: (100.0, 10.0),
            value: (80, 200),
        },
        Manufacturer::Nova => EngineLine {
            weight: 2.0,
            max_power: (800.0, 400.0),
            heat_efficiency: 0.05,
            max_heat: (150.0, 20.0),
            value: (200, 500),
        },
    }
}

fn chassis_line(m: Manufacturer) -> ChassisLine {
    match m {
        Manufacturer::Pirate => ChassisLine {
            weight: (1.5, 0.0),
            top_speed: (180.0, 20.0),
            max_hull: (90.0, 10.0),
            heat_dispersion: (12.5, 1.25),
            buoyancy: 2.5,
            value: (20, 60),
        },
        Manufacturer::Core => ChassisLine {
            weight: (1.5, 0.0),
            top_speed: (200.0, 20.0),
            max_hull: (100.0, 10.0),
            heat_dispersion: (16.0, 1.5),
            buoyancy: 2.0,
            value: (80, 200),
        },
        Manufacturer::Kamen => ChassisLine {
            weight: (4.0, 0.0),
            top_speed: (300.0, 50.0),
            max_hull: (150.0, 10.0),
            heat_dispersion: (15.0, 1.2),
            buoyancy: 1.0,
            value: (100, 300),
        },
        Manufacturer::Aero => ChassisLine {
            weight: (1.0, 0.0),
            top_speed: (180.0, 10.0),
            max_hull: (80.0, 10.0),
            heat_dispersion: (20.0, 2.0),
            buoyancy: 3.0,
            value: (80, 200),
        },
        Manufacturer::Nova => ChassisLine {
            weight: (2.0, 0.3),
            top_speed: (250.0, 20.0),
            max_hull: (100.0, 10.0),
            heat_dispersion: (17.5, 2.0),
            buoyancy: 2.0,
            value: (200, 500),
        },
    }
}

fn wings_line(m: Manufacturer) -> WingsLine {
    match m {
        Manufacturer::Pirate => WingsLine {
            weight: 0.5,
            base_turn_speed: 1.8,
            min_turn_speed: 0.15,
            max_speed: (150.0, 15.0),
            lift_efficiency: 0.5,
            min_lift_speed: 50.0,
            lift_angle: PI / 8.0,
            air_brake_strength: (2.0, 0.2),
            value: (20, 60),
        },
        Manufacturer::Core => WingsLine {
            weight: 0.5,
            base_turn_speed: 2.0,
            min_turn_speed: 0.2,
            max_speed: (180.0, 18.0),
            lift_efficiency: 0.5,
            min_lift_speed: 60.0,
            lift_angle: PI / 8.0,
            air_brake_strength: (3.0, 0.3),
            value: (80, 200),
        },
        Manufacturer::Kamen => WingsLine {
            weight: 1.5,
            base_turn_speed: 1.5,
            min_turn_speed: 0.3,
            max_speed: (220.0, 18.0),
            lift_efficiency: 0.6,
            min_lift_speed: 80.0,
            lift_angle: PI / 10.0,
            air_brake_strength: (2.0, 0.2),
            value: (100, 300),
        },
        Manufacturer::Aero => WingsLine {
            weight: 0.3,
            base_turn_speed: 3.0,
            min_turn_speed: 0.1,
            max_speed: (160.0, 18.0),
            lift_efficiency: 0.8,
            min_lift_speed: 60.0,
            lift_angle: PI / 6.0,
            air_brake_strength: (4.0, 0.4),
            value: (80, 200),
        },
        Manufacturer::Nova => WingsLine {
            weight: 1.0,
            base_turn_speed: 2.2,
            min_turn_speed: 0.5,
            max_speed: (220.0, 18.0),
            lift_efficiency: 0.4,
            min_lift_speed: 80.0,
            lift_angle: PI / 12.0,
            air_brake_strength: (3.0, 0.3),
            value: (200, 500),
        },
    }
}

fn scaled(line: (f64, f64), steps: f64) -> f64 {
    line.0 + line.1 * steps
}

fn scaled_value(line: (u64, u64), steps: u32) -> u64 {
    line.0 + line.1 * u64::from(steps)
}

/// Levels start at 1; stats grow with every level above that.
fn steps_above_one(level: u32) -> u32 {
    level.saturating_sub(1)
}

pub fn create_engine(manufacturer: u32, level: u32) -> Engine {
    let m = Manufacturer::resolve(manufacturer, "Engine");
    let line = engine_line(m);
    let steps = steps_above_one(level);
    let adj = f64::from(steps);
    Engine {
        name: format!("{} Standard Engine Lvl {}", m.label(), level),
        weight: line.weight,
        power: 0.0,
        max_power: scaled(line.max_power, adj),
        min_power: 0.0,
        heat_efficiency: line.heat_efficiency,
        heat: 0.0,
        max_heat: scaled(line.max_heat, adj),
        value: scaled_value(line.value, steps),
    }
}

pub fn create_chassis(manufacturer: u32, level: u32) -> Chassis {
    let m = Manufacturer::resolve(manufacturer, "Chassis");
    let line = chassis_line(m);
    let steps = steps_above_one(level);
    let adj = f64::from(steps);
    let max_hull = scaled(line.max_hull, adj);
    Chassis {
        name: format!("{} Standard Chassis Lvl {}", m.label(), level),
        weight: scaled(line.weight, adj),
        top_speed: scaled(line.top_speed, adj),
        hull: max_hull,
        max_hull,
        heat_dispersion: scaled(line.heat_dispersion, adj),
        buoyancy: line.buoyancy,
        value: scaled_value(line.value, steps),
    }
}

pub fn create_wings(manufacturer: u32, level: u32) -> Wings {
    let m = Manufacturer::resolve(manufacturer, "Wings");
    let line = wings_line(m);
    let steps = steps_above_one(level);
    let adj = f64::from(steps);
    Wings {
        name: format!("{} Standard Wings Lvl {}", m.label(), level),
        weight: line.weight,
        base_turn_speed: line.base_turn_speed + 0.2 * adj,
        min_turn_speed: line.min_turn_speed + 0.05 * adj,
        max_speed: scaled(line.max_speed, adj),
        lift_efficiency: line.lift_efficiency,
        min_lift_speed: line.min_lift_speed - 5.0 * adj,
        lift_angle: line.lift_angle + adj * PI / 32.0,
        air_brake: true,
        air_brake_strength: scaled(line.air_brake_strength, adj),
        value: scaled_value(line.value, steps),
    }
}

/// Guns scale with the raw level rather than the steps above one.
pub fn create_gun(selection: u32, level: u32) -> Result<Gun, CatalogError> {
    let l = f64::from(level);
    let value = 10 + 10 * u64::from(level);
    let (name, weight, max_heat, heat_efficiency, damage, cooldown_time, speed, size, max_angle) =
        match selection {
            0 => (
                "Machine Gun",
                0.5,
                100.0 + l * 25.0,
                5.0 - l * 0.5,
                15.0 + l * 2.5,
                150.0 - l * 10.0,
                1500.0 + l * 50.0,
                1.0 + l * 0.25,
                PI / 12.0 + l * PI / 36.0,
            ),
            1 => (
                "Cannon",
                2.2,
                150.0 + l * 10.0,
                25.0 - l * 5.0,
                50.0 + l * 5.0,
                600.0 - l * 100.0,
                3000.0 + l * 1000.0,
                2.0 + l * 0.5,
                PI / 12.0 + l * PI / 60.0,
            ),
            2 => (
                "Scorpion",
                1.5,
                100.0 + l * 25.0,
                4.0 - l,
                8.0 + l,
                70.0 - l * 10.0,
                1000.0 + l * 100.0,
                0.5,
                PI / 48.0 + l * PI / 96.0,
            ),
            other => return Err(CatalogError::InvalidGunSelection(other)),
        };

    Ok(Gun {
        name: format!("{} Lvl {}", name, level),
        weight,
        max_heat,
        heat_efficiency,
        damage,
        cooldown_time: cooldown_time.max(0.0),
        projectile_speed: speed,
        projectile_size: size,
        max_angle,
        value,
        cooldown: 0.0,
        heat: 0.0,
        angle: 0.0,
    })
}

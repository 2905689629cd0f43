//! Guns, projectiles and hull outcomes.

use crate::utils::{normalize_angle, shortest_angle_diff};
use log::error;
use shared::components::Gun;
use shared::entity::{Player, Projectile, PROJECTILE_LIFESPAN};
use shared::map::{Biome, BiomeZone};

pub const GUN_TOGGLE_COOLDOWN: f64 = 200.0;
pub const PROJECTILE_COLOR: (u8, u8, u8) = (100, 100, 100);

/// A projectile leaving a gun, before it is given an id.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub speed: f64,
    pub damage: f64,
    pub size: f64,
}

impl Shot {
    pub fn into_projectile(self, id: u32, owner: &str) -> Projectile {
        Projectile {
            id,
            x: self.x,
            y: self.y,
            vx: self.angle.cos() * self.speed,
            vy: self.angle.sin() * self.speed,
            angle: self.angle,
            damage: self.damage,
            size: self.size,
            owner: owner.to_string(),
            lifespan: PROJECTILE_LIFESPAN,
            color: PROJECTILE_COLOR,
        }
    }
}

/// Flips the selected gun while `c` is held, then runs the toggle cooldown.
pub fn toggle_gun(player: &mut Player, time_speed: f64) {
    if player.keys.c && player.gun_toggle_cooldown <= 0.0 {
        player.selected_gun = player.selected_gun.toggled();
        player.gun_toggle_cooldown = GUN_TOGGLE_COOLDOWN;
    }
    player.gun_toggle_cooldown = (player.gun_toggle_cooldown - 10.0 * time_speed).max(0.0);
}

/// Fires the selected gun if the trigger is held and the gun is ready.
pub fn try_fire(player: &mut Player) -> Option<Shot> {
    if player.biome == Biome::Recovery || !player.keys.mouse {
        return None;
    }
    let (x, y) = (player.x, player.y);
    let gun = player.selected_gun_mut();
    if !gun.can_fire() {
        return None;
    }

    gun.cooldown = gun.cooldown_time;
    gun.heat = (gun.heat + gun.heat_efficiency).min(gun.max_heat);
    Some(Shot {
        x,
        y,
        angle: gun.angle,
        speed: gun.projectile_speed,
        damage: gun.damage,
        size: gun.projectile_size,
    })
}

/// Rotates a gun toward `target` at a rate inversely proportional to its weight.
pub fn track_target(gun: &mut Gun, target: f64, dt: f64) {
    let target = normalize_angle(target);
    gun.angle = normalize_angle(gun.angle);

    let diff = shortest_angle_diff(target, gun.angle);
    let max_change = dt / gun.weight;

    if diff.abs() <= max_change {
        gun.angle = target;
    } else {
        gun.angle = normalize_angle(gun.angle + diff.signum() * max_change);
    }
}

/// Limits `angle` to within `half_traverse` of `heading`.
pub fn clamp_to_traverse(angle: f64, heading: f64, half_traverse: f64) -> f64 {
    let heading = normalize_angle(heading);
    let diff = normalize_angle(normalize_angle(angle) - heading).clamp(-half_traverse, half_traverse);
    normalize_angle(heading + diff)
}

fn cool_down(gun: &mut Gun, heat_dispersion: f64, dt: f64) {
    if gun.cooldown > 0.0 {
        gun.cooldown = (gun.cooldown - dt * 1000.0).max(0.0);
    }
    if gun.heat > 0.0 {
        gun.heat = (gun.heat - heat_dispersion * dt).max(0.0);
    }
}

/// Aims both guns at the player's cursor and bleeds off cooldown and heat.
/// Skipped for the tick when the aim cannot be computed.
pub fn update_guns(player: &mut Player, dt: f64) {
    if !player.has_valid_target() || !player.has_valid_position() {
        error!(
            "Invalid coordinates for player {}: t=({}, {}) pos=({}, {})",
            player.username, player.t_x, player.t_y, player.x, player.y
        );
        return;
    }

    let target = normalize_angle((player.t_y - player.y).atan2(player.t_x - player.x));
    if target.is_nan() {
        error!(
            "NaN target angle for player {} (gun1 {}, gun2 {})",
            player.username, player.gun1.angle, player.gun2.angle
        );
        return;
    }

    let heading = player.angle;
    let dispersion = player.chassis.heat_dispersion;
    for gun in [&mut player.gun1, &mut player.gun2] {
        track_target(gun, target, dt);
        gun.angle = clamp_to_traverse(gun.angle, heading, gun.half_traverse());
        cool_down(gun, dispersion, dt);
    }
}

/// What happened to a projectile during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flight {
    Alive,
    Expired,
}

/// Ages and moves a projectile. Projectiles inside the recovery zone, before
/// or after moving, are expired.
pub fn advance_projectile(projectile: &mut Projectile, recovery: &BiomeZone, dt: f64) -> Flight {
    if recovery.contains(projectile.x, projectile.y) || projectile.lifespan <= 0.0 {
        return Flight::Expired;
    }
    projectile.lifespan -= 1000.0 * dt;
    projectile.x += projectile.vx * dt;
    projectile.y += projectile.vy * dt;

    if recovery.contains(projectile.x, projectile.y) {
        return Flight::Expired;
    }
    Flight::Alive
}

/// Index of the first non-owner player the projectile overlaps.
pub fn find_hit(projectile: &Projectile, players: &[Player]) -> Option<usize> {
    players.iter().position(|player| {
        player.username != projectile.owner
            && (player.x - projectile.x).hypot(player.y - projectile.y)
                < player.size + projectile.size
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HullFate {
    Intact,
    /// Hull gone but the player can pay for a new plane.
    Revive,
    Death,
}

pub fn hull_fate(player: &Player) -> HullFate {
    if player.chassis.hull > 0.0 {
        HullFate::Intact
    } else if player.money >= player.value {
        HullFate::Revive
    } else {
        HullFate::Death
    }
}

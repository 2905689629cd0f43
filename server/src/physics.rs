//! Flight model.
//!
//! One call to [`update_player`] advances a plane by a single tick. The steps
//! run in a fixed order and every force is applied as an impulse scaled by the
//! tick's delta time, except gravity which is applied per tick.

use crate::combat::{self, Shot};
use crate::utils::{magnitude, smoothstep};
use log::error;
use shared::entity::Player;
use shared::map::{Biome, MapObject};
use std::f64::consts::PI;

pub const GRAVITY: f64 = 0.5;
pub const DRAG_COEFFICIENT: f64 = 0.06;
pub const WING_AREA: f64 = 0.5;
pub const WATER_DENSITY: f64 = 20.0;
pub const AIR_DENSITY: f64 = 1.0;
pub const MAX_LIFT: f64 = 1000.0;
pub const LIFT_BUFFER: f64 = 10.0;
/// Below this speed the recovery zone brings a plane to a standstill.
pub const JELLO_STOP_SPEED: f64 = 2.0;

/// Side effects of a tick that the caller has to publish.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickEvents {
    pub shot: Option<Shot>,
    /// Money credited by selling the inventory on leaving the recovery zone.
    pub sold: Option<u64>,
}

pub fn fluid_density(biome: Biome) -> f64 {
    if biome == Biome::Water {
        WATER_DENSITY
    } else {
        AIR_DENSITY
    }
}

/// Applies quadratic drag to a velocity. Components that end up below 0.001
/// snap to zero.
pub fn apply_drag(vx: &mut f64, vy: &mut f64, density: f64, coefficient: f64, weight: f64, dt: f64) {
    let speed = magnitude(*vx, *vy);
    if speed == 0.0 {
        return;
    }
    let force = 0.5 * density * speed * speed * coefficient;
    let accel = force / weight;
    *vx += -(*vx / speed) * accel * dt;
    *vy += -(*vy / speed) * accel * dt;

    if vx.abs() < 0.001 {
        *vx = 0.0;
    }
    if vy.abs() < 0.001 {
        *vy = 0.0;
    }
}

pub fn apply_turning(player: &mut Player, speed: f64, dt: f64) {
    let wings = &player.wings;
    let speed_factor = 1.0 - (speed / wings.max_speed).min(1.0);
    let turn = (wings.min_turn_speed + (wings.base_turn_speed - wings.min_turn_speed) * speed_factor) * dt;

    if player.keys.a {
        player.angle -= turn;
    }
    if player.keys.d {
        player.angle += turn;
    }
}

pub fn apply_throttle(player: &mut Player) {
    let engine = &mut player.engine;
    let step = engine.max_power / 100.0;
    if player.keys.w {
        engine.power += step;
    }
    if player.keys.s {
        engine.power -= step;
    }
    engine.power = engine.power.min(engine.max_power).max(engine.min_power);
}

pub fn apply_repairs(player: &mut Player, dt: f64) {
    if player.biome != Biome::Water {
        player.chassis.repair(player.repair_speed * dt);
    }
}

pub fn apply_propulsion(player: &mut Player, dt: f64) {
    let accel = player.engine.power / player.weight * dt;
    player.vx += player.angle.cos() * accel;
    player.vy += player.angle.sin() * accel;
}

/// Engine heat. A saturated engine that keeps producing more heat than it can
/// shed damages the hull instead.
pub fn apply_heat(player: &mut Player, speed: f64, dt: f64) {
    let mut generated = player.engine.power * player.engine.heat_efficiency * dt;
    let mut dispersed = player.chassis.heat_dispersion * dt;

    if speed > player.chassis.top_speed {
        generated += (speed - player.chassis.top_speed) * dt;
    }

    match player.biome {
        Biome::Water => dispersed *= 2.0,
        Biome::Recovery => dispersed *= 10.0,
        Biome::Air => {}
    }

    let engine = &mut player.engine;
    if engine.heat >= engine.max_heat && generated > dispersed {
        player.chassis.take_damage((generated - dispersed) / 5.0);
    } else {
        engine.heat += generated - dispersed;
    }
    engine.heat = engine.heat.clamp(0.0, engine.max_heat);
}

pub fn apply_lift(player: &mut Player, speed: f64, dt: f64) {
    let velocity_angle = player.vy.atan2(player.vx);
    let aoa = player.angle - velocity_angle;
    let aoa = aoa.sin().atan2(aoa.cos());

    if aoa.abs() > player.wings.lift_angle {
        player.stalling = true;
        return;
    }
    player.stalling = false;

    let min_lift = player.wings.min_lift_speed;
    let scale = smoothstep(min_lift - LIFT_BUFFER, min_lift + LIFT_BUFFER, speed);
    let lift = (player.wings.lift_efficiency * speed * speed * aoa.sin() * scale)
        .clamp(-MAX_LIFT, MAX_LIFT);

    let normal = velocity_angle + PI / 2.0;
    player.vx += normal.cos() * lift * dt;
    player.vy += normal.sin() * lift * dt;
}

/// Gravity per tick; in water the chassis buoyancy pushes back up.
pub fn apply_gravity(player: &mut Player) {
    match player.biome {
        Biome::Air => player.vy += GRAVITY,
        Biome::Water => player.vy += GRAVITY - player.chassis.buoyancy,
        Biome::Recovery => {}
    }
}

pub fn apply_player_drag(player: &mut Player, dt: f64) {
    let mut coefficient = DRAG_COEFFICIENT;
    if player.wings.air_brake && player.keys.s && player.engine.power == player.engine.min_power {
        coefficient *= player.wings.air_brake_strength;
    }
    apply_drag(
        &mut player.vx,
        &mut player.vy,
        fluid_density(player.biome),
        coefficient * WING_AREA,
        player.weight,
        dt,
    );
}

/// Recovery zone braking. Throttle still works, at double strength.
pub fn apply_recovery_jello(player: &mut Player, dt: f64) {
    let speed = player.speed();
    if speed < JELLO_STOP_SPEED {
        player.vx = 0.0;
        player.vy = 0.0;
    } else {
        let friction = 0.9 + (speed / 100.0).min(0.09);
        player.vx *= friction;
        player.vy *= friction;
    }

    if player.engine.power > player.engine.min_power {
        let accel = player.engine.power / player.weight * dt * 2.0;
        player.vx += player.angle.cos() * accel;
        player.vy += player.angle.sin() * accel;
    }
}

/// Moves the plane, stopping each axis separately at the world boundary.
pub fn integrate_position(player: &mut Player, map: &MapObject, dt: f64) {
    let next_x = player.x + player.vx * dt;
    let next_y = player.y + player.vy * dt;
    let (blocked_x, blocked_y) = map.check_collisions(player.size, player.x, player.y, next_x, next_y);

    if blocked_x {
        player.vx = 0.0;
    } else {
        player.x = next_x;
    }
    if blocked_y {
        player.vy = 0.0;
    } else {
        player.y = next_y;
    }
}

pub fn apply_water_damage(player: &mut Player, dt: f64) {
    if player.biome == Biome::Water {
        let speed = player.speed();
        player.chassis.take_damage(speed.sqrt() * dt);
    }
}

/// Advances one plane by one tick. Hull outcomes are left to the caller.
pub fn update_player(player: &mut Player, map: &MapObject, dt: f64, time_speed: f64) -> TickEvents {
    let mut events = TickEvents::default();

    if !player.has_valid_position() {
        error!(
            "Skipping update for player {}: invalid position ({}, {})",
            player.username, player.x, player.y
        );
        return events;
    }

    player.biome = map.classify(player.x, player.y);
    let speed = player.speed();

    if !player.keys.r {
        apply_turning(player, speed, dt);
        apply_throttle(player);
        combat::toggle_gun(player, time_speed);
        events.shot = combat::try_fire(player);
    } else {
        apply_repairs(player, dt);
    }
    apply_propulsion(player, dt);
    apply_heat(player, speed, dt);
    combat::update_guns(player, dt);

    apply_lift(player, speed, dt);
    apply_gravity(player);
    apply_player_drag(player, dt);

    if player.biome == Biome::Recovery {
        apply_recovery_jello(player, dt);
        if !player.inventory.is_empty() {
            player.browsing = true;
        }
    } else if player.browsing {
        player.browsing = false;
        events.sold = Some(player.sell_all());
    }

    integrate_position(player, map, dt);
    apply_water_damage(player, dt);
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::catalog::create_engine;
    use shared::components::Component;

    const DT: f64 = 0.01;

    fn test_player(x: f64, y: f64) -> Player {
        Player::new("pilot", (0, 0, 0), (x, y), (0, 1), 0).unwrap()
    }

    #[test]
    fn test_throttle_clamps_power() {
        let mut player = test_player(0.0, -400.0);
        player.keys.w = true;
        for _ in 0..150 {
            apply_throttle(&mut player);
        }
        assert_eq!(player.engine.power, player.engine.max_power);

        player.keys.w = false;
        player.keys.s = true;
        for _ in 0..150 {
            apply_throttle(&mut player);
        }
        assert_eq!(player.engine.power, player.engine.min_power);
    }

    #[test]
    fn test_turning_slows_with_speed() {
        let mut slow = test_player(0.0, 0.0);
        slow.keys.d = true;
        apply_turning(&mut slow, 0.0, DT);
        assert_approx_eq!(slow.angle, slow.wings.base_turn_speed * DT, 1e-12);

        let mut fast = test_player(0.0, 0.0);
        fast.keys.a = true;
        let max_speed = fast.wings.max_speed;
        apply_turning(&mut fast, max_speed * 2.0, DT);
        assert_approx_eq!(fast.angle, -fast.wings.min_turn_speed * DT, 1e-12);
    }

    #[test]
    fn test_heat_accumulates_and_clamps() {
        let mut player = test_player(0.0, 0.0);
        player.biome = Biome::Air;
        player.engine.power = player.engine.max_power;
        let expected = (player.engine.max_power * player.engine.heat_efficiency
            - player.chassis.heat_dispersion)
            * DT;
        apply_heat(&mut player, 0.0, DT);
        assert_approx_eq!(player.engine.heat, expected, 1e-9);

        player.engine.power = 0.0;
        for _ in 0..1000 {
            apply_heat(&mut player, 0.0, DT);
        }
        assert_eq!(player.engine.heat, 0.0);
    }

    #[test]
    fn test_saturated_engine_damages_hull() {
        let mut player = test_player(0.0, 0.0);
        player.biome = Biome::Air;
        player.engine.power = player.engine.max_power;
        player.engine.heat = player.engine.max_heat;
        let hull = player.chassis.hull;
        let excess = (player.engine.max_power * player.engine.heat_efficiency
            - player.chassis.heat_dispersion)
            * DT;

        apply_heat(&mut player, 0.0, DT);

        assert_eq!(player.engine.heat, player.engine.max_heat);
        assert_approx_eq!(player.chassis.hull, hull - excess / 5.0, 1e-9);
    }

    #[test]
    fn test_heat_disperses_faster_in_recovery() {
        let mut air = test_player(0.0, 0.0);
        air.biome = Biome::Air;
        air.engine.heat = 10.0;
        let mut recovery = air.clone();
        recovery.biome = Biome::Recovery;

        apply_heat(&mut air, 0.0, DT);
        apply_heat(&mut recovery, 0.0, DT);
        let air_drop = 10.0 - air.engine.heat;
        let recovery_drop = 10.0 - recovery.engine.heat;
        assert_approx_eq!(recovery_drop, air_drop * 10.0, 1e-9);
    }

    #[test]
    fn test_heat_disperses_twice_as_fast_in_water() {
        let mut air = test_player(0.0, 0.0);
        air.biome = Biome::Air;
        air.engine.heat = 10.0;
        let mut water = air.clone();
        water.biome = Biome::Water;

        apply_heat(&mut air, 0.0, DT);
        apply_heat(&mut water, 0.0, DT);
        let air_drop = 10.0 - air.engine.heat;
        let water_drop = 10.0 - water.engine.heat;
        assert_approx_eq!(air_drop, air.chassis.heat_dispersion * DT, 1e-9);
        assert_approx_eq!(water_drop, air_drop * 2.0, 1e-9);
    }

    #[test]
    fn test_overspeed_adds_heat() {
        let mut cruising = test_player(0.0, 0.0);
        cruising.biome = Biome::Air;
        cruising.engine.power = cruising.engine.max_power;
        let mut fast = cruising.clone();
        let top_speed = cruising.chassis.top_speed;

        apply_heat(&mut cruising, top_speed, DT);
        apply_heat(&mut fast, top_speed + 50.0, DT);
        assert!(cruising.engine.heat > 0.0);
        assert_approx_eq!(fast.engine.heat - cruising.engine.heat, 50.0 * DT, 1e-9);
    }

    #[test]
    fn test_repairs_clamp_and_skip_water() {
        let mut player = test_player(0.0, 0.0);
        player.biome = Biome::Air;
        player.chassis.hull = player.chassis.max_hull - 0.01;
        apply_repairs(&mut player, DT);
        assert_eq!(player.chassis.hull, player.chassis.max_hull);

        player.biome = Biome::Water;
        player.chassis.hull = 10.0;
        apply_repairs(&mut player, DT);
        assert_eq!(player.chassis.hull, 10.0);
    }

    #[test]
    fn test_stall_beyond_lift_angle() {
        let mut player = test_player(0.0, 0.0);
        player.vx = 100.0;
        player.vy = 0.0;
        player.angle = player.wings.lift_angle + 0.1;
        apply_lift(&mut player, 100.0, DT);
        assert!(player.stalling);
        assert_eq!((player.vx, player.vy), (100.0, 0.0));

        player.angle = -0.1;
        apply_lift(&mut player, 100.0, DT);
        assert!(!player.stalling);
        // Nose up (negative y is up) produces upward lift.
        assert!(player.vy < 0.0);
    }

    #[test]
    fn test_no_lift_below_ramp() {
        let mut player = test_player(0.0, 0.0);
        player.vx = 10.0;
        player.angle = -0.1;
        apply_lift(&mut player, 10.0, DT);
        assert_eq!(player.vy, 0.0);
    }

    #[test]
    fn test_gravity_by_biome() {
        let mut player = test_player(0.0, 0.0);
        player.biome = Biome::Air;
        apply_gravity(&mut player);
        assert_eq!(player.vy, GRAVITY);

        player.vy = 0.0;
        player.biome = Biome::Water;
        apply_gravity(&mut player);
        assert_approx_eq!(player.vy, GRAVITY - player.chassis.buoyancy, 1e-12);

        player.vy = 0.0;
        player.biome = Biome::Recovery;
        apply_gravity(&mut player);
        assert_eq!(player.vy, 0.0);
    }

    #[test]
    fn test_drag_is_stronger_in_water() {
        let mut air = test_player(0.0, 0.0);
        air.biome = Biome::Air;
        air.vx = 100.0;
        air.vy = 0.0;
        let mut water = air.clone();
        water.biome = Biome::Water;

        apply_player_drag(&mut air, DT);
        apply_player_drag(&mut water, DT);

        let expected_air = 0.5 * 100.0 * 100.0 * DRAG_COEFFICIENT * WING_AREA / air.weight * DT;
        assert_approx_eq!(100.0 - air.vx, expected_air, 1e-9);
        assert!(water.vx < air.vx);
    }

    #[test]
    fn test_drag_snaps_tiny_components() {
        let (mut vx, mut vy) = (50.0, 0.0005);
        apply_drag(&mut vx, &mut vy, AIR_DENSITY, DRAG_COEFFICIENT, 1.0, DT);
        assert_eq!(vy, 0.0);
        assert!(vx > 0.0);
    }

    #[test]
    fn test_air_brake_needs_idle_engine() {
        let mut braking = test_player(0.0, 0.0);
        braking.biome = Biome::Air;
        braking.vx = 100.0;
        braking.vy = 0.0;
        braking.keys.s = true;
        braking.engine.power = braking.engine.min_power;
        let mut coasting = braking.clone();
        coasting.keys.s = false;

        apply_player_drag(&mut braking, DT);
        apply_player_drag(&mut coasting, DT);
        assert!(braking.vx < coasting.vx);
    }

    #[test]
    fn test_recovery_jello_stops_slow_planes() {
        let mut player = test_player(0.0, 0.0);
        player.vx = 1.0;
        player.vy = 1.0;
        apply_recovery_jello(&mut player, DT);
        assert_eq!((player.vx, player.vy), (0.0, 0.0));

        player.vx = 50.0;
        player.vy = 0.0;
        apply_recovery_jello(&mut player, DT);
        assert_approx_eq!(player.vx, 50.0 * 0.99, 1e-9);
    }

    #[test]
    fn test_recovery_throttle_is_boosted() {
        let mut player = test_player(0.0, 0.0);
        player.engine.power = 100.0;
        apply_recovery_jello(&mut player, DT);
        assert_approx_eq!(player.vx, 100.0 / player.weight * DT * 2.0, 1e-9);
    }

    #[test]
    fn test_boundary_blocks_each_axis() {
        let map = MapObject::new();
        let mut player = test_player(19_999.0, 0.0);
        player.vx = 1000.0;
        player.vy = 100.0;
        integrate_position(&mut player, &map, DT);
        assert_eq!(player.x, 19_999.0);
        assert_eq!(player.vx, 0.0);
        assert_approx_eq!(player.y, 1.0, 1e-9);
        assert_eq!(player.vy, 100.0);
    }

    #[test]
    fn test_water_drains_hull() {
        let mut player = test_player(0.0, 500.0);
        player.biome = Biome::Water;
        player.vx = 100.0;
        player.vy = 0.0;
        let hull = player.chassis.hull;
        apply_water_damage(&mut player, DT);
        assert_approx_eq!(player.chassis.hull, hull - 10.0 * DT, 1e-9);
    }

    #[test]
    fn test_update_skips_corrupt_position() {
        let map = MapObject::new();
        let mut player = test_player(0.0, 0.0);
        player.x = f64::NAN;
        player.keys.w = true;
        let events = update_player(&mut player, &map, DT, 1.0);
        assert_eq!(events, TickEvents::default());
        assert_eq!(player.engine.power, 0.0);
    }

    #[test]
    fn test_update_clamps_stay_within_bounds() {
        let map = MapObject::new();
        let mut player = test_player(1000.0, 500.0);
        player.keys.w = true;
        player.keys.d = true;
        player.keys.mouse = true;
        player.t_x = 2000.0;
        player.t_y = 500.0;

        for _ in 0..2000 {
            update_player(&mut player, &map, DT, 1.0);
            let c = &player.chassis;
            let e = &player.engine;
            assert!(c.hull >= 0.0 && c.hull <= c.max_hull);
            assert!(e.heat >= 0.0 && e.heat <= e.max_heat);
            assert!(e.power >= e.min_power && e.power <= e.max_power);
        }
    }

    #[test]
    fn test_leaving_recovery_sells_inventory() {
        let map = MapObject::new();
        let mut player = test_player(0.0, 0.0);
        player.inventory.push(Component::Engine(create_engine(1, 1)));

        let events = update_player(&mut player, &map, DT, 1.0);
        assert!(player.browsing);
        assert_eq!(events.sold, None);

        player.x = 1000.0;
        player.y = -1000.0;
        let events = update_player(&mut player, &map, DT, 1.0);
        assert_eq!(events.sold, Some(80));
        assert!(!player.browsing);
        assert_eq!(player.money, 80);
        assert!(player.inventory.is_empty());
    }

    #[test]
    fn test_repair_key_replaces_flight_controls() {
        let map = MapObject::new();
        let mut player = test_player(1000.0, -1000.0);
        player.keys.r = true;
        player.keys.w = true;
        player.chassis.hull = 10.0;
        update_player(&mut player, &map, DT, 1.0);
        assert_eq!(player.engine.power, 0.0);
        assert_approx_eq!(player.chassis.hull, 10.0 + player.repair_speed * DT, 1e-9);
    }
}

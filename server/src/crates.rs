//! Crate spawning, towing and pickup.
//!
//! Crates name their carrier by username and the carrier is looked up again on
//! every tick. A crate whose carrier has gone is simply dropped where it is.

use crate::config::SimConfig;
use crate::physics::{apply_drag, AIR_DENSITY, DRAG_COEFFICIENT, WATER_DENSITY};
use log::debug;
use rand::Rng;
use shared::catalog::{create_chassis, create_engine, create_wings};
use shared::components::Component;
use shared::entity::{Cargo, Crate, CrateKind, Player};
use shared::map::{Biome, BiomeZone, MapObject, SEA_LEVEL};
use std::f64::consts::PI;

pub const ROPE_LENGTH: f64 = 5.0;
pub const SPRING_STRENGTH: f64 = 32.0;
pub const ROPE_DAMPING: f64 = 0.8;
pub const CRATE_GRAVITY: f64 = 1.0;
pub const CRATE_BUOYANCY: f64 = 2.0;
pub const REPULSION_STRENGTH: f64 = 12.0;

/// A message for a player who just opened a crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pickup {
    pub username: String,
    pub message: String,
}

pub fn take_id(next_id: &mut u32) -> u32 {
    let id = *next_id;
    *next_id = next_id.wrapping_add(1);
    id
}

fn random_side<R: Rng>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) {
        -1.0
    } else {
        1.0
    }
}

/// Component level from a roll that grows with distance from the center.
pub fn level_for_roll(roll: f64) -> u32 {
    if roll > 14000.0 {
        3
    } else if roll > 5000.0 {
        2
    } else {
        1
    }
}

pub fn money_crate<R: Rng>(rng: &mut R, map: &MapObject, id: u32) -> Crate {
    let x = random_side(rng) * (500.0 + rng.gen::<f64>() * (map.size_x - 1000.0));
    let amount = (x.abs() / 100.0 + 20.0).round() as u64;
    Crate::new(id, x, SEA_LEVEL, Cargo::Money(amount))
}

pub fn component_crate<R: Rng>(rng: &mut R, map: &MapObject, id: u32) -> Crate {
    let x = random_side(rng) * (2000.0 + rng.gen::<f64>() * (map.size_x - 2000.0));
    let level = level_for_roll(rng.gen::<f64>() * x.abs());
    let manufacturer = rng.gen_range(1..=4);
    let component = match rng.gen_range(0..3) {
        0 => Component::Engine(create_engine(manufacturer, level)),
        1 => Component::Chassis(create_chassis(manufacturer, level)),
        _ => Component::Wings(create_wings(manufacturer, level)),
    };
    Crate::new(id, x, SEA_LEVEL, Cargo::Component(component))
}

/// Tops both crate kinds up to their caps.
pub fn refill<R: Rng>(
    crates: &mut Vec<Crate>,
    rng: &mut R,
    next_id: &mut u32,
    map: &MapObject,
    config: &SimConfig,
) {
    let money = crates.iter().filter(|c| c.kind() == CrateKind::Money).count();
    for _ in money..config.max_money_crates {
        let id = take_id(next_id);
        crates.push(money_crate(rng, map, id));
    }

    let components = crates
        .iter()
        .filter(|c| c.kind() == CrateKind::Component)
        .count();
    for _ in components..config.max_component_crates {
        let id = take_id(next_id);
        crates.push(component_crate(rng, map, id));
    }
}

/// Three level-1 crates, one per part kind, used to preview a manufacturer.
pub fn item_test_crates(manufacturer: u32, next_id: &mut u32) -> Vec<Crate> {
    vec![
        Component::Engine(create_engine(manufacturer, 1)),
        Component::Chassis(create_chassis(manufacturer, 1)),
        Component::Wings(create_wings(manufacturer, 1)),
    ]
    .into_iter()
    .map(|component| Crate::new(take_id(next_id), 500.0, 0.0, Cargo::Component(component)))
    .collect()
}

/// Clears the carrier on every crate towed by `username`.
pub fn release_all(crates: &mut [Crate], username: &str) -> usize {
    let mut released = 0;
    for crate_ in crates.iter_mut().filter(|c| c.is_carried_by(username)) {
        crate_.carrier = None;
        released += 1;
    }
    released
}

enum CrateStep {
    Moved,
    Dropped,
    Opened(Pickup),
}

fn integrate(crate_: &mut Crate, dt: f64) {
    crate_.x += crate_.vx * dt;
    crate_.y += crate_.vy * dt;
}

fn open(crate_: &Crate, player: &mut Player) -> Pickup {
    let message = match &crate_.cargo {
        Cargo::Money(amount) => {
            player.money += amount;
            format!("+${}!", amount)
        }
        Cargo::Component(component) => {
            player.inventory.push(component.clone());
            format!("Picked up {}", component.name())
        }
    };
    player.drop_crate(crate_.id);
    Pickup {
        username: player.username.clone(),
        message,
    }
}

fn step_crate(
    crate_: &mut Crate,
    players: &mut [Player],
    map: &MapObject,
    recovery: &BiomeZone,
    dt: f64,
) -> CrateStep {
    let Some(carrier) = crate_.carrier.clone() else {
        let biome = map.classify(crate_.x, crate_.y);
        let density = if biome == Biome::Water {
            WATER_DENSITY
        } else {
            AIR_DENSITY
        };
        apply_drag(&mut crate_.vx, &mut crate_.vy, density, DRAG_COEFFICIENT, crate_.weight, dt);
        if biome == Biome::Water {
            crate_.vy += CRATE_GRAVITY - CRATE_BUOYANCY;
        } else {
            crate_.vy += CRATE_GRAVITY;
        }
        integrate(crate_, dt);
        return CrateStep::Moved;
    };

    let Some(player) = players.iter_mut().find(|p| p.username == carrier) else {
        debug!("Carrier {} of crate {} is gone, dropping it", carrier, crate_.id);
        crate_.carrier = None;
        return CrateStep::Dropped;
    };

    if recovery.contains(crate_.x, crate_.y) {
        return CrateStep::Opened(open(crate_, player));
    }

    let rope_angle = player.angle + PI;
    let target_x = player.x + rope_angle.cos() * ROPE_LENGTH;
    let target_y = player.y + rope_angle.sin() * ROPE_LENGTH;
    crate_.vx += (target_x - crate_.x) * SPRING_STRENGTH * dt;
    crate_.vy += (target_y - crate_.y) * SPRING_STRENGTH * dt;

    apply_drag(&mut crate_.vx, &mut crate_.vy, AIR_DENSITY, DRAG_COEFFICIENT, crate_.weight, dt);
    crate_.vy += CRATE_GRAVITY;
    crate_.vx *= ROPE_DAMPING;
    crate_.vy *= ROPE_DAMPING;
    integrate(crate_, dt);
    CrateStep::Moved
}

/// Pushes crate `i` and its close neighbours apart.
fn repel(crates: &mut [Crate], i: usize, dt: f64) {
    let radius = crates[i].size * 2.0;
    for j in 0..crates.len() {
        if j == i {
            continue;
        }
        let dx = crates[i].x - crates[j].x;
        let dy = crates[i].y - crates[j].y;
        let distance = dx.hypot(dy);
        if distance < radius && distance > 0.01 {
            let (nx, ny) = (dx / distance, dy / distance);
            let push = REPULSION_STRENGTH * (radius - distance) / radius * dt;
            crates[i].x += nx * push;
            crates[i].y += ny * push;
            crates[j].x -= nx * push;
            crates[j].y -= ny * push;
        }
    }
}

/// Hands the crate to the first player close enough who is not already towing it.
fn attach_nearby(crate_: &mut Crate, players: &mut [Player]) {
    let Some(idx) = players.iter().position(|p| {
        !crate_.is_carried_by(&p.username)
            && (p.x - crate_.x).hypot(p.y - crate_.y) <= 2.0 * (p.size + crate_.size + 5.0)
    }) else {
        return;
    };

    if let Some(previous) = crate_.carrier.take() {
        if let Some(p) = players.iter_mut().find(|p| p.username == previous) {
            p.drop_crate(crate_.id);
        }
    }
    let player = &mut players[idx];
    player.push_crate(crate_.id, crate_.weight);
    crate_.carrier = Some(player.username.clone());
}

/// Runs one tick over every crate. Opened crates are removed and reported.
pub fn update_crates(
    crates: &mut Vec<Crate>,
    players: &mut [Player],
    map: &MapObject,
    dt: f64,
) -> Vec<Pickup> {
    let recovery = map.recovery();
    let mut pickups = Vec::new();

    let mut i = 0;
    while i < crates.len() {
        match step_crate(&mut crates[i], players, map, &recovery, dt) {
            CrateStep::Opened(pickup) => {
                crates.remove(i);
                pickups.push(pickup);
                continue;
            }
            CrateStep::Dropped => {
                i += 1;
                continue;
            }
            CrateStep::Moved => {}
        }
        repel(crates, i, dt);
        attach_nearby(&mut crates[i], players);
        i += 1;
    }
    pickups
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const DT: f64 = 0.01;

    fn test_player(name: &str, x: f64, y: f64) -> Player {
        Player::new(name, (0, 0, 0), (x, y), (0, 1), 0).unwrap()
    }

    fn carried(id: u32, x: f64, y: f64, cargo: Cargo, player: &mut Player) -> Crate {
        let mut crate_ = Crate::new(id, x, y, cargo);
        crate_.carrier = Some(player.username.clone());
        player.push_crate(id, crate_.weight);
        crate_
    }

    #[test]
    fn test_level_for_roll() {
        assert_eq!(level_for_roll(0.0), 1);
        assert_eq!(level_for_roll(5000.0), 1);
        assert_eq!(level_for_roll(5000.1), 2);
        assert_eq!(level_for_roll(14000.1), 3);
    }

    #[test]
    fn test_refill_respects_caps_and_placement() {
        let map = MapObject::new();
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let mut next_id = 1;
        let mut crates = Vec::new();

        refill(&mut crates, &mut rng, &mut next_id, &map, &config);
        refill(&mut crates, &mut rng, &mut next_id, &map, &config);

        let money: Vec<_> = crates.iter().filter(|c| c.kind() == CrateKind::Money).collect();
        assert_eq!(money.len(), 40);
        assert_eq!(crates.len(), 50);
        for c in &money {
            assert!(c.x.abs() >= 500.0 && c.x.abs() <= map.size_x - 500.0);
            assert_eq!(c.y, SEA_LEVEL);
            if let Cargo::Money(amount) = c.cargo {
                assert_eq!(amount, (c.x.abs() / 100.0 + 20.0).round() as u64);
            }
        }
        for c in crates.iter().filter(|c| c.kind() == CrateKind::Component) {
            assert!(c.x.abs() >= 2000.0 && c.x.abs() <= map.size_x);
        }
        assert_eq!(next_id, 51);
    }

    #[test]
    fn test_money_crate_opens_in_recovery() {
        let map = MapObject::new();
        let mut players = vec![test_player("p", 0.0, 0.0)];
        let base_weight = players[0].weight;
        let mut crates = vec![carried(1, 10.0, 0.0, Cargo::Money(50), &mut players[0])];

        let pickups = update_crates(&mut crates, &mut players, &map, DT);

        assert!(crates.is_empty());
        assert_eq!(players[0].money, 50);
        assert!(players[0].crates.is_empty());
        assert_eq!(players[0].weight, base_weight);
        assert_eq!(
            pickups,
            vec![Pickup {
                username: "p".into(),
                message: "+$50!".into()
            }]
        );
    }

    #[test]
    fn test_component_crate_goes_to_inventory() {
        let map = MapObject::new();
        let mut players = vec![test_player("p", 0.0, 0.0)];
        let wings = create_wings(3, 1);
        let mut crates = vec![carried(
            1,
            0.0,
            0.0,
            Cargo::Component(Component::Wings(wings.clone())),
            &mut players[0],
        )];

        let pickups = update_crates(&mut crates, &mut players, &map, DT);

        assert_eq!(players[0].inventory, vec![Component::Wings(wings)]);
        assert_eq!(pickups[0].message, "Picked up Aero Standard Wings Lvl 1");
    }

    #[test]
    fn test_missing_carrier_drops_crate() {
        let map = MapObject::new();
        let mut players: Vec<Player> = Vec::new();
        let mut crate_ = Crate::new(1, 5000.0, 300.0, Cargo::Money(10));
        crate_.carrier = Some("ghost".into());
        let mut crates = vec![crate_];

        update_crates(&mut crates, &mut players, &map, DT);

        assert!(crates[0].carrier.is_none());
        assert_eq!((crates[0].x, crates[0].y), (5000.0, 300.0));
    }

    #[test]
    fn test_free_crate_attaches_to_first_close_player() {
        let map = MapObject::new();
        let mut players = vec![
            test_player("far", 9000.0, -1000.0),
            test_player("first", 5010.0, -1000.0),
            test_player("second", 5005.0, -1000.0),
        ];
        let mut crates = vec![Crate::new(1, 5000.0, -1000.0, Cargo::Money(10))];

        update_crates(&mut crates, &mut players, &map, DT);

        assert_eq!(crates[0].carrier.as_deref(), Some("first"));
        assert!(players[1].carries(1));
        assert!(!players[2].carries(1));
        assert_eq!(players[1].weight, players[2].weight + 1.0);
    }

    #[test]
    fn test_crate_changes_hands() {
        let map = MapObject::new();
        let mut players = vec![
            test_player("thief", 5000.0, -1000.0),
            test_player("owner", 5000.0, -1000.0),
        ];
        let mut crates = vec![carried(1, 5000.0, -1000.0, Cargo::Money(10), &mut players[1])];

        update_crates(&mut crates, &mut players, &map, DT);

        assert_eq!(crates[0].carrier.as_deref(), Some("thief"));
        assert!(players[0].carries(1));
        assert!(!players[1].carries(1));
    }

    #[test]
    fn test_carried_crate_is_pulled_toward_carrier() {
        let map = MapObject::new();
        let mut players = vec![test_player("p", 5000.0, -1000.0)];
        let mut crates = vec![carried(1, 4900.0, -1000.0, Cargo::Money(10), &mut players[0])];

        update_crates(&mut crates, &mut players, &map, DT);
        assert!(crates[0].vx > 0.0);
        assert!(crates[0].x > 4900.0);
    }

    #[test]
    fn test_free_crate_floats_in_water() {
        let map = MapObject::new();
        let mut players: Vec<Player> = Vec::new();
        let mut crates = vec![Crate::new(1, 5000.0, 800.0, Cargo::Money(10))];
        update_crates(&mut crates, &mut players, &map, DT);
        assert!(crates[0].vy < 0.0);

        let mut airborne = vec![Crate::new(2, 5000.0, -800.0, Cargo::Money(10))];
        update_crates(&mut airborne, &mut players, &map, DT);
        assert!(airborne[0].vy > 0.0);
    }

    #[test]
    fn test_close_crates_repel() {
        let map = MapObject::new();
        let mut players: Vec<Player> = Vec::new();
        let mut crates = vec![
            Crate::new(1, 5000.0, -800.0, Cargo::Money(10)),
            Crate::new(2, 5004.0, -800.0, Cargo::Money(10)),
        ];
        update_crates(&mut crates, &mut players, &map, DT);
        assert!(crates[1].x - crates[0].x > 4.0);
    }

    #[test]
    fn test_release_all() {
        let mut crates = vec![
            Crate::new(1, 0.0, 0.0, Cargo::Money(1)),
            Crate::new(2, 0.0, 0.0, Cargo::Money(1)),
        ];
        crates[0].carrier = Some("a".into());
        crates[1].carrier = Some("b".into());
        assert_eq!(release_all(&mut crates, "a"), 1);
        assert!(crates[0].carrier.is_none());
        assert_eq!(crates[1].carrier.as_deref(), Some("b"));
    }

    #[test]
    fn test_item_test_crates() {
        let mut next_id = 10;
        let crates = item_test_crates(2, &mut next_id);
        assert_eq!(crates.len(), 3);
        assert_eq!(next_id, 13);
        assert!(crates.iter().all(|c| (c.x, c.y) == (500.0, 0.0)));
    }
}

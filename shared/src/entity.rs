//! Live simulation records: players, projectiles, crates and parties.
//!
//! Links between records are by key, never by reference: a crate names its
//! carrier by username and a player lists the ids of the crates it carries.
//! Either side may disappear between ticks, so lookups are repeated on every use.

use crate::catalog::{create_chassis, create_engine, create_gun, create_wings, CatalogError};
use crate::components::{Chassis, Component, Engine, Gun, Wings};
use crate::map::Biome;
use serde::{Deserialize, Serialize};

pub const PLAYER_SIZE: f64 = 10.0;
pub const REPAIR_SPEED: f64 = 5.0;
pub const RESPAWN_VELOCITY: (f64, f64) = (80.0, 0.0);
pub const CRATE_SIZE: f64 = 5.0;
pub const CRATE_WEIGHT: f64 = 1.0;
pub const PROJECTILE_LIFESPAN: f64 = 5000.0;

/// Keys held by the client at its latest update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keys {
    /// Throttle up.
    pub w: bool,
    /// Turn left.
    pub a: bool,
    /// Throttle down / air brake.
    pub s: bool,
    /// Turn right.
    pub d: bool,
    /// Toggle the selected gun.
    pub c: bool,
    /// Repair instead of flying.
    pub r: bool,
    pub mouse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GunSlot {
    Primary,
    Secondary,
}

impl GunSlot {
    pub fn toggled(self) -> Self {
        match self {
            GunSlot::Primary => GunSlot::Secondary,
            GunSlot::Secondary => GunSlot::Primary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatLine {
    /// Server millis when the line was received.
    pub sent_at: u64,
    pub text: String,
}

/// Party membership as shown next to a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyTag {
    pub name: String,
    pub color: (u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarriedCrate {
    pub id: u32,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub username: String,
    pub color: (u8, u8, u8),
    pub size: f64,
    pub repair_speed: f64,

    pub chassis: Chassis,
    pub engine: Engine,
    pub wings: Wings,
    pub gun1: Gun,
    pub gun2: Gun,
    pub selected_gun: GunSlot,
    /// Milliseconds until the selected gun may be toggled again.
    pub gun_toggle_cooldown: f64,

    pub angle: f64,
    pub biome: Biome,
    pub start_x: f64,
    pub start_y: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub t_x: f64,
    pub t_y: f64,
    pub keys: Keys,

    pub money: u64,
    pub experience: f64,
    pub crates: Vec<CarriedCrate>,
    pub inventory: Vec<Component>,
    pub browsing: bool,
    pub stalling: bool,

    pub weight: f64,
    pub value: u64,

    pub party: Option<PartyTag>,
    pub messages: Vec<ChatLine>,
    pub last_activity: u64,
    pub privileges: bool,
}

impl Player {
    /// Builds a player with the standard starting kit and the chosen guns.
    pub fn new(
        username: impl Into<String>,
        color: (u8, u8, u8),
        spawn: (f64, f64),
        guns: (u32, u32),
        now: u64,
    ) -> Result<Self, CatalogError> {
        let mut player = Self {
            username: username.into(),
            color,
            size: PLAYER_SIZE,
            repair_speed: REPAIR_SPEED,
            chassis: create_chassis(0, 1),
            engine: create_engine(0, 1),
            wings: create_wings(0, 1),
            gun1: create_gun(guns.0, 1)?,
            gun2: create_gun(guns.1, 1)?,
            selected_gun: GunSlot::Primary,
            gun_toggle_cooldown: 0.0,
            angle: 0.0,
            biome: Biome::Air,
            start_x: spawn.0,
            start_y: spawn.1,
            x: spawn.0,
            y: spawn.1,
            vx: RESPAWN_VELOCITY.0,
            vy: RESPAWN_VELOCITY.1,
            t_x: 0.0,
            t_y: 0.0,
            keys: Keys::default(),
            money: 0,
            experience: 0.0,
            crates: Vec::new(),
            inventory: Vec::new(),
            browsing: false,
            stalling: false,
            weight: 0.0,
            value: 0,
            party: None,
            messages: Vec::new(),
            last_activity: now,
            privileges: false,
        };
        player.update_plane();
        Ok(player)
    }

    pub fn speed(&self) -> f64 {
        self.vx.hypot(self.vy)
    }

    pub fn has_valid_position(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn has_valid_target(&self) -> bool {
        self.t_x.is_finite() && self.t_y.is_finite()
    }

    pub fn selected_gun_mut(&mut self) -> &mut Gun {
        match self.selected_gun {
            GunSlot::Primary => &mut self.gun1,
            GunSlot::Secondary => &mut self.gun2,
        }
    }

    /// Recomputes the derived value and weight.
    pub fn update_plane(&mut self) {
        self.value = self.chassis.value
            + self.engine.value
            + self.wings.value
            + self.gun1.value
            + self.gun2.value;
        self.weight = self.chassis.weight
            + self.engine.weight
            + self.wings.weight
            + self.crates.iter().map(|c| c.weight).sum::<f64>();
    }

    /// Swaps the inventory item at `index` into its slot; the replaced part
    /// takes the item's place in the inventory. Returns the installed part's
    /// name, or `None` when the slot is empty.
    pub fn install(&mut self, index: usize) -> Option<String> {
        let incoming = self.inventory.get(index)?.clone();
        let name = incoming.name().to_string();
        let outgoing = match incoming {
            Component::Engine(engine) => {
                Component::Engine(std::mem::replace(&mut self.engine, engine))
            }
            Component::Chassis(chassis) => {
                Component::Chassis(std::mem::replace(&mut self.chassis, chassis))
            }
            Component::Wings(wings) => Component::Wings(std::mem::replace(&mut self.wings, wings)),
        };
        self.inventory[index] = outgoing;
        self.update_plane();
        Some(name)
    }

    pub fn carries(&self, crate_id: u32) -> bool {
        self.crates.iter().any(|c| c.id == crate_id)
    }

    /// Records a crate as carried. The crate's own carrier field is the
    /// caller's responsibility.
    pub fn push_crate(&mut self, crate_id: u32, weight: f64) {
        if !self.carries(crate_id) {
            self.crates.push(CarriedCrate { id: crate_id, weight });
            self.update_plane();
        }
    }

    pub fn drop_crate(&mut self, crate_id: u32) -> bool {
        let before = self.crates.len();
        self.crates.retain(|c| c.id != crate_id);
        let removed = self.crates.len() != before;
        if removed {
            self.update_plane();
        }
        removed
    }

    /// Clears the carried list, returning the ids that were dropped.
    pub fn drop_all_crates(&mut self) -> Vec<u32> {
        let ids = self.crates.drain(..).map(|c| c.id).collect();
        self.update_plane();
        ids
    }

    /// Empties the inventory into money. Returns the amount credited.
    pub fn sell_all(&mut self) -> u64 {
        let total: u64 = self.inventory.drain(..).map(|c| c.value()).sum();
        self.money += total;
        total
    }

    /// Puts the player back at its spawn point with a fresh airframe.
    /// Carried crates must be released by the caller beforehand.
    pub fn respawn(&mut self) {
        self.x = self.start_x;
        self.y = self.start_y;
        self.vx = RESPAWN_VELOCITY.0;
        self.vy = RESPAWN_VELOCITY.1;
        self.t_x = 0.0;
        self.t_y = 0.0;
        self.angle = 0.0;
        self.gun1.reset();
        self.gun2.reset();
        self.chassis.hull = self.chassis.max_hull;
        self.engine.heat = 0.0;
        self.engine.power = self.engine.max_power.min(100.0).max(self.engine.min_power);
        self.crates.clear();
        self.update_plane();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projectile {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    pub damage: f64,
    pub size: f64,
    pub owner: String,
    /// Remaining milliseconds.
    pub lifespan: f64,
    pub color: (u8, u8, u8),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cargo {
    Money(u64),
    Component(Component),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrateKind {
    Money,
    Component,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crate {
    pub id: u32,
    pub cargo: Cargo,
    pub size: f64,
    pub weight: f64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    /// Username of the carrying player.
    pub carrier: Option<String>,
}

impl Crate {
    pub fn new(id: u32, x: f64, y: f64, cargo: Cargo) -> Self {
        Self {
            id,
            cargo,
            size: CRATE_SIZE,
            weight: CRATE_WEIGHT,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            angle: 0.0,
            carrier: None,
        }
    }

    pub fn kind(&self) -> CrateKind {
        match self.cargo {
            Cargo::Money(_) => CrateKind::Money,
            Cargo::Component(_) => CrateKind::Component,
        }
    }

    pub fn is_carried_by(&self, username: &str) -> bool {
        self.carrier.as_deref() == Some(username)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    pub name: String,
    pub color: (u8, u8, u8),
    pub members: Vec<String>,
}

impl Party {
    pub fn new(name: impl Into<String>, color: (u8, u8, u8)) -> Self {
        Self {
            name: name.into(),
            color,
            members: Vec::new(),
        }
    }

    pub fn tag(&self) -> PartyTag {
        PartyTag {
            name: self.name.clone(),
            color: self.color,
        }
    }

    pub fn add_member(&mut self, username: &str) {
        if !self.members.iter().any(|m| m == username) {
            self.members.push(username.to_string());
        }
    }

    pub fn remove_member(&mut self, username: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != username);
        self.members.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

//! Types shared by the game server and its clients.
//!
//! - [`components`] and [`catalog`]: plane parts and the factory that builds them
//! - [`map`]: world geometry and biome lookup
//! - [`entity`]: players, projectiles, crates and parties
//! - [`protocol`]: message types and the length-prefixed frame codec

pub mod catalog;
pub mod components;
pub mod entity;
pub mod map;
pub mod protocol;

pub use catalog::{create_chassis, create_engine, create_gun, create_wings, CatalogError};
pub use components::{Chassis, Component, Engine, Gun, Wings};
pub use entity::{Cargo, Crate, CrateKind, GunSlot, Keys, Party, Player, Projectile};
pub use map::{Biome, BiomeZone, MapObject};
pub use protocol::{ClientPacket, NoticeKind, ProtocolError, ServerPacket};

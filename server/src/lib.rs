//! # Skyhaul Server Library
//!
//! The authoritative game server for Skyhaul. It owns the canonical world,
//! simulates every plane, projectile and crate on fixed timers, and answers
//! client requests over TCP.
//!
//! ## Architecture
//!
//! ### Single Owner
//! One main loop owns both the [`game::GameState`] and the
//! [`client_manager::ClientManager`]. Network tasks (an acceptor plus one
//! reader and one writer per connection) talk to it over unbounded channels,
//! so no game data is ever shared across tasks.
//!
//! ### Outbox Routing
//! Handlers and ticks never touch sockets. They queue messages addressed to a
//! player, every player, everyone but one player, or a raw connection. After
//! each event the loop encodes each message once and writes it to the
//! resolved sessions.
//!
//! ### Timers
//! Players, projectiles and crates advance on independent intervals (10 ms by
//! default); a slower sweep drops idle players and empty parties.
//!
//! ## Module Organization
//!
//! - `client_manager`: connection registry and username bindings
//! - `combat`: guns, projectiles and hull outcomes
//! - `commands`: chat command parsing
//! - `config`: simulation settings
//! - `crates`: loot spawning, towing and pickup
//! - `game`: the world state and every handler
//! - `network`: TCP framing tasks and the main loop
//! - `physics`: per-plane flight model
//! - `scheduler`: tick timers
//! - `utils`: angles and timestamps
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::SimConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", SimConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod commands;
pub mod config;
pub mod crates;
pub mod game;
pub mod network;
pub mod physics;
pub mod scheduler;
pub mod utils;

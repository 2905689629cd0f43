//! Authoritative game state.
//!
//! [`GameState`] owns every live collection and is only ever touched from the
//! server's main loop. Handlers and ticks never write to sockets; they queue
//! [`Outbound`] messages which the network layer drains and routes after each
//! event.

use crate::client_manager::{ConnId, Recipient};
use crate::combat::{self, Flight, HullFate};
use crate::commands::{self, ChatCommand};
use crate::config::SimConfig;
use crate::crates;
use crate::physics;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::catalog::CatalogError;
use shared::entity::{ChatLine, Crate, Keys, Party, Player, Projectile};
use shared::map::MapObject;
use shared::protocol::{NoticeKind, ServerPacket};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error("Username cannot be empty.")]
    EmptyUsername,
    #[error("Username is too long.")]
    UsernameTooLong,
    #[error("Username already in use.")]
    UsernameTaken,
    #[error("Already logged in.")]
    AlreadyLoggedIn,
    #[error("Invalid gun selection.")]
    InvalidGun(#[from] CatalogError),
    #[error("player {0} not found")]
    PlayerNotFound(String),
    #[error("invalid item index {0}")]
    InvalidItemIndex(i64),
    #[error("update for {claimed} arrived on a session logged in as {session:?}")]
    UsernameMismatch {
        session: Option<String>,
        claimed: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub to: Recipient,
    pub packet: ServerPacket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub username: String,
    pub color: (u8, u8, u8),
    pub guns: (u32, u32),
}

/// Latest input from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInput {
    pub username: String,
    pub keys: Option<Keys>,
    pub t_x: f64,
    pub t_y: f64,
    pub chat_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Snapshot {
    Players,
    Parties,
    Map,
    Projectiles,
    Crates,
}

pub struct GameState {
    pub config: SimConfig,
    pub map: MapObject,
    pub players: Vec<Player>,
    pub projectiles: Vec<Projectile>,
    pub crates: Vec<Crate>,
    pub parties: Vec<Party>,
    pub tick: u64,
    rng: StdRng,
    next_entity_id: u32,
    outbox: Vec<Outbound>,
    /// Usernames whose sessions must be unbound once the outbox is flushed.
    departures: Vec<String>,
}

impl GameState {
    pub fn new(config: SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            map: MapObject::new(),
            players: Vec::new(),
            projectiles: Vec::new(),
            crates: Vec::new(),
            parties: Vec::new(),
            tick: 0,
            rng,
            next_entity_id: 1,
            outbox: Vec::new(),
            departures: Vec::new(),
        }
    }

    pub fn player(&self, username: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.username == username)
    }

    pub fn player_mut(&mut self, username: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.username == username)
    }

    pub fn send(&mut self, to: Recipient, packet: ServerPacket) {
        self.outbox.push(Outbound { to, packet });
    }

    pub fn notify(&mut self, username: &str, message: impl Into<String>, kind: NoticeKind) {
        self.send(
            Recipient::Player(username.to_string()),
            ServerPacket::notice(message, kind),
        );
    }

    pub fn notify_all(&mut self, message: impl Into<String>, kind: NoticeKind) {
        self.send(Recipient::All, ServerPacket::notice(message, kind));
    }

    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn take_departures(&mut self) -> Vec<String> {
        std::mem::take(&mut self.departures)
    }

    // --- client commands ---

    /// Creates a player for a connection. Failures are answered with
    /// `login_failed` and returned for logging.
    pub fn login(
        &mut self,
        conn: ConnId,
        already_logged_in: bool,
        request: LoginRequest,
        now: u64,
    ) -> Result<String, GameError> {
        match self.try_login(conn, already_logged_in, request, now) {
            Ok(username) => Ok(username),
            Err(e) => {
                warn!("Login rejected on connection {}: {}", conn, e);
                self.send(
                    Recipient::Connection(conn),
                    ServerPacket::LoginFailed {
                        message: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    fn try_login(
        &mut self,
        conn: ConnId,
        already_logged_in: bool,
        request: LoginRequest,
        now: u64,
    ) -> Result<String, GameError> {
        if already_logged_in {
            return Err(GameError::AlreadyLoggedIn);
        }
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(GameError::EmptyUsername);
        }
        if username.chars().count() > self.config.max_username_len {
            return Err(GameError::UsernameTooLong);
        }
        if self.player(&username).is_some() {
            return Err(GameError::UsernameTaken);
        }

        let mut player = Player::new(
            username.clone(),
            request.color,
            self.config.spawn,
            request.guns,
            now,
        )?;
        let is_admin = username == self.config.admin_name;
        player.privileges = is_admin;
        self.players.push(player);

        self.send(
            Recipient::AllExcept(username.clone()),
            ServerPacket::notice(format!("{} joined!", username), NoticeKind::Server),
        );
        self.send(
            Recipient::Connection(conn),
            ServerPacket::LoginSuccess {
                username: username.clone(),
                map: self.map.clone(),
            },
        );
        self.notify(&username, "Hi!", NoticeKind::Game);
        let count = self.players.len();
        self.notify(&username, format!("Current players: {}", count), NoticeKind::Server);
        if is_admin {
            self.notify(&username, "You are the admin.", NoticeKind::Server);
        }

        info!(target: "players", "Player joined: {}", username);
        Ok(username)
    }

    /// Applies a client's input. Only the session's own player may be updated.
    pub fn update(
        &mut self,
        session_user: Option<&str>,
        input: PlayerInput,
        now: u64,
    ) -> Result<(), GameError> {
        if session_user != Some(input.username.as_str()) {
            return Err(GameError::UsernameMismatch {
                session: session_user.map(str::to_string),
                claimed: input.username,
            });
        }

        let player = self
            .player_mut(&input.username)
            .ok_or_else(|| GameError::PlayerNotFound(input.username.clone()))?;
        if let Some(keys) = input.keys {
            player.keys = keys;
        }
        player.t_x = input.t_x;
        player.t_y = input.t_y;
        player.last_activity = now;

        let Some(line) = input.chat_message.filter(|m| !m.is_empty()) else {
            return Ok(());
        };
        info!(target: "chat", "{}: {}", input.username, line);
        if line.starts_with('/') {
            self.run_commands(&input.username, &line);
        } else {
            player.messages.push(ChatLine {
                sent_at: now,
                text: line,
            });
        }
        Ok(())
    }

    /// Swaps an inventory component into its slot.
    pub fn equip_item(&mut self, username: &str, index: i64) -> Result<String, GameError> {
        let player = self
            .player_mut(username)
            .ok_or_else(|| GameError::PlayerNotFound(username.to_string()))?;
        let installed = usize::try_from(index).ok().and_then(|i| player.install(i));

        match installed {
            Some(name) => {
                self.notify(username, format!("Equipped {}", name), NoticeKind::Game);
                Ok(name)
            }
            None => {
                warn!("Item {} not found in inventory of {}", index, username);
                self.notify(username, format!("Failed to equip item {}", index), NoticeKind::Game);
                Err(GameError::InvalidItemIndex(index))
            }
        }
    }

    pub fn snapshot(&self, kind: Snapshot) -> ServerPacket {
        match kind {
            Snapshot::Players => ServerPacket::PlayerData {
                players: self.players.clone(),
            },
            Snapshot::Parties => ServerPacket::PartyData {
                parties: self.parties.clone(),
            },
            Snapshot::Map => ServerPacket::MapData {
                map: self.map.clone(),
            },
            Snapshot::Projectiles => ServerPacket::ProjectileData {
                projectiles: self.projectiles.clone(),
            },
            Snapshot::Crates => ServerPacket::CrateData {
                crates: self.crates.clone(),
            },
        }
    }

    /// Handles a closed connection that was logged in.
    pub fn disconnect(&mut self, username: &str) -> bool {
        if self.remove_player(username).is_none() {
            warn!("Disconnect for unknown player {}", username);
            return false;
        }
        self.notify_all(format!("{} has disconnected", username), NoticeKind::Server);
        info!("Player disconnected: {}", username);
        true
    }

    /// Removes a player along with its crate links and party membership.
    fn remove_player(&mut self, username: &str) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.username == username)?;
        self.leave_party(username);
        crates::release_all(&mut self.crates, username);
        Some(self.players.remove(idx))
    }

    // --- chat commands ---

    fn run_commands(&mut self, username: &str, line: &str) {
        let parsed = commands::parse_line(line, &self.config.admin_name);
        let (open, gated) = commands::partition(parsed);
        for command in open {
            self.run_command(username, command);
        }

        let privileged = self.player(username).map_or(false, |p| p.privileges);
        if !privileged {
            if !gated.is_empty() {
                debug!("Ignoring {} privileged command(s) from {}", gated.len(), username);
            }
            return;
        }
        for command in gated {
            self.run_command(username, command);
        }
    }

    fn run_command(&mut self, username: &str, command: ChatCommand) {
        let notice = match command {
            ChatCommand::Players => self
                .players
                .iter()
                .map(|p| p.username.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            ChatCommand::Privilege => {
                let Some(player) = self.player_mut(username) else {
                    return;
                };
                player.privileges = true;
                "Command privileges enabled.".to_string()
            }
            ChatCommand::Party(name) => {
                if self.join_party(username, &name) {
                    format!("Created and joined party {}", name)
                } else {
                    format!("Joined party {}", name)
                }
            }
            ChatCommand::Xp(amount) => {
                let Some(player) = self.player_mut(username) else {
                    return;
                };
                player.experience += amount;
                format!("Added {} xp", amount)
            }
            ChatCommand::Ep(power) => {
                let Some(player) = self.player_mut(username) else {
                    return;
                };
                let engine = &mut player.engine;
                engine.max_power = power;
                engine.power = engine.power.min(engine.max_power).max(engine.min_power);
                player.chassis.top_speed = power * power;
                player.chassis.heat_dispersion = power * engine.heat_efficiency;
                player.wings.max_speed = power * power;
                format!("Changed max engine power to {}", power)
            }
            ChatCommand::Detach => {
                let Some(player) = self.player_mut(username) else {
                    return;
                };
                player.drop_all_crates();
                crates::release_all(&mut self.crates, username);
                "Detached all crates".to_string()
            }
            ChatCommand::ItemTest(manufacturer) => {
                let spawned = crates::item_test_crates(manufacturer, &mut self.next_entity_id);
                self.crates.extend(spawned);
                format!("Created item test crates for manufacturer {}", manufacturer)
            }
        };
        self.notify(username, notice, NoticeKind::Server);
    }

    // --- parties ---

    /// Moves a player into the named party, creating it if needed. Returns
    /// whether the party was created.
    fn join_party(&mut self, username: &str, name: &str) -> bool {
        self.leave_party(username);

        let (idx, created) = match self.parties.iter().position(|p| p.name == name) {
            Some(idx) => (idx, false),
            None => {
                let color = (self.rng.gen(), self.rng.gen(), self.rng.gen());
                self.parties.push(Party::new(name, color));
                (self.parties.len() - 1, true)
            }
        };
        self.parties[idx].add_member(username);
        let tag = self.parties[idx].tag();
        if let Some(player) = self.player_mut(username) {
            player.party = Some(tag);
        }
        created
    }

    fn leave_party(&mut self, username: &str) {
        for party in &mut self.parties {
            party.remove_member(username);
        }
        if let Some(player) = self.player_mut(username) {
            player.party = None;
        }
    }

    pub fn purge_parties(&mut self) -> usize {
        let before = self.parties.len();
        self.parties.retain(|p| !p.is_empty());
        before - self.parties.len()
    }

    // --- ticks ---

    pub fn tick_players(&mut self, now: u64) {
        let dt = self.config.delta_time();
        let time_speed = self.config.time_speed;
        let chat_lifetime = self.config.chat_lifetime_ms;
        let mut deaths = Vec::new();

        for i in 0..self.players.len() {
            let player = &mut self.players[i];
            let events = physics::update_player(player, &self.map, dt, time_speed);

            if let Some(shot) = events.shot {
                let id = crates::take_id(&mut self.next_entity_id);
                self.projectiles.push(shot.into_projectile(id, &player.username));
            }
            if let Some(amount) = events.sold {
                self.outbox.push(Outbound {
                    to: Recipient::Player(player.username.clone()),
                    packet: ServerPacket::notice(
                        format!("Sold all items for ${}", amount),
                        NoticeKind::Pickup,
                    ),
                });
            }

            match combat::hull_fate(player) {
                HullFate::Intact => {}
                HullFate::Revive => {
                    let cost = player.value;
                    player.money -= cost;
                    player.respawn();
                    let name = player.username.clone();
                    crates::release_all(&mut self.crates, &name);
                    self.notify_all(format!("{} has been downed!", name), NoticeKind::Server);
                    self.notify(
                        &name,
                        format!("You have been downed! -${}.", cost),
                        NoticeKind::Urgent,
                    );
                    info!("Player {} revived for ${}", name, cost);
                }
                HullFate::Death => deaths.push(player.username.clone()),
            }

            let player = &mut self.players[i];
            player
                .messages
                .retain(|line| now.saturating_sub(line.sent_at) < chat_lifetime);
        }

        for name in deaths {
            self.notify_all(format!("{} has been killed!", name), NoticeKind::Server);
            self.send(Recipient::Player(name.clone()), ServerPacket::PlayerDestroyed);
            self.remove_player(&name);
            self.departures.push(name.clone());
            info!("Player {} was destroyed", name);
        }
        self.tick += 1;
    }

    pub fn tick_projectiles(&mut self) {
        if self.players.is_empty() || self.projectiles.is_empty() {
            return;
        }
        let dt = self.config.delta_time();
        let recovery = self.map.recovery();
        let players = &mut self.players;

        self.projectiles.retain_mut(|projectile| {
            if combat::advance_projectile(projectile, &recovery, dt) == Flight::Expired {
                return false;
            }
            match combat::find_hit(projectile, players.as_slice()) {
                Some(idx) => {
                    players[idx].chassis.take_damage(projectile.damage);
                    false
                }
                None => true,
            }
        });
    }

    pub fn tick_crates(&mut self) {
        if self.players.is_empty() {
            return;
        }
        crates::refill(
            &mut self.crates,
            &mut self.rng,
            &mut self.next_entity_id,
            &self.map,
            &self.config,
        );
        let pickups = crates::update_crates(
            &mut self.crates,
            &mut self.players,
            &self.map,
            self.config.delta_time(),
        );
        for pickup in pickups {
            self.notify(&pickup.username, pickup.message, NoticeKind::Pickup);
        }
    }

    /// Drops idle players and empty parties.
    pub fn sweep(&mut self, now: u64) {
        let timeout = self.config.inactivity_timeout_ms;
        let idle: Vec<String> = self
            .players
            .iter()
            .filter(|p| now.saturating_sub(p.last_activity) >= timeout)
            .map(|p| p.username.clone())
            .collect();

        for name in idle {
            self.remove_player(&name);
            info!("Removed inactive player {}", name);
            self.departures.push(name);
        }

        let purged = self.purge_parties();
        if purged > 0 {
            debug!("Purged {} empty parties", purged);
        }
    }
}

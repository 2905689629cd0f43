//! Server network layer: TCP sessions, frame I/O and the main loop

use crate::client_manager::{ClientManager, ConnId, Recipient};
use crate::config::SimConfig;
use crate::game::{GameState, LoginRequest, Outbound, PlayerInput, Snapshot};
use crate::scheduler::{Scheduler, TickKind};
use crate::utils::get_timestamp;
use bytes::Bytes;
use log::{debug, error, info, warn};
use shared::protocol::{decode_payload, encode_frame, ClientPacket, FrameDecoder, ServerPacket};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

const READ_CHUNK: usize = 4096;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Connected { stream: TcpStream, addr: SocketAddr },
    PacketReceived { conn: ConnId, packet: ClientPacket },
    Disconnected { conn: ConnId },
}

/// Reads frames until end of stream, forwarding every decoded packet.
/// Oversized or malformed frames are logged and dropped.
pub async fn read_frames<R>(
    mut reader: R,
    conn: ConnId,
    server_tx: &mpsc::UnboundedSender<ServerMessage>,
) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut forwarded = 0;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        decoder.push(&chunk[..n]);

        loop {
            let payload = match decoder.next_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    warn!("Dropping frame from connection {}: {}", conn, e);
                    continue;
                }
            };

            match decode_payload::<ClientPacket>(&payload) {
                Ok(envelope) => {
                    let message = ServerMessage::PacketReceived {
                        conn,
                        packet: envelope.body,
                    };
                    if let Err(e) = server_tx.send(message) {
                        error!("Failed to send packet to main loop: {}", e);
                        return Ok(forwarded);
                    }
                    forwarded += 1;
                }
                Err(e) => warn!("Failed to decode message from connection {}: {}", conn, e),
            }
        }
    }

    if let Err(e) = decoder.finish() {
        warn!("Connection {} closed mid-frame: {}", conn, e);
    }
    Ok(forwarded)
}

/// Writes queued frames until the session's sender is dropped.
pub async fn write_frames<W>(mut writer: W, mut frames: mpsc::UnboundedReceiver<Bytes>) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(frame) = frames.recv().await {
        writer.write_all(&frame).await?;
    }
    writer.shutdown().await
}

/// Main server coordinating networking and game simulation
pub struct Server {
    listener: Arc<TcpListener>,
    clients: ClientManager,
    game: GameState,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(addr: &str, config: SimConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = Arc::new(TcpListener::bind(addr).await?);
        info!("Server listening on {}", listener.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            clients: ClientManager::new(),
            game: GameState::new(config),
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawns task that accepts incoming connections
    fn spawn_acceptor(&self) {
        let listener = Arc::clone(&self.listener);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = server_tx.send(ServerMessage::Connected { stream, addr }) {
                            error!("Failed to hand connection to main loop: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Registers a session and spawns its reader and writer tasks.
    fn accept_connection(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }
        let (reader, writer) = stream.into_split();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let conn = self.clients.add_session(addr, frame_tx);

        let server_tx = self.server_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = read_frames(reader, conn, &server_tx).await {
                debug!("Read error on connection {}: {}", conn, e);
            }
            if let Err(e) = server_tx.send(ServerMessage::Disconnected { conn }) {
                error!("Failed to report disconnect of {}: {}", conn, e);
            }
        });

        tokio::spawn(async move {
            if let Err(e) = write_frames(writer, frame_rx).await {
                debug!("Write error on connection {}: {}", conn, e);
            }
        });
    }

    fn handle_disconnect(&mut self, conn: ConnId) {
        let Some(session) = self.clients.remove_session(conn) else {
            return;
        };
        if let Some(username) = session.username {
            self.game.disconnect(&username);
        }
        self.flush_outbox();
    }

    /// Processes an incoming packet and flushes whatever it produced
    fn handle_packet(&mut self, conn: ConnId, packet: ClientPacket) {
        let now = get_timestamp();

        match packet {
            ClientPacket::Login {
                username,
                r,
                g,
                b,
                selected_gun1,
                selected_gun2,
            } => {
                let already_logged_in = self.clients.username_of(conn).is_some();
                let request = LoginRequest {
                    username,
                    color: (r, g, b),
                    guns: (selected_gun1, selected_gun2),
                };
                if let Ok(username) = self.game.login(conn, already_logged_in, request, now) {
                    self.clients.bind(conn, &username);
                }
            }

            ClientPacket::Update {
                username,
                keys,
                t_x,
                t_y,
                chat_message,
            } => {
                let session = self.clients.username_of(conn).map(str::to_string);
                let input = PlayerInput {
                    username,
                    keys,
                    t_x,
                    t_y,
                    chat_message,
                };
                if let Err(e) = self.game.update(session.as_deref(), input, now) {
                    warn!("Ignoring update from connection {}: {}", conn, e);
                }
            }

            ClientPacket::EquipItem { item_index } => match self.clients.username_of(conn) {
                Some(username) => {
                    let username = username.to_string();
                    if let Err(e) = self.game.equip_item(&username, item_index) {
                        debug!("Equip failed for {}: {}", username, e);
                    }
                }
                None => warn!("Equip request from connection {} before login", conn),
            },

            ClientPacket::GetPlayers => self.reply_snapshot(conn, Snapshot::Players),
            ClientPacket::GetParties => self.reply_snapshot(conn, Snapshot::Parties),
            ClientPacket::GetMap => self.reply_snapshot(conn, Snapshot::Map),
            ClientPacket::GetProjectiles => self.reply_snapshot(conn, Snapshot::Projectiles),
            ClientPacket::GetCrates => self.reply_snapshot(conn, Snapshot::Crates),

            ClientPacket::Ping { client_time } => {
                self.game
                    .send(Recipient::Connection(conn), ServerPacket::Pong { client_time });
            }
        }

        self.flush_outbox();
    }

    fn reply_snapshot(&mut self, conn: ConnId, kind: Snapshot) {
        let packet = self.game.snapshot(kind);
        self.game.send(Recipient::Connection(conn), packet);
    }

    fn handle_tick(&mut self, kind: TickKind) {
        let now = get_timestamp();
        match kind {
            TickKind::Players => {
                self.game.tick_players(now);
                if self.game.tick % 6000 == 0 && !self.game.players.is_empty() {
                    debug!(
                        "Tick {}: {} sessions, {} players, {} projectiles, {} crates",
                        self.game.tick,
                        self.clients.len(),
                        self.game.players.len(),
                        self.game.projectiles.len(),
                        self.game.crates.len()
                    );
                }
            }
            TickKind::Projectiles => self.game.tick_projectiles(),
            TickKind::Crates => self.game.tick_crates(),
            TickKind::Sweep => self.game.sweep(now),
        }
        self.flush_outbox();
    }

    /// Encodes each queued message once and writes it to its recipients,
    /// then unbinds sessions whose players left the game.
    fn flush_outbox(&mut self) {
        let time_sent = get_timestamp();
        for Outbound { to, packet } in self.game.take_outbox() {
            let frame = match encode_frame(&packet, time_sent) {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode {:?} message: {}", to, e);
                    continue;
                }
            };
            let targets = self.clients.resolve(&to);
            self.clients.deliver(&targets, &frame);
        }

        for username in self.game.take_departures() {
            self.clients.unbind(&username);
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        let mut scheduler = Scheduler::new(&self.game.config);

        info!("Server started successfully");

        loop {
            tokio::select! {
                // Handle network events
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Connected { stream, addr }) => {
                            self.accept_connection(stream, addr);
                        },
                        Some(ServerMessage::PacketReceived { conn, packet }) => {
                            self.handle_packet(conn, packet);
                        },
                        Some(ServerMessage::Disconnected { conn }) => {
                            self.handle_disconnect(conn);
                        },
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                // Handle simulation ticks
                kind = scheduler.next() => {
                    self.handle_tick(kind);
                },
            }
        }

        Ok(())
    }
}

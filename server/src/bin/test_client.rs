use clap::Parser;
use log::{info, warn};
use server::utils::get_timestamp;
use shared::protocol::{
    decode_payload, encode_frame, ClientPacket, FrameDecoder, ServerPacket, WireMessage,
};
use shared::Keys;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time::{interval, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted client that logs in and flies in circles", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Username to log in with
    #[arg(short, long, default_value = "testbot")]
    username: String,

    /// Seconds to fly before disconnecting
    #[arg(short, long, default_value = "10")]
    duration: u64,
}

/// Logs every message the server sends until the connection closes.
async fn print_incoming(mut reader: OwnedReadHalf) {
    let mut decoder = FrameDecoder::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!("Read error: {}", e);
                break;
            }
        };
        decoder.push(&chunk[..n]);

        loop {
            let payload = match decoder.next_frame() {
                Ok(Some(payload)) => payload,
                Ok(None) => break,
                Err(e) => {
                    warn!("Bad frame: {}", e);
                    continue;
                }
            };
            match decode_payload::<ServerPacket>(&payload) {
                Ok(envelope) => match envelope.body {
                    ServerPacket::NoticeMessage {
                        message,
                        message_type,
                    } => info!("[{:?}] {}", message_type, message),
                    ServerPacket::Pong { client_time } => {
                        info!("Round trip {} ms", get_timestamp().saturating_sub(client_time))
                    }
                    ServerPacket::PlayerData { players } => {
                        for p in players {
                            info!(
                                "  {} at ({:.0}, {:.0}) hull {:.0}/{:.0} ${}",
                                p.username, p.x, p.y, p.chassis.hull, p.chassis.max_hull, p.money
                            );
                        }
                    }
                    other => info!("Received {}", other.message_type()),
                },
                Err(e) => warn!("Failed to decode message: {}", e),
            }
        }
    }
    info!("Server closed the connection");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let stream = TcpStream::connect(&args.server).await?;
    info!("Connected to {}", args.server);
    let (reader, mut writer) = stream.into_split();
    let reader_task = tokio::spawn(print_incoming(reader));

    let login = ClientPacket::Login {
        username: args.username.clone(),
        r: 200,
        g: 80,
        b: 40,
        selected_gun1: 0,
        selected_gun2: 1,
    };
    writer.write_all(&encode_frame(&login, get_timestamp())?).await?;

    let start = Instant::now();
    let mut ticker = interval(Duration::from_millis(100));
    let mut step: u64 = 0;

    while start.elapsed() < Duration::from_secs(args.duration) {
        ticker.tick().await;
        step += 1;

        let heading = step as f64 * 0.05;
        let update = ClientPacket::Update {
            username: args.username.clone(),
            keys: Some(Keys {
                w: step % 50 < 25,
                mouse: true,
                ..Keys::default()
            }),
            t_x: heading.cos() * 1000.0,
            t_y: heading.sin() * 1000.0,
            chat_message: (step == 1).then(|| "/players".to_string()),
        };
        writer.write_all(&encode_frame(&update, get_timestamp())?).await?;

        if step % 20 == 0 {
            writer.write_all(&encode_frame(&ClientPacket::GetPlayers, get_timestamp())?).await?;
            let ping = ClientPacket::Ping {
                client_time: get_timestamp(),
            };
            writer.write_all(&encode_frame(&ping, get_timestamp())?).await?;
        }
    }

    info!("Test client finished");
    writer.shutdown().await?;
    drop(writer);
    reader_task.abort();
    Ok(())
}

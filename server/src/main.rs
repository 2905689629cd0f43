use clap::Parser;
use log::info;
use server::config::SimConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value = "10")]
    tick_ms: u64,

    /// Simulated time multiplier
    #[arg(long, default_value = "1.0")]
    time_speed: f64,

    /// Chat keyword that grants command privileges
    #[arg(long, default_value = "Shluck")]
    admin_name: String,

    /// Seed for crate placement and party colors
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = SimConfig {
        tick: Duration::from_millis(args.tick_ms.max(1)),
        time_speed: args.time_speed,
        admin_name: args.admin_name,
        seed: args.seed,
        ..SimConfig::default()
    };

    info!("Starting server...");
    info!(
        "Tick every {:?} at {}x time speed",
        config.tick, config.time_speed
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

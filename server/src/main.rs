use clap::Parser;
use log::info;
use server::network::Server;
use server::{GameRules, ServerConfig};
use shared::Catalog;
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Seconds between two resolved turns
    #[clap(short, long, default_value = "30")]
    turn_seconds: u64,
    /// Maximum number of connected clients
    #[clap(long, default_value = "64")]
    max_clients: usize,
    /// Most players seated in one game
    #[clap(long, default_value = "8")]
    max_players: usize,
    /// Players needed before a game can start
    #[clap(long, default_value = "2")]
    min_players: usize,
    /// JSON catalog of races, units and buildings (built-in catalog if omitted)
    #[clap(short, long)]
    catalog: Option<PathBuf>,
}

/// Parses arguments, loads the catalog and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let catalog = match &args.catalog {
        Some(path) => {
            info!("Loading catalog from {}", path.display());
            Catalog::load(path)?
        }
        None => Catalog::standard(),
    };

    let config = ServerConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        turn_duration: Duration::from_secs(args.turn_seconds.max(1)),
        max_clients: args.max_clients,
        rules: GameRules {
            max_players: args.max_players,
            min_players: args.min_players,
            ..GameRules::default()
        },
    };

    let server = Server::new(config, catalog).await?;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

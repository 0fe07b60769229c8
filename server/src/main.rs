use clap::Parser;
use log::{error, info};
use server::config::{
    ServerConfig, DEFAULT_ACTION_LOG, DEFAULT_CLIENT_TIMEOUT, DEFAULT_MAX_CLIENTS,
};
use server::action_log::DEFAULT_APPEND_TIMEOUT;
use server::network::Server;
use server::session::SessionConfig;
use shared::{LOCKED_PUSH_LEVEL, PLAYER_ONE, PLAYER_TWO, PUSH_COOLDOWN_MS};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "3001")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value_t = DEFAULT_CLIENT_TIMEOUT.as_secs())]
    client_timeout_secs: u64,

    /// Minimum milliseconds between two accepted pushes
    #[arg(long, default_value_t = PUSH_COOLDOWN_MS)]
    push_cooldown_ms: u64,

    /// Level that allows only one push
    #[arg(long, default_value_t = LOCKED_PUSH_LEVEL)]
    locked_level: u32,

    /// Disable the single-push level
    #[arg(long)]
    no_locked_level: bool,

    /// Id of the player holding the first turn
    #[arg(long, default_value = PLAYER_ONE)]
    player_a: String,

    /// Id of the second player
    #[arg(long, default_value = PLAYER_TWO)]
    player_b: String,

    /// CSV file receiving the action log
    #[arg(long, default_value = DEFAULT_ACTION_LOG)]
    action_log: PathBuf,

    /// Do not write an action log
    #[arg(long)]
    no_action_log: bool,

    /// Milliseconds before a stalled action log append is abandoned
    #[arg(long, default_value_t = DEFAULT_APPEND_TIMEOUT.as_millis() as u64)]
    log_timeout_ms: u64,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: format!("{}:{}", self.host, self.port),
            max_clients: self.max_clients,
            client_timeout: Duration::from_secs(self.client_timeout_secs),
            action_log: (!self.no_action_log).then_some(self.action_log),
            log_append_timeout: Duration::from_millis(self.log_timeout_ms),
            session: SessionConfig {
                push_cooldown_ms: self.push_cooldown_ms,
                locked_level: (!self.no_locked_level).then_some(self.locked_level),
                players: (self.player_a, self.player_b),
                ..SessionConfig::default()
            },
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = Args::parse().into_config();
    info!(
        "Players {} and {}, push cooldown {}ms, locked level {:?}",
        config.session.players.0,
        config.session.players.1,
        config.session.push_cooldown_ms,
        config.session.locked_level
    );

    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}

//! TETRS ARENA - one well, many players
//!
//! Server-authoritative multiplayer Tetris over WebSockets.

mod board;
mod error;
mod game;
mod piece;
mod player;
mod protocol;
mod replica;
mod score;
mod server;
mod settings;
mod spectator;
mod tetromino;

use clap::{Parser, Subcommand};
use settings::Settings;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tetrs-arena", version, about = "Shared-board multiplayer Tetris server")]
struct Cli {
    /// Settings file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the game server (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Join a running server and report the final standings
    Watch {
        #[arg(default_value = "ws://127.0.0.1:3000")]
        url: String,
    },
    /// Write the default settings file
    InitConfig,
}

/// Get the arena temp directory, creating it if needed
fn arena_temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("tetrs-arena");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let session_id: u32 = rand::random();
    let log_dir = arena_temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    // File gets everything, stderr mirrors it for whoever runs the server
    let file_appender = tracing_appender::rolling::never(&log_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("tetrs_arena=debug".parse()?))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        "TETRS ARENA starting up, session={:08x}, log={}",
        session_id,
        log_dir.join(&log_file).display()
    );

    let mut settings = Settings::load(cli.config.as_deref());

    match cli.command.unwrap_or(Command::Serve { host: None, port: None }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }
            server::run(settings).await
        }
        Command::Watch { url } => {
            match spectator::watch(&url, settings.game.points_per_line).await? {
                Some(outcome) => {
                    println!("{}", outcome.summary());
                    for (rank, (id, score)) in outcome.standings.iter().enumerate() {
                        println!("{:>3}. player {:<4} {:>6}", rank + 1, id, score);
                    }
                }
                None => println!("Disconnected before the game ended"),
            }
            Ok(())
        }
        Command::InitConfig => {
            let path = settings.save(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

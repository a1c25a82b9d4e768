mod commands;
mod config;
mod storage;

use clap::{Parser, Subcommand};
use commands::{PlayerCommands, Session};
use config::CliConfig;
use rps_engine::RpsError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Commit-Reveal Rock-Paper-Scissors with escrowed stakes")]
#[command(version)]
struct Cli {
    /// Data directory for game storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Local player management
    #[command(subcommand)]
    Player(PlayerCommands),
    /// Create a new game
    Create {
        /// Player creating the game
        player: String,
        /// Game name, hashed into the game ID
        name: String,
        /// Bet amount in satoshis
        amount: u64,
        /// Round limit recorded with the game
        #[arg(long, default_value_t = 3)]
        end_round: u32,
        /// Create without players; the game must be started first
        #[arg(long)]
        no_join: bool,
    },
    /// Open a game created with --no-join
    Start {
        /// Manager owner or game creator
        player: String,
        /// Game name or ID
        game: String,
    },
    /// Join an existing game
    Join {
        /// Player name
        player: String,
        /// Game name or ID
        game: String,
    },
    /// Commit a move and lock the stake
    Commit {
        /// Player name
        player: String,
        /// Game name or ID
        game: String,
        /// rock, paper or scissors (or 1-3)
        #[arg(value_name = "MOVE")]
        mv: String,
    },
    /// Reveal a committed move
    Reveal {
        /// Player name
        player: String,
        /// Game name or ID
        game: String,
        /// Move to reveal, defaults to the stored commitment
        #[arg(long = "move")]
        mv: Option<String>,
        /// Secret (hex encoded)
        #[arg(long)]
        secret: Option<String>,
    },
    /// Settle a game once both moves are revealed
    Settle {
        /// A player of the game or the manager owner
        player: String,
        /// Game name or ID
        game: String,
    },
    /// Withdraw the full credited balance
    Withdraw {
        /// Player name
        player: String,
    },
    /// Show credited balance
    Balance {
        /// Player name
        player: String,
    },
    /// Show game status
    Status {
        /// Game name or ID
        game: String,
    },
    /// List games
    List,
    /// Show the event log
    Events {
        /// Only events of this game
        game: Option<String>,
    },
    /// Hand manager ownership to another player
    TransferOwner {
        /// Current owner
        player: String,
        /// New owner
        new_owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| CliConfig::default().data_dir);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = match CliConfig::load(&data_dir).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_level = if cli.verbose || config.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rps={},rps_engine={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match Session::open(&config).await {
        Ok(session) => run(cli.command, &session).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        match e.downcast_ref::<RpsError>() {
            Some(rps) => eprintln!("Error [{:?}]: {}", rps.kind(), rps),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, session: &Session) -> anyhow::Result<()> {
    match command {
        Commands::Player(cmd) => commands::handle_player_command(cmd, session).await,
        Commands::Create {
            player,
            name,
            amount,
            end_round,
            no_join,
        } => commands::create_game(session, &player, &name, amount, end_round, no_join).await,
        Commands::Start { player, game } => commands::start_game(session, &player, &game).await,
        Commands::Join { player, game } => commands::join_game(session, &player, &game).await,
        Commands::Commit { player, game, mv } => {
            commands::commit_move(session, &player, &game, &mv).await
        }
        Commands::Reveal {
            player,
            game,
            mv,
            secret,
        } => commands::reveal_move(session, &player, &game, mv, secret).await,
        Commands::Settle { player, game } => commands::settle_game(session, &player, &game).await,
        Commands::Withdraw { player } => commands::withdraw(session, &player).await,
        Commands::Balance { player } => commands::show_balance(session, &player).await,
        Commands::Status { game } => commands::show_game_status(session, &game).await,
        Commands::List => commands::list_games(session).await,
        Commands::Events { game } => commands::show_events(session, game.as_deref()).await,
        Commands::TransferOwner { player, new_owner } => {
            commands::transfer_owner(session, &player, &new_owner).await
        }
    }
}

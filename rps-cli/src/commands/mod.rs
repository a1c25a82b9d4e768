use crate::config::CliConfig;
use crate::storage::{ManagerUpdate, Storage};
use anyhow::{anyhow, bail, Result};
use clap::Subcommand;
use comfy_table::{presets::UTF8_FULL, Table};
use rps_engine::{
    generate_secret, Amount, BetHash, CallContext, Event, EventKind, GameId, GameInfo,
    GameManager, Identity, Move, Secret,
};

#[derive(Subcommand)]
pub enum PlayerCommands {
    /// Register a local player name
    Add {
        /// Player name
        name: String,
    },
    /// List local players
    List,
}

/// Handle on the shared database.
///
/// Reads load the latest stored manager; every mutation goes through
/// [`Session::update`] so it runs against fresh state in one transaction.
pub struct Session {
    storage: Storage,
}

impl Session {
    pub async fn open(config: &CliConfig) -> Result<Self> {
        let storage = Storage::new(&config.db_path()).await?;
        let manager = storage
            .load_or_init_manager(&config.operator_name, &config.manager)
            .await?;

        if manager.config() != config.manager {
            tracing::warn!(
                "Manager settings in {} differ from the stored ones and are ignored",
                CliConfig::FILE_NAME
            );
        }

        Ok(Self { storage })
    }

    async fn manager(&self) -> Result<GameManager> {
        let snapshot = self
            .storage
            .load_manager()
            .await?
            .ok_or_else(|| anyhow!("Game manager is not initialized"))?;
        Ok(GameManager::from_snapshot(snapshot)?)
    }

    async fn update<T, F>(&self, op: F) -> Result<(GameManager, T)>
    where
        F: FnOnce(&ManagerUpdate<'_>) -> Result<T>,
    {
        self.storage.update_manager(op).await
    }

    async fn caller(&self, name: &str) -> Result<Identity> {
        self.storage
            .player(name)
            .await?
            .ok_or_else(|| anyhow!("Player '{}' not found. Use 'rps player add {}'", name, name))
    }

    async fn name_of(&self, identity: Identity) -> Result<String> {
        let players = self.storage.players().await?;
        Ok(players
            .into_iter()
            .find(|(_, id)| *id == identity)
            .map(|(name, _)| name)
            .unwrap_or_else(|| short(&identity.to_string()).to_string()))
    }
}

fn looks_like_id(game: &str) -> bool {
    game.len() == 64 && game.chars().all(|c| c.is_ascii_hexdigit())
}

/// Accept either a game name or its 64-char hex id.
fn parse_game(game: &str) -> Result<GameId> {
    if looks_like_id(game) {
        return Ok(game.parse()?);
    }
    Ok(GameId::from_name(game)?)
}

fn short(s: &str) -> &str {
    &s[..s.len().min(8)]
}

pub async fn handle_player_command(cmd: PlayerCommands, session: &Session) -> Result<()> {
    match cmd {
        PlayerCommands::Add { name } => {
            let identity = Identity::new();
            session.storage.add_player(&name, identity).await?;
            println!("Player '{}' registered", name);
            println!("Identity: {}", identity);
        }
        PlayerCommands::List => {
            let players = session.storage.players().await?;
            if players.is_empty() {
                println!("No players registered.");
                return Ok(());
            }

            let manager = session.manager().await?;
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Name", "Identity", "Balance", "Owner"]);
            let owner = manager.owner();
            for (name, identity) in players {
                table.add_row(vec![
                    name,
                    identity.to_string(),
                    format!("{} sats", manager.balance_of(identity).to_sat()),
                    (identity == owner).to_string(),
                ]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

pub async fn create_game(
    session: &Session,
    player: &str,
    name: &str,
    amount: u64,
    end_round: u32,
    no_join: bool,
) -> Result<()> {
    // Such a name could never be addressed again by later commands
    if looks_like_id(name) {
        bail!("Game name must not be a 64-character hex string");
    }
    let ctx = CallContext::new(session.caller(player).await?);
    let (_, game_id) = session
        .update(|update| {
            Ok(update.manager().create_game(
                &ctx,
                name,
                Amount::from_sat(amount),
                end_round,
                !no_join,
            )?)
        })
        .await?;

    println!("Created game '{}'", name);
    println!("Game ID: {}", game_id);
    println!("Bet Amount: {} sats", amount);
    println!();
    if no_join {
        println!("Start it before players can join:");
        println!("rps start {} \"{}\"", player, name);
    } else {
        println!("Share this command with another player:");
        println!("rps join <their-name> \"{}\"", name);
    }
    Ok(())
}

pub async fn start_game(session: &Session, player: &str, game: &str) -> Result<()> {
    let ctx = CallContext::new(session.caller(player).await?);
    let game_id = parse_game(game)?;
    session
        .update(|update| Ok(update.manager().start_game(&ctx, game_id)?))
        .await?;

    println!("Game {} started, waiting for players", short(&game_id.to_hex()));
    Ok(())
}

pub async fn join_game(session: &Session, player: &str, game: &str) -> Result<()> {
    let ctx = CallContext::new(session.caller(player).await?);
    let game_id = parse_game(game)?;
    let (manager, _) = session
        .update(|update| Ok(update.manager().add_player(&ctx, game_id)?))
        .await?;

    let info = manager.game(game_id)?;
    println!("Joined game {}!", short(&game_id.to_hex()));
    if info.players.len() == 2 {
        println!("Game is now ready for betting!");
        println!("Both players commit a move:");
        println!("rps commit <name> \"{}\" <rock|paper|scissors>", game);
    } else {
        println!("Waiting for one more player...");
    }
    Ok(())
}

pub async fn commit_move(session: &Session, player: &str, game: &str, mv: &str) -> Result<()> {
    let caller = session.caller(player).await?;
    let game_id = parse_game(game)?;
    let mv: Move = mv.parse()?;

    let secret = generate_secret();
    let hash = BetHash::compute(mv, &secret);
    let (manager, _) = session
        .update(|update| {
            let manager = update.manager();
            let ctx = if manager.config().direct_deposit {
                CallContext::new(caller).with_value(manager.game(game_id)?.bet_amount)
            } else {
                CallContext::new(caller)
            };
            manager.place_bet(&ctx, game_id, hash)?;
            update.save_secret(game_id, caller, mv, &secret)
        })
        .await?;

    println!("Commitment submitted for game {}!", short(&game_id.to_hex()));
    println!("Commitment: {}", hash);
    println!("Secret (kept locally for reveal): {}", secret.to_hex());
    println!();

    let info = manager.game(game_id)?;
    if info.committed == 2 {
        println!("Both players have committed! Now reveal:");
        println!("rps reveal <name> \"{}\"", game);
    } else {
        println!("Waiting for other player to commit...");
    }
    Ok(())
}

pub async fn reveal_move(
    session: &Session,
    player: &str,
    game: &str,
    mv: Option<String>,
    secret: Option<String>,
) -> Result<()> {
    let caller = session.caller(player).await?;
    let game_id = parse_game(game)?;

    let (mv, secret): (Move, Secret) = match (mv, secret) {
        (Some(mv), Some(secret)) => (mv.parse()?, secret.parse()?),
        (Some(mv), None) => {
            let secret: String = dialoguer::Password::new()
                .with_prompt("Secret (hex)")
                .interact()?;
            (mv.parse()?, secret.parse()?)
        }
        (None, _) => session
            .storage
            .secret(game_id, caller)
            .await?
            .ok_or_else(|| anyhow!("No stored commitment for '{}', pass --move and --secret", player))?,
    };

    let ctx = CallContext::new(caller);
    let (manager, _) = session
        .update(|update| Ok(update.manager().reveal_bet(&ctx, game_id, mv.code(), &secret)?))
        .await?;

    println!("Revealed {} for game {}!", mv, short(&game_id.to_hex()));
    let info = manager.game(game_id)?;
    if let Some(outcome) = info.outcome {
        println!("Both moves are in: {}", outcome);
        println!("Settle the game:");
        println!("rps settle <name> \"{}\"", game);
    } else {
        println!("Waiting for other player to reveal...");
    }
    Ok(())
}

pub async fn settle_game(session: &Session, player: &str, game: &str) -> Result<()> {
    let ctx = CallContext::new(session.caller(player).await?);
    let game_id = parse_game(game)?;
    let (_, settlement) = session
        .update(|update| Ok(update.manager().reveal_winner(&ctx, game_id)?))
        .await?;

    println!("------ GAME COMPLETED! ------");
    println!("Result: {}", settlement.outcome);
    if let Some(winner) = settlement.winner() {
        println!("Winner: {}", session.name_of(winner).await?);
    }
    for (identity, amount) in &settlement.credits {
        println!(
            "Credited {} sats to {}",
            amount.to_sat(),
            session.name_of(*identity).await?
        );
    }
    Ok(())
}

pub async fn withdraw(session: &Session, player: &str) -> Result<()> {
    let ctx = CallContext::new(session.caller(player).await?);
    let (_, amount) = session
        .update(|update| Ok(update.manager().withdraw(&ctx)?))
        .await?;

    println!("Withdrew {} sats", amount.to_sat());
    Ok(())
}

pub async fn show_balance(session: &Session, player: &str) -> Result<()> {
    let identity = session.caller(player).await?;
    let balance = session.manager().await?.balance_of(identity);
    println!("Balance for '{}': {} sats", player, balance.to_sat());
    Ok(())
}

pub async fn transfer_owner(session: &Session, player: &str, new_owner: &str) -> Result<()> {
    let ctx = CallContext::new(session.caller(player).await?);
    let new_owner_id = session.caller(new_owner).await?;
    session
        .update(|update| Ok(update.manager().change_owner(&ctx, new_owner_id)?))
        .await?;

    println!("Manager ownership transferred to '{}'", new_owner);
    Ok(())
}

pub async fn show_game_status(session: &Session, game: &str) -> Result<()> {
    let game_id = parse_game(game)?;
    let manager = session.manager().await?;
    let info = manager.game(game_id)?;

    println!("Game Status: {}", game_id);
    println!("═══════════════════════════════════");
    println!("Phase: {}", info.phase);
    println!("Bet Amount: {} sats", info.bet_amount.to_sat());
    println!("End Round: {}", info.end_round);
    println!("Players: {}/2", info.players.len());
    if let Some(outcome) = info.outcome {
        println!("Result: {}", outcome);
    }
    println!();

    if info.players.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Player", "Committed", "Revealed Move"]);
    for (index, identity) in info.players.iter().enumerate() {
        let committed = manager.commitment_of(game_id, *identity)?;
        let revealed = manager.revealed_move_of(game_id, *identity)?;
        table.add_row(vec![
            (index + 1).to_string(),
            session.name_of(*identity).await?,
            committed
                .map(|h| short(&h.to_hex()).to_string())
                .unwrap_or_else(|| "-".to_string()),
            revealed
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub async fn list_games(session: &Session) -> Result<()> {
    let manager = session.manager().await?;
    let games = manager.games();
    if games.is_empty() {
        println!("No games.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Game ID", "Phase", "Players", "Bet Amount", "Result"]);
    for GameInfo {
        id,
        phase,
        players,
        bet_amount,
        outcome,
        ..
    } in games
    {
        table.add_row(vec![
            short(&id.to_hex()).to_string(),
            phase.to_string(),
            format!("{}/2", players.len()),
            format!("{} sats", bet_amount.to_sat()),
            outcome.map(|o| o.to_string()).unwrap_or_default(),
        ]);
    }

    println!("Games:");
    println!("{}", table);
    println!(
        "Held in custody: {} sats",
        manager.total_held().to_sat()
    );
    Ok(())
}

pub async fn show_events(session: &Session, game: Option<&str>) -> Result<()> {
    let manager = session.manager().await?;
    let events = match game {
        Some(game) => manager.events_for(parse_game(game)?)?,
        None => manager.events(),
    };
    if events.is_empty() {
        println!("No events.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Time", "Game", "Event", "Details"]);
    for event in &events {
        table.add_row(vec![
            event.at.format("%Y-%m-%d %H:%M:%S").to_string(),
            event
                .game_id
                .map(|id| short(&id.to_hex()).to_string())
                .unwrap_or_else(|| "-".to_string()),
            event.name().to_string(),
            describe(session, event).await?,
        ]);
    }
    println!("{}", table);
    Ok(())
}

async fn describe(session: &Session, event: &Event) -> Result<String> {
    let text = match &event.kind {
        EventKind::NewGame {
            bet_amount,
            end_round,
            ..
        } => format!("bet {} sats, end round {}", bet_amount.to_sat(), end_round),
        EventKind::PlayerAdded { player } => session.name_of(*player).await?,
        EventKind::BetPlaced { player, hash } => {
            format!("{} committed {}", session.name_of(*player).await?, short(&hash.to_hex()))
        }
        EventKind::BetRevealed { player, mv } => {
            format!("{} revealed {}", session.name_of(*player).await?, mv)
        }
        EventKind::WinnerRevealed { outcome, .. } => outcome.to_string(),
        EventKind::PhaseChanged { from, to } => format!("{} -> {}", from, to),
        EventKind::BalanceCredited { player, amount } => format!(
            "{} +{} sats",
            session.name_of(*player).await?,
            amount.to_sat()
        ),
        EventKind::Withdrawal { player, amount } => format!(
            "{} -{} sats",
            session.name_of(*player).await?,
            amount.to_sat()
        ),
        EventKind::OwnerChanged { owner, .. } => {
            format!("new owner {}", session.name_of(*owner).await?)
        }
    };
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn session_in(dir: &std::path::Path) -> Session {
        let config = CliConfig::load(dir).await.unwrap();
        Session::open(&config).await.unwrap()
    }

    async fn joined_game(dir: &std::path::Path) -> Session {
        let session = session_in(dir).await;
        for name in ["alice", "bob"] {
            handle_player_command(PlayerCommands::Add { name: name.into() }, &session)
                .await
                .unwrap();
        }
        create_game(&session, "alice", "friday", 100, 3, false).await.unwrap();
        join_game(&session, "bob", "friday").await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_open_registers_operator() {
        let temp_dir = tempdir().unwrap();
        let session = session_in(temp_dir.path()).await;

        let operator = session.caller("operator").await.unwrap();
        assert_eq!(session.manager().await.unwrap().owner(), operator);

        // Reopening keeps the same owner
        drop(session);
        let session = session_in(temp_dir.path()).await;
        assert_eq!(session.manager().await.unwrap().owner(), operator);
    }

    #[tokio::test]
    async fn test_stored_manager_settings_win_over_file() {
        let temp_dir = tempdir().unwrap();
        drop(session_in(temp_dir.path()).await);

        tokio::fs::write(
            temp_dir.path().join(CliConfig::FILE_NAME),
            r#"{ "manager": { "direct_deposit": true, "min_bet": 500, "max_end_round": 3 } }"#,
        )
        .await
        .unwrap();
        let session = session_in(temp_dir.path()).await;

        let config = session.manager().await.unwrap().config();
        assert_eq!(config.min_bet, Amount::from_sat(1));
        assert_eq!(config.max_end_round, 100);
    }

    #[test]
    fn test_parse_game_accepts_name_or_id() {
        let by_name = parse_game("friday").unwrap();
        let by_id = parse_game(&by_name.to_hex()).unwrap();
        assert_eq!(by_name, by_id);
        assert!(parse_game("").is_err());
    }

    #[tokio::test]
    async fn test_hex_looking_name_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let session = session_in(temp_dir.path()).await;
        let name = "ab".repeat(32);

        assert!(create_game(&session, "operator", &name, 10, 3, false).await.is_err());
        assert!(session.manager().await.unwrap().games().is_empty());

        let shorter = "ab".repeat(31);
        create_game(&session, "operator", &shorter, 10, 3, false)
            .await
            .unwrap();
        show_game_status(&session, &shorter).await.unwrap();
    }

    #[tokio::test]
    async fn test_full_game_flow() {
        let temp_dir = tempdir().unwrap();
        let session = joined_game(temp_dir.path()).await;

        commit_move(&session, "alice", "friday", "rock").await.unwrap();
        commit_move(&session, "bob", "friday", "scissors").await.unwrap();
        reveal_move(&session, "alice", "friday", None, None).await.unwrap();
        reveal_move(&session, "bob", "friday", None, None).await.unwrap();
        settle_game(&session, "bob", "friday").await.unwrap();

        let alice = session.caller("alice").await.unwrap();
        let bob = session.caller("bob").await.unwrap();
        let manager = session.manager().await.unwrap();
        assert_eq!(manager.balance_of(alice), Amount::from_sat(200));
        assert_eq!(manager.balance_of(bob), Amount::ZERO);

        withdraw(&session, "alice").await.unwrap();
        assert!(withdraw(&session, "alice").await.is_err());
        assert!(session.manager().await.unwrap().custody_is_balanced());

        // State survives a restart
        drop(session);
        let session = session_in(temp_dir.path()).await;
        let manager = session.manager().await.unwrap();
        let info = manager.game(parse_game("friday").unwrap()).unwrap();
        assert_eq!(info.phase, rps_engine::Phase::Done);
        assert_eq!(manager.total_held(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_concurrent_sessions_keep_each_commit() {
        let temp_dir = tempdir().unwrap();
        drop(joined_game(temp_dir.path()).await);

        // Both opened before either commit, like two `rps` processes
        let first = session_in(temp_dir.path()).await;
        let second = session_in(temp_dir.path()).await;
        commit_move(&first, "alice", "friday", "rock").await.unwrap();
        commit_move(&second, "bob", "friday", "paper").await.unwrap();

        let manager = session_in(temp_dir.path()).await.manager().await.unwrap();
        let info = manager.game(parse_game("friday").unwrap()).unwrap();
        assert_eq!(info.committed, 2);
        assert_eq!(info.phase, rps_engine::Phase::BettingEnd);
        assert_eq!(manager.total_held(), Amount::from_sat(200));
    }

    #[tokio::test]
    async fn test_withdraw_is_not_undone_by_another_session() {
        let temp_dir = tempdir().unwrap();
        let session = joined_game(temp_dir.path()).await;
        commit_move(&session, "alice", "friday", "paper").await.unwrap();
        commit_move(&session, "bob", "friday", "rock").await.unwrap();
        reveal_move(&session, "alice", "friday", None, None).await.unwrap();
        reveal_move(&session, "bob", "friday", None, None).await.unwrap();
        settle_game(&session, "alice", "friday").await.unwrap();
        create_game(&session, "bob", "saturday", 10, 3, false).await.unwrap();

        let other = session_in(temp_dir.path()).await;
        withdraw(&session, "alice").await.unwrap();
        join_game(&other, "alice", "saturday").await.unwrap();

        let alice = session.caller("alice").await.unwrap();
        let manager = session.manager().await.unwrap();
        assert_eq!(manager.balance_of(alice), Amount::ZERO);
        assert_eq!(manager.total_held(), Amount::ZERO);
        assert!(manager.custody_is_balanced());
        assert!(withdraw(&other, "alice").await.is_err());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_stored_secret() {
        let temp_dir = tempdir().unwrap();
        let session = joined_game(temp_dir.path()).await;
        commit_move(&session, "alice", "friday", "rock").await.unwrap();

        let alice = session.caller("alice").await.unwrap();
        let game_id = parse_game("friday").unwrap();
        let (_, stored) = session.storage.secret(game_id, alice).await.unwrap().unwrap();

        assert!(commit_move(&session, "alice", "friday", "paper").await.is_err());
        let (mv, secret) = session.storage.secret(game_id, alice).await.unwrap().unwrap();
        assert_eq!(mv, Move::Rock);
        assert_eq!(secret, stored);
    }

    #[tokio::test]
    async fn test_unknown_player_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let session = session_in(temp_dir.path()).await;

        assert!(create_game(&session, "mallory", "g", 10, 3, false).await.is_err());
        assert!(session.manager().await.unwrap().games().is_empty());
    }
}

use anyhow::{Context, Result};
use rps_engine::{GameId, GameManager, Identity, ManagerConfig, ManagerSnapshot, Move, Secret};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Mutex;

/// How long a write waits for another `rps` process holding the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
                name TEXT PRIMARY KEY,
                identity TEXT UNIQUE NOT NULL
            )",
            [],
        )?;

        // Secrets never leave this machine until the player reveals
        conn.execute(
            "CREATE TABLE IF NOT EXISTS secrets (
                game_id TEXT NOT NULL,
                identity TEXT NOT NULL,
                move_code INTEGER NOT NULL,
                secret TEXT NOT NULL,
                PRIMARY KEY (game_id, identity)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS state (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                snapshot TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn add_player(&self, name: &str, identity: Identity) -> Result<()> {
        let conn = self.conn.lock().await;
        insert_player(&conn, name, identity)
    }

    pub async fn player(&self, name: &str) -> Result<Option<Identity>> {
        let conn = self.conn.lock().await;
        find_player(&conn, name)
    }

    pub async fn players(&self) -> Result<Vec<(String, Identity)>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT name, identity FROM players ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut players: Vec<(String, Identity)> = Vec::new();
        for row in rows {
            let (name, identity) = row?;
            players.push((name, identity.parse::<Identity>()?));
        }
        Ok(players)
    }

    pub async fn secret(&self, game_id: GameId, identity: Identity) -> Result<Option<(Move, Secret)>> {
        let conn = self.conn.lock().await;
        let row: Option<(u8, String)> = conn
            .query_row(
                "SELECT move_code, secret FROM secrets WHERE game_id = ?1 AND identity = ?2",
                params![game_id.to_hex(), identity.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((code, secret)) => Ok(Some((Move::try_from(code)?, secret.parse::<Secret>()?))),
            None => Ok(None),
        }
    }

    pub async fn load_manager(&self) -> Result<Option<ManagerSnapshot>> {
        let conn = self.conn.lock().await;
        read_snapshot(&conn)
    }

    /// Load the manager, creating it on first use together with the
    /// operator player. Runs as one write transaction so concurrent first
    /// runs agree on a single owner.
    pub async fn load_or_init_manager(
        &self,
        operator_name: &str,
        config: &ManagerConfig,
    ) -> Result<GameManager> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(snapshot) = read_snapshot(&tx)? {
            return Ok(GameManager::from_snapshot(snapshot)?);
        }

        let owner = match find_player(&tx, operator_name)? {
            Some(owner) => owner,
            None => {
                let owner = Identity::new();
                insert_player(&tx, operator_name, owner)?;
                owner
            }
        };
        let manager = GameManager::new(owner, config.clone())?;
        write_snapshot(&tx, &manager.snapshot())?;
        tx.commit()?;

        tracing::info!("Initialized game manager owned by '{}'", operator_name);
        Ok(manager)
    }

    /// Run one state transition against the latest stored manager.
    ///
    /// The snapshot is re-read under `BEGIN IMMEDIATE`, so another process
    /// cannot write between the load and the save. Nothing is written when
    /// `op` fails.
    pub async fn update_manager<T, F>(&self, op: F) -> Result<(GameManager, T)>
    where
        F: FnOnce(&ManagerUpdate<'_>) -> Result<T>,
    {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let snapshot = read_snapshot(&tx)?
            .ok_or_else(|| anyhow::anyhow!("Game manager is not initialized"))?;
        let update = ManagerUpdate {
            tx,
            manager: GameManager::from_snapshot(snapshot)?,
        };

        let value = op(&update)?;
        write_snapshot(&update.tx, &update.manager.snapshot())?;
        update.tx.commit()?;
        Ok((update.manager, value))
    }
}

/// A manager loaded inside an open write transaction.
pub struct ManagerUpdate<'conn> {
    tx: Transaction<'conn>,
    manager: GameManager,
}

impl ManagerUpdate<'_> {
    pub fn manager(&self) -> &GameManager {
        &self.manager
    }

    /// Store a commit secret in the same transaction as the bet.
    pub fn save_secret(
        &self,
        game_id: GameId,
        identity: Identity,
        mv: Move,
        secret: &Secret,
    ) -> Result<()> {
        insert_secret(&self.tx, game_id, identity, mv, secret)
    }
}

fn read_snapshot(conn: &Connection) -> Result<Option<ManagerSnapshot>> {
    let snapshot: Option<String> = conn
        .query_row("SELECT snapshot FROM state WHERE id = 1", [], |row| row.get(0))
        .optional()?;

    snapshot
        .map(|json| serde_json::from_str(&json).context("Corrupted manager state"))
        .transpose()
}

fn write_snapshot(conn: &Connection, snapshot: &ManagerSnapshot) -> Result<()> {
    let json = serde_json::to_string(snapshot)?;
    conn.execute(
        "INSERT OR REPLACE INTO state (id, snapshot) VALUES (1, ?1)",
        params![json],
    )?;
    Ok(())
}

fn find_player(conn: &Connection, name: &str) -> Result<Option<Identity>> {
    let identity: Option<String> = conn
        .query_row(
            "SELECT identity FROM players WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    identity
        .map(|id| id.parse::<Identity>().map_err(anyhow::Error::from))
        .transpose()
}

fn insert_player(conn: &Connection, name: &str, identity: Identity) -> Result<()> {
    conn.execute(
        "INSERT INTO players (name, identity) VALUES (?1, ?2)",
        params![name, identity.to_string()],
    )
    .with_context(|| format!("Player '{}' already exists", name))?;
    Ok(())
}

fn insert_secret(
    conn: &Connection,
    game_id: GameId,
    identity: Identity,
    mv: Move,
    secret: &Secret,
) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO secrets (game_id, identity, move_code, secret)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            game_id.to_hex(),
            identity.to_string(),
            mv.code(),
            secret.to_hex()
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rps_engine::{generate_secret, Amount, CallContext};
    use tempfile::tempdir;

    async fn initialized(db_path: &Path) -> (Storage, GameManager) {
        let storage = Storage::new(db_path).await.unwrap();
        let manager = storage
            .load_or_init_manager("operator", &ManagerConfig::default())
            .await
            .unwrap();
        (storage, manager)
    }

    #[tokio::test]
    async fn test_players_are_unique() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(&temp_dir.path().join("rps.db")).await.unwrap();

        let alice = Identity::new();
        storage.add_player("alice", alice).await.unwrap();
        assert!(storage.add_player("alice", Identity::new()).await.is_err());

        assert_eq!(storage.player("alice").await.unwrap(), Some(alice));
        assert_eq!(storage.player("bob").await.unwrap(), None);
        assert_eq!(storage.players().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_init_registers_operator_once() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("rps.db");
        let (storage, manager) = initialized(&db_path).await;

        let operator = storage.player("operator").await.unwrap().unwrap();
        assert_eq!(manager.owner(), operator);

        let (_, again) = initialized(&db_path).await;
        assert_eq!(again.owner(), operator);
        assert_eq!(storage.players().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_secret_round_trip() {
        let temp_dir = tempdir().unwrap();
        let (storage, _) = initialized(&temp_dir.path().join("rps.db")).await;

        let game_id = GameId::from_name("my game").unwrap();
        let player = Identity::new();
        let secret = generate_secret();
        storage
            .update_manager(|update| update.save_secret(game_id, player, Move::Scissors, &secret))
            .await
            .unwrap();

        let (mv, loaded) = storage.secret(game_id, player).await.unwrap().unwrap();
        assert_eq!(mv, Move::Scissors);
        assert_eq!(loaded, secret);
        assert!(storage
            .secret(game_id, Identity::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_failed_update_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let (storage, manager) = initialized(&temp_dir.path().join("rps.db")).await;
        let owner = CallContext::new(manager.owner());
        let game_id = GameId::from_name("rolled back").unwrap();

        let result = storage
            .update_manager(|update| -> Result<()> {
                update
                    .manager()
                    .create_game(&owner, "rolled back", Amount::from_sat(10), 3, true)?;
                update.save_secret(game_id, owner.caller, Move::Rock, &generate_secret())?;
                anyhow::bail!("abort")
            })
            .await;
        assert!(result.is_err());

        let snapshot = storage.load_manager().await.unwrap().unwrap();
        let manager = GameManager::from_snapshot(snapshot).unwrap();
        assert!(!manager.contains(game_id));
        assert!(storage.secret(game_id, owner.caller).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_updates_from_separate_connections_are_kept() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("rps.db");
        let (first, manager) = initialized(&db_path).await;
        let (second, _) = initialized(&db_path).await;
        let owner = CallContext::new(manager.owner());

        // Both connections opened before either write
        first
            .update_manager(|update| {
                Ok(update
                    .manager()
                    .create_game(&owner, "one", Amount::from_sat(10), 3, true)?)
            })
            .await
            .unwrap();
        second
            .update_manager(|update| {
                Ok(update
                    .manager()
                    .create_game(&owner, "two", Amount::from_sat(10), 3, true)?)
            })
            .await
            .unwrap();

        let reopened = Storage::new(&db_path).await.unwrap();
        let snapshot = reopened.load_manager().await.unwrap().unwrap();
        let manager = GameManager::from_snapshot(snapshot).unwrap();
        assert!(manager.contains(GameId::from_name("one").unwrap()));
        assert!(manager.contains(GameId::from_name("two").unwrap()));
    }
}

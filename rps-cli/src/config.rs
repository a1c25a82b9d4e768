use anyhow::{Context, Result};
use rps_engine::ManagerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    /// Local player name that owns the game manager
    pub operator_name: String,
    pub verbose: bool,
    /// Only used when the database is first created. Afterwards the
    /// settings stored with the manager apply.
    pub manager: ManagerConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("rps"),
            operator_name: "operator".to_string(),
            verbose: false,
            manager: ManagerConfig::default(),
        }
    }
}

impl CliConfig {
    pub const FILE_NAME: &'static str = "config.json";

    /// Read `config.json` from `data_dir`, falling back to defaults.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(Self::FILE_NAME);
        let mut config = if tokio::fs::try_exists(&path).await? {
            let content = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<CliConfig>(&content)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        } else {
            CliConfig::default()
        };

        config.data_dir = data_dir.to_path_buf();
        config.manager.validate()?;
        Ok(config)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("rps.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_defaults_without_file() {
        let temp_dir = tempdir().unwrap();
        let config = CliConfig::load(temp_dir.path()).await.unwrap();

        assert_eq!(config.operator_name, "operator");
        assert_eq!(config.data_dir, temp_dir.path());
        assert!(config.manager.direct_deposit);
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let temp_dir = tempdir().unwrap();
        tokio::fs::write(
            temp_dir.path().join(CliConfig::FILE_NAME),
            r#"{ "operator_name": "house" }"#,
        )
        .await
        .unwrap();

        let config = CliConfig::load(temp_dir.path()).await.unwrap();
        assert_eq!(config.operator_name, "house");
        assert_eq!(config.manager, ManagerConfig::default());
    }

    #[tokio::test]
    async fn test_invalid_manager_config_is_rejected() {
        let temp_dir = tempdir().unwrap();
        tokio::fs::write(
            temp_dir.path().join(CliConfig::FILE_NAME),
            r#"{ "manager": { "direct_deposit": true, "min_bet": 0, "max_end_round": 3 } }"#,
        )
        .await
        .unwrap();

        assert!(CliConfig::load(temp_dir.path()).await.is_err());
    }
}

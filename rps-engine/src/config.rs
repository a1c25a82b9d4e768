use crate::error::{Result, RpsError};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Bets carry the stake as attached value instead of being non-payable.
    pub direct_deposit: bool,
    pub min_bet: Amount,
    pub max_end_round: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            direct_deposit: true,
            min_bet: Amount::from_sat(1),
            max_end_round: 100,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_bet == Amount::ZERO {
            return Err(RpsError::config("Minimum bet must be greater than 0"));
        }

        if self.max_end_round == 0 {
            return Err(RpsError::config("Max end round must be greater than 0"));
        }

        Ok(())
    }
}

use crate::{GameId, Identity, Outcome, Result, RpsError};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Credits produced by settling one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub game_id: GameId,
    pub outcome: Outcome,
    pub credits: Vec<(Identity, Amount)>,
}

impl Settlement {
    /// Loser's stake goes to the winner; a draw refunds each stake.
    pub fn compute(
        game_id: GameId,
        outcome: Outcome,
        player1: Identity,
        player2: Identity,
        bet_amount: Amount,
    ) -> Result<Self> {
        let pot = bet_amount
            .checked_mul(2)
            .ok_or_else(|| RpsError::internal("Pot overflow"))?;

        let credits = match outcome {
            Outcome::Player1Wins => vec![(player1, pot)],
            Outcome::Player2Wins => vec![(player2, pot)],
            Outcome::Draw => vec![(player1, bet_amount), (player2, bet_amount)],
        };

        Ok(Self {
            game_id,
            outcome,
            credits,
        })
    }

    pub fn total(&self) -> Amount {
        self.credits
            .iter()
            .fold(Amount::ZERO, |acc, (_, amount)| acc + *amount)
    }

    pub fn winner(&self) -> Option<Identity> {
        match self.outcome {
            Outcome::Draw => None,
            _ => self.credits.first().map(|(player, _)| *player),
        }
    }
}

/// Withdrawable balance per identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowLedger {
    balances: HashMap<Identity, Amount>,
}

impl EscrowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credited_balance_of(&self, player: Identity) -> Amount {
        self.balances.get(&player).copied().unwrap_or(Amount::ZERO)
    }

    pub fn total(&self) -> Amount {
        self.balances
            .values()
            .fold(Amount::ZERO, |acc, amount| acc + *amount)
    }

    /// Credit every entry of `settlement` or none of them.
    pub fn apply(&mut self, settlement: &Settlement) -> Result<()> {
        let mut updated = Vec::with_capacity(settlement.credits.len());
        for (player, amount) in &settlement.credits {
            let current = updated
                .iter()
                .find(|(p, _)| p == player)
                .map(|(_, a)| *a)
                .unwrap_or_else(|| self.credited_balance_of(*player));
            let next = current
                .checked_add(*amount)
                .ok_or_else(|| RpsError::internal(format!("Balance overflow for {}", player)))?;
            updated.retain(|(p, _)| p != player);
            updated.push((*player, next));
        }

        for (player, balance) in updated {
            self.balances.insert(player, balance);
        }
        Ok(())
    }

    /// Remove the whole balance of `player` and return it.
    pub fn withdraw(&mut self, player: Identity) -> Result<Amount> {
        let available = self.credited_balance_of(player);
        if available == Amount::ZERO {
            return Err(RpsError::InsufficientBalance {
                need: 1,
                available: 0,
            });
        }

        self.balances.remove(&player);
        tracing::info!("Player {} withdrew {} sats", player, available.to_sat());
        Ok(available)
    }
}

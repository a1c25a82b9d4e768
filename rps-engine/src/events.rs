use crate::{BetHash, GameId, Identity, Move, Outcome, Phase};
use bitcoin::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit record for off-chain observers. Nothing inside the engine reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub at: DateTime<Utc>,
    pub game_id: Option<GameId>,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    NewGame {
        operator: Identity,
        bet_amount: Amount,
        end_round: u32,
    },
    PlayerAdded {
        player: Identity,
    },
    BetPlaced {
        player: Identity,
        hash: BetHash,
    },
    BetRevealed {
        player: Identity,
        #[serde(rename = "move")]
        mv: Move,
    },
    WinnerRevealed {
        outcome: Outcome,
        winner: Option<Identity>,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    BalanceCredited {
        player: Identity,
        amount: Amount,
    },
    Withdrawal {
        player: Identity,
        amount: Amount,
    },
    OwnerChanged {
        previous: Identity,
        owner: Identity,
    },
}

impl Event {
    pub fn new(game_id: Option<GameId>, kind: EventKind) -> Self {
        Self {
            at: Utc::now(),
            game_id,
            kind,
        }
    }

    pub fn for_game(game_id: GameId, kind: EventKind) -> Self {
        Self::new(Some(game_id), kind)
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            EventKind::NewGame { .. } => "NewGame",
            EventKind::PlayerAdded { .. } => "PlayerAdded",
            EventKind::BetPlaced { .. } => "BetPlaced",
            EventKind::BetRevealed { .. } => "BetRevealed",
            EventKind::WinnerRevealed { .. } => "WinnerRevealed",
            EventKind::PhaseChanged { .. } => "PhaseChanged",
            EventKind::BalanceCredited { .. } => "BalanceCredited",
            EventKind::Withdrawal { .. } => "Withdrawal",
            EventKind::OwnerChanged { .. } => "OwnerChanged",
        }
    }
}

use crate::{BetHash, Identity, Move, Result, RpsError, Secret};
use serde::{Deserialize, Serialize};

/// Commitment record of one player within one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    address: Identity,
    has_joined: bool,
    hashed_bet: Option<BetHash>,
    revealed_move: Option<Move>,
}

impl PlayerRecord {
    fn new(address: Identity) -> Self {
        Self {
            address,
            has_joined: true,
            hashed_bet: None,
            revealed_move: None,
        }
    }

    pub fn address(&self) -> Identity {
        self.address
    }

    pub fn has_joined(&self) -> bool {
        self.has_joined
    }

    pub fn hashed_bet(&self) -> Option<BetHash> {
        self.hashed_bet
    }

    pub fn has_committed(&self) -> bool {
        self.hashed_bet.is_some()
    }

    pub fn has_revealed(&self) -> bool {
        self.revealed_move.is_some()
    }

    pub fn revealed_move(&self) -> Option<Move> {
        self.revealed_move
    }

    fn set_commitment(&mut self, hash: BetHash) -> Result<()> {
        if hash.is_zero() {
            return Err(RpsError::ZeroCommitment);
        }
        if self.hashed_bet.is_some() {
            return Err(RpsError::CommitmentAlreadySubmitted(self.address));
        }

        self.hashed_bet = Some(hash);
        Ok(())
    }

    fn set_reveal(&mut self, mv: Move, secret: &Secret) -> Result<()> {
        if self.revealed_move.is_some() {
            return Err(RpsError::AlreadyRevealed(self.address));
        }
        let stored = self
            .hashed_bet
            .ok_or(RpsError::CommitmentMissing(self.address))?;
        if !stored.verify(mv, secret) {
            return Err(RpsError::CommitmentMismatch(self.address));
        }

        self.revealed_move = Some(mv);
        Ok(())
    }
}

/// Ordered pair of player records for one game.
///
/// Join order is kept: index 0 is player 1, index 1 is player 2.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentLedger {
    records: Vec<PlayerRecord>,
}

impl CommitmentLedger {
    pub const CAPACITY: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= Self::CAPACITY
    }

    pub fn players(&self) -> Vec<Identity> {
        self.records.iter().map(|r| r.address).collect()
    }

    pub fn contains(&self, player: Identity) -> bool {
        self.records.iter().any(|r| r.address == player)
    }

    pub fn record(&self, player: Identity) -> Option<&PlayerRecord> {
        self.records.iter().find(|r| r.address == player)
    }

    pub fn records(&self) -> &[PlayerRecord] {
        &self.records
    }

    pub fn committed_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_committed()).count()
    }

    pub fn revealed_count(&self) -> usize {
        self.records.iter().filter(|r| r.has_revealed()).count()
    }

    pub fn join(&mut self, player: Identity) -> Result<()> {
        if self.contains(player) {
            return Err(RpsError::AlreadyJoined(player));
        }
        if self.is_full() {
            return Err(RpsError::GameFull);
        }

        self.records.push(PlayerRecord::new(player));
        Ok(())
    }

    pub fn set_commitment(&mut self, player: Identity, hash: BetHash) -> Result<()> {
        self.record_mut(player)?.set_commitment(hash)
    }

    pub fn set_reveal(&mut self, player: Identity, mv: Move, secret: &Secret) -> Result<()> {
        self.record_mut(player)?.set_reveal(mv, secret)
    }

    /// Both revealed moves in join order, once both players revealed.
    pub fn revealed_pair(&self) -> Option<(Move, Move)> {
        match self.records.as_slice() {
            [first, second] => Some((first.revealed_move?, second.revealed_move?)),
            _ => None,
        }
    }

    fn record_mut(&mut self, player: Identity) -> Result<&mut PlayerRecord> {
        self.records
            .iter_mut()
            .find(|r| r.address == player)
            .ok_or(RpsError::NotAPlayer(player))
    }
}

use crate::{GameId, Identity, Phase};
use bitcoin::Amount;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RpsError>;

/// Failure classes surfaced to callers alongside the reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Phase,
    Integrity,
    ValueTransfer,
    NotFound,
    InvalidArgument,
    Config,
    Internal,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RpsError {
    #[error("Caller {0} is not the operator")]
    NotOperator(Identity),

    #[error("Caller {0} is not the owner")]
    NotOwner(Identity),

    #[error("Caller {0} is not allowed to start this game")]
    NotCreator(Identity),

    #[error("Identity {0} is not a player of this game")]
    NotAPlayer(Identity),

    #[error("Supplied players do not match the registered pair")]
    PlayerMismatch,

    #[error("Invalid phase: expected {expected}, game is in {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("Illegal phase transition from {from} to {to}")]
    IllegalTransition { from: Phase, to: Phase },

    #[error("Game is full")]
    GameFull,

    #[error("Player {0} already joined")]
    AlreadyJoined(Identity),

    #[error("Commitment must not be zero")]
    ZeroCommitment,

    #[error("Commitment already submitted by player {0}")]
    CommitmentAlreadySubmitted(Identity),

    #[error("No commitment stored for player {0}")]
    CommitmentMissing(Identity),

    #[error("Reveal does not match the commitment of player {0}")]
    CommitmentMismatch(Identity),

    #[error("Player {0} already revealed")]
    AlreadyRevealed(Identity),

    #[error("Invalid move code: {0}")]
    InvalidMove(u8),

    #[error("Function is non-payable, attached {0}")]
    NonPayable(Amount),

    #[error("Stake must be exactly {expected}, attached {attached}")]
    InvalidStake { expected: Amount, attached: Amount },

    #[error("Game not found: {0}")]
    GameNotFound(GameId),

    #[error("Game already exists: {0}")]
    GameAlreadyExists(GameId),

    #[error("Insufficient balance: need {need} sats, have {available} sats")]
    InsufficientBalance { need: u64, available: u64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpsError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotOperator(_)
            | Self::NotOwner(_)
            | Self::NotCreator(_)
            | Self::NotAPlayer(_)
            | Self::PlayerMismatch => ErrorKind::Authorization,
            Self::InvalidPhase { .. }
            | Self::IllegalTransition { .. }
            | Self::GameFull
            | Self::AlreadyJoined(_) => ErrorKind::Phase,
            Self::ZeroCommitment
            | Self::CommitmentAlreadySubmitted(_)
            | Self::CommitmentMissing(_)
            | Self::CommitmentMismatch(_)
            | Self::AlreadyRevealed(_)
            | Self::InvalidMove(_) => ErrorKind::Integrity,
            Self::NonPayable(_) | Self::InvalidStake { .. } | Self::InsufficientBalance { .. } => {
                ErrorKind::ValueTransfer
            }
            Self::GameNotFound(_) => ErrorKind::NotFound,
            Self::GameAlreadyExists(_) | Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let someone = Identity::new();
        assert_eq!(RpsError::NotOperator(someone).kind(), ErrorKind::Authorization);
        assert_eq!(RpsError::GameFull.kind(), ErrorKind::Phase);
        assert_eq!(RpsError::InvalidMove(4).kind(), ErrorKind::Integrity);
        assert_eq!(
            RpsError::NonPayable(Amount::from_sat(1)).kind(),
            ErrorKind::ValueTransfer
        );
        assert_eq!(
            RpsError::GameNotFound(GameId::from_name("missing").unwrap()).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_reason_is_readable() {
        let err = RpsError::InvalidPhase {
            expected: Phase::BettingEnd,
            actual: Phase::PlayersReached,
        };
        assert_eq!(
            err.to_string(),
            "Invalid phase: expected BettingEnd, game is in PlayersReached"
        );
    }
}

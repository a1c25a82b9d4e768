//! Commit-reveal Rock-Paper-Scissors for 2 players
//!
//! Players commit to `SHA-256(move || secret)`, reveal once both commitments
//! are in, and the pooled stakes are credited to an escrow ledger: the winner
//! takes both stakes, a draw refunds each.

pub mod commitment;
pub mod config;
pub mod error;
pub mod escrow;
pub mod events;
pub mod game;
pub mod manager;
pub mod ownable;
pub mod phase;
pub mod player;
pub mod types;

pub use commitment::{generate_secret, BetHash, CommitmentScheme, GameId, Secret, Sha256Scheme};
pub use config::ManagerConfig;
pub use error::{ErrorKind, Result, RpsError};
pub use escrow::{EscrowLedger, Settlement};
pub use events::{Event, EventKind};
pub use game::{Game, GameInfo};
pub use manager::{GameManager, ManagerSnapshot};
pub use ownable::Ownable;
pub use phase::Phase;
pub use player::{CommitmentLedger, PlayerRecord};
pub use types::{winner_index, CallContext, Identity, Move, Outcome};

pub use ::bitcoin::Amount;

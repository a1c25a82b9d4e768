use crate::{Result, RpsError};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Authenticated identity of a caller or player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(Uuid);

impl Identity {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Identity {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| RpsError::invalid_argument(format!("Invalid identity '{}': {}", s, e)))
    }
}

/// Who is calling and how much value the call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Identity,
    pub value: Amount,
}

impl CallContext {
    pub fn new(caller: Identity) -> Self {
        Self {
            caller,
            value: Amount::ZERO,
        }
    }

    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }

    pub fn ensure_non_payable(&self) -> Result<()> {
        if self.value > Amount::ZERO {
            return Err(RpsError::NonPayable(self.value));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Move {
    Rock = 1,
    Paper = 2,
    Scissors = 3,
}

impl Move {
    pub const ALL: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock)
        )
    }
}

impl TryFrom<u8> for Move {
    type Error = RpsError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Move::Rock),
            2 => Ok(Move::Paper),
            3 => Ok(Move::Scissors),
            other => Err(RpsError::InvalidMove(other)),
        }
    }
}

impl From<Move> for u8 {
    fn from(mv: Move) -> u8 {
        mv.code()
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        };
        f.write_str(name)
    }
}

impl FromStr for Move {
    type Err = RpsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" | "r" => Ok(Move::Rock),
            "paper" | "p" => Ok(Move::Paper),
            "scissors" | "s" => Ok(Move::Scissors),
            other => {
                let code: u8 = other
                    .parse()
                    .map_err(|_| RpsError::invalid_argument(format!("Unknown move '{}'", s)))?;
                Move::try_from(code)
            }
        }
    }
}

/// Result of a game. Code 0 ("no result yet") is `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Outcome {
    Player1Wins = 1,
    Player2Wins = 2,
    Draw = 3,
}

impl Outcome {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_moves(first: Move, second: Move) -> Self {
        if first == second {
            Outcome::Draw
        } else if first.beats(second) {
            Outcome::Player1Wins
        } else {
            Outcome::Player2Wins
        }
    }
}

impl TryFrom<u8> for Outcome {
    type Error = RpsError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Outcome::Player1Wins),
            2 => Ok(Outcome::Player2Wins),
            3 => Ok(Outcome::Draw),
            other => Err(RpsError::invalid_argument(format!(
                "Invalid outcome code: {}",
                other
            ))),
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> u8 {
        outcome.code()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Outcome::Player1Wins => "Player 1 wins",
            Outcome::Player2Wins => "Player 2 wins",
            Outcome::Draw => "Draw",
        };
        f.write_str(text)
    }
}

/// Winner index over raw move codes; both codes must be in 1..=3.
pub fn winner_index(first: u8, second: u8) -> Result<Outcome> {
    let first = Move::try_from(first)
        .map_err(|_| RpsError::invalid_argument(format!("Invalid move code: {}", first)))?;
    let second = Move::try_from(second)
        .map_err(|_| RpsError::invalid_argument(format!("Invalid move code: {}", second)))?;
    Ok(Outcome::from_moves(first, second))
}

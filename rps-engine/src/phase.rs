use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single game. Declaration order is the only order a game
/// can move in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    Created,
    Started,
    PlayersReached,
    BettingEnd,
    RevealWinner,
    Done,
}

impl Phase {
    /// Phases reachable from `self` in one step.
    ///
    /// Staying in `Started`, `PlayersReached` or `BettingEnd` after the first
    /// join/bet/reveal is not a transition and is not listed here.
    pub fn successors(self) -> &'static [Phase] {
        match self {
            Phase::Created => &[Phase::Started],
            Phase::Started => &[Phase::PlayersReached],
            Phase::PlayersReached => &[Phase::BettingEnd],
            Phase::BettingEnd => &[Phase::RevealWinner],
            Phase::RevealWinner => &[Phase::Done],
            Phase::Done => &[],
        }
    }

    pub fn can_advance_to(self, next: Phase) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 6] = [
        Phase::Created,
        Phase::Started,
        Phase::PlayersReached,
        Phase::BettingEnd,
        Phase::RevealWinner,
        Phase::Done,
    ];

    #[test]
    fn test_successors_only_move_forward_by_one() {
        for (i, phase) in ALL.iter().enumerate() {
            for (j, next) in ALL.iter().enumerate() {
                assert_eq!(phase.can_advance_to(*next), j == i + 1);
            }
        }
    }

    #[test]
    fn test_done_is_terminal() {
        assert!(Phase::Done.is_terminal());
        assert!(ALL[..5].iter().all(|p| !p.is_terminal()));
    }
}

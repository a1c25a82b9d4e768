use crate::{
    BetHash, CallContext, CommitmentLedger, EscrowLedger, Event, EventKind, GameId, Identity,
    Move, Outcome, Ownable, Phase, PlayerRecord, Result, RpsError, Secret, Settlement,
};
use bitcoin::Amount;
use serde::{Deserialize, Serialize};

/// One Rock-Paper-Scissors game driven by its operator.
///
/// Every operation checks all of its guards before touching state, so a
/// failed call leaves the game exactly as it was.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    id: GameId,
    access: Ownable,
    bet_amount: Amount,
    end_round: u32,
    phase: Phase,
    ledger: CommitmentLedger,
    outcome: Option<Outcome>,
    history: Vec<Event>,
}

impl Game {
    /// Create a game operated by `ctx.caller`.
    ///
    /// With `first_player` the game starts immediately with that player
    /// joined, otherwise it waits in `Created` for `start_game`.
    pub fn create(
        ctx: &CallContext,
        id: GameId,
        bet_amount: Amount,
        end_round: u32,
        first_player: Option<Identity>,
    ) -> Result<Self> {
        ctx.ensure_non_payable()?;
        if id.is_zero() {
            return Err(RpsError::invalid_argument("Game id cannot be zero"));
        }
        if bet_amount == Amount::ZERO {
            return Err(RpsError::invalid_argument("Bet amount must be greater than 0"));
        }
        if bet_amount.checked_mul(2).is_none() {
            return Err(RpsError::invalid_argument("Bet amount too large"));
        }
        if end_round == 0 {
            return Err(RpsError::invalid_argument("End round must be greater than 0"));
        }

        let mut game = Self {
            id,
            access: Ownable::new(ctx.caller),
            bet_amount,
            end_round,
            phase: Phase::Created,
            ledger: CommitmentLedger::new(),
            outcome: None,
            history: Vec::new(),
        };
        game.emit(EventKind::NewGame {
            operator: ctx.caller,
            bet_amount,
            end_round,
        });
        tracing::info!(
            "Game {} created with bet {} sats, end round {}",
            id,
            bet_amount.to_sat(),
            end_round
        );

        if let Some(player) = first_player {
            game.advance(Phase::Started)?;
            game.ledger.join(player)?;
            game.emit(EventKind::PlayerAdded { player });
            tracing::info!("Player {} joined game {}", player, id);
        }

        Ok(game)
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    pub fn operator(&self) -> Identity {
        self.access.owner()
    }

    pub fn bet_amount(&self) -> Amount {
        self.bet_amount
    }

    pub fn end_round(&self) -> u32 {
        self.end_round
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn players(&self) -> Vec<Identity> {
        self.ledger.players()
    }

    pub fn is_player(&self, identity: Identity) -> bool {
        self.ledger.contains(identity)
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn record(&self, player: Identity) -> Option<&PlayerRecord> {
        self.ledger.record(player)
    }

    pub fn commitment_of(&self, player: Identity) -> Option<BetHash> {
        self.ledger.record(player).and_then(|r| r.hashed_bet())
    }

    /// `None` until `player` has revealed.
    pub fn revealed_move_of(&self, player: Identity) -> Option<Move> {
        self.ledger.record(player).and_then(|r| r.revealed_move())
    }

    pub fn history(&self) -> &[Event] {
        &self.history
    }

    /// Stakes placed into this game and not yet settled.
    pub fn unsettled_stake(&self) -> Amount {
        if self.phase == Phase::Done {
            return Amount::ZERO;
        }
        self.bet_amount * self.ledger.committed_count() as u64
    }

    pub fn change_operator(&mut self, ctx: &CallContext, new_operator: Identity) -> Result<()> {
        let previous = self.access.change_owner(ctx, new_operator)?;
        self.emit(EventKind::OwnerChanged {
            previous,
            owner: new_operator,
        });
        Ok(())
    }

    pub fn start_game(&mut self, ctx: &CallContext) -> Result<()> {
        self.ensure_operator(ctx)?;
        self.ensure_phase(Phase::Created)?;

        self.advance(Phase::Started)?;
        tracing::info!("Game {} started", self.id);
        Ok(())
    }

    pub fn add_player(&mut self, ctx: &CallContext, player: Identity) -> Result<()> {
        self.ensure_operator(ctx)?;
        self.ensure_phase(Phase::Started)?;

        self.ledger.join(player)?;
        self.emit(EventKind::PlayerAdded { player });
        tracing::info!("Player {} joined game {}", player, self.id);

        if self.ledger.is_full() {
            self.advance(Phase::PlayersReached)?;
            tracing::info!("Game {} ready for betting phase", self.id);
        }
        Ok(())
    }

    pub fn place_bet(&mut self, ctx: &CallContext, player: Identity, hash: BetHash) -> Result<()> {
        self.ensure_operator(ctx)?;
        self.ensure_phase(Phase::PlayersReached)?;

        self.ledger.set_commitment(player, hash)?;
        self.emit(EventKind::BetPlaced { player, hash });
        tracing::info!("Player {} placed bet in game {}", player, self.id);

        if self.ledger.committed_count() == CommitmentLedger::CAPACITY {
            self.advance(Phase::BettingEnd)?;
            tracing::info!("Game {} betting closed", self.id);
        }
        Ok(())
    }

    pub fn reveal_bet(
        &mut self,
        ctx: &CallContext,
        player: Identity,
        mv: Move,
        secret: &Secret,
    ) -> Result<()> {
        self.ensure_operator(ctx)?;
        self.ensure_phase(Phase::BettingEnd)?;

        self.ledger.set_reveal(player, mv, secret)?;
        self.emit(EventKind::BetRevealed { player, mv });
        tracing::info!("Player {} revealed {} in game {}", player, mv, self.id);

        if let Some((first, second)) = self.ledger.revealed_pair() {
            self.outcome = Some(Outcome::from_moves(first, second));
            self.advance(Phase::RevealWinner)?;
        }
        Ok(())
    }

    /// Settle the game into `escrow`. Runs once; the game is `Done` after.
    pub fn reveal_winner(
        &mut self,
        ctx: &CallContext,
        player1: Identity,
        player2: Identity,
        escrow: &mut EscrowLedger,
    ) -> Result<Settlement> {
        self.ensure_operator(ctx)?;
        self.ensure_phase(Phase::RevealWinner)?;
        if self.ledger.players() != [player1, player2] {
            return Err(RpsError::PlayerMismatch);
        }
        let outcome = self
            .outcome
            .ok_or_else(|| RpsError::internal("Outcome missing in RevealWinner phase"))?;

        let settlement =
            Settlement::compute(self.id, outcome, player1, player2, self.bet_amount)?;
        escrow.apply(&settlement)?;

        self.emit(EventKind::WinnerRevealed {
            outcome,
            winner: settlement.winner(),
        });
        for (player, amount) in &settlement.credits {
            self.emit(EventKind::BalanceCredited {
                player: *player,
                amount: *amount,
            });
        }
        self.advance(Phase::Done)?;

        tracing::info!(
            "Game {} completed: {} ({} sats credited)",
            self.id,
            outcome,
            settlement.total().to_sat()
        );
        Ok(settlement)
    }

    pub fn info(&self) -> GameInfo {
        GameInfo {
            id: self.id,
            operator: self.operator(),
            bet_amount: self.bet_amount,
            end_round: self.end_round,
            phase: self.phase,
            players: self.ledger.players(),
            committed: self.ledger.committed_count(),
            revealed: self.ledger.revealed_count(),
            outcome: self.outcome,
        }
    }

    fn ensure_operator(&self, ctx: &CallContext) -> Result<()> {
        ctx.ensure_non_payable()?;
        if !self.access.is_owner(ctx.caller) {
            tracing::warn!("Rejected call from {} on game {}", ctx.caller, self.id);
            return Err(RpsError::NotOperator(ctx.caller));
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: Phase) -> Result<()> {
        if self.phase != expected {
            tracing::warn!(
                "Rejected call on game {}: expected phase {}, in {}",
                self.id,
                expected,
                self.phase
            );
            return Err(RpsError::InvalidPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn advance(&mut self, to: Phase) -> Result<()> {
        let from = self.phase;
        if !from.can_advance_to(to) {
            return Err(RpsError::IllegalTransition { from, to });
        }

        self.phase = to;
        self.emit(EventKind::PhaseChanged { from, to });
        Ok(())
    }

    fn emit(&mut self, kind: EventKind) {
        self.history.push(Event::for_game(self.id, kind));
    }
}

/// Game info for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameInfo {
    pub id: GameId,
    pub operator: Identity,
    pub bet_amount: Amount,
    pub end_round: u32,
    pub phase: Phase,
    pub players: Vec<Identity>,
    pub committed: usize,
    pub revealed: usize,
    pub outcome: Option<Outcome>,
}

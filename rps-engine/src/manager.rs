use crate::{
    BetHash, CallContext, EscrowLedger, Event, EventKind, Game, GameId, GameInfo, Identity,
    ManagerConfig, Move, Ownable, Phase, Result, RpsError, Secret, Settlement,
};
use bitcoin::Amount;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GameSlot {
    creator: Identity,
    game: Game,
}

/// Everything a manager owns. Serializable so front ends can persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerSnapshot {
    operator: Identity,
    access: Ownable,
    config: ManagerConfig,
    games: BTreeMap<GameId, GameSlot>,
    escrow: EscrowLedger,
    held: Amount,
    events: Vec<Event>,
}

/// Multi-game front of the engine.
///
/// The manager is the operator of every game it creates and exposes
/// player-facing calls on top. All state sits behind one lock: a mutating
/// call holds the write guard from its first guard check to its last
/// write, readers always see whole transitions.
#[derive(Debug, Clone)]
pub struct GameManager {
    state: Arc<RwLock<ManagerSnapshot>>,
}

impl GameManager {
    pub fn new(owner: Identity, config: ManagerConfig) -> Result<Self> {
        config.validate()?;

        let snapshot = ManagerSnapshot {
            operator: Identity::new(),
            access: Ownable::new(owner),
            config,
            games: BTreeMap::new(),
            escrow: EscrowLedger::new(),
            held: Amount::ZERO,
            events: Vec::new(),
        };
        tracing::info!("Game manager created, owner {}", owner);
        Ok(Self::from_state(snapshot))
    }

    pub fn from_snapshot(snapshot: ManagerSnapshot) -> Result<Self> {
        snapshot.config.validate()?;
        Ok(Self::from_state(snapshot))
    }

    fn from_state(snapshot: ManagerSnapshot) -> Self {
        Self {
            state: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn snapshot(&self) -> ManagerSnapshot {
        self.state.read().clone()
    }

    pub fn owner(&self) -> Identity {
        self.state.read().access.owner()
    }

    /// Identity the manager uses when driving its games.
    pub fn operator(&self) -> Identity {
        self.state.read().operator
    }

    pub fn config(&self) -> ManagerConfig {
        self.state.read().config.clone()
    }

    pub fn contains(&self, id: GameId) -> bool {
        self.state.read().games.contains_key(&id)
    }

    pub fn game(&self, id: GameId) -> Result<GameInfo> {
        tracing::debug!("Querying game {}", id);
        let state = self.state.read();
        state.slot(id).map(|slot| slot.game.info())
    }

    pub fn games(&self) -> Vec<GameInfo> {
        let state = self.state.read();
        tracing::debug!("Listing {} games", state.games.len());
        state.games.values().map(|slot| slot.game.info()).collect()
    }

    pub fn commitment_of(&self, id: GameId, player: Identity) -> Result<Option<BetHash>> {
        let state = self.state.read();
        state.slot(id).map(|slot| slot.game.commitment_of(player))
    }

    pub fn revealed_move_of(&self, id: GameId, player: Identity) -> Result<Option<Move>> {
        let state = self.state.read();
        state.slot(id).map(|slot| slot.game.revealed_move_of(player))
    }

    pub fn balance_of(&self, player: Identity) -> Amount {
        self.state.read().escrow.credited_balance_of(player)
    }

    /// Value currently in custody: unwithdrawn balances plus open stakes.
    pub fn total_held(&self) -> Amount {
        self.state.read().held
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.read().events.clone()
    }

    pub fn events_for(&self, id: GameId) -> Result<Vec<Event>> {
        tracing::debug!("Querying events of game {}", id);
        let state = self.state.read();
        state.slot(id).map(|slot| slot.game.history().to_vec())
    }

    /// Custody equals escrow balances plus stakes of unsettled games.
    pub fn custody_is_balanced(&self) -> bool {
        let state = self.state.read();
        if !state.config.direct_deposit {
            return state.held == Amount::ZERO;
        }
        let open = state
            .games
            .values()
            .fold(Amount::ZERO, |acc, slot| acc + slot.game.unsettled_stake());
        state.held == state.escrow.total() + open
    }

    pub fn create_game(
        &self,
        ctx: &CallContext,
        name: &str,
        bet_amount: Amount,
        end_round: u32,
        join_creator: bool,
    ) -> Result<GameId> {
        ctx.ensure_non_payable()?;
        let id = GameId::from_name(name)?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        if bet_amount < state.config.min_bet {
            return Err(RpsError::invalid_argument(format!(
                "Bet amount must be at least {} sats",
                state.config.min_bet.to_sat()
            )));
        }
        if end_round > state.config.max_end_round {
            return Err(RpsError::invalid_argument(format!(
                "End round must be at most {}",
                state.config.max_end_round
            )));
        }
        if state.games.contains_key(&id) {
            return Err(rejected(RpsError::GameAlreadyExists(id)));
        }

        let game = Game::create(
            &CallContext::new(state.operator),
            id,
            bet_amount,
            end_round,
            join_creator.then_some(ctx.caller),
        )?;
        state.events.extend_from_slice(game.history());
        state.games.insert(
            id,
            GameSlot {
                creator: ctx.caller,
                game,
            },
        );

        tracing::info!("Game '{}' registered as {} by {}", name, id, ctx.caller);
        Ok(id)
    }

    /// Open a game created without players. Manager owner or game creator only.
    pub fn start_game(&self, ctx: &CallContext, id: GameId) -> Result<()> {
        ctx.ensure_non_payable()?;
        let mut guard = self.state.write();
        let state = &mut *guard;
        let operator = CallContext::new(state.operator);
        let is_owner = state.access.is_owner(ctx.caller);

        let slot = state
            .games
            .get_mut(&id)
            .ok_or_else(|| rejected(RpsError::GameNotFound(id)))?;
        if !is_owner && slot.creator != ctx.caller {
            return Err(rejected(RpsError::NotCreator(ctx.caller)));
        }
        let before = slot.game.history().len();
        slot.game.start_game(&operator)?;
        state.events.extend_from_slice(&slot.game.history()[before..]);
        Ok(())
    }

    /// The caller joins game `id`.
    pub fn add_player(&self, ctx: &CallContext, id: GameId) -> Result<()> {
        ctx.ensure_non_payable()?;
        let mut guard = self.state.write();
        let state = &mut *guard;
        let operator = CallContext::new(state.operator);

        let slot = state
            .games
            .get_mut(&id)
            .ok_or_else(|| rejected(RpsError::GameNotFound(id)))?;
        let before = slot.game.history().len();
        slot.game.add_player(&operator, ctx.caller)?;
        state.events.extend_from_slice(&slot.game.history()[before..]);
        Ok(())
    }

    /// Commit the caller's hashed move, taking the stake into custody when
    /// deposits are direct.
    pub fn place_bet(&self, ctx: &CallContext, id: GameId, hash: BetHash) -> Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        let operator = CallContext::new(state.operator);
        let direct_deposit = state.config.direct_deposit;

        let slot = state
            .games
            .get_mut(&id)
            .ok_or_else(|| rejected(RpsError::GameNotFound(id)))?;
        if !slot.game.is_player(ctx.caller) {
            return Err(rejected(RpsError::NotAPlayer(ctx.caller)));
        }
        if direct_deposit {
            let expected = slot.game.bet_amount();
            if ctx.value != expected {
                return Err(rejected(RpsError::InvalidStake {
                    expected,
                    attached: ctx.value,
                }));
            }
        } else {
            ctx.ensure_non_payable()?;
        }
        let held = state
            .held
            .checked_add(ctx.value)
            .ok_or_else(|| RpsError::internal("Custody overflow"))?;

        let before = slot.game.history().len();
        slot.game.place_bet(&operator, ctx.caller, hash)?;
        state.events.extend_from_slice(&slot.game.history()[before..]);
        state.held = held;
        Ok(())
    }

    pub fn reveal_bet(
        &self,
        ctx: &CallContext,
        id: GameId,
        move_code: u8,
        secret: &Secret,
    ) -> Result<()> {
        ctx.ensure_non_payable()?;
        let mv = Move::try_from(move_code)?;

        let mut guard = self.state.write();
        let state = &mut *guard;
        let operator = CallContext::new(state.operator);

        let slot = state
            .games
            .get_mut(&id)
            .ok_or_else(|| rejected(RpsError::GameNotFound(id)))?;
        if !slot.game.is_player(ctx.caller) {
            return Err(rejected(RpsError::NotAPlayer(ctx.caller)));
        }
        let before = slot.game.history().len();
        slot.game.reveal_bet(&operator, ctx.caller, mv, secret)?;
        state.events.extend_from_slice(&slot.game.history()[before..]);
        Ok(())
    }

    /// Settle game `id`. Callable by either player or the manager owner.
    pub fn reveal_winner(&self, ctx: &CallContext, id: GameId) -> Result<Settlement> {
        ctx.ensure_non_payable()?;
        let mut guard = self.state.write();
        let state = &mut *guard;
        let operator = CallContext::new(state.operator);
        let is_owner = state.access.is_owner(ctx.caller);

        let slot = state
            .games
            .get_mut(&id)
            .ok_or_else(|| rejected(RpsError::GameNotFound(id)))?;
        if !is_owner && !slot.game.is_player(ctx.caller) {
            return Err(rejected(RpsError::NotAPlayer(ctx.caller)));
        }
        let (player1, player2) = match slot.game.players().as_slice() {
            [first, second] => (*first, *second),
            _ => {
                return Err(RpsError::InvalidPhase {
                    expected: Phase::RevealWinner,
                    actual: slot.game.phase(),
                })
            }
        };

        let before = slot.game.history().len();
        let settlement = slot
            .game
            .reveal_winner(&operator, player1, player2, &mut state.escrow)?;
        state.events.extend_from_slice(&slot.game.history()[before..]);
        Ok(settlement)
    }

    /// Pay out the caller's whole escrow balance.
    pub fn withdraw(&self, ctx: &CallContext) -> Result<Amount> {
        ctx.ensure_non_payable()?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let available = state.escrow.credited_balance_of(ctx.caller);
        let held = if state.config.direct_deposit {
            state
                .held
                .checked_sub(available)
                .ok_or_else(|| RpsError::internal("Custody below credited balance"))?
        } else {
            state.held
        };

        let amount = state.escrow.withdraw(ctx.caller)?;
        state.held = held;
        state.events.push(Event::new(
            None,
            EventKind::Withdrawal {
                player: ctx.caller,
                amount,
            },
        ));
        Ok(amount)
    }

    pub fn change_owner(&self, ctx: &CallContext, new_owner: Identity) -> Result<()> {
        let mut state = self.state.write();
        let previous = state.access.change_owner(ctx, new_owner)?;
        state.events.push(Event::new(
            None,
            EventKind::OwnerChanged {
                previous,
                owner: new_owner,
            },
        ));
        Ok(())
    }
}

fn rejected(err: RpsError) -> RpsError {
    tracing::warn!("Rejected manager call: {}", err);
    err
}

impl ManagerSnapshot {
    fn slot(&self, id: GameId) -> Result<&GameSlot> {
        self.games.get(&id).ok_or(RpsError::GameNotFound(id))
    }
}

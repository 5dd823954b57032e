use crate::errors::GameError;
use crate::player::{ActionKind, PlayerAction as A};

/// What the acting player faces when a request is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BetContext {
    pub stack: u32,
    /// Chips the player already committed this round
    pub player_bet: u32,
    /// Highest commitment at the table this round
    pub table_bet: u32,
    pub min_raise: u32,
    /// A short all-in left this player without the right to raise
    pub raise_locked: bool,
}

impl BetContext {
    pub fn to_call(&self) -> u32 {
        self.table_bet.saturating_sub(self.player_bet)
    }
}

/// A request resolved into the exact chip movement it causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedAction {
    Fold,
    Check,
    /// Chips to add to match the table bet
    Call(u32),
    /// Raise the table bet to `to`, costing `cost` from the stack
    Raise { to: u32, cost: u32 },
    /// Commit the remaining stack
    AllIn(u32),
}

impl ValidatedAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ValidatedAction::Fold => ActionKind::Fold,
            ValidatedAction::Check => ActionKind::Check,
            ValidatedAction::Call(_) => ActionKind::Call,
            ValidatedAction::Raise { .. } => ActionKind::Raise,
            ValidatedAction::AllIn(_) => ActionKind::AllIn,
        }
    }

    /// Chips this action moves from the stack.
    pub fn cost(&self) -> u32 {
        match self {
            ValidatedAction::Fold | ValidatedAction::Check => 0,
            ValidatedAction::Call(c) | ValidatedAction::AllIn(c) => *c,
            ValidatedAction::Raise { cost, .. } => *cost,
        }
    }
}

/// Validates a player action according to betting rules and stack size.
///
/// A raise amount is measured over the table's current bet: raising by `r`
/// sets the table bet to `table_bet + r` and must satisfy `r >= min_raise`.
/// Calls and raises that would consume the whole stack come back as
/// [`ValidatedAction::AllIn`].
///
/// # Errors
///
/// - [`GameError::CannotCheck`] - Check while facing a bet
/// - [`GameError::InvalidBetAmount`] - Raise below the minimum
/// - [`GameError::InsufficientChips`] - Raise the stack cannot fund
/// - [`GameError::BettingNotReopened`] - Raise (or an all-in above the call)
///   after a short all-in that did not reopen betting
/// - [`GameError::PlayerAllIn`] - All-in with an empty stack
///
/// # Examples
///
/// ```
/// use holdem_engine::rules::{validate_action, BetContext, ValidatedAction};
/// use holdem_engine::player::PlayerAction;
///
/// let ctx = BetContext { stack: 1000, player_bet: 0, table_bet: 20, min_raise: 20, raise_locked: false };
/// assert_eq!(validate_action(&ctx, PlayerAction::Call), Ok(ValidatedAction::Call(20)));
/// assert_eq!(
///     validate_action(&ctx, PlayerAction::Raise(40)),
///     Ok(ValidatedAction::Raise { to: 60, cost: 60 })
/// );
/// ```
///
/// ```
/// use holdem_engine::rules::{validate_action, BetContext};
/// use holdem_engine::player::PlayerAction;
/// use holdem_engine::errors::GameError;
///
/// let ctx = BetContext { stack: 1000, player_bet: 0, table_bet: 50, min_raise: 100, raise_locked: false };
/// assert_eq!(
///     validate_action(&ctx, PlayerAction::Check),
///     Err(GameError::CannotCheck { to_call: 50 })
/// );
/// assert!(matches!(
///     validate_action(&ctx, PlayerAction::Raise(50)),
///     Err(GameError::InvalidBetAmount { .. })
/// ));
/// ```
pub fn validate_action(ctx: &BetContext, action: A) -> Result<ValidatedAction, GameError> {
    let to_call = ctx.to_call();
    match action {
        A::Fold => Ok(ValidatedAction::Fold),
        A::Check => {
            if to_call == 0 {
                Ok(ValidatedAction::Check)
            } else {
                Err(GameError::CannotCheck { to_call })
            }
        }
        A::Call => {
            if to_call == 0 {
                // nothing to match; a call is a check
                Ok(ValidatedAction::Check)
            } else if to_call >= ctx.stack {
                Ok(ValidatedAction::AllIn(ctx.stack))
            } else {
                Ok(ValidatedAction::Call(to_call))
            }
        }
        A::Raise(amount) => {
            if ctx.raise_locked {
                return Err(GameError::BettingNotReopened);
            }
            if amount < ctx.min_raise || amount == 0 {
                return Err(GameError::InvalidBetAmount {
                    amount,
                    minimum: ctx.min_raise.max(1),
                });
            }
            let to = ctx.table_bet.saturating_add(amount);
            let cost = to - ctx.player_bet;
            if cost > ctx.stack {
                Err(GameError::InsufficientChips {
                    needed: cost,
                    stack: ctx.stack,
                })
            } else if cost == ctx.stack {
                Ok(ValidatedAction::AllIn(ctx.stack))
            } else {
                Ok(ValidatedAction::Raise { to, cost })
            }
        }
        A::AllIn => {
            if ctx.stack == 0 {
                Err(GameError::PlayerAllIn)
            } else if ctx.raise_locked && ctx.stack > to_call {
                Err(GameError::BettingNotReopened)
            } else {
                Ok(ValidatedAction::AllIn(ctx.stack))
            }
        }
    }
}

/// Every action kind [`validate_action`] would accept in `ctx`.
pub fn legal_actions(ctx: &BetContext) -> Vec<ActionKind> {
    let mut kinds = Vec::with_capacity(4);
    if ctx.stack == 0 {
        return kinds;
    }
    let to_call = ctx.to_call();
    kinds.push(ActionKind::Fold);
    if to_call == 0 {
        kinds.push(ActionKind::Check);
    } else {
        kinds.push(ActionKind::Call);
    }
    let min_raise_cost = ctx.table_bet.saturating_add(ctx.min_raise.max(1)) - ctx.player_bet;
    if !ctx.raise_locked && min_raise_cost <= ctx.stack {
        kinds.push(ActionKind::Raise);
    }
    if !ctx.raise_locked || ctx.stack <= to_call {
        kinds.push(ActionKind::AllIn);
    }
    kinds
}

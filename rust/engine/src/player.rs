use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::errors::GameError;

pub type PlayerId = String;

/// The kind of an action, without its amount. Also stored as a player's `last_action`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Fold,
    Check,
    Call,
    Raise,
    AllIn,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Fold => "fold",
            ActionKind::Check => "check",
            ActionKind::Call => "call",
            ActionKind::Raise => "raise",
            ActionKind::AllIn => "all_in",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player's request during a betting round.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "amount", rename_all = "snake_case")]
pub enum PlayerAction {
    /// Fold and forfeit the hand
    Fold,
    /// Check (no bet, only valid if nothing to call)
    Check,
    /// Match the current bet, or as much of it as the stack allows
    Call,
    /// Raise by the given amount over the table's current bet
    Raise(u32),
    /// Commit every remaining chip
    AllIn,
}

impl PlayerAction {
    /// Builds an action from the transport's `(kind, amount)` pair. The amount is
    /// only meaningful for raises.
    pub fn from_parts(kind: ActionKind, amount: u32) -> Self {
        match kind {
            ActionKind::Fold => PlayerAction::Fold,
            ActionKind::Check => PlayerAction::Check,
            ActionKind::Call => PlayerAction::Call,
            ActionKind::Raise => PlayerAction::Raise(amount),
            ActionKind::AllIn => PlayerAction::AllIn,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            PlayerAction::Fold => ActionKind::Fold,
            PlayerAction::Check => ActionKind::Check,
            PlayerAction::Call => ActionKind::Call,
            PlayerAction::Raise(_) => ActionKind::Raise,
            PlayerAction::AllIn => ActionKind::AllIn,
        }
    }
}

/// Seat configuration used when a table is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: PlayerId,
    pub display_name: String,
    pub stack: u32,
}

impl Seat {
    pub fn new(id: impl Into<PlayerId>, display_name: impl Into<String>, stack: u32) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            stack,
        }
    }
}

/// A seated player and the per-hand betting state attached to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    id: PlayerId,
    display_name: String,
    stack: u32,
    /// Seat index, fixed for the lifetime of the table
    position: usize,
    hole: Vec<Card>,
    /// Chips committed in the current betting round
    current_bet: u32,
    /// Chips committed over the whole hand; drives pot math
    total_bet_this_hand: u32,
    has_folded: bool,
    /// Not dealt in this hand because the stack was empty at hand start
    sitting_out: bool,
    last_action: Option<ActionKind>,
    /// A short all-in did not reopen betting for this player
    raise_locked: bool,
    /// Cards were shown at showdown
    revealed: bool,
}

impl Player {
    pub fn new(seat: Seat, position: usize) -> Self {
        Self {
            id: seat.id,
            display_name: seat.display_name,
            stack: seat.stack,
            position,
            hole: Vec::with_capacity(2),
            current_bet: 0,
            total_bet_this_hand: 0,
            has_folded: false,
            sitting_out: false,
            last_action: None,
            raise_locked: false,
            revealed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
    pub fn stack(&self) -> u32 {
        self.stack
    }
    pub fn position(&self) -> usize {
        self.position
    }
    pub fn hole_cards(&self) -> &[Card] {
        &self.hole
    }
    pub fn current_bet(&self) -> u32 {
        self.current_bet
    }
    pub fn total_bet_this_hand(&self) -> u32 {
        self.total_bet_this_hand
    }
    pub fn has_folded(&self) -> bool {
        self.has_folded
    }
    pub fn is_sitting_out(&self) -> bool {
        self.sitting_out
    }
    pub fn last_action(&self) -> Option<ActionKind> {
        self.last_action
    }
    pub fn is_raise_locked(&self) -> bool {
        self.raise_locked
    }
    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Still contesting the pot (not folded, dealt in).
    pub fn in_hand(&self) -> bool {
        !self.has_folded && !self.sitting_out
    }

    /// In the hand and still holding chips, i.e. able to act.
    pub fn can_act(&self) -> bool {
        self.in_hand() && self.stack > 0
    }

    pub fn is_all_in(&self) -> bool {
        self.in_hand() && self.stack == 0 && self.total_bet_this_hand > 0
    }

    /// Clears every per-hand field. Busted players sit the hand out.
    pub fn reset_for_new_hand(&mut self) {
        self.hole.clear();
        self.current_bet = 0;
        self.total_bet_this_hand = 0;
        self.last_action = None;
        self.raise_locked = false;
        self.revealed = false;
        self.sitting_out = self.stack == 0;
        self.has_folded = self.sitting_out;
    }

    /// Clears the per-round fields between streets.
    pub fn reset_for_new_round(&mut self) {
        self.current_bet = 0;
        self.raise_locked = false;
        if self.can_act() {
            self.last_action = None;
        }
    }

    pub fn give_card(&mut self, c: Card) -> Result<(), GameError> {
        if self.hole.len() >= 2 {
            return Err(GameError::Internal {
                phase: crate::game::Phase::PreFlop,
                message: format!("{} already holds two cards", self.id),
            });
        }
        self.hole.push(c);
        Ok(())
    }

    /// Moves chips from the stack into the current round's commitment.
    pub fn commit(&mut self, amount: u32) -> Result<(), GameError> {
        if amount > self.stack {
            return Err(GameError::InsufficientChips {
                needed: amount,
                stack: self.stack,
            });
        }
        self.stack -= amount;
        self.current_bet += amount;
        self.total_bet_this_hand += amount;
        Ok(())
    }

    pub fn add_chips(&mut self, amount: u32) {
        self.stack = self.stack.saturating_add(amount);
    }

    /// Takes back an uncalled part of this player's commitment.
    pub(crate) fn refund(&mut self, amount: u32) {
        let amount = amount.min(self.total_bet_this_hand);
        self.total_bet_this_hand -= amount;
        self.current_bet = self.current_bet.saturating_sub(amount);
        self.stack = self.stack.saturating_add(amount);
    }

    pub(crate) fn fold(&mut self) {
        self.has_folded = true;
        self.last_action = Some(ActionKind::Fold);
    }

    pub(crate) fn set_last_action(&mut self, kind: ActionKind) {
        self.last_action = Some(kind);
    }

    pub(crate) fn set_raise_locked(&mut self, locked: bool) {
        self.raise_locked = locked;
    }

    pub(crate) fn reveal(&mut self) {
        self.revealed = true;
    }
}

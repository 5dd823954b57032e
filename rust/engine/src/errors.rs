use thiserror::Error;

use crate::game::Phase;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Minimum raise is {minimum}, got {amount}")]
    InvalidBetAmount { amount: u32, minimum: u32 },
    #[error("Cannot check, must call {to_call} or fold")]
    CannotCheck { to_call: u32 },
    #[error("Insufficient chips: need {needed}, have {stack}")]
    InsufficientChips { needed: u32, stack: u32 },
    #[error("Betting was not reopened by a short all-in; call or fold")]
    BettingNotReopened,
    #[error("No hand in progress")]
    NoHandInProgress,
    #[error("A hand is already in progress")]
    HandInProgress,
    #[error("Hand already complete")]
    HandAlreadyComplete,
    #[error("Player already folded")]
    PlayerAlreadyFolded,
    #[error("Player has no chips left to act with")]
    PlayerAllIn,
    #[error("It's not {actual}'s turn (expected {expected})")]
    NotPlayersTurn { expected: String, actual: String },
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
    #[error("No all-in runout is pending")]
    NoRunoutPending,
    #[error("Game over")]
    GameOver,
    #[error("Invalid table configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid card: {0}")]
    InvalidCard(String),
    #[error("Board has {cards} cards, cannot evaluate")]
    InvalidBoard { cards: usize },
    #[error("Showdown attempted with {cards} board cards")]
    IncompleteBoard { cards: usize },
    #[error("Deck exhausted")]
    DeckExhausted,
    #[error("Internal state error in {phase:?}: {message}")]
    Internal { phase: Phase, message: String },
}

impl GameError {
    /// True for errors raised while validating a request, before anything was mutated.
    ///
    /// Everything else is an engine fault that can surface half way through a
    /// transition, which the session shell answers with a rollback.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            GameError::IncompleteBoard { .. }
                | GameError::DeckExhausted
                | GameError::Internal { .. }
        )
    }
}

//! Typed events emitted by engine transitions.
//!
//! These describe what happened for display and audit; nothing in the engine
//! reads them back.

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::hand::HandCategory;
use crate::logger::Street;
use crate::player::{ActionKind, PlayerId};
use crate::pot::Pot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandEvent {
    HandStarted {
        hand_number: u64,
        dealer: usize,
        small_blind: usize,
        big_blind: usize,
    },
    BlindPosted {
        player_id: PlayerId,
        amount: u32,
        big: bool,
    },
    HoleCardsDealt {
        players: Vec<PlayerId>,
    },
    ActionTaken {
        player_id: PlayerId,
        action: ActionKind,
        amount: u32,
        street: Street,
    },
    StreetDealt {
        street: Street,
        cards: Vec<Card>,
    },
    PotsLocked {
        pots: Vec<Pot>,
    },
    UncalledBetReturned {
        player_id: PlayerId,
        amount: u32,
    },
    CardsRevealed {
        player_id: PlayerId,
        cards: Vec<Card>,
        category: HandCategory,
    },
    PotAwarded {
        pot_index: usize,
        amount: u32,
        winners: Vec<PlayerId>,
    },
    HandCompleted {
        hand_id: String,
        showdown: bool,
    },
    GameOver {
        winner: Option<PlayerId>,
    },
}

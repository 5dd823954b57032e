use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::player::{ActionKind, PlayerId};
use crate::pot::Pot;

/// Represents a betting street in Texas Hold'em poker.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Street {
    /// Before flop (hole cards dealt)
    Preflop,
    /// After flop (3 community cards)
    Flop,
    /// After turn (4th community card)
    Turn,
    /// After river (5th community card)
    River,
}

/// Records a single player action during a hand.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub player_id: PlayerId,
    /// The betting street when this action occurred
    pub street: Street,
    /// The action as applied, after call/raise normalisation to all-in
    pub action: ActionKind,
    /// Chips moved from the stack by this action
    pub amount: u32,
}

/// How one player finished a hand.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerResult {
    pub player_id: PlayerId,
    pub final_stack: u32,
    /// Chips received from pots and uncalled refunds
    pub winnings: u32,
    /// `final_stack` minus the stack at hand start
    pub net: i64,
    /// Hole cards, empty when the player sat out
    pub cards: Vec<Card>,
    /// Whether the cards were shown at showdown rather than mucked
    pub shown: bool,
}

/// Information about the showdown phase when hands are revealed.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ShowdownInfo {
    /// Every player who took chips from at least one pot
    pub winners: Vec<PlayerId>,
    /// Optional notes about the showdown (e.g., "split pot", "flush over straight")
    #[serde(default)]
    pub notes: Option<String>,
}

/// Complete record of a poker hand including all actions, board cards, and outcome.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct HandRecord {
    /// Unique identifier for this hand (format: YYYYMMDD-NNNNNN)
    pub hand_id: String,
    pub hand_number: u64,
    /// RNG seed used for deck shuffling (enables deterministic replay)
    pub seed: Option<u64>,
    /// Chronological list of all player actions
    pub actions: Vec<ActionRecord>,
    /// Community cards on the board (up to 5 cards)
    pub board: Vec<Card>,
    /// Pots as awarded; a fold-out yields a single pot
    pub pots: Vec<Pot>,
    pub results: Vec<PlayerResult>,
    /// Timestamp when the hand ended (RFC3339 format)
    #[serde(default)]
    pub ts: Option<String>,
    /// Additional metadata (extensible JSON object)
    #[serde(default)]
    pub meta: Option<serde_json::Value>,
    /// Showdown information if hand went to showdown
    #[serde(default)]
    pub showdown: Option<ShowdownInfo>,
}

impl HandRecord {
    pub fn total_pot(&self) -> u32 {
        self.pots.iter().map(|p| p.amount).sum()
    }

    pub fn result_for(&self, player_id: &str) -> Option<&PlayerResult> {
        self.results.iter().find(|r| r.player_id == player_id)
    }
}

pub fn format_hand_id(yyyymmdd: &str, seq: u64) -> String {
    format!("{}-{:06}", yyyymmdd, seq)
}

/// Hands out `YYYYMMDD-NNNNNN` ids from the current UTC date and a running counter.
pub(crate) fn next_hand_id(seq: u64) -> String {
    format_hand_id(&Utc::now().format("%Y%m%d").to_string(), seq)
}

pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

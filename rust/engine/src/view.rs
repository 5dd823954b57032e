//! Read-only projection of the table handed to transports and AI seats.

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::game::Phase;
use crate::player::{ActionKind, PlayerId};
use crate::pot::Pot;
use crate::rules::{legal_actions, BetContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub display_name: String,
    pub stack: u32,
    pub seat: usize,
    pub current_bet: u32,
    pub total_bet_this_hand: u32,
    pub has_folded: bool,
    pub sitting_out: bool,
    pub last_action: Option<ActionKind>,
    pub is_dealer: bool,
    pub is_small_blind: bool,
    pub is_big_blind: bool,
    pub is_all_in: bool,
    pub raise_locked: bool,
    /// Present for the viewer's own seat and for hands shown at showdown
    pub hole_cards: Option<Vec<Card>>,
    /// The player holds cards the viewer may not see
    pub cards_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateView {
    pub phase: Phase,
    pub hand_number: u64,
    pub dealer: Option<usize>,
    pub small_blind_seat: Option<usize>,
    pub big_blind_seat: Option<usize>,
    pub board: Vec<Card>,
    pub pots: Vec<Pot>,
    pub current_bet: u32,
    pub min_raise: u32,
    pub action_on: Option<usize>,
    pub action_on_player: Option<PlayerId>,
    pub small_blind: u32,
    pub big_blind: u32,
    pub current_pot_total: u32,
    /// Streets remain to be dealt by explicit request
    pub runout_pending: bool,
    pub players: Vec<PlayerView>,
}

impl StateView {
    pub fn player(&self, id: &str) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn is_players_turn(&self, id: &str) -> bool {
        self.action_on_player.as_deref() == Some(id)
    }

    pub fn to_call(&self, id: &str) -> u32 {
        self.player(id)
            .map(|p| self.current_bet.saturating_sub(p.current_bet))
            .unwrap_or(0)
    }

    /// Action kinds the player could submit right now; empty when it is not their turn.
    pub fn legal_actions(&self, id: &str) -> Vec<ActionKind> {
        match self.player(id) {
            Some(p) if self.is_players_turn(id) => legal_actions(&BetContext {
                stack: p.stack,
                player_bet: p.current_bet,
                table_bet: self.current_bet,
                min_raise: self.min_raise,
                raise_locked: p.raise_locked,
            }),
            _ => Vec::new(),
        }
    }

    /// Players still contesting the pot, the viewer included.
    pub fn players_in_hand(&self) -> impl Iterator<Item = &PlayerView> {
        self.players
            .iter()
            .filter(|p| !p.has_folded && !p.sitting_out)
    }
}

use serde::{Deserialize, Serialize};

use crate::logger::Street;
use crate::player::Player;

/// Lifecycle of a table. `Waiting` only precedes the first hand: `start_new_hand`
/// moves a `HandOver` table straight to the next `PreFlop`, or to `GameOver`
/// once at most one player holds chips.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Waiting,
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
    HandOver,
    GameOver,
}

impl Phase {
    /// Betting street for phases where players act.
    pub fn street(self) -> Option<Street> {
        match self {
            Phase::PreFlop => Some(Street::Preflop),
            Phase::Flop => Some(Street::Flop),
            Phase::Turn => Some(Street::Turn),
            Phase::River => Some(Street::River),
            Phase::Waiting | Phase::Showdown | Phase::HandOver | Phase::GameOver => None,
        }
    }

    /// Number of community cards this phase must show, when that is fixed.
    pub fn board_cards(self) -> Option<usize> {
        match self {
            Phase::Waiting | Phase::PreFlop => Some(0),
            Phase::Flop => Some(3),
            Phase::Turn => Some(4),
            Phase::River | Phase::Showdown => Some(5),
            // a hand may end by folds on any street
            Phase::HandOver | Phase::GameOver => None,
        }
    }

    pub fn is_betting(self) -> bool {
        self.street().is_some()
    }

    /// The street that follows this one, or `Showdown` after the river.
    pub fn next_street(self) -> Option<Phase> {
        match self {
            Phase::PreFlop => Some(Phase::Flop),
            Phase::Flop => Some(Phase::Turn),
            Phase::Turn => Some(Phase::River),
            Phase::River => Some(Phase::Showdown),
            _ => None,
        }
    }
}

/// Seats holding the button and the blinds for one hand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ButtonSeats {
    pub dealer: usize,
    pub small_blind: usize,
    pub big_blind: usize,
}

impl ButtonSeats {
    /// Heads-up the dealer posts the small blind; otherwise the blinds are the
    /// next two funded seats after the dealer.
    pub fn for_dealer(players: &[Player], dealer: usize) -> Option<Self> {
        let funded = players.iter().filter(|p| p.stack() > 0).count();
        if funded < 2 {
            return None;
        }
        let small_blind = if funded == 2 {
            dealer
        } else {
            next_funded_seat(players, dealer)?
        };
        let big_blind = next_funded_seat(players, small_blind)?;
        Some(Self {
            dealer,
            small_blind,
            big_blind,
        })
    }
}

/// First seat after `from` (wrapping, excluding `from`) that satisfies `pred`.
pub fn next_seat_where<F>(players: &[Player], from: usize, pred: F) -> Option<usize>
where
    F: Fn(&Player) -> bool,
{
    let n = players.len();
    (1..=n)
        .map(|offset| (from + offset) % n)
        .find(|&idx| idx != from && pred(&players[idx]))
}

pub fn next_funded_seat(players: &[Player], from: usize) -> Option<usize> {
    next_seat_where(players, from, |p| p.stack() > 0)
}

/// Moves the button to the next funded seat, skipping busted players.
pub fn rotate_dealer(players: &[Player], dealer: usize) -> Option<usize> {
    next_funded_seat(players, dealer)
}

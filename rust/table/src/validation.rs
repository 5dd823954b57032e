//! Post-transition invariant audit.
//!
//! Findings are warnings attached to the outcome. Whether a finding rolls the
//! transition back is the session's decision (see `strict_invariants`).

use holdem_engine::engine::Engine;
use holdem_engine::game::Phase;
use holdem_engine::player::PlayerId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    /// Stacks plus committed chips differ from the chips seated at creation
    ChipMismatch { expected: u64, actual: u64 },
    /// A street bet larger than everything the player put in this hand
    BetExceedsCommitment {
        player_id: PlayerId,
        current_bet: u32,
        total_bet: u32,
    },
    ActionPositionInvalid { seat: Option<usize>, reason: String },
    BoardCountMismatch {
        phase: Phase,
        expected: usize,
        actual: usize,
    },
}

impl ValidationWarning {
    /// Warnings that mean chips were created or lost.
    pub fn is_chip_integrity(&self) -> bool {
        matches!(
            self,
            ValidationWarning::ChipMismatch { .. } | ValidationWarning::BetExceedsCommitment { .. }
        )
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::ChipMismatch { expected, actual } => {
                write!(f, "chip total {actual} differs from expected {expected}")
            }
            ValidationWarning::BetExceedsCommitment {
                player_id,
                current_bet,
                total_bet,
            } => write!(
                f,
                "{player_id} has street bet {current_bet} above hand commitment {total_bet}"
            ),
            ValidationWarning::ActionPositionInvalid { seat, reason } => match seat {
                Some(seat) => write!(f, "action on seat {seat}: {reason}"),
                None => write!(f, "no action seat: {reason}"),
            },
            ValidationWarning::BoardCountMismatch {
                phase,
                expected,
                actual,
            } => write!(f, "{phase:?} shows {actual} board cards, expected {expected}"),
        }
    }
}

/// The facts the audit looks at, taken from a table after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFacts {
    pub expected_chips: u64,
    pub chips_in_play: u64,
    pub phase: Phase,
    pub board_cards: usize,
    pub runout_pending: bool,
    pub action_on: Option<usize>,
    pub seats: Vec<SeatFacts>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeatFacts {
    pub player_id: PlayerId,
    pub current_bet: u32,
    pub total_bet: u32,
    pub in_hand: bool,
    pub can_act: bool,
}

impl TableFacts {
    pub fn from_engine(engine: &Engine) -> Self {
        Self {
            expected_chips: engine.initial_chips(),
            chips_in_play: engine.chips_in_play(),
            phase: engine.phase(),
            board_cards: engine.board().len(),
            runout_pending: engine.is_runout_pending(),
            action_on: engine.action_on(),
            seats: engine
                .players()
                .iter()
                .map(|p| SeatFacts {
                    player_id: p.id().to_string(),
                    current_bet: p.current_bet(),
                    total_bet: p.total_bet_this_hand(),
                    in_hand: p.in_hand(),
                    can_act: p.can_act(),
                })
                .collect(),
        }
    }
}

pub fn audit_engine(engine: &Engine) -> Vec<ValidationWarning> {
    audit(&TableFacts::from_engine(engine))
}

pub fn audit(facts: &TableFacts) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if facts.chips_in_play != facts.expected_chips {
        warnings.push(ValidationWarning::ChipMismatch {
            expected: facts.expected_chips,
            actual: facts.chips_in_play,
        });
    }

    for seat in &facts.seats {
        if seat.current_bet > seat.total_bet {
            warnings.push(ValidationWarning::BetExceedsCommitment {
                player_id: seat.player_id.clone(),
                current_bet: seat.current_bet,
                total_bet: seat.total_bet,
            });
        }
    }

    match facts.action_on {
        Some(seat) => {
            let reason = match facts.seats.get(seat) {
                None => Some("no such seat"),
                Some(s) if !s.in_hand => Some("player is not in the hand"),
                Some(s) if !s.can_act => Some("player cannot act"),
                Some(_) if !facts.phase.is_betting() => Some("no betting in this phase"),
                Some(_) => None,
            };
            if let Some(reason) = reason {
                warnings.push(ValidationWarning::ActionPositionInvalid {
                    seat: Some(seat),
                    reason: reason.to_string(),
                });
            }
        }
        None if facts.phase.is_betting() && !facts.runout_pending => {
            warnings.push(ValidationWarning::ActionPositionInvalid {
                seat: None,
                reason: "betting street with nobody to act".to_string(),
            });
        }
        None => {}
    }

    if let Some(expected) = facts.phase.board_cards() {
        if expected != facts.board_cards {
            warnings.push(ValidationWarning::BoardCountMismatch {
                phase: facts.phase,
                expected,
                actual: facts.board_cards,
            });
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::engine::TableConfig;
    use holdem_engine::player::{PlayerAction, Seat};

    fn engine() -> Engine {
        let seats = vec![
            Seat::new("a", "A", 1000),
            Seat::new("b", "B", 1000),
            Seat::new("c", "C", 1000),
        ];
        Engine::new(seats, TableConfig::with_big_blind(20).seeded(11)).expect("engine")
    }

    #[test]
    fn live_table_passes_audit() {
        let mut e = engine();
        assert!(audit_engine(&e).is_empty());
        e.start_new_hand().expect("hand");
        assert!(audit_engine(&e).is_empty());
        let actor = e.action_on_player().expect("actor").to_string();
        e.apply_action(&actor, PlayerAction::Call).expect("call");
        assert!(audit_engine(&e).is_empty());
    }

    #[test]
    fn reports_each_broken_invariant() {
        let mut e = engine();
        e.start_new_hand().expect("hand");
        let mut facts = TableFacts::from_engine(&e);
        facts.chips_in_play -= 5;
        facts.seats[0].current_bet = facts.seats[0].total_bet + 1;
        facts.board_cards = 3;
        let folded = (facts.action_on.expect("actor") + 1) % 3;
        facts.seats[folded].in_hand = false;
        facts.action_on = Some(folded);

        let warnings = audit(&facts);
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert!(matches!(
            warnings[0],
            ValidationWarning::ChipMismatch { expected: 3000, actual: 2995 }
        ));
        assert!(warnings[1].is_chip_integrity());
        assert!(matches!(
            &warnings[2],
            ValidationWarning::ActionPositionInvalid { seat: Some(s), .. } if *s == folded
        ));
        assert!(matches!(
            warnings[3],
            ValidationWarning::BoardCountMismatch { expected: 0, actual: 3, .. }
        ));
        assert!(!warnings[3].is_chip_integrity());
    }

    #[test]
    fn betting_street_needs_an_actor() {
        let mut e = engine();
        e.start_new_hand().expect("hand");
        let mut facts = TableFacts::from_engine(&e);
        facts.action_on = None;
        assert_eq!(audit(&facts).len(), 1);
        facts.runout_pending = true;
        assert!(audit(&facts).is_empty());
    }

    #[test]
    fn warnings_render_readably() {
        let w = ValidationWarning::BoardCountMismatch {
            phase: Phase::Turn,
            expected: 4,
            actual: 3,
        };
        assert_eq!(w.to_string(), "Turn shows 3 board cards, expected 4");
        let json = serde_json::to_value(&w).expect("json");
        assert_eq!(json["kind"], "board_count_mismatch");
    }
}

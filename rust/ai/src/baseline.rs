//! Heuristic computer opponent tuned by difficulty.
//!
//! Decisions combine a small random component, equity-driven logic when an
//! [`EquityEstimator`] answers, and hand-strength heuristics when it does not.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use holdem_engine::cards::Card;
use holdem_engine::hand::{HandCategory, evaluate};
use holdem_engine::player::{ActionKind, PlayerAction};
use holdem_engine::view::{PlayerView, StateView};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::AIOpponent;
use crate::equity::{BettingContext, EquityEstimate, EquityEstimator, MonteCarloEstimator};

const DEFAULT_ITERATIONS: usize = 300;
const DEFAULT_COMMITMENT_THRESHOLD: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
            Difficulty::Expert => "expert",
        }
    }

    pub fn params(self) -> StrategyParams {
        let (bluff, fold, raise, call, aggression, tightness, randomness) = match self {
            Difficulty::Easy => (0.05, 0.25, 0.7, 0.4, 0.3, 0.7, 0.3),
            Difficulty::Medium => (0.15, 0.35, 0.6, 0.45, 0.5, 0.5, 0.2),
            Difficulty::Hard => (0.25, 0.4, 0.55, 0.5, 0.7, 0.4, 0.1),
            Difficulty::Expert => (0.3, 0.45, 0.5, 0.5, 0.8, 0.3, 0.05),
        };
        StrategyParams {
            bluff_frequency: bluff,
            fold_threshold: fold,
            raise_threshold: raise,
            call_threshold: call,
            aggression,
            tightness,
            randomness,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Tuning knobs, all in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParams {
    pub bluff_frequency: f64,
    pub fold_threshold: f64,
    pub raise_threshold: f64,
    pub call_threshold: f64,
    pub aggression: f64,
    pub tightness: f64,
    /// Chance of a random legal action instead of a considered one
    pub randomness: f64,
}

/// Difficulty-based heuristic opponent.
///
/// # Strategy
///
/// 1. With probability `randomness`, a random legal action.
/// 2. If the estimator answers: pot commitment by stack-to-pot ratio, direct
///    odds against `equity_needed`, then minimum-defense-frequency bluff catching.
/// 3. Otherwise preflop/postflop strength heuristics against the thresholds.
///
/// The result is always patched to be legal: no check facing a bet, a call for
/// the whole stack is an all-in and an unaffordable raise becomes a call.
///
/// # Example
///
/// ```rust
/// use holdem_ai::baseline::{BaselineAI, Difficulty};
/// use holdem_ai::AIOpponent;
///
/// let ai = BaselineAI::with_seed(Difficulty::Hard, 42);
/// assert_eq!(ai.name(), "BaselineAI(hard)");
/// ```
pub struct BaselineAI {
    difficulty: Difficulty,
    params: StrategyParams,
    name: String,
    estimator: Box<dyn EquityEstimator>,
    rng: Mutex<ChaCha20Rng>,
}

impl fmt::Debug for BaselineAI {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaselineAI")
            .field("difficulty", &self.difficulty)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl BaselineAI {
    /// Create an opponent with a random seed and a Monte-Carlo estimator.
    pub fn new(difficulty: Difficulty) -> Self {
        Self::with_seed(difficulty, rand::random())
    }

    /// Create a reproducible opponent.
    pub fn with_seed(difficulty: Difficulty, seed: u64) -> Self {
        Self {
            difficulty,
            params: difficulty.params(),
            name: format!("BaselineAI({difficulty})"),
            estimator: Box::new(MonteCarloEstimator::new(DEFAULT_ITERATIONS, seed ^ 0x5eed)),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }

    /// Replace the equity source, e.g. with [`crate::equity::UnavailableEstimator`].
    pub fn with_estimator(mut self, estimator: Box<dyn EquityEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    fn roll(&self) -> f64 {
        self.rng
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .random::<f64>()
    }

    /// Preflop strength in `0.0..=1.0`.
    ///
    /// Pairs score 0.85 and up by rank. Other hands score by rank sum, with
    /// small bonuses for suited and connected cards.
    pub fn preflop_strength(hole: [Card; 2]) -> f64 {
        let a = f64::from(hole[0].rank.value());
        let b = f64::from(hole[1].rank.value());
        if hole[0].rank == hole[1].rank {
            return 0.85 + (a / 14.0) * 0.15;
        }
        let mut strength = (a + b) / 28.0 * 0.7;
        if hole[0].suit == hole[1].suit {
            strength += 0.1;
        }
        if (a - b).abs() == 1.0 {
            strength += 0.05;
        }
        strength.min(1.0)
    }

    /// Postflop strength from the made hand, with credit for a four-card flush draw.
    pub fn postflop_strength(hole: [Card; 2], board: &[Card]) -> Option<f64> {
        let rank = evaluate(hole, board).ok()?;
        let made = match rank.category {
            HandCategory::HighCard => 0.2,
            HandCategory::OnePair => 0.45,
            HandCategory::TwoPair => 0.65,
            HandCategory::ThreeOfAKind => 0.75,
            HandCategory::Straight => 0.82,
            HandCategory::Flush => 0.88,
            HandCategory::FullHouse => 0.93,
            HandCategory::FourOfAKind => 0.97,
            HandCategory::StraightFlush | HandCategory::RoyalFlush => 1.0,
        };
        let flush_draw = board.len() < 5
            && hole.iter().any(|h| {
                hole.iter().chain(board).filter(|c| c.suit == h.suit).count() == 4
            });
        Some(if flush_draw { f64::max(made, 0.6) } else { made })
    }

    /// Raise increment over the table bet, or 0 when no legal raise fits.
    fn raise_amount(&self, view: &StateView, me: &PlayerView) -> u32 {
        let to_call = view.to_call(&me.id);
        let max_raise = me.stack.saturating_sub(to_call);
        if max_raise < view.min_raise || view.min_raise == 0 {
            return 0;
        }
        if self.roll() < self.params.aggression * 0.1 {
            return max_raise;
        }
        let base = (f64::from(view.current_pot_total) * (0.5 + self.params.aggression * 0.5)) as u32;
        base.clamp(view.min_raise, max_raise)
    }

    fn raise_or(&self, view: &StateView, me: &PlayerView, fallback: PlayerAction) -> PlayerAction {
        match self.raise_amount(view, me) {
            0 => fallback,
            amount => PlayerAction::Raise(amount),
        }
    }

    fn random_action(&self, view: &StateView, me: &PlayerView) -> PlayerAction {
        let to_call = view.to_call(&me.id);
        if to_call == 0 {
            return if self.roll() < 0.7 {
                PlayerAction::Check
            } else {
                self.raise_or(view, me, PlayerAction::Check)
            };
        }
        if to_call >= me.stack {
            return if self.roll() < 0.6 {
                PlayerAction::AllIn
            } else {
                PlayerAction::Fold
            };
        }
        let r = self.roll();
        if r < 0.2 {
            PlayerAction::Fold
        } else if r < 0.7 || me.stack <= to_call * 2 {
            PlayerAction::Call
        } else {
            self.raise_or(view, me, PlayerAction::Call)
        }
    }

    fn advanced_decision(&self, view: &StateView, me: &PlayerView, eq: &EquityEstimate) -> PlayerAction {
        let to_call = view.to_call(&me.id);
        let win = eq.win_probability;
        if to_call == 0 {
            if win > 0.7 || (win > 0.5 && self.roll() < self.params.aggression) {
                return self.raise_or(view, me, PlayerAction::Check);
            }
            return PlayerAction::Check;
        }

        let commitment = eq.commitment_threshold.unwrap_or(DEFAULT_COMMITMENT_THRESHOLD);
        if eq.stack_to_pot_ratio <= commitment && win > 0.3 {
            tracing::debug!(player_id = %me.id, spr = eq.stack_to_pot_ratio, "pot committed");
            return PlayerAction::Call;
        }

        let equity_needed = eq.equity_needed.unwrap_or(eq.pot_odds);
        let adjusted = win * (1.0 - self.params.randomness * 0.3);
        let defend = self.roll() < eq.minimum_defense_frequency;
        if adjusted > equity_needed {
            if to_call < me.stack && win > 0.65 && me.stack > to_call * 2 {
                return self.raise_or(view, me, PlayerAction::Call);
            }
            PlayerAction::Call
        } else if defend && win > 0.35 {
            if to_call >= me.stack && win <= 0.4 {
                PlayerAction::Fold
            } else {
                PlayerAction::Call
            }
        } else {
            PlayerAction::Fold
        }
    }

    fn heuristic_decision(&self, view: &StateView, me: &PlayerView, hole: [Card; 2]) -> PlayerAction {
        let p = &self.params;
        let to_call = view.to_call(&me.id);
        let pot = view.current_pot_total;
        let pot_odds = if pot + to_call == 0 {
            0.0
        } else {
            f64::from(to_call) / f64::from(pot + to_call)
        };
        let preflop = view.board.is_empty();
        let strength = if preflop {
            let late = me.seat + 2 >= view.players.len();
            Self::preflop_strength(hole) * if late { 1.2 } else { 1.0 }
        } else {
            Self::postflop_strength(hole, &view.board)
                .map(|s| s * (0.85 + self.roll() * 0.15))
                .unwrap_or_else(|| Self::preflop_strength(hole))
        };

        if to_call == 0 {
            let bluff = if preflop { p.bluff_frequency } else { p.bluff_frequency * 0.7 };
            if strength > p.raise_threshold || self.roll() < bluff {
                return self.raise_or(view, me, PlayerAction::Check);
            }
            return PlayerAction::Check;
        }

        if to_call >= me.stack {
            let needed = if preflop { p.call_threshold * 1.2 } else { p.call_threshold };
            return if strength > needed {
                PlayerAction::AllIn
            } else {
                PlayerAction::Fold
            };
        }

        let fold_below = if preflop { p.fold_threshold } else { p.fold_threshold * 0.8 };
        if strength < fold_below {
            PlayerAction::Fold
        } else if strength > p.raise_threshold && me.stack > to_call * 3 {
            self.raise_or(view, me, PlayerAction::Call)
        } else if strength > p.call_threshold || pot_odds < strength {
            PlayerAction::Call
        } else {
            PlayerAction::Fold
        }
    }

    /// Patches a decision into one the engine accepts.
    fn legalize(view: &StateView, me: &PlayerView, action: PlayerAction) -> PlayerAction {
        let legal = view.legal_actions(&me.id);
        let to_call = view.to_call(&me.id);
        let passive = if to_call == 0 {
            PlayerAction::Check
        } else if to_call >= me.stack {
            PlayerAction::AllIn
        } else {
            PlayerAction::Call
        };
        match action {
            PlayerAction::Check if to_call > 0 => passive,
            PlayerAction::Call if to_call >= me.stack => PlayerAction::AllIn,
            PlayerAction::Call if to_call == 0 => PlayerAction::Check,
            PlayerAction::Raise(amount) => {
                let cost = u64::from(view.current_bet) + u64::from(amount) - u64::from(me.current_bet);
                if !legal.contains(&ActionKind::Raise) || amount < view.min_raise || cost > u64::from(me.stack) {
                    passive
                } else {
                    action
                }
            }
            PlayerAction::AllIn if !legal.contains(&ActionKind::AllIn) => passive,
            other => other,
        }
    }
}

impl AIOpponent for BaselineAI {
    fn decide(&self, view: &StateView, player_id: &str) -> PlayerAction {
        let Some(me) = view.player(player_id) else {
            return PlayerAction::Fold;
        };
        let to_call = view.to_call(player_id);
        let hole = match me.hole_cards.as_deref() {
            Some([a, b]) => [*a, *b],
            _ => {
                return if to_call == 0 {
                    PlayerAction::Check
                } else {
                    PlayerAction::Fold
                };
            }
        };

        let action = if self.roll() < self.params.randomness {
            self.random_action(view, me)
        } else {
            let opponents = view.players_in_hand().count().saturating_sub(1);
            let ctx = BettingContext {
                street: view.phase.street(),
                pot: view.current_pot_total,
                to_call,
                stack: me.stack,
            };
            match self.estimator.estimate(hole, &view.board, opponents, &ctx) {
                Ok(eq) => self.advanced_decision(view, me, &eq),
                Err(err) => {
                    tracing::debug!(player_id, %err, "equity unavailable, using heuristics");
                    self.heuristic_decision(view, me, hole)
                }
            }
        };

        let action = Self::legalize(view, me, action);
        tracing::debug!(player_id, ?action, difficulty = %self.difficulty, "ai decision");
        action
    }

    fn name(&self) -> &str {
        &self.name
    }
}

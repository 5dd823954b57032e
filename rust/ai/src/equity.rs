//! Equity estimation consumed by the computer opponent.
//!
//! Estimation is an external concern: an [`EquityEstimator`] may be slow or
//! unavailable, and callers treat any error as "no advanced data".

use std::sync::Mutex;

use holdem_engine::cards::{full_deck, Card};
use holdem_engine::hand::evaluate;
use holdem_engine::logger::Street;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha20Rng;
use thiserror::Error;

/// Betting situation the estimate is asked for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BettingContext {
    pub street: Option<Street>,
    /// Chips already in the middle, including this round's bets
    pub pot: u32,
    pub to_call: u32,
    pub stack: u32,
}

/// Win/tie chances plus derived betting metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityEstimate {
    pub win_probability: f64,
    pub tie_probability: f64,
    /// Share of the final pot the call would pay: `to_call / (pot + to_call)`
    pub pot_odds: f64,
    /// `pot / (pot + to_call)`
    pub minimum_defense_frequency: f64,
    pub stack_to_pot_ratio: f64,
    pub equity_needed: Option<f64>,
    pub commitment_threshold: Option<f64>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EstimateError {
    #[error("equity estimation unavailable: {0}")]
    Unavailable(String),
    #[error("invalid estimation input: {0}")]
    InvalidInput(String),
}

pub trait EquityEstimator: Send + Sync {
    fn estimate(
        &self,
        hero: [Card; 2],
        board: &[Card],
        opponents: usize,
        ctx: &BettingContext,
    ) -> Result<EquityEstimate, EstimateError>;
}

/// Stand-in for a missing estimation service.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEstimator;

impl EquityEstimator for UnavailableEstimator {
    fn estimate(
        &self,
        _hero: [Card; 2],
        _board: &[Card],
        _opponents: usize,
        _ctx: &BettingContext,
    ) -> Result<EquityEstimate, EstimateError> {
        Err(EstimateError::Unavailable("no estimator configured".into()))
    }
}

/// Samples random opponent hands and board completions.
#[derive(Debug)]
pub struct MonteCarloEstimator {
    iterations: usize,
    rng: Mutex<ChaCha20Rng>,
}

impl MonteCarloEstimator {
    pub fn new(iterations: usize, seed: u64) -> Self {
        Self {
            iterations: iterations.max(1),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl EquityEstimator for MonteCarloEstimator {
    fn estimate(
        &self,
        hero: [Card; 2],
        board: &[Card],
        opponents: usize,
        ctx: &BettingContext,
    ) -> Result<EquityEstimate, EstimateError> {
        if opponents == 0 {
            return Err(EstimateError::InvalidInput("no opponents".into()));
        }
        if board.len() > 5 {
            return Err(EstimateError::InvalidInput(format!(
                "{} board cards",
                board.len()
            )));
        }
        let known: Vec<Card> = hero.iter().chain(board).copied().collect();
        let mut remaining: Vec<Card> = full_deck()
            .into_iter()
            .filter(|c| !known.contains(c))
            .collect();
        if remaining.len() + known.len() != 52 {
            return Err(EstimateError::InvalidInput("duplicate cards".into()));
        }
        let missing = 5 - board.len();
        let needed = missing + opponents * 2;
        if needed > remaining.len() {
            return Err(EstimateError::InvalidInput(format!(
                "{opponents} opponents do not fit in the deck"
            )));
        }

        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let (mut wins, mut ties) = (0usize, 0usize);
        let mut full_board = Vec::with_capacity(5);
        for _ in 0..self.iterations {
            let (drawn, _) = remaining.partial_shuffle(&mut *rng, needed);
            full_board.clear();
            full_board.extend_from_slice(board);
            full_board.extend_from_slice(&drawn[..missing]);

            let hero_rank = evaluate(hero, &full_board)
                .map_err(|e| EstimateError::InvalidInput(e.to_string()))?;
            let mut best_villain = None;
            for pair in drawn[missing..].chunks_exact(2) {
                let rank = evaluate([pair[0], pair[1]], &full_board)
                    .map_err(|e| EstimateError::InvalidInput(e.to_string()))?;
                if best_villain.as_ref().is_none_or(|b| rank > *b) {
                    best_villain = Some(rank);
                }
            }
            match best_villain.map(|v| hero_rank.cmp(&v)) {
                Some(std::cmp::Ordering::Greater) | None => wins += 1,
                Some(std::cmp::Ordering::Equal) => ties += 1,
                Some(std::cmp::Ordering::Less) => {}
            }
        }

        let n = self.iterations as f64;
        let pot = f64::from(ctx.pot);
        let to_call = f64::from(ctx.to_call);
        let pot_odds = if ctx.to_call == 0 { 0.0 } else { to_call / (pot + to_call) };
        let mdf = if ctx.to_call == 0 { 1.0 } else { pot / (pot + to_call) };
        Ok(EquityEstimate {
            win_probability: wins as f64 / n,
            tie_probability: ties as f64 / n,
            pot_odds,
            minimum_defense_frequency: mdf,
            stack_to_pot_ratio: f64::from(ctx.stack) / pot.max(1.0),
            equity_needed: Some(pot_odds),
            commitment_threshold: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::cards::parse_cards;

    fn ctx() -> BettingContext {
        BettingContext {
            street: Some(Street::Flop),
            pot: 100,
            to_call: 50,
            stack: 1000,
        }
    }

    fn two(s: &str) -> [Card; 2] {
        let v = parse_cards(s).unwrap();
        [v[0], v[1]]
    }

    #[test]
    fn made_nuts_on_river_always_wins() {
        let est = MonteCarloEstimator::new(200, 1);
        let board = parse_cards("Qs Js Ts 2c 3d").unwrap();
        let e = est.estimate(two("As Ks"), &board, 2, &ctx()).unwrap();
        assert_eq!(e.win_probability, 1.0);
        assert_eq!(e.tie_probability, 0.0);
    }

    #[test]
    fn board_royal_is_always_a_tie() {
        let est = MonteCarloEstimator::new(100, 2);
        let board = parse_cards("As Ks Qs Js Ts").unwrap();
        let e = est.estimate(two("2c 3d"), &board, 1, &ctx()).unwrap();
        assert_eq!(e.tie_probability, 1.0);
    }

    #[test]
    fn betting_metrics_follow_pot_and_call() {
        let est = MonteCarloEstimator::new(10, 3);
        let e = est.estimate(two("7c 2d"), &[], 1, &ctx()).unwrap();
        assert!((e.pot_odds - 50.0 / 150.0).abs() < 1e-9);
        assert!((e.minimum_defense_frequency - 100.0 / 150.0).abs() < 1e-9);
        assert!((e.stack_to_pot_ratio - 10.0).abs() < 1e-9);
        assert_eq!(e.equity_needed, Some(e.pot_odds));
    }

    #[test]
    fn rejects_bad_inputs() {
        let est = MonteCarloEstimator::new(10, 4);
        assert!(est.estimate(two("Ac Kd"), &[], 0, &ctx()).is_err());
        let board = parse_cards("Ac 2d 3h").unwrap();
        assert!(matches!(
            est.estimate(two("Ac Kd"), &board, 1, &ctx()),
            Err(EstimateError::InvalidInput(_))
        ));
        assert!(est.estimate(two("Ac Kd"), &[], 30, &ctx()).is_err());
        assert!(UnavailableEstimator.estimate(two("Ac Kd"), &[], 1, &ctx()).is_err());
    }
}

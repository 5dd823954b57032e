//! Table builders shared by the engine integration tests.
//!
//! Seats are named by their role relative to the first dealer: `s0` holds the
//! button, `s1` sits to its left and so on. The dealer is drawn from the seed, so
//! a throwaway probe table is built first to learn where it lands.

#![allow(dead_code)]

use holdem_engine::engine::{Engine, TableConfig};
use holdem_engine::player::{ActionKind, PlayerAction, Seat};

pub const SEED: u64 = 2024;

pub fn config() -> TableConfig {
    TableConfig::with_big_blind(20).seeded(SEED)
}

/// Builds a table where `stacks[k]` belongs to the seat `k` places left of the first dealer.
pub fn table_from_dealer(stacks: &[u32], config: TableConfig) -> Engine {
    let n = stacks.len();
    let probe_seats = (0..n).map(|i| Seat::new(format!("probe{i}"), "", 1)).collect();
    let dealer = Engine::new(probe_seats, config.clone())
        .expect("probe table")
        .dealer();
    let seats = (0..n)
        .map(|seat| {
            let k = (seat + n - dealer) % n;
            Seat::new(format!("s{k}"), format!("Seat {k}"), stacks[k])
        })
        .collect();
    let engine = Engine::new(seats, config).expect("table");
    assert_eq!(engine.dealer(), dealer);
    engine
}

pub fn on(engine: &Engine) -> String {
    engine
        .action_on_player()
        .expect("someone should be on the clock")
        .to_string()
}

/// Everyone shoves or calls until nobody can act.
pub fn play_all_in(engine: &mut Engine) {
    while let Some(id) = engine.action_on_player().map(str::to_string) {
        let legal = engine.view(Some(&id)).legal_actions(&id);
        let action = if legal.contains(&ActionKind::AllIn) {
            PlayerAction::AllIn
        } else if legal.contains(&ActionKind::Call) {
            PlayerAction::Call
        } else {
            PlayerAction::Check
        };
        engine.apply_action(&id, action).expect("legal action");
    }
}

/// Everyone calls or checks down to showdown.
pub fn check_down(engine: &mut Engine) {
    while let Some(id) = engine.action_on_player().map(str::to_string) {
        let legal = engine.view(Some(&id)).legal_actions(&id);
        let action = if legal.contains(&ActionKind::Check) {
            PlayerAction::Check
        } else {
            PlayerAction::Call
        };
        engine.apply_action(&id, action).expect("legal action");
    }
}

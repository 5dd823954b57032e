use holdem_engine::engine::{Engine, RunoutMode, TableConfig};
use holdem_engine::game::Phase;
use holdem_engine::player::{ActionKind, PlayerAction, Seat};
use proptest::prelude::*;

fn table(seed: u64, stacks: &[u32], runout: RunoutMode) -> Engine {
    let seats = stacks
        .iter()
        .enumerate()
        .map(|(i, &s)| Seat::new(format!("p{i}"), format!("P{i}"), s))
        .collect();
    let config = TableConfig {
        runout,
        ..TableConfig::with_big_blind(20).seeded(seed)
    };
    Engine::new(seats, config).expect("valid table")
}

fn pick(kinds: &[ActionKind], choice: u8, extra: u32, min_raise: u32) -> PlayerAction {
    match kinds[choice as usize % kinds.len()] {
        ActionKind::Raise => PlayerAction::Raise(min_raise + extra),
        kind => PlayerAction::from_parts(kind, 0),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chips_are_conserved_across_every_transition(
        seed in any::<u64>(),
        stacks in prop::collection::vec(1u32..3000, 2..7),
        script in prop::collection::vec((any::<u8>(), 0u32..400), 1..300),
        paced in any::<bool>(),
    ) {
        let runout = if paced { RunoutMode::Paced } else { RunoutMode::Automatic };
        let mut e = table(seed, &stacks, runout);
        let total: u64 = stacks.iter().map(|&s| u64::from(s)).sum();

        for (choice, extra) in script {
            let result = match e.phase() {
                Phase::GameOver => break,
                Phase::Waiting | Phase::HandOver => e.start_new_hand(),
                _ if e.is_runout_pending() => {
                    if choice % 2 == 0 { e.deal_next_street() } else { e.advance_all_in_streets() }
                }
                _ => {
                    let id = e.action_on_player().expect("betting street has an actor").to_string();
                    let view = e.view(Some(&id));
                    let action = pick(&view.legal_actions(&id), choice, extra, view.min_raise);
                    let before = e.view(None);
                    let result = e.apply_action(&id, action);
                    if let Err(err) = &result {
                        prop_assert!(err.is_rejection(), "internal error: {err}");
                        prop_assert_eq!(e.view(None), before);
                    }
                    result
                }
            };
            if let Err(err) = result {
                prop_assert!(err.is_rejection(), "internal error: {err}");
            }
            prop_assert_eq!(e.chips_in_play(), total);
            if e.phase().is_betting() && !e.pots().is_empty() {
                let committed: u32 = e.players().iter().map(|p| p.total_bet_this_hand()).sum();
                prop_assert_eq!(e.pots().iter().map(|p| p.amount).sum::<u32>(), committed);
            }
            if let Some(expected) = e.phase().board_cards() {
                prop_assert_eq!(e.board().len(), expected);
            }
        }
    }
}

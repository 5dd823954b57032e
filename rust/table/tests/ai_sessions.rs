use holdem_ai::Difficulty;
use holdem_engine::errors::GameError;
use holdem_engine::events::HandEvent;
use holdem_engine::game::Phase;
use holdem_engine::player::PlayerAction;
use holdem_table::session::{GameConfig, OpponentType, SessionError, SessionManager, HERO_ID};
use holdem_table::settings::TableSettings;

fn three_handed(manager: &SessionManager, seed: u64) -> String {
    manager
        .create_session(
            GameConfig::against(vec![
                OpponentType::AI(Difficulty::Easy),
                OpponentType::AI(Difficulty::Hard),
            ])
            .seeded(seed),
        )
        .expect("create session")
}

/// Lets the computers act, then calls for the hero, until the hand is over.
fn play_out_hand(manager: &SessionManager, id: &String) -> usize {
    let mut ai_actions = 0;
    for _ in 0..200 {
        let outcomes = manager.run_ai_turns(id).expect("ai turns");
        for outcome in &outcomes {
            assert!(outcome.success);
            assert!(outcome.events.iter().any(|e| matches!(
                e,
                HandEvent::ActionTaken { player_id, .. } if player_id.starts_with("ai_")
            )));
        }
        ai_actions += outcomes.len();

        let view = manager.state(id, Some(HERO_ID)).expect("state");
        if !view.phase.is_betting() {
            return ai_actions;
        }
        if view.is_players_turn(HERO_ID) {
            manager
                .process_action(id, HERO_ID, PlayerAction::Call, None)
                .expect("hero call");
        }
    }
    panic!("hand did not finish");
}

#[test]
fn computers_play_full_hands() {
    let manager = SessionManager::new(TableSettings::default()).expect("manager");
    let id = three_handed(&manager, 42);

    let mut hands = 0;
    for _ in 0..5 {
        match manager.start_new_hand(&id) {
            Ok(dealt) if dealt.state.phase == Phase::GameOver => break,
            Ok(_) => {}
            Err(SessionError::Rejected(GameError::GameOver)) => break,
            Err(err) => panic!("unexpected failure: {err}"),
        }
        play_out_hand(&manager, &id);
        hands += 1;

        let view = manager.state(&id, Some(HERO_ID)).expect("state");
        assert_eq!(view.phase, Phase::HandOver);
        let stacks: u32 = view.players.iter().map(|p| p.stack).sum();
        assert_eq!(stacks, 6000);
    }

    let history = manager.hand_history(&id).expect("history");
    assert_eq!(history.len(), hands);
    assert!(history.iter().all(|h| h.results.len() == 3));

    let metrics = manager.monitor().session_metrics(&id).expect("metrics");
    assert_eq!(metrics.rollbacks, 0);
    assert_eq!(metrics.chip_integrity_warnings, 0);
    assert!(!metrics.actions.is_empty());
}

#[test]
fn ai_outcomes_are_projected_for_the_hero() {
    let manager = SessionManager::new(TableSettings::default()).expect("manager");
    let id = three_handed(&manager, 7);
    manager.start_new_hand(&id).expect("hand");

    let outcomes = manager.run_ai_turns(&id).expect("ai turns");
    for outcome in outcomes {
        if outcome.state.phase.is_betting() {
            let hero = outcome.state.player(HERO_ID).expect("hero");
            assert!(hero.hole_cards.is_some());
            assert!(outcome
                .state
                .players
                .iter()
                .filter(|p| p.id != HERO_ID)
                .all(|p| p.hole_cards.is_none()));
        }
    }
}

#[test]
fn ai_turns_stop_at_the_hero() {
    let manager = SessionManager::new(TableSettings::default()).expect("manager");
    let id = three_handed(&manager, 11);
    manager.start_new_hand(&id).expect("hand");
    manager.run_ai_turns(&id).expect("ai turns");

    let view = manager.state(&id, Some(HERO_ID)).expect("state");
    if view.phase.is_betting() {
        assert_eq!(view.action_on_player.as_deref(), Some(HERO_ID));
        // nothing for the computers to do until the hero moves
        assert!(manager.run_ai_turns(&id).expect("ai turns").is_empty());
    }
}

#[test]
fn ai_turns_respect_the_per_call_cap() {
    let settings = TableSettings {
        max_ai_actions_per_turn: 1,
        ..TableSettings::default()
    };
    let manager = SessionManager::new(settings).expect("manager");
    let id = three_handed(&manager, 19);
    manager.start_new_hand(&id).expect("hand");
    assert!(manager.run_ai_turns(&id).expect("ai turns").len() <= 1);
}

#[test]
fn seeded_sessions_replay_identically() {
    let play = |manager: &SessionManager| {
        let id = three_handed(manager, 2024);
        manager.start_new_hand(&id).expect("hand");
        play_out_hand(manager, &id);
        let record = manager
            .hand_history(&id)
            .expect("history")
            .pop()
            .expect("record");
        (record.board, record.actions, record.results)
    };
    let first = play(&SessionManager::new(TableSettings::default()).expect("manager"));
    let second = play(&SessionManager::new(TableSettings::default()).expect("manager"));
    assert_eq!(first, second);
}

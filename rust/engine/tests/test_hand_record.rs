mod helpers;

use helpers::{check_down, config, table_from_dealer};
use holdem_engine::logger::{HandRecord, Street};
use holdem_engine::player::{ActionKind, PlayerAction as A};

#[test]
fn record_captures_actions_results_and_metadata() {
    let mut e = table_from_dealer(&[1000, 1000], config());
    e.start_new_hand().unwrap();
    e.apply_action("s0", A::Raise(40)).unwrap();
    e.apply_action("s1", A::Call).unwrap();
    check_down(&mut e);

    let record = e.last_hand_record().expect("hand complete").clone();
    assert_eq!(record.hand_number, 1);
    assert_eq!(record.seed, Some(helpers::SEED));
    let (date, seq) = record.hand_id.split_once('-').unwrap();
    assert_eq!(date.len(), 8);
    assert_eq!(seq, "000001");

    assert_eq!(record.actions[0].player_id, "s0");
    assert_eq!(record.actions[0].street, Street::Preflop);
    assert_eq!(record.actions[0].action, ActionKind::Raise);
    assert_eq!(record.actions[0].amount, 50);
    assert_eq!(record.actions[1].amount, 40);
    assert!(record.actions.iter().skip(2).all(|a| a.action == ActionKind::Check));

    assert_eq!(record.total_pot(), 120);
    assert_eq!(record.board.len(), 5);
    let showdown = record.showdown.as_ref().unwrap();
    assert!(!showdown.winners.is_empty());
    assert!(record.results.iter().all(|r| r.shown && r.cards.len() == 2));
    assert_eq!(record.results.iter().map(|r| r.net).sum::<i64>(), 0);
    assert_eq!(record.meta.as_ref().unwrap()["big_blind"], 20);
    assert!(record.ts.is_some());
}

#[test]
fn record_serializes_to_json_and_back() {
    let mut e = table_from_dealer(&[1000, 1000], config());
    e.start_new_hand().unwrap();
    e.apply_action("s0", A::Fold).unwrap();
    let record = e.last_hand_record().unwrap();
    let json = serde_json::to_string(record).unwrap();
    assert!(json.contains("\"action\":\"fold\""));
    let back: HandRecord = serde_json::from_str(&json).unwrap();
    assert_eq!(&back, record);
}

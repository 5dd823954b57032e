use std::collections::HashSet;

use holdem_engine::cards::Card;
use holdem_engine::deck::Deck;
use holdem_engine::errors::GameError;

#[test]
fn shuffled_deck_has_52_unique_cards() {
    let mut deck = Deck::new_with_seed(42);
    deck.shuffle();
    let mut set = HashSet::new();
    for i in 0..52 {
        let c = deck.deal_card().expect("should have 52 cards");
        assert!(set.insert(c), "card {} duplicated at position {}", c, i);
    }
    assert!(deck.deal_card().is_none());
    assert_eq!(deck.draw(), Err(GameError::DeckExhausted));
}

#[test]
fn shuffle_is_deterministic_with_same_seed() {
    let mut d1 = Deck::new_with_seed(12345);
    let mut d2 = Deck::new_with_seed(12345);
    d1.shuffle();
    d2.shuffle();
    let a: Vec<Card> = (0..10).map(|_| d1.draw().unwrap()).collect();
    let b: Vec<Card> = (0..10).map(|_| d2.draw().unwrap()).collect();
    assert_eq!(a, b, "same seed must yield identical order");
}

#[test]
fn shuffle_differs_with_different_seed() {
    let mut d1 = Deck::new_with_seed(1);
    let mut d2 = Deck::new_with_seed(2);
    d1.shuffle();
    d2.shuffle();
    let a: Vec<Card> = (0..52).map(|_| d1.draw().unwrap()).collect();
    let b: Vec<Card> = (0..52).map(|_| d2.draw().unwrap()).collect();
    assert_ne!(a, b);
}

#[test]
fn reshuffle_restores_full_deck() {
    let mut deck = Deck::new_with_seed(9);
    deck.shuffle();
    deck.burn_card().unwrap();
    for _ in 0..10 {
        deck.draw().unwrap();
    }
    assert_eq!(deck.remaining(), 41);
    deck.shuffle();
    assert_eq!(deck.remaining(), 52);
}

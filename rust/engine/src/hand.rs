use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Suit};
use crate::errors::GameError;
use crate::player::PlayerId;

/// The ten canonical hand categories, weakest first.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandCategory {
    HighCard = 1,
    OnePair = 2,
    TwoPair = 3,
    ThreeOfAKind = 4,
    Straight = 5,
    Flush = 6,
    FullHouse = 7,
    FourOfAKind = 8,
    StraightFlush = 9,
    RoyalFlush = 10,
}

impl HandCategory {
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            HandCategory::HighCard => "High Card",
            HandCategory::OnePair => "One Pair",
            HandCategory::TwoPair => "Two Pair",
            HandCategory::ThreeOfAKind => "Three of a Kind",
            HandCategory::Straight => "Straight",
            HandCategory::Flush => "Flush",
            HandCategory::FullHouse => "Full House",
            HandCategory::FourOfAKind => "Four of a Kind",
            HandCategory::StraightFlush => "Straight Flush",
            HandCategory::RoyalFlush => "Royal Flush",
        }
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Totally ordered strength of a five-card hand.
///
/// Ordering is by category, then lexicographically by `tiebreak`: the ranks
/// that decide between two hands of the same category, most significant first
/// (quad rank then kicker, trips then pair, and so on). A straight is keyed by
/// its high card, which is 5 for the wheel.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct HandRank {
    pub category: HandCategory,
    pub tiebreak: Vec<u8>,
}

impl Ord for HandRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.tiebreak.cmp(&other.tiebreak))
    }
}

impl PartialOrd for HandRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Classifies exactly five cards. Input order does not matter.
pub fn evaluate_five(cards: &[Card; 5]) -> HandRank {
    let mut rank_counts = [0u8; 15]; // 2..14 used
    let mut suit_counts = [0u8; 4];
    for c in cards {
        rank_counts[c.rank.value() as usize] += 1;
        suit_counts[suit_index(c.suit)] += 1;
    }
    let is_flush = suit_counts.iter().any(|&n| n == 5);
    let straight_high = detect_straight_high(&rank_counts);

    if let (true, Some(high)) = (is_flush, straight_high) {
        let category = if high == 14 {
            HandCategory::RoyalFlush
        } else {
            HandCategory::StraightFlush
        };
        return HandRank {
            category,
            tiebreak: vec![high],
        };
    }

    // ranks grouped by multiplicity, larger groups first, then higher rank
    let mut groups: Vec<(u8, u8)> = (2..=14u8)
        .rev()
        .filter(|&r| rank_counts[r as usize] > 0)
        .map(|r| (rank_counts[r as usize], r))
        .collect();
    groups.sort_by(|a, b| b.cmp(a));
    let ordered: Vec<u8> = groups.iter().map(|&(_, r)| r).collect();

    let category = match (groups[0].0, groups.get(1).map(|g| g.0)) {
        (4, _) => HandCategory::FourOfAKind,
        (3, Some(2)) => HandCategory::FullHouse,
        _ if is_flush => HandCategory::Flush,
        _ if straight_high.is_some() => HandCategory::Straight,
        (3, _) => HandCategory::ThreeOfAKind,
        (2, Some(2)) => HandCategory::TwoPair,
        (2, _) => HandCategory::OnePair,
        _ => HandCategory::HighCard,
    };

    let tiebreak = match (category, straight_high) {
        (HandCategory::Straight, Some(high)) => vec![high],
        _ => ordered,
    };
    HandRank { category, tiebreak }
}

/// Best five-card rank from two hole cards and a board of 3 to 5 cards.
///
/// Every five-card subset is scored (21 of them with a full board) and the
/// maximum is returned.
///
/// # Errors
///
/// [`GameError::InvalidBoard`] when the board holds fewer than 3 or more than 5 cards.
///
/// # Examples
///
/// ```
/// use holdem_engine::cards::parse_cards;
/// use holdem_engine::hand::{evaluate, HandCategory};
///
/// let hole = parse_cards("As Ks").unwrap();
/// let board = parse_cards("Qs Js Ts").unwrap();
/// let rank = evaluate([hole[0], hole[1]], &board).unwrap();
/// assert_eq!(rank.category, HandCategory::RoyalFlush);
/// ```
pub fn evaluate(hole: [Card; 2], board: &[Card]) -> Result<HandRank, GameError> {
    if !(3..=5).contains(&board.len()) {
        return Err(GameError::InvalidBoard { cards: board.len() });
    }
    let mut all = Vec::with_capacity(7);
    all.extend_from_slice(&hole);
    all.extend_from_slice(board);
    best_of(&all).ok_or(GameError::InvalidBoard { cards: board.len() })
}

/// Highest rank over every five-card combination of `cards`.
pub fn best_of(cards: &[Card]) -> Option<HandRank> {
    let n = cards.len();
    if n < 5 {
        return None;
    }
    let mut best: Option<HandRank> = None;
    for a in 0..n {
        for b in a + 1..n {
            for c in b + 1..n {
                for d in c + 1..n {
                    for e in d + 1..n {
                        let rank = evaluate_five(&[cards[a], cards[b], cards[c], cards[d], cards[e]]);
                        if best.as_ref().map_or(true, |cur| rank > *cur) {
                            best = Some(rank);
                        }
                    }
                }
            }
        }
    }
    best
}

/// Every player whose rank equals the maximum. More than one id means a split.
pub fn compare_hands(ranks: &BTreeMap<PlayerId, HandRank>) -> Vec<PlayerId> {
    let Some(best) = ranks.values().max() else {
        return Vec::new();
    };
    ranks
        .iter()
        .filter(|(_, rank)| *rank == best)
        .map(|(id, _)| id.clone())
        .collect()
}

fn suit_index(s: Suit) -> usize {
    match s {
        Suit::Clubs => 0,
        Suit::Diamonds => 1,
        Suit::Hearts => 2,
        Suit::Spades => 3,
    }
}

/// High card of a five-rank run, with the ace also playing low (A-2-3-4-5 is 5-high).
fn detect_straight_high(rank_counts: &[u8; 15]) -> Option<u8> {
    let present = |r: u8| rank_counts[r as usize] > 0;
    (5..=14u8).rev().find(|&high| {
        (high - 4..=high).all(|r| if r == 1 { present(14) } else { present(r) })
    })
}

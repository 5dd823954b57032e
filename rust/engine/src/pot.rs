//! Main and side pot construction from per-player hand commitments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::GameError;
use crate::game::Phase;
use crate::hand::{compare_hands, HandRank};
use crate::player::{Player, PlayerId};

/// A pot and the players who can win it, in seat order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: u32,
    pub eligible: Vec<PlayerId>,
}

/// What one player put into the hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub player_id: PlayerId,
    pub total: u32,
    pub folded: bool,
}

impl Contribution {
    pub fn new(player_id: impl Into<PlayerId>, total: u32, folded: bool) -> Self {
        Self {
            player_id: player_id.into(),
            total,
            folded,
        }
    }
}

pub fn contributions(players: &[Player]) -> Vec<Contribution> {
    players
        .iter()
        .map(|p| Contribution::new(p.id(), p.total_bet_this_hand(), !p.in_hand()))
        .collect()
}

/// Result of a hand where everyone but one player folded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uncontested {
    pub winner: PlayerId,
    pub pot: Pot,
    /// Excess the winner bet that nobody called; goes straight back to their stack
    pub uncalled: u32,
}

/// Chips paid out of one pot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotAward {
    pub pot_index: usize,
    pub amount: u32,
    pub winners: Vec<PlayerId>,
    pub payouts: Vec<(PlayerId, u32)>,
}

/// Splits commitments into a main pot and side pots.
///
/// Levels are the distinct positive commitments of players still in the hand.
/// Each level takes `min(level, c) - min(previous, c)` from every contribution,
/// folded ones included, and is eligible to the live players who reached it.
pub fn calculate_pots(contributions: &[Contribution]) -> Vec<Pot> {
    let mut levels: Vec<u32> = contributions
        .iter()
        .filter(|c| !c.folded && c.total > 0)
        .map(|c| c.total)
        .collect();
    levels.sort_unstable();
    levels.dedup();

    let mut pots = Vec::with_capacity(levels.len());
    let mut previous = 0u32;
    for &level in &levels {
        let amount: u32 = contributions
            .iter()
            .map(|c| c.total.min(level) - c.total.min(previous))
            .sum();
        let eligible: Vec<PlayerId> = contributions
            .iter()
            .filter(|c| !c.folded && c.total >= level)
            .map(|c| c.player_id.clone())
            .collect();
        previous = level;
        if amount == 0 || eligible.is_empty() {
            continue;
        }
        pots.push(Pot { amount, eligible });
    }

    let total: u32 = contributions.iter().map(|c| c.total).sum();
    let assigned: u32 = pots.iter().map(|p| p.amount).sum();
    if total > assigned {
        let stray = total - assigned;
        tracing::warn!(stray, "folded chips above the highest live level");
        match pots.last_mut() {
            Some(last) => last.amount += stray,
            None => pots.push(Pot {
                amount: stray,
                eligible: contributions
                    .iter()
                    .filter(|c| !c.folded)
                    .map(|c| c.player_id.clone())
                    .collect(),
            }),
        }
    }
    pots
}

/// Everyone else folded: the sole survivor takes the pot without a showdown.
///
/// Returns `None` unless exactly one contribution is live.
pub fn settle_uncontested(contributions: &[Contribution]) -> Option<Uncontested> {
    let mut live = contributions.iter().filter(|c| !c.folded);
    let winner = live.next()?;
    if live.next().is_some() {
        return None;
    }
    let called = contributions
        .iter()
        .filter(|c| c.folded)
        .map(|c| c.total)
        .max()
        .unwrap_or(0);
    let uncalled = winner.total.saturating_sub(called);
    let total: u32 = contributions.iter().map(|c| c.total).sum();
    Some(Uncontested {
        winner: winner.player_id.clone(),
        pot: Pot {
            amount: total - uncalled,
            eligible: vec![winner.player_id.clone()],
        },
        uncalled,
    })
}

/// Pays every pot to its best eligible hands.
///
/// `seat_order` lists players starting left of the dealer; a split pot's odd
/// chips go to the first winner in that order.
pub fn award_pots(
    pots: &[Pot],
    rankings: &BTreeMap<PlayerId, HandRank>,
    seat_order: &[PlayerId],
) -> Result<Vec<PotAward>, GameError> {
    let mut awards = Vec::with_capacity(pots.len());
    for (pot_index, pot) in pots.iter().enumerate() {
        let contenders: BTreeMap<PlayerId, HandRank> = pot
            .eligible
            .iter()
            .filter_map(|id| rankings.get(id).map(|r| (id.clone(), r.clone())))
            .collect();
        let best = compare_hands(&contenders);
        let winners: Vec<PlayerId> = seat_order
            .iter()
            .filter(|id| best.contains(id))
            .cloned()
            .collect();
        if winners.is_empty() {
            return Err(GameError::Internal {
                phase: Phase::Showdown,
                message: format!("pot {pot_index} has no ranked contender"),
            });
        }
        let share = pot.amount / winners.len() as u32;
        let odd = pot.amount % winners.len() as u32;
        let payouts = winners
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), if i == 0 { share + odd } else { share }))
            .collect();
        awards.push(PotAward {
            pot_index,
            amount: pot.amount,
            winners,
            payouts,
        });
    }
    Ok(awards)
}

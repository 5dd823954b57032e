use chrono::{DateTime, Utc};
use holdem_engine::logger::HandRecord;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;
use thiserror::Error;

const DEFAULT_CAPACITY: usize = 500;

/// Completed hands of one session, oldest dropped first once full.
#[derive(Debug)]
pub struct HistoryStore {
    capacity: usize,
    hands: RwLock<VecDeque<HandRecord>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            hands: RwLock::new(VecDeque::with_capacity(capacity.min(64))),
        }
    }

    /// Add a hand record to the history
    pub fn add_hand(&self, record: HandRecord) -> Result<(), HistoryError> {
        let mut hands = self
            .hands
            .write()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        if hands.len() == self.capacity {
            if let Some(evicted) = hands.pop_front() {
                tracing::debug!(hand_id = %evicted.hand_id, "history full, dropping oldest hand");
            }
        }
        tracing::debug!(hand_id = %record.hand_id, pot = record.total_pot(), "hand archived");
        hands.push_back(record);
        Ok(())
    }

    /// Newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<HandRecord>, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(hands.iter().rev().take(limit).cloned().collect())
    }

    /// Every stored hand in play order.
    pub fn all(&self) -> Result<Vec<HandRecord>, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(hands.iter().cloned().collect())
    }

    pub fn get_hand(&self, hand_id: &str) -> Result<HandRecord, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        hands
            .iter()
            .find(|h| h.hand_id == hand_id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(hand_id.to_string()))
    }

    /// Hands matching every criterion set on `filter`, in play order.
    pub fn filter(&self, filter: &HandFilter) -> Result<Vec<HandRecord>, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(hands.iter().filter(|h| filter.matches(h)).cloned().collect())
    }

    /// Results of `player_id` over the stored hands they were dealt into.
    pub fn statistics(&self, player_id: &str) -> Result<HandStatistics, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;

        let mut stats = HandStatistics::default();
        let mut total_pot = 0u64;
        for hand in hands.iter() {
            let Some(result) = hand.result_for(player_id) else {
                continue;
            };
            stats.total_hands += 1;
            if result.winnings > 0 {
                stats.wins += 1;
            }
            stats.net_chips += result.net;
            total_pot += u64::from(hand.total_pot());
        }

        if stats.total_hands > 0 {
            let n = stats.total_hands as f64;
            stats.win_rate = stats.wins as f64 / n * 100.0;
            stats.avg_pot_size = total_pot as f64 / n;
        }
        Ok(stats)
    }

    pub fn total_hands(&self) -> Result<usize, HistoryError> {
        let hands = self
            .hands
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(hands.len())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter criteria for hand history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandFilter {
    /// Only hands this player was dealt into
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(default)]
    pub showdown_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pot: Option<u32>,
    /// Only hands finished at or after this instant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
}

impl HandFilter {
    fn matches(&self, hand: &HandRecord) -> bool {
        if let Some(player_id) = &self.player_id {
            if hand.result_for(player_id).is_none() {
                return false;
            }
        }

        if self.showdown_only && hand.showdown.is_none() {
            return false;
        }

        if let Some(min_pot) = self.min_pot {
            if hand.total_pot() < min_pot {
                return false;
            }
        }

        if let Some(since) = self.since {
            let finished = hand
                .ts
                .as_deref()
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc));
            match finished {
                Some(ts) if ts >= since => {}
                _ => return false,
            }
        }

        true
    }
}

/// Statistics calculated from hand history
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HandStatistics {
    pub total_hands: usize,
    pub wins: usize,
    /// Percentage of hands with any winnings
    pub win_rate: f64,
    pub net_chips: i64,
    pub avg_pot_size: f64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("History storage poisoned")]
    StoragePoisoned,
    #[error("Hand not found: {0}")]
    NotFound(String),
}

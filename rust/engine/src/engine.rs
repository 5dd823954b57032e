use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::cards::Card;
use crate::deck::Deck;
use crate::errors::GameError;
use crate::events::HandEvent;
use crate::game::{rotate_dealer, ButtonSeats, Phase};
use crate::hand::{evaluate, HandRank};
use crate::logger::{next_hand_id, timestamp, ActionRecord, HandRecord, PlayerResult, ShowdownInfo};
use crate::player::{ActionKind, Player, PlayerAction, PlayerId, Seat};
use crate::pot::{award_pots, calculate_pots, contributions, settle_uncontested, Pot};
use crate::rules::{validate_action, BetContext, ValidatedAction};
use crate::view::{PlayerView, StateView};

pub const MIN_SEATS: usize = 2;
pub const MAX_SEATS: usize = 10;

/// What happens once every remaining player is all-in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunoutMode {
    /// Deal the remaining streets and resolve the showdown in the same transition
    #[default]
    Automatic,
    /// Wait for [`Engine::deal_next_street`] or [`Engine::advance_all_in_streets`]
    Paced,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    pub small_blind: u32,
    pub big_blind: u32,
    /// Deck seed; `None` draws one at random
    pub seed: Option<u64>,
    #[serde(default)]
    pub runout: RunoutMode,
}

impl TableConfig {
    /// Blinds of `big_blind / 2` and `big_blind`.
    pub fn with_big_blind(big_blind: u32) -> Self {
        Self {
            small_blind: big_blind / 2,
            big_blind,
            seed: None,
            runout: RunoutMode::Automatic,
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn paced(mut self) -> Self {
        self.runout = RunoutMode::Paced;
        self
    }

    fn validate(&self) -> Result<(), GameError> {
        if self.big_blind == 0 {
            return Err(GameError::InvalidConfig("big blind must be positive".into()));
        }
        if self.small_blind > self.big_blind {
            return Err(GameError::InvalidConfig(format!(
                "small blind {} exceeds big blind {}",
                self.small_blind, self.big_blind
            )));
        }
        Ok(())
    }
}

/// Betting state machine for a single table.
///
/// Every mutating call either fails with a rejection before touching state, or
/// applies a full transition and returns the [`HandEvent`]s it produced. Internal
/// failures (see [`GameError::is_rejection`]) can leave a transition half
/// applied; callers that need atomicity keep a clone to restore.
///
/// # Examples
///
/// ```
/// use holdem_engine::engine::{Engine, TableConfig};
/// use holdem_engine::game::Phase;
/// use holdem_engine::player::{PlayerAction, Seat};
///
/// let seats = vec![Seat::new("alice", "Alice", 1000), Seat::new("bob", "Bob", 1000)];
/// let mut engine = Engine::new(seats, TableConfig::with_big_blind(20).seeded(7)).unwrap();
/// engine.start_new_hand().unwrap();
/// assert_eq!(engine.phase(), Phase::PreFlop);
///
/// let first = engine.action_on_player().unwrap().to_string();
/// engine.apply_action(&first, PlayerAction::Fold).unwrap();
/// assert_eq!(engine.phase(), Phase::HandOver);
/// assert_eq!(engine.chips_in_play(), 2000);
/// ```
#[derive(Debug, Clone)]
pub struct Engine {
    config: TableConfig,
    deck: Deck,
    players: Vec<Player>,
    board: Vec<Card>,
    pots: Vec<Pot>,
    /// Pots hold the hand's chips; set at all-in lock or showdown
    pots_locked: bool,
    /// Pots were paid out and `total_bet_this_hand` no longer holds chips
    settled: bool,
    current_bet: u32,
    min_raise: u32,
    dealer: usize,
    buttons: Option<ButtonSeats>,
    action_on: Option<usize>,
    phase: Phase,
    hand_number: u64,
    runout_pending: bool,
    actions: Vec<ActionRecord>,
    starting_stacks: Vec<u32>,
    winnings: Vec<u32>,
    initial_chips: u64,
    last_record: Option<HandRecord>,
}

impl Engine {
    /// Seats players in the given order. The first dealer is drawn from the deck's RNG.
    pub fn new(seats: Vec<Seat>, config: TableConfig) -> Result<Self, GameError> {
        config.validate()?;
        if !(MIN_SEATS..=MAX_SEATS).contains(&seats.len()) {
            return Err(GameError::InvalidConfig(format!(
                "{} seats, need {MIN_SEATS} to {MAX_SEATS}",
                seats.len()
            )));
        }
        let mut seen = HashSet::new();
        for seat in &seats {
            if seat.id.is_empty() || !seen.insert(seat.id.as_str()) {
                return Err(GameError::InvalidConfig(format!(
                    "player id {:?} is empty or repeated",
                    seat.id
                )));
            }
        }

        let mut deck = match config.seed {
            Some(seed) => Deck::new_with_seed(seed),
            None => Deck::new_random(),
        };
        let dealer = deck.pick_index(seats.len());
        let players: Vec<Player> = seats
            .into_iter()
            .enumerate()
            .map(|(i, seat)| Player::new(seat, i))
            .collect();
        let initial_chips: u64 = players.iter().map(|p| u64::from(p.stack())).sum();
        // pots and totals are u32 sums over every seat
        if initial_chips > u64::from(u32::MAX) {
            return Err(GameError::InvalidConfig(format!(
                "{initial_chips} chips seated, at most {} fit a pot",
                u32::MAX
            )));
        }
        let n = players.len();
        Ok(Self {
            min_raise: config.big_blind,
            config,
            deck,
            players,
            board: Vec::with_capacity(5),
            pots: Vec::new(),
            pots_locked: false,
            settled: true,
            current_bet: 0,
            dealer,
            buttons: None,
            action_on: None,
            phase: Phase::Waiting,
            hand_number: 0,
            runout_pending: false,
            actions: Vec::new(),
            starting_stacks: vec![0; n],
            winnings: vec![0; n],
            initial_chips,
            last_record: None,
        })
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }
    pub fn players(&self) -> &[Player] {
        &self.players
    }
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id() == id)
    }
    pub fn board(&self) -> &[Card] {
        &self.board
    }
    pub fn pots(&self) -> &[Pot] {
        &self.pots
    }
    pub fn phase(&self) -> Phase {
        self.phase
    }
    pub fn hand_number(&self) -> u64 {
        self.hand_number
    }
    pub fn current_bet(&self) -> u32 {
        self.current_bet
    }
    pub fn min_raise(&self) -> u32 {
        self.min_raise
    }
    pub fn dealer(&self) -> usize {
        self.dealer
    }
    pub fn buttons(&self) -> Option<ButtonSeats> {
        self.buttons
    }
    /// Seat whose turn it is; `None` when nobody can act.
    pub fn action_on(&self) -> Option<usize> {
        self.action_on
    }
    pub fn action_on_player(&self) -> Option<&str> {
        self.action_on.map(|i| self.players[i].id())
    }
    pub fn is_runout_pending(&self) -> bool {
        self.runout_pending
    }
    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }
    pub fn last_hand_record(&self) -> Option<&HandRecord> {
        self.last_record.as_ref()
    }
    pub fn deck_remaining(&self) -> usize {
        self.deck.remaining()
    }

    /// Chips seated at table creation.
    pub fn initial_chips(&self) -> u64 {
        self.initial_chips
    }

    /// Stacks plus chips committed to an unsettled hand. Equals
    /// [`Engine::initial_chips`] after every transition.
    pub fn chips_in_play(&self) -> u64 {
        let stacks: u64 = self.players.iter().map(|p| u64::from(p.stack())).sum();
        if self.settled {
            stacks
        } else {
            stacks
                + self
                    .players
                    .iter()
                    .map(|p| u64::from(p.total_bet_this_hand()))
                    .sum::<u64>()
        }
    }

    /// Rotates the button, posts blinds and deals hole cards.
    ///
    /// With at most one funded player the table ends instead: the phase becomes
    /// [`Phase::GameOver`] and a single [`HandEvent::GameOver`] is returned.
    pub fn start_new_hand(&mut self) -> Result<Vec<HandEvent>, GameError> {
        match self.phase {
            Phase::Waiting | Phase::HandOver => {}
            Phase::GameOver => return Err(GameError::GameOver),
            _ => return Err(GameError::HandInProgress),
        }

        let mut funded = self.players.iter().filter(|p| p.stack() > 0);
        let first_funded = funded.next().map(|p| p.id().to_string());
        if funded.next().is_none() {
            tracing::info!(winner = ?first_funded, "one funded player left, game over");
            self.phase = Phase::GameOver;
            self.action_on = None;
            return Ok(vec![HandEvent::GameOver {
                winner: first_funded,
            }]);
        }

        self.dealer = if self.hand_number == 0 && self.players[self.dealer].stack() > 0 {
            self.dealer
        } else {
            rotate_dealer(&self.players, self.dealer).ok_or_else(|| self.internal("no seat for the button"))?
        };
        let buttons = ButtonSeats::for_dealer(&self.players, self.dealer)
            .ok_or_else(|| self.internal("cannot place blinds"))?;

        for p in &mut self.players {
            p.reset_for_new_hand();
        }
        self.starting_stacks = self.players.iter().map(|p| p.stack()).collect();
        self.winnings = vec![0; self.players.len()];
        self.board.clear();
        self.pots.clear();
        self.pots_locked = false;
        self.settled = false;
        self.runout_pending = false;
        self.actions.clear();
        self.deck.shuffle();
        self.hand_number += 1;
        self.buttons = Some(buttons);
        self.phase = Phase::PreFlop;
        tracing::info!(
            hand_number = self.hand_number,
            dealer = buttons.dealer,
            "hand started"
        );

        let mut events = vec![HandEvent::HandStarted {
            hand_number: self.hand_number,
            dealer: buttons.dealer,
            small_blind: buttons.small_blind,
            big_blind: buttons.big_blind,
        }];
        events.push(self.post_blind(buttons.small_blind, self.config.small_blind, false)?);
        events.push(self.post_blind(buttons.big_blind, self.config.big_blind, true)?);
        self.current_bet = self.config.big_blind;
        self.min_raise = self.config.big_blind;

        // two passes starting left of the dealer
        let n = self.players.len();
        for _ in 0..2 {
            for offset in 1..=n {
                let idx = (self.dealer + offset) % n;
                if self.players[idx].in_hand() {
                    let card = self.deck.draw()?;
                    self.players[idx].give_card(card)?;
                }
            }
        }
        events.push(HandEvent::HoleCardsDealt {
            players: self
                .players
                .iter()
                .filter(|p| p.in_hand())
                .map(|p| p.id().to_string())
                .collect(),
        });

        self.progress(buttons.big_blind, &mut events)?;
        Ok(events)
    }

    /// Validates and applies one betting action, then advances the hand as far
    /// as it goes without further input.
    pub fn apply_action(
        &mut self,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<Vec<HandEvent>, GameError> {
        match self.phase {
            Phase::Waiting => return Err(GameError::NoHandInProgress),
            Phase::Showdown | Phase::HandOver => return Err(GameError::HandAlreadyComplete),
            Phase::GameOver => return Err(GameError::GameOver),
            Phase::PreFlop | Phase::Flop | Phase::Turn | Phase::River => {}
        }
        let idx = self
            .seat_of(player_id)
            .ok_or_else(|| GameError::UnknownPlayer(player_id.to_string()))?;
        let player = &self.players[idx];
        if !player.in_hand() {
            return Err(GameError::PlayerAlreadyFolded);
        }
        if player.stack() == 0 {
            return Err(GameError::PlayerAllIn);
        }
        if self.action_on != Some(idx) {
            return Err(GameError::NotPlayersTurn {
                expected: self.action_on_player().unwrap_or("nobody").to_string(),
                actual: player_id.to_string(),
            });
        }

        let validated = validate_action(
            &BetContext {
                stack: player.stack(),
                player_bet: player.current_bet(),
                table_bet: self.current_bet,
                min_raise: self.min_raise,
                raise_locked: player.is_raise_locked(),
            },
            action,
        )?;
        let street = self
            .phase
            .street()
            .ok_or_else(|| self.internal("betting outside a street"))?;

        let kind = validated.kind();
        let cost = validated.cost();
        let previous_bet = self.current_bet;
        self.players[idx].commit(cost)?;
        match validated {
            ValidatedAction::Fold => self.players[idx].fold(),
            ValidatedAction::Check | ValidatedAction::Call(_) => {}
            ValidatedAction::Raise { to, .. } => {
                self.min_raise = self.min_raise.max(to - previous_bet);
                self.current_bet = to;
                self.clear_raise_locks();
            }
            ValidatedAction::AllIn(_) => {
                let new_bet = self.players[idx].current_bet();
                if new_bet > previous_bet {
                    let increment = new_bet - previous_bet;
                    if increment >= self.min_raise {
                        self.min_raise = increment;
                        self.clear_raise_locks();
                    } else {
                        self.lock_matched_players(idx, previous_bet);
                    }
                    self.current_bet = new_bet;
                }
            }
        }
        if kind != ActionKind::Fold {
            self.players[idx].set_last_action(kind);
        }

        tracing::debug!(player_id, action = %kind, amount = cost, ?street, "action applied");
        self.actions.push(ActionRecord {
            player_id: player_id.to_string(),
            street,
            action: kind,
            amount: cost,
        });
        let mut events = vec![HandEvent::ActionTaken {
            player_id: player_id.to_string(),
            action: kind,
            amount: cost,
            street,
        }];
        self.progress(idx, &mut events)?;
        Ok(events)
    }

    /// Deals one street of a pending all-in runout; resolves the showdown once
    /// the river is out.
    pub fn deal_next_street(&mut self) -> Result<Vec<HandEvent>, GameError> {
        if !self.runout_pending {
            return Err(GameError::NoRunoutPending);
        }
        let mut events = Vec::new();
        self.deal_street(&mut events)?;
        if self.board.len() == 5 {
            self.showdown(&mut events)?;
        }
        Ok(events)
    }

    /// Deals every remaining street of a pending all-in runout and resolves the showdown.
    pub fn advance_all_in_streets(&mut self) -> Result<Vec<HandEvent>, GameError> {
        if !self.runout_pending {
            return Err(GameError::NoRunoutPending);
        }
        let mut events = Vec::new();
        self.run_out_board(&mut events)?;
        self.showdown(&mut events)?;
        Ok(events)
    }

    /// Projects the table for `viewer`, hiding hole cards they may not see.
    pub fn view(&self, viewer: Option<&str>) -> StateView {
        let buttons = self.buttons;
        let players = self
            .players
            .iter()
            .map(|p| {
                let holds = !p.hole_cards().is_empty();
                let visible = holds && (viewer == Some(p.id()) || p.is_revealed());
                let seat = p.position();
                PlayerView {
                    id: p.id().to_string(),
                    display_name: p.display_name().to_string(),
                    stack: p.stack(),
                    seat,
                    current_bet: p.current_bet(),
                    total_bet_this_hand: p.total_bet_this_hand(),
                    has_folded: p.has_folded(),
                    sitting_out: p.is_sitting_out(),
                    last_action: p.last_action(),
                    is_dealer: buttons.is_some_and(|b| b.dealer == seat),
                    is_small_blind: buttons.is_some_and(|b| b.small_blind == seat),
                    is_big_blind: buttons.is_some_and(|b| b.big_blind == seat),
                    is_all_in: p.is_all_in(),
                    raise_locked: p.is_raise_locked(),
                    hole_cards: visible.then(|| p.hole_cards().to_vec()),
                    cards_hidden: holds && !visible,
                }
            })
            .collect();
        let current_pot_total = if self.pots_locked {
            self.pots.iter().map(|p| p.amount).sum()
        } else if self.settled {
            0
        } else {
            self.players.iter().map(|p| p.total_bet_this_hand()).sum()
        };
        StateView {
            phase: self.phase,
            hand_number: self.hand_number,
            dealer: buttons.map(|b| b.dealer),
            small_blind_seat: buttons.map(|b| b.small_blind),
            big_blind_seat: buttons.map(|b| b.big_blind),
            board: self.board.clone(),
            pots: self.pots.clone(),
            current_bet: self.current_bet,
            min_raise: self.min_raise,
            action_on: self.action_on,
            action_on_player: self.action_on_player().map(str::to_string),
            small_blind: self.config.small_blind,
            big_blind: self.config.big_blind,
            current_pot_total,
            runout_pending: self.runout_pending,
            players,
        }
    }

    fn seat_of(&self, id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.id() == id)
    }

    fn internal(&self, message: &str) -> GameError {
        GameError::Internal {
            phase: self.phase,
            message: message.to_string(),
        }
    }

    fn post_blind(&mut self, seat: usize, blind: u32, big: bool) -> Result<HandEvent, GameError> {
        let player = &mut self.players[seat];
        let amount = blind.min(player.stack());
        player.commit(amount)?;
        Ok(HandEvent::BlindPosted {
            player_id: player.id().to_string(),
            amount,
            big,
        })
    }

    fn clear_raise_locks(&mut self) {
        for p in &mut self.players {
            p.set_raise_locked(false);
        }
    }

    /// A short all-in does not reopen betting for players who already acted
    /// and matched the bet it topped.
    fn lock_matched_players(&mut self, shover: usize, previous_bet: u32) {
        for (i, p) in self.players.iter_mut().enumerate() {
            if i != shover
                && p.can_act()
                && p.last_action().is_some()
                && p.current_bet() == previous_bet
            {
                p.set_raise_locked(true);
            }
        }
    }

    /// First seat after `from`, wrapping around to `from` itself, that still owes action.
    fn next_to_act(&self, from: usize) -> Option<usize> {
        let n = self.players.len();
        (1..=n).map(|offset| (from + offset) % n).find(|&idx| {
            let p = &self.players[idx];
            p.can_act() && (p.last_action().is_none() || p.current_bet() < self.current_bet)
        })
    }

    fn in_hand_count(&self) -> usize {
        self.players.iter().filter(|p| p.in_hand()).count()
    }

    fn can_act_count(&self) -> usize {
        self.players.iter().filter(|p| p.can_act()).count()
    }

    fn round_complete(&self) -> bool {
        if self.in_hand_count() <= 1 {
            return true;
        }
        let mut funded = self.players.iter().filter(|p| p.can_act());
        match (funded.next(), funded.next()) {
            (None, _) => true,
            // a lone player with chips has nobody left to bet against
            (Some(p), None) if p.current_bet() >= self.current_bet => true,
            _ => self.next_to_act(0).is_none(),
        }
    }

    /// Moves the hand forward after a transition: passes the turn, ends the
    /// round, runs out the board or settles the hand.
    fn progress(&mut self, from: usize, events: &mut Vec<HandEvent>) -> Result<(), GameError> {
        if self.in_hand_count() == 1 {
            return self.finish_uncontested(events);
        }
        if !self.round_complete() {
            self.action_on = self.next_to_act(from);
            if self.action_on.is_none() {
                return Err(self.internal("open round with nobody to act"));
            }
            return Ok(());
        }

        self.action_on = None;
        if self.phase == Phase::River {
            return self.showdown(events);
        }
        if self.can_act_count() < 2 {
            self.lock_pots(events);
            return match self.config.runout {
                RunoutMode::Automatic => {
                    self.run_out_board(events)?;
                    self.showdown(events)
                }
                RunoutMode::Paced => {
                    tracing::debug!(board = self.board.len(), "all-in runout pending");
                    self.runout_pending = true;
                    Ok(())
                }
            };
        }

        for p in &mut self.players {
            p.reset_for_new_round();
        }
        self.current_bet = 0;
        self.min_raise = self.config.big_blind;
        self.deal_street(events)?;
        self.action_on = self.next_to_act(self.dealer);
        if self.action_on.is_none() {
            return Err(self.internal("new street with nobody to act"));
        }
        Ok(())
    }

    fn deal_street(&mut self, events: &mut Vec<HandEvent>) -> Result<(), GameError> {
        let next = match self.phase.next_street() {
            Some(next) if next != Phase::Showdown => next,
            _ => return Err(self.internal("no street left to deal")),
        };
        let count = if next == Phase::Flop { 3 } else { 1 };
        self.deck.burn_card()?;
        let mut cards = Vec::with_capacity(count);
        for _ in 0..count {
            cards.push(self.deck.draw()?);
        }
        self.board.extend_from_slice(&cards);
        self.phase = next;
        let street = next
            .street()
            .ok_or_else(|| self.internal("dealt phase has no street"))?;
        tracing::debug!(?street, board = self.board.len(), "street dealt");
        events.push(HandEvent::StreetDealt { street, cards });
        Ok(())
    }

    fn run_out_board(&mut self, events: &mut Vec<HandEvent>) -> Result<(), GameError> {
        while self.board.len() < 5 {
            self.deal_street(events)?;
        }
        Ok(())
    }

    fn lock_pots(&mut self, events: &mut Vec<HandEvent>) {
        self.pots = calculate_pots(&contributions(&self.players));
        self.pots_locked = true;
        events.push(HandEvent::PotsLocked {
            pots: self.pots.clone(),
        });
    }

    fn finish_uncontested(&mut self, events: &mut Vec<HandEvent>) -> Result<(), GameError> {
        let settled = settle_uncontested(&contributions(&self.players))
            .ok_or_else(|| self.internal("fold-out without a single survivor"))?;
        let winner = self
            .seat_of(&settled.winner)
            .ok_or_else(|| self.internal("fold-out winner is not seated"))?;
        if settled.uncalled > 0 {
            self.players[winner].refund(settled.uncalled);
            events.push(HandEvent::UncalledBetReturned {
                player_id: settled.winner.clone(),
                amount: settled.uncalled,
            });
        }
        self.players[winner].add_chips(settled.pot.amount);
        self.winnings[winner] += settled.pot.amount;
        events.push(HandEvent::PotAwarded {
            pot_index: 0,
            amount: settled.pot.amount,
            winners: vec![settled.winner.clone()],
        });
        self.pots = vec![settled.pot];
        self.pots_locked = true;
        self.settled = true;
        tracing::info!(winner = %settled.winner, hand_number = self.hand_number, "hand won uncontested");
        self.finish_hand(None, events);
        Ok(())
    }

    fn showdown(&mut self, events: &mut Vec<HandEvent>) -> Result<(), GameError> {
        if self.board.len() < 5 {
            tracing::error!(cards = self.board.len(), "showdown with incomplete board");
            return Err(GameError::IncompleteBoard {
                cards: self.board.len(),
            });
        }
        self.phase = Phase::Showdown;
        self.action_on = None;
        self.runout_pending = false;
        if !self.pots_locked {
            self.lock_pots(events);
        }

        let mut rankings: BTreeMap<PlayerId, HandRank> = BTreeMap::new();
        for idx in 0..self.players.len() {
            if !self.players[idx].in_hand() {
                continue;
            }
            let hole: [Card; 2] = self.players[idx]
                .hole_cards()
                .try_into()
                .map_err(|_| self.internal("player at showdown without two hole cards"))?;
            let rank = evaluate(hole, &self.board)?;
            let player = &mut self.players[idx];
            player.reveal();
            events.push(HandEvent::CardsRevealed {
                player_id: player.id().to_string(),
                cards: hole.to_vec(),
                category: rank.category,
            });
            rankings.insert(player.id().to_string(), rank);
        }

        let n = self.players.len();
        let seat_order: Vec<PlayerId> = (1..=n)
            .map(|offset| self.players[(self.dealer + offset) % n].id().to_string())
            .collect();
        let awards = award_pots(&self.pots, &rankings, &seat_order)?;

        let mut winners: Vec<PlayerId> = Vec::new();
        let mut split = false;
        for award in &awards {
            split |= award.winners.len() > 1;
            for (id, amount) in &award.payouts {
                let idx = self
                    .seat_of(id)
                    .ok_or_else(|| self.internal("pot winner is not seated"))?;
                self.players[idx].add_chips(*amount);
                self.winnings[idx] += amount;
                if !winners.contains(id) {
                    winners.push(id.clone());
                }
            }
            events.push(HandEvent::PotAwarded {
                pot_index: award.pot_index,
                amount: award.amount,
                winners: award.winners.clone(),
            });
        }
        self.settled = true;

        let notes = if split {
            "split pot".to_string()
        } else {
            winners
                .first()
                .and_then(|id| rankings.get(id))
                .map(|r| r.category.name().to_string())
                .unwrap_or_default()
        };
        tracing::info!(hand_number = self.hand_number, ?winners, %notes, "showdown resolved");
        self.finish_hand(
            Some(ShowdownInfo {
                winners,
                notes: Some(notes),
            }),
            events,
        );
        Ok(())
    }

    fn finish_hand(&mut self, showdown: Option<ShowdownInfo>, events: &mut Vec<HandEvent>) {
        self.phase = Phase::HandOver;
        self.action_on = None;
        self.runout_pending = false;

        let results = self
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| PlayerResult {
                player_id: p.id().to_string(),
                final_stack: p.stack(),
                winnings: self.winnings[i],
                net: i64::from(p.stack()) - i64::from(self.starting_stacks[i]),
                cards: p.hole_cards().to_vec(),
                shown: p.is_revealed(),
            })
            .collect();
        let record = HandRecord {
            hand_id: next_hand_id(self.hand_number),
            hand_number: self.hand_number,
            seed: self.config.seed,
            actions: self.actions.clone(),
            board: self.board.clone(),
            pots: self.pots.clone(),
            results,
            ts: Some(timestamp()),
            meta: Some(serde_json::json!({
                "small_blind": self.config.small_blind,
                "big_blind": self.config.big_blind,
                "dealer": self.players[self.dealer].id(),
            })),
            showdown,
        };
        events.push(HandEvent::HandCompleted {
            hand_id: record.hand_id.clone(),
            showdown: record.showdown.is_some(),
        });
        self.last_record = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(stacks: &[u32]) -> Engine {
        let seats = stacks
            .iter()
            .enumerate()
            .map(|(i, &s)| Seat::new(format!("p{i}"), format!("Player {i}"), s))
            .collect();
        Engine::new(seats, TableConfig::with_big_blind(20).seeded(11)).expect("valid table")
    }

    #[test]
    fn rejects_bad_seat_counts_and_duplicate_ids() {
        let cfg = TableConfig::with_big_blind(20);
        assert!(matches!(
            Engine::new(vec![Seat::new("a", "A", 100)], cfg.clone()),
            Err(GameError::InvalidConfig(_))
        ));
        assert!(matches!(
            Engine::new(
                vec![Seat::new("a", "A", 100), Seat::new("a", "B", 100)],
                cfg
            ),
            Err(GameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_tables_whose_chips_overflow_a_pot() {
        let half = u32::MAX / 2 + 1;
        let seats = vec![Seat::new("a", "A", half), Seat::new("b", "B", half)];
        assert!(matches!(
            Engine::new(seats, TableConfig::with_big_blind(20)),
            Err(GameError::InvalidConfig(_))
        ));

        // the largest table that still fits plays an all-in to the end
        let seats = vec![
            Seat::new("a", "A", u32::MAX / 2),
            Seat::new("b", "B", u32::MAX / 2),
        ];
        let mut e = Engine::new(seats, TableConfig::with_big_blind(20).seeded(5)).expect("fits");
        e.start_new_hand().expect("hand");
        let first = e.action_on_player().expect("actor").to_string();
        e.apply_action(&first, PlayerAction::AllIn).expect("shove");
        let second = e.action_on_player().expect("caller").to_string();
        e.apply_action(&second, PlayerAction::Call).expect("call");
        assert_eq!(e.phase(), Phase::HandOver);
        assert_eq!(e.chips_in_play(), e.initial_chips());
    }

    #[test]
    fn waiting_only_precedes_the_first_hand() {
        let mut e = engine(&[1000, 1000]);
        assert_eq!(e.phase(), Phase::Waiting);
        e.start_new_hand().expect("hand");
        let on = e.action_on_player().expect("actor").to_string();
        e.apply_action(&on, PlayerAction::Fold).expect("fold");
        assert_eq!(e.phase(), Phase::HandOver);
        e.start_new_hand().expect("next hand");
        assert_eq!(e.phase(), Phase::PreFlop);
        assert_eq!(e.hand_number(), 2);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut e = engine(&[1000, 1000, 1000]);
        e.start_new_hand().expect("first hand");
        assert_eq!(e.start_new_hand(), Err(GameError::HandInProgress));
    }

    #[test]
    fn runout_calls_without_pending_runout_are_rejected() {
        let mut e = engine(&[1000, 1000]);
        assert_eq!(e.deal_next_street(), Err(GameError::NoRunoutPending));
        e.start_new_hand().expect("hand");
        assert_eq!(e.advance_all_in_streets(), Err(GameError::NoRunoutPending));
    }

    #[test]
    fn acting_out_of_turn_names_the_expected_player() {
        let mut e = engine(&[1000, 1000, 1000]);
        e.start_new_hand().expect("hand");
        let on = e.action_on_player().expect("someone to act").to_string();
        let other = e
            .players()
            .iter()
            .map(|p| p.id().to_string())
            .find(|id| *id != on)
            .expect("another player");
        assert_eq!(
            e.apply_action(&other, PlayerAction::Call),
            Err(GameError::NotPlayersTurn {
                expected: on,
                actual: other
            })
        );
    }
}

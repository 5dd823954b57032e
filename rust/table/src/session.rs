use crate::dedup::RequestCache;
use crate::events::{EventBus, GameEvent};
use crate::history::{HistoryError, HistoryStore};
use crate::logging::{init_logging, LogFormat};
use crate::monitor::{GameMonitor, HealthLevel};
use crate::settings::{SettingsError, SettingsStore, TableSettings};
use crate::snapshot::SnapshotRing;
use crate::validation::{audit_engine, ValidationWarning};
use holdem_ai::{create_ai, AIOpponent, BaselineAI, Difficulty};
use holdem_engine::engine::{Engine, RunoutMode, TableConfig, MAX_SEATS};
use holdem_engine::errors::GameError;
use holdem_engine::events::HandEvent;
use holdem_engine::logger::HandRecord;
use holdem_engine::player::{ActionKind, PlayerAction, PlayerId, Seat};
use holdem_engine::view::StateView;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

pub type SessionId = String;

/// Seat id of the session's own human player.
pub const HERO_ID: &str = "hero";

/// Most opponents a session can seat next to the hero.
pub const MAX_OPPONENTS: usize = MAX_SEATS - 1;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Unknown player: {0}")]
    UnknownPlayer(String),
    #[error("Action rejected: {0}")]
    Rejected(#[source] GameError),
    #[error("Transition failed and was rolled back to state version {version}: {source}")]
    RolledBack { version: u64, source: GameError },
    #[error("Invariant audit failed, rolled back to state version {version}")]
    InvariantViolation {
        version: u64,
        warnings: Vec<ValidationWarning>,
    },
    #[error("Session expired: {0}")]
    Expired(SessionId),
    #[error("Invalid game configuration: {0}")]
    InvalidConfig(String),
    #[error("Session storage poisoned")]
    StoragePoisoned,
}

impl From<SettingsError> for SessionError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::InvalidValue(msg) => SessionError::InvalidConfig(msg),
            SettingsError::StoragePoisoned => SessionError::StoragePoisoned,
        }
    }
}

impl From<HistoryError> for SessionError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::StoragePoisoned => SessionError::StoragePoisoned,
            HistoryError::NotFound(hand_id) => {
                SessionError::InvalidConfig(format!("no hand {hand_id} in history"))
            }
        }
    }
}

/// Who controls an opponent seat. Serialized as `"human"` or `"ai:<difficulty>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OpponentType {
    Human,
    AI(Difficulty),
}

impl fmt::Display for OpponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpponentType::Human => f.write_str("human"),
            OpponentType::AI(difficulty) => write!(f, "ai:{difficulty}"),
        }
    }
}

impl FromStr for OpponentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("human") => Ok(OpponentType::Human),
            None if s.eq_ignore_ascii_case("ai") => Ok(OpponentType::AI(Difficulty::Medium)),
            Some((kind, difficulty)) if kind.eq_ignore_ascii_case("ai") => {
                if difficulty.eq_ignore_ascii_case("baseline") {
                    return Ok(OpponentType::AI(Difficulty::Medium));
                }
                difficulty.parse().map(OpponentType::AI)
            }
            _ => Err(format!("unknown opponent type: {s}")),
        }
    }
}

impl TryFrom<String> for OpponentType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OpponentType> for String {
    fn from(value: OpponentType) -> Self {
        value.to_string()
    }
}

/// How to seat a new session. Unset fields fall back to [`TableSettings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub seed: Option<u64>,
    /// One entry per seat after the hero's, seated as `ai_1`, `ai_2`, ...
    #[serde(default = "default_opponents")]
    pub opponents: Vec<OpponentType>,
    #[serde(default)]
    pub big_blind: Option<u32>,
    #[serde(default)]
    pub starting_stack: Option<u32>,
    #[serde(default)]
    pub runout: Option<RunoutMode>,
}

fn default_opponents() -> Vec<OpponentType> {
    vec![OpponentType::AI(Difficulty::Medium)]
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            opponents: default_opponents(),
            big_blind: None,
            starting_stack: None,
            runout: None,
        }
    }
}

impl GameConfig {
    pub fn against(opponents: Vec<OpponentType>) -> Self {
        Self {
            opponents,
            ..Self::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), SessionError> {
        if self.opponents.is_empty() || self.opponents.len() > MAX_OPPONENTS {
            return Err(SessionError::InvalidConfig(format!(
                "{} opponents, need 1 to {MAX_OPPONENTS}",
                self.opponents.len()
            )));
        }
        if self.starting_stack == Some(0) {
            return Err(SessionError::InvalidConfig(
                "starting_stack must be positive".to_string(),
            ));
        }
        if let Some(stack) = self.starting_stack {
            let seated = u64::from(stack) * (self.opponents.len() as u64 + 1);
            if seated > u64::from(u32::MAX) {
                return Err(SessionError::InvalidConfig(format!(
                    "starting_stack {stack} seats {seated} chips, more than a pot can hold"
                )));
            }
        }
        if self.big_blind == Some(0) {
            return Err(SessionError::InvalidConfig(
                "big_blind must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of one applied transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    /// Version after the transition; each applied transition bumps it by one
    pub state_version: u64,
    pub state: StateView,
    pub events: Vec<HandEvent>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<ValidationWarning>,
    /// Set when the transition finished a hand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand_record: Option<HandRecord>,
}

#[derive(Debug, Clone)]
struct CachedAction {
    player_id: PlayerId,
    action: PlayerAction,
    outcome: ActionOutcome,
}

#[derive(Debug)]
struct TableState {
    engine: Engine,
    version: u64,
    /// Pre-transition copies of the table for the most recent applied transitions.
    /// Kept for inspection through [`GameSession::snapshot_versions`]; rollback
    /// restores the copy taken by the transition in flight.
    snapshots: SnapshotRing<Engine>,
}

type Auditor = fn(&Engine) -> Vec<ValidationWarning>;

pub struct GameSession {
    id: SessionId,
    config: GameConfig,
    settings: TableSettings,
    player_ids: Vec<PlayerId>,
    computers: HashMap<PlayerId, Box<dyn AIOpponent>>,
    table: Mutex<TableState>,
    requests: RequestCache<CachedAction>,
    history: HistoryStore,
    event_bus: Arc<EventBus>,
    monitor: Arc<GameMonitor>,
    auditor: Auditor,
    created_at: Instant,
    last_active: Mutex<Instant>,
}

impl fmt::Debug for GameSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let computers: Vec<(&str, &str)> = self
            .computers
            .iter()
            .map(|(id, ai)| (id.as_str(), ai.name()))
            .collect();
        f.debug_struct("GameSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("players", &self.player_ids)
            .field("computers", &computers)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl GameSession {
    fn new(
        id: SessionId,
        config: GameConfig,
        settings: TableSettings,
        event_bus: Arc<EventBus>,
        monitor: Arc<GameMonitor>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let big_blind = config.big_blind.unwrap_or(settings.big_blind);
        let stack = config
            .starting_stack
            .unwrap_or_else(|| settings.starting_stack());

        let mut seats = vec![Seat::new(HERO_ID, "Hero", stack)];
        let mut computers: HashMap<PlayerId, Box<dyn AIOpponent>> = HashMap::new();
        for (n, opponent) in config.opponents.iter().enumerate() {
            let seat_id = format!("ai_{}", n + 1);
            match opponent {
                OpponentType::Human => {
                    seats.push(Seat::new(seat_id, format!("Player {}", n + 1), stack));
                }
                OpponentType::AI(difficulty) => {
                    let ai: Box<dyn AIOpponent> = match config.seed {
                        Some(seed) => Box::new(BaselineAI::with_seed(
                            *difficulty,
                            seed.wrapping_add(n as u64 + 1),
                        )),
                        None => create_ai(difficulty.as_str())
                            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?,
                    };
                    seats.push(Seat::new(
                        seat_id.clone(),
                        format!("Bot {} ({difficulty})", n + 1),
                        stack,
                    ));
                    computers.insert(seat_id, ai);
                }
            }
        }
        let player_ids = seats.iter().map(|s| s.id.clone()).collect();

        let mut table_config = TableConfig::with_big_blind(big_blind);
        table_config.seed = config.seed;
        table_config.runout = config.runout.unwrap_or(settings.runout);
        let engine = Engine::new(seats, table_config)
            .map_err(|e| SessionError::InvalidConfig(e.to_string()))?;

        let now = Instant::now();
        Ok(Self {
            table: Mutex::new(TableState {
                engine,
                version: 0,
                snapshots: SnapshotRing::new(settings.snapshot_capacity),
            }),
            requests: RequestCache::new(settings.dedup_ttl()),
            history: HistoryStore::with_capacity(settings.history_capacity),
            id,
            config,
            settings,
            player_ids,
            computers,
            event_bus,
            monitor,
            auditor: audit_engine,
            created_at: now,
            last_active: Mutex::new(now),
        })
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn settings(&self) -> &TableSettings {
        &self.settings
    }

    /// Seat ids in seating order.
    pub fn player_ids(&self) -> &[PlayerId] {
        &self.player_ids
    }

    pub fn is_ai_player(&self, player_id: &str) -> bool {
        self.computers.contains_key(player_id)
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn touch(&self) {
        let mut last = self.last_active.lock().unwrap_or_else(|e| e.into_inner());
        *last = Instant::now();
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        let last = self.last_active.lock().unwrap_or_else(|e| e.into_inner());
        last.elapsed() > ttl
    }

    fn table(&self) -> MutexGuard<'_, TableState> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_for_write(&self) -> Result<MutexGuard<'_, TableState>, SessionError> {
        self.table.lock().map_err(|_| SessionError::StoragePoisoned)
    }

    pub fn state_version(&self) -> u64 {
        self.table().version
    }

    /// Table projection for `viewer`; `None` is a spectator who sees only shown hands.
    pub fn view(&self, viewer: Option<&str>) -> StateView {
        self.table().engine.view(viewer)
    }

    /// Versions of the retained pre-transition snapshots, oldest first.
    pub fn snapshot_versions(&self) -> Vec<u64> {
        self.table().snapshots.versions()
    }

    /// Whose perspective non-action outcomes are projected from.
    fn observer(&self) -> Option<&str> {
        Some(HERO_ID)
    }

    pub fn start_new_hand(&self) -> Result<ActionOutcome, SessionError> {
        self.transact(None, self.observer(), Engine::start_new_hand)
    }

    pub fn deal_next_street(&self) -> Result<ActionOutcome, SessionError> {
        self.transact(None, self.observer(), Engine::deal_next_street)
    }

    pub fn advance_all_in_streets(&self) -> Result<ActionOutcome, SessionError> {
        self.transact(None, self.observer(), Engine::advance_all_in_streets)
    }

    /// Applies one betting action for `player_id`.
    ///
    /// A repeated `request_id` replays the first successful outcome without
    /// touching the table, also when the duplicates race each other.
    pub fn process_action(
        &self,
        player_id: &str,
        action: PlayerAction,
        request_id: Option<&str>,
    ) -> Result<ActionOutcome, SessionError> {
        self.submit(player_id, action, request_id, Some(player_id))
    }

    fn submit(
        &self,
        player_id: &str,
        action: PlayerAction,
        request_id: Option<&str>,
        viewer: Option<&str>,
    ) -> Result<ActionOutcome, SessionError> {
        if !self.player_ids.iter().any(|id| id == player_id) {
            self.monitor.record_rejection(&self.id);
            return Err(SessionError::UnknownPlayer(player_id.to_string()));
        }
        if let Some(outcome) = self.replay(request_id, player_id, action) {
            return Ok(outcome);
        }

        let mut table = self.lock_for_write()?;
        if let Some(outcome) = self.replay(request_id, player_id, action) {
            return Ok(outcome);
        }

        tracing::debug!(
            session_id = %self.id,
            player_id,
            action = ?action,
            request_id = ?request_id,
            "processing player action"
        );
        let result = self.apply_locked(&mut table, Some(action.kind()), viewer, |engine| {
            engine.apply_action(player_id, action)
        });
        match result {
            Ok(outcome) => {
                if let Some(request_id) = request_id {
                    self.requests.insert(
                        request_id,
                        CachedAction {
                            player_id: player_id.to_string(),
                            action,
                            outcome: outcome.clone(),
                        },
                    );
                }
                Ok(outcome)
            }
            Err(SessionError::Rejected(err)) => {
                self.event_bus.broadcast(
                    &self.id,
                    GameEvent::ActionRejected {
                        session_id: self.id.clone(),
                        player_id: player_id.to_string(),
                        reason: err.to_string(),
                    },
                );
                Err(SessionError::Rejected(err))
            }
            Err(err) => Err(err),
        }
    }

    fn replay(
        &self,
        request_id: Option<&str>,
        player_id: &str,
        action: PlayerAction,
    ) -> Option<ActionOutcome> {
        let cached = self.requests.get(request_id?)?;
        if cached.player_id != player_id || cached.action != action {
            tracing::warn!(
                session_id = %self.id,
                request_id = ?request_id,
                first = ?(&cached.player_id, cached.action),
                repeated = ?(player_id, action),
                "request id reused with different arguments, replaying first result"
            );
        } else {
            tracing::debug!(
                session_id = %self.id,
                request_id = ?request_id,
                state_version = cached.outcome.state_version,
                "duplicate request, replaying cached result"
            );
        }
        self.monitor.record_duplicate(&self.id);
        Some(cached.outcome)
    }

    fn transact<F>(
        &self,
        kind: Option<ActionKind>,
        viewer: Option<&str>,
        mutate: F,
    ) -> Result<ActionOutcome, SessionError>
    where
        F: FnOnce(&mut Engine) -> Result<Vec<HandEvent>, GameError>,
    {
        let mut table = self.lock_for_write()?;
        self.apply_locked(&mut table, kind, viewer, mutate)
    }

    /// Snapshot, mutate, audit. Any error leaves the table exactly as it was,
    /// including a panic inside `mutate`, which is caught and rolled back.
    fn apply_locked<F>(
        &self,
        table: &mut TableState,
        kind: Option<ActionKind>,
        viewer: Option<&str>,
        mutate: F,
    ) -> Result<ActionOutcome, SessionError>
    where
        F: FnOnce(&mut Engine) -> Result<Vec<HandEvent>, GameError>,
    {
        let version = table.version;
        let snapshot = table.engine.clone();

        let applied = panic::catch_unwind(AssertUnwindSafe(|| mutate(&mut table.engine)))
            .unwrap_or_else(|payload| {
                Err(GameError::Internal {
                    phase: snapshot.phase(),
                    message: format!("transition panicked: {}", panic_message(payload.as_ref())),
                })
            });
        let events = match applied {
            Ok(events) => events,
            Err(err) if err.is_rejection() => {
                table.engine = snapshot;
                self.monitor.record_rejection(&self.id);
                tracing::warn!(session_id = %self.id, error = %err, "request rejected");
                return Err(SessionError::Rejected(err));
            }
            Err(err) => {
                table.engine = snapshot;
                self.monitor.record_rollback(&self.id, &[]);
                tracing::error!(
                    session_id = %self.id,
                    state_version = version,
                    error = %err,
                    "transition failed, table rolled back"
                );
                return Err(SessionError::RolledBack {
                    version,
                    source: err,
                });
            }
        };

        let warnings = (self.auditor)(&table.engine);
        for warning in &warnings {
            tracing::warn!(
                session_id = %self.id,
                state_version = version + 1,
                warning = %warning,
                "invariant audit warning"
            );
        }
        if !warnings.is_empty() && self.settings.strict_invariants {
            table.engine = snapshot;
            self.monitor.record_rollback(&self.id, &warnings);
            tracing::error!(
                session_id = %self.id,
                state_version = version,
                warnings = warnings.len(),
                "strict invariants: transition rolled back"
            );
            return Err(SessionError::InvariantViolation { version, warnings });
        }

        table.snapshots.push(version, snapshot);
        table.version = version + 1;
        let state_version = table.version;
        let finished_hand = events
            .iter()
            .any(|e| matches!(e, HandEvent::HandCompleted { .. }));
        let hand_record = if finished_hand {
            table.engine.last_hand_record().cloned()
        } else {
            None
        };
        if let Some(record) = &hand_record {
            if let Err(err) = self.history.add_hand(record.clone()) {
                tracing::error!(
                    session_id = %self.id,
                    hand_id = %record.hand_id,
                    error = %err,
                    "failed to archive hand"
                );
            }
        }

        self.monitor.record_success(&self.id, kind, &warnings);
        self.event_bus
            .publish_hand_events(&self.id, state_version, &events);
        tracing::debug!(
            session_id = %self.id,
            state_version,
            phase = ?table.engine.phase(),
            events = events.len(),
            "transition applied"
        );

        Ok(ActionOutcome {
            success: true,
            state_version,
            state: table.engine.view(viewer),
            events,
            validation_warnings: warnings,
            hand_record,
        })
    }

    /// Lets computer seats act while the action is on them.
    ///
    /// Each decision is made from a fresh view outside the table lock and then
    /// submitted like any client request. Stops at a human seat, at the end of
    /// betting, or after `max_ai_actions_per_turn` decisions.
    pub fn run_ai_turns(&self) -> Result<Vec<ActionOutcome>, SessionError> {
        let mut outcomes = Vec::new();
        for _ in 0..self.settings.max_ai_actions_per_turn {
            let view = {
                let table = self.table();
                let Some(actor) = table.engine.action_on_player() else {
                    break;
                };
                if !self.is_ai_player(actor) {
                    break;
                }
                let actor = actor.to_string();
                (table.engine.view(Some(&actor)), actor)
            };
            let (view, actor) = view;
            let Some(ai) = self.computers.get(&actor) else {
                break;
            };

            let action = ai.decide(&view, &actor);
            tracing::debug!(
                session_id = %self.id,
                player_id = %actor,
                ai = ai.name(),
                action = ?action,
                "computer decision"
            );
            let request_id = Uuid::new_v4().to_string();
            match self.submit(&actor, action, Some(&request_id), self.observer()) {
                Ok(outcome) => outcomes.push(outcome),
                // someone else moved the table on; look again
                Err(SessionError::Rejected(GameError::NotPlayersTurn { .. })) => continue,
                Err(SessionError::Rejected(err)) => {
                    let fallback = if view.to_call(&actor) == 0 {
                        PlayerAction::Check
                    } else {
                        PlayerAction::Fold
                    };
                    tracing::warn!(
                        session_id = %self.id,
                        player_id = %actor,
                        error = %err,
                        fallback = ?fallback,
                        "computer action rejected, using fallback"
                    );
                    let request_id = Uuid::new_v4().to_string();
                    match self.submit(&actor, fallback, Some(&request_id), self.observer()) {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(SessionError::Rejected(_)) => continue,
                        Err(err) => return Err(err),
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(outcomes)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
}

/// Registry of live sessions sharing one event bus, monitor and settings store.
#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<GameSession>>>,
    event_bus: Arc<EventBus>,
    monitor: Arc<GameMonitor>,
    settings: Arc<SettingsStore>,
    session_ttl: Option<Duration>,
}

impl SessionManager {
    pub fn new(settings: TableSettings) -> Result<Self, SessionError> {
        let store = SettingsStore::with_settings(settings)?;
        Ok(Self::with_components(
            Arc::new(EventBus::new()),
            Arc::new(GameMonitor::new()),
            Arc::new(store),
        ))
    }

    /// Settings from `HOLDEM_*` variables, with the global subscriber filtered
    /// at their `log_level` unless `RUST_LOG` says otherwise.
    pub fn from_env(format: LogFormat) -> Result<Self, SessionError> {
        let settings = TableSettings::from_env()?;
        if !init_logging(format, &settings.log_level) {
            tracing::debug!("global subscriber already installed");
        }
        tracing::info!(settings = ?settings, "starting session manager");
        Self::new(settings)
    }

    pub fn with_components(
        event_bus: Arc<EventBus>,
        monitor: Arc<GameMonitor>,
        settings: Arc<SettingsStore>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            event_bus,
            monitor,
            settings,
            session_ttl: None,
        }
    }

    /// Overrides the inactivity timeout taken from the settings.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    fn ttl(&self) -> Duration {
        self.session_ttl.unwrap_or_else(|| {
            self.settings
                .get()
                .map(|s| s.session_timeout())
                .unwrap_or_else(|_| TableSettings::default().session_timeout())
        })
    }

    /// Seats a new table. No hand is dealt until [`SessionManager::start_new_hand`].
    pub fn create_session(&self, config: GameConfig) -> Result<SessionId, SessionError> {
        let id = Uuid::new_v4().to_string();
        let settings = self.settings.get()?;

        tracing::info!(
            session_id = %id,
            opponents = ?config.opponents,
            seed = ?config.seed,
            "creating new game session"
        );

        let session = Arc::new(GameSession::new(
            id.clone(),
            config,
            settings,
            Arc::clone(&self.event_bus),
            Arc::clone(&self.monitor),
        )?);
        let players = session.player_ids().to_vec();
        {
            let mut guard = self
                .sessions
                .write()
                .map_err(|_| SessionError::StoragePoisoned)?;
            guard.insert(id.clone(), session);
        }

        self.event_bus.broadcast(
            &id,
            GameEvent::SessionCreated {
                session_id: id.clone(),
                players,
            },
        );
        Ok(id)
    }

    /// Looks a session up, expiring it if it sat idle past the timeout.
    pub fn get_session(&self, id: &SessionId) -> Result<Arc<GameSession>, SessionError> {
        let session = {
            let guard = self
                .sessions
                .read()
                .map_err(|_| SessionError::StoragePoisoned)?;
            guard
                .get(id)
                .cloned()
                .ok_or_else(|| SessionError::NotFound(id.clone()))?
        };
        if session.is_expired(self.ttl()) {
            self.end_session(id, "expired due to inactivity")?;
            return Err(SessionError::Expired(id.clone()));
        }
        session.touch();
        Ok(session)
    }

    pub fn state(&self, session_id: &SessionId, viewer: Option<&str>) -> Result<StateView, SessionError> {
        Ok(self.get_session(session_id)?.view(viewer))
    }

    pub fn start_new_hand(&self, session_id: &SessionId) -> Result<ActionOutcome, SessionError> {
        self.get_session(session_id)?.start_new_hand()
    }

    pub fn process_action(
        &self,
        session_id: &SessionId,
        player_id: &str,
        action: PlayerAction,
        request_id: Option<&str>,
    ) -> Result<ActionOutcome, SessionError> {
        self.get_session(session_id)?
            .process_action(player_id, action, request_id)
    }

    pub fn deal_next_street(&self, session_id: &SessionId) -> Result<ActionOutcome, SessionError> {
        self.get_session(session_id)?.deal_next_street()
    }

    pub fn advance_all_in_streets(&self, session_id: &SessionId) -> Result<ActionOutcome, SessionError> {
        self.get_session(session_id)?.advance_all_in_streets()
    }

    pub fn run_ai_turns(&self, session_id: &SessionId) -> Result<Vec<ActionOutcome>, SessionError> {
        self.get_session(session_id)?.run_ai_turns()
    }

    /// Completed hands of the session in play order.
    pub fn hand_history(&self, session_id: &SessionId) -> Result<Vec<HandRecord>, SessionError> {
        Ok(self.get_session(session_id)?.history().all()?)
    }

    pub fn health(&self, session_id: &SessionId) -> HealthLevel {
        self.monitor.health(session_id)
    }

    pub fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionError> {
        if self.end_session(session_id, "terminated_by_request")? {
            Ok(())
        } else {
            Err(SessionError::NotFound(session_id.clone()))
        }
    }

    /// Drops every session idle past the timeout and returns how many went.
    pub fn cleanup_expired_sessions(&self) -> usize {
        let ttl = self.ttl();
        let mut expired = Vec::new();
        {
            let mut guard = match self.sessions.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.retain(|id, session| {
                if session.is_expired(ttl) {
                    expired.push(id.clone());
                    false
                } else {
                    true
                }
            });
        }

        for id in &expired {
            tracing::info!(session_id = %id, "session expired");
            self.announce_end(id, "expired");
        }
        expired.len()
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        match self.sessions.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn monitor(&self) -> Arc<GameMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn settings(&self) -> Arc<SettingsStore> {
        Arc::clone(&self.settings)
    }

    fn end_session(&self, session_id: &SessionId, reason: &str) -> Result<bool, SessionError> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| SessionError::StoragePoisoned)?
            .remove(session_id);
        if removed.is_some() {
            tracing::info!(session_id = %session_id, reason, "session ended");
            self.announce_end(session_id, reason);
        }
        Ok(removed.is_some())
    }

    fn announce_end(&self, session_id: &SessionId, reason: &str) {
        self.event_bus.broadcast(
            session_id,
            GameEvent::SessionEnded {
                session_id: session_id.clone(),
                reason: reason.to_string(),
            },
        );
        self.event_bus.drop_session(session_id);
        self.monitor.forget_session(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdem_engine::game::Phase;

    fn session(settings: TableSettings) -> GameSession {
        GameSession::new(
            "test".to_string(),
            GameConfig::against(vec![OpponentType::Human, OpponentType::Human]).seeded(99),
            settings,
            Arc::new(EventBus::new()),
            Arc::new(GameMonitor::new()),
        )
        .expect("session")
    }

    fn actor(session: &GameSession) -> String {
        session
            .view(None)
            .action_on_player
            .expect("someone to act")
    }

    #[test]
    fn opponent_types_parse_and_print() {
        assert_eq!("human".parse::<OpponentType>(), Ok(OpponentType::Human));
        assert_eq!(
            "ai:hard".parse::<OpponentType>(),
            Ok(OpponentType::AI(Difficulty::Hard))
        );
        assert_eq!(
            "ai:baseline".parse::<OpponentType>(),
            Ok(OpponentType::AI(Difficulty::Medium))
        );
        assert!("robot".parse::<OpponentType>().is_err());
        assert!("ai:godlike".parse::<OpponentType>().is_err());

        let config: GameConfig =
            serde_json::from_str(r#"{"opponents": ["ai:expert", "human"], "seed": 3}"#)
                .expect("config");
        assert_eq!(
            config.opponents,
            vec![OpponentType::AI(Difficulty::Expert), OpponentType::Human]
        );
        let json = serde_json::to_value(&config).expect("json");
        assert_eq!(json["opponents"][0], "ai:expert");
    }

    #[test]
    fn config_limits_are_enforced() {
        let too_many = GameConfig::against(vec![OpponentType::Human; MAX_OPPONENTS + 1]);
        assert!(too_many.validate().is_err());
        assert!(GameConfig::against(Vec::new()).validate().is_err());
        let broke = GameConfig {
            starting_stack: Some(0),
            ..GameConfig::default()
        };
        assert!(broke.validate().is_err());
        let deep = GameConfig {
            starting_stack: Some(u32::MAX / 3 + 1),
            ..GameConfig::against(vec![OpponentType::Human, OpponentType::Human])
        };
        assert!(matches!(deep.validate(), Err(SessionError::InvalidConfig(_))));
        let fits = GameConfig {
            starting_stack: Some(u32::MAX / 3),
            ..deep
        };
        assert!(fits.validate().is_ok());
    }

    #[test]
    fn failing_mutation_restores_the_table() {
        let session = session(TableSettings::default());
        session.start_new_hand().expect("hand");
        let before = session.view(Some(HERO_ID));
        let version = session.state_version();
        let who = actor(&session);

        let err = session
            .transact(None, None, |engine| {
                engine.apply_action(&who, PlayerAction::Call)?;
                Err(GameError::Internal {
                    phase: engine.phase(),
                    message: "injected fault".into(),
                })
            })
            .expect_err("fault");

        assert!(matches!(err, SessionError::RolledBack { version: v, .. } if v == version));
        assert_eq!(session.view(Some(HERO_ID)), before);
        assert_eq!(session.state_version(), version);
        assert_eq!(session.monitor.snapshot().rollbacks, 1);

        // the table still works after the rollback
        session
            .process_action(&who, PlayerAction::Call, None)
            .expect("call after rollback");
        assert_eq!(session.state_version(), version + 1);
    }

    #[test]
    fn panicking_mutation_is_rolled_back() {
        let session = session(TableSettings::default());
        session.start_new_hand().expect("hand");
        let before = session.view(Some(HERO_ID));
        let version = session.state_version();
        let retained = session.snapshot_versions();
        let who = actor(&session);

        let err = session
            .transact(None, None, |engine| {
                engine.apply_action(&who, PlayerAction::Call)?;
                panic!("engine blew up mid-transition");
            })
            .expect_err("panic becomes an error");
        match err {
            SessionError::RolledBack {
                version: v,
                source: GameError::Internal { message, .. },
            } => {
                assert_eq!(v, version);
                assert!(message.contains("engine blew up"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(session.view(Some(HERO_ID)), before);
        assert_eq!(session.state_version(), version);
        assert_eq!(session.monitor.snapshot().rollbacks, 1);
        assert_eq!(session.snapshot_versions(), retained);

        // the lock is not poisoned and the table keeps working
        session
            .process_action(&who, PlayerAction::Call, None)
            .expect("call after the panic");
        assert_eq!(session.state_version(), version + 1);
    }

    fn heads_up_with_stack(stack: u32) -> Result<GameSession, SessionError> {
        GameSession::new(
            "deep".to_string(),
            GameConfig {
                starting_stack: Some(stack),
                ..GameConfig::against(vec![OpponentType::Human]).seeded(4)
            },
            TableSettings::default(),
            Arc::new(EventBus::new()),
            Arc::new(GameMonitor::new()),
        )
    }

    #[test]
    fn stacks_that_overflow_a_pot_are_refused() {
        assert!(matches!(
            heads_up_with_stack(u32::MAX / 2 + 1),
            Err(SessionError::InvalidConfig(_))
        ));

        let session = heads_up_with_stack(u32::MAX / 2).expect("largest fitting table");
        session.start_new_hand().expect("hand");
        let first = actor(&session);
        session
            .process_action(&first, PlayerAction::AllIn, None)
            .expect("shove");
        let second = actor(&session);
        let called = session
            .process_action(&second, PlayerAction::Call, None)
            .expect("call");
        assert!(called.hand_record.is_some());
        assert!(called.validation_warnings.is_empty());
        let stacks: u64 = called.state.players.iter().map(|p| u64::from(p.stack)).sum();
        assert_eq!(stacks, u64::from(u32::MAX / 2) * 2);
        // whether or not someone busted, the session still accepts requests
        assert!(session.start_new_hand().is_ok());
    }

    #[test]
    fn incomplete_board_showdown_is_rolled_back() {
        let session = session(TableSettings::default());
        session.start_new_hand().expect("hand");
        let before = session.view(None);

        let err = session
            .transact(None, None, |_| Err(GameError::IncompleteBoard { cards: 3 }))
            .expect_err("fault");
        assert!(matches!(
            err,
            SessionError::RolledBack {
                source: GameError::IncompleteBoard { cards: 3 },
                ..
            }
        ));
        assert_eq!(session.view(None), before);
    }

    fn fake_mismatch(_: &Engine) -> Vec<ValidationWarning> {
        vec![ValidationWarning::ChipMismatch {
            expected: 1,
            actual: 2,
        }]
    }

    #[test]
    fn audit_warnings_are_attached_but_not_fatal_by_default() {
        let mut session = session(TableSettings::default());
        session.auditor = fake_mismatch;
        let outcome = session.start_new_hand().expect("hand");
        assert_eq!(outcome.validation_warnings.len(), 1);
        assert_eq!(outcome.state_version, 1);
        assert_eq!(outcome.state.phase, Phase::PreFlop);
        assert_eq!(session.monitor.health(&session.id), HealthLevel::Warning);
    }

    #[test]
    fn strict_invariants_roll_back_on_warnings() {
        let mut session = session(TableSettings {
            strict_invariants: true,
            ..TableSettings::default()
        });
        session.auditor = fake_mismatch;
        let err = session.start_new_hand().expect_err("strict");
        assert!(matches!(
            err,
            SessionError::InvariantViolation { version: 0, ref warnings } if warnings.len() == 1
        ));
        assert_eq!(session.view(None).phase, Phase::Waiting);
        assert_eq!(session.state_version(), 0);
    }

    #[test]
    fn rejected_actions_leave_version_alone() {
        let session = session(TableSettings::default());
        session.start_new_hand().expect("hand");
        let who = actor(&session);
        let version = session.state_version();

        let err = session
            .process_action(&who, PlayerAction::Check, None)
            .expect_err("cannot check facing the big blind");
        assert!(matches!(err, SessionError::Rejected(GameError::CannotCheck { .. })));
        assert!(matches!(
            session.process_action("ghost", PlayerAction::Fold, None),
            Err(SessionError::UnknownPlayer(_))
        ));
        assert_eq!(session.state_version(), version);
        assert_eq!(session.monitor.snapshot().rejections, 2);
    }

    #[test]
    fn snapshot_ring_stays_bounded() {
        let session = session(TableSettings {
            snapshot_capacity: 2,
            ..TableSettings::default()
        });
        session.start_new_hand().expect("hand");
        for _ in 0..3 {
            let who = actor(&session);
            session
                .process_action(&who, PlayerAction::Call, None)
                .or_else(|_| session.process_action(&who, PlayerAction::Check, None))
                .expect("passive action");
        }
        assert_eq!(session.snapshot_versions(), vec![2, 3]);
    }
}

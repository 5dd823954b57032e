//! # holdem-table: Sessions Around the Betting Engine
//!
//! Runs [`holdem_engine`] tables for concurrent callers. Each session admits
//! one mutation at a time, replays retried requests, snapshots the table before
//! every transition and rolls back when the engine faults. Applied transitions
//! are audited, archived and published to subscribers.
//!
//! ## Quick Start
//!
//! ```rust
//! use holdem_engine::player::PlayerAction;
//! use holdem_table::session::{GameConfig, OpponentType, SessionManager, HERO_ID};
//! use holdem_table::settings::TableSettings;
//!
//! let manager = SessionManager::new(TableSettings::default()).unwrap();
//! let id = manager
//!     .create_session(GameConfig::against(vec![OpponentType::Human]).seeded(5))
//!     .unwrap();
//! let dealt = manager.start_new_hand(&id).unwrap();
//! assert_eq!(dealt.state_version, 1);
//!
//! let actor = dealt.state.action_on_player.clone().unwrap();
//! let first = manager
//!     .process_action(&id, &actor, PlayerAction::Call, Some("req-1"))
//!     .unwrap();
//! // a retry with the same request id is answered from the cache
//! let retry = manager
//!     .process_action(&id, &actor, PlayerAction::Call, Some("req-1"))
//!     .unwrap();
//! assert_eq!(first, retry);
//! assert!(manager.state(&id, Some(HERO_ID)).unwrap().player(HERO_ID).is_some());
//! ```

pub mod dedup;
pub mod events;
pub mod history;
pub mod logging;
pub mod monitor;
pub mod session;
pub mod settings;
pub mod snapshot;
pub mod validation;

pub use events::{EventBus, EventSubscription, GameEvent};
pub use history::{HandFilter, HandStatistics, HistoryError, HistoryStore};
pub use logging::{init_logging, LogEntry, LogFormat, TestLogSubscriber};
pub use monitor::{GameMonitor, HealthLevel, SessionMetrics};
pub use session::{
    ActionOutcome, GameConfig, GameSession, OpponentType, SessionError, SessionId, SessionManager,
};
pub use settings::{SettingsError, SettingsStore, TableSettings};
pub use validation::ValidationWarning;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_starts_empty() {
        let manager = SessionManager::new(TableSettings::default()).expect("manager");
        assert!(manager.active_sessions().is_empty());
        assert_eq!(manager.event_bus().subscriber_count(), 0);
        assert_eq!(manager.monitor().snapshot().requests, 0);
    }

    #[test]
    fn manager_rejects_invalid_settings() {
        let settings = TableSettings {
            big_blind: 0,
            ..TableSettings::default()
        };
        assert!(matches!(
            SessionManager::new(settings),
            Err(SessionError::InvalidConfig(_))
        ));
    }
}

use holdem_engine::engine::RunoutMode;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;

/// Prefix of the environment variables read by [`TableSettings::from_env`].
pub const ENV_PREFIX: &str = "HOLDEM_";

/// Table and shell settings shared by every session a manager creates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TableSettings {
    /// Big blind; the small blind is always half of it
    pub big_blind: u32,
    /// Starting stack in big blinds
    pub default_stack_bb: u32,
    /// How long a completed request id replays its result
    pub dedup_ttl_ms: u64,
    /// Pre-mutation snapshots kept per session
    pub snapshot_capacity: usize,
    /// Completed hands kept per session
    pub history_capacity: usize,
    /// Session timeout in minutes
    pub session_timeout_minutes: u64,
    /// Upper bound on computer decisions per `run_ai_turns` call
    pub max_ai_actions_per_turn: usize,
    pub runout: RunoutMode,
    /// Roll back transitions that fail the invariant audit
    pub strict_invariants: bool,
    pub log_level: String,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            big_blind: 20,
            default_stack_bb: 100,
            dedup_ttl_ms: 5_000,
            snapshot_capacity: 8,
            history_capacity: 500,
            session_timeout_minutes: 30,
            max_ai_actions_per_turn: 64,
            runout: RunoutMode::Automatic,
            strict_invariants: false,
            log_level: "info".to_string(),
        }
    }
}

impl TableSettings {
    /// Validate settings values
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.big_blind < 2 || self.big_blind % 2 != 0 {
            return Err(SettingsError::InvalidValue(
                "big_blind must be an even number of at least 2".to_string(),
            ));
        }
        if !(1..=10_000).contains(&self.default_stack_bb) {
            return Err(SettingsError::InvalidValue(
                "default_stack_bb must be between 1 and 10000".to_string(),
            ));
        }
        if u64::from(self.big_blind) * u64::from(self.default_stack_bb) > u64::from(u32::MAX / 16) {
            return Err(SettingsError::InvalidValue(
                "starting stack is too large".to_string(),
            ));
        }
        if self.dedup_ttl_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "dedup_ttl_ms must be greater than 0".to_string(),
            ));
        }
        if !(1..=64).contains(&self.snapshot_capacity) {
            return Err(SettingsError::InvalidValue(
                "snapshot_capacity must be between 1 and 64".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "history_capacity must be greater than 0".to_string(),
            ));
        }
        if self.session_timeout_minutes == 0 {
            return Err(SettingsError::InvalidValue(
                "session_timeout_minutes must be greater than 0".to_string(),
            ));
        }
        if self.max_ai_actions_per_turn == 0 {
            return Err(SettingsError::InvalidValue(
                "max_ai_actions_per_turn must be greater than 0".to_string(),
            ));
        }
        if self.log_level.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "log_level cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn small_blind(&self) -> u32 {
        self.big_blind / 2
    }

    pub fn starting_stack(&self) -> u32 {
        self.big_blind.saturating_mul(self.default_stack_bb)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_millis(self.dedup_ttl_ms)
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }

    /// Defaults overlaid with `HOLDEM_*` variables from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_vars(std::env::vars())
    }

    /// Defaults overlaid with `HOLDEM_<FIELD>` entries from `vars`; other keys are ignored.
    pub fn from_vars<I>(vars: I) -> Result<Self, SettingsError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut settings = Self::default();
        for (key, raw) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = match field.as_str() {
                "runout" | "log_level" => serde_json::Value::String(raw),
                _ => serde_json::from_str(&raw).map_err(|_| {
                    SettingsError::InvalidValue(format!("{key} has unparseable value {raw:?}"))
                })?,
            };
            settings.set_field(&field, value)?;
        }
        settings.validate()?;
        Ok(settings)
    }

    fn set_field(&mut self, field: &str, value: serde_json::Value) -> Result<(), SettingsError> {
        fn number(field: &str, value: &serde_json::Value) -> Result<u64, SettingsError> {
            value.as_u64().ok_or_else(|| {
                SettingsError::InvalidValue(format!("{field} must be a number"))
            })
        }
        fn narrow<T: TryFrom<u64>>(field: &str, n: u64) -> Result<T, SettingsError> {
            T::try_from(n).map_err(|_| SettingsError::InvalidValue(format!("{field} is out of range")))
        }

        match field {
            "big_blind" => self.big_blind = narrow(field, number(field, &value)?)?,
            "default_stack_bb" => self.default_stack_bb = narrow(field, number(field, &value)?)?,
            "dedup_ttl_ms" => self.dedup_ttl_ms = number(field, &value)?,
            "snapshot_capacity" => self.snapshot_capacity = narrow(field, number(field, &value)?)?,
            "history_capacity" => self.history_capacity = narrow(field, number(field, &value)?)?,
            "session_timeout_minutes" => self.session_timeout_minutes = number(field, &value)?,
            "max_ai_actions_per_turn" => {
                self.max_ai_actions_per_turn = narrow(field, number(field, &value)?)?
            }
            "runout" => {
                self.runout = serde_json::from_value(value).map_err(|_| {
                    SettingsError::InvalidValue("runout must be automatic or paced".to_string())
                })?
            }
            "strict_invariants" => {
                self.strict_invariants = value.as_bool().ok_or_else(|| {
                    SettingsError::InvalidValue("strict_invariants must be a boolean".to_string())
                })?
            }
            "log_level" => {
                let level = value.as_str().ok_or_else(|| {
                    SettingsError::InvalidValue("log_level must be a string".to_string())
                })?;
                self.log_level = level.to_string();
            }
            _ => {
                return Err(SettingsError::InvalidValue(format!(
                    "unknown field: {}",
                    field
                )))
            }
        }
        Ok(())
    }
}

/// In-memory settings store with validation
#[derive(Debug, Default)]
pub struct SettingsStore {
    settings: RwLock<TableSettings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: TableSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings: RwLock::new(settings),
        })
    }

    /// Get current settings
    pub fn get(&self) -> Result<TableSettings, SettingsError> {
        self.settings
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| SettingsError::StoragePoisoned)
    }

    /// Update settings with validation
    pub fn update(&self, new_settings: TableSettings) -> Result<TableSettings, SettingsError> {
        new_settings.validate()?;

        let mut guard = self
            .settings
            .write()
            .map_err(|_| SettingsError::StoragePoisoned)?;
        *guard = new_settings.clone();
        tracing::info!(settings = ?new_settings, "table settings updated");
        Ok(new_settings)
    }

    /// Update specific field
    pub fn update_field(
        &self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<TableSettings, SettingsError> {
        let mut current = self.get()?;
        current.set_field(field, value)?;
        self.update(current)
    }

    /// Reset to default settings
    pub fn reset(&self) -> Result<TableSettings, SettingsError> {
        self.update(TableSettings::default())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Settings storage poisoned")]
    StoragePoisoned,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn default_settings_are_valid() {
        let settings = TableSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.small_blind(), 10);
        assert_eq!(settings.starting_stack(), 2000);
        assert_eq!(settings.dedup_ttl(), Duration::from_secs(5));
    }

    #[test]
    fn validates_ranges() {
        for bad in [
            TableSettings { big_blind: 0, ..Default::default() },
            TableSettings { big_blind: 15, ..Default::default() },
            TableSettings { default_stack_bb: 0, ..Default::default() },
            TableSettings { dedup_ttl_ms: 0, ..Default::default() },
            TableSettings { snapshot_capacity: 0, ..Default::default() },
            TableSettings { history_capacity: 0, ..Default::default() },
            TableSettings { session_timeout_minutes: 0, ..Default::default() },
            TableSettings { max_ai_actions_per_turn: 0, ..Default::default() },
            TableSettings { log_level: " ".into(), ..Default::default() },
        ] {
            assert!(bad.validate().is_err(), "{bad:?} passed validation");
        }
    }

    #[test]
    fn env_overlays_defaults() {
        let settings = TableSettings::from_vars(vars(&[
            ("HOLDEM_BIG_BLIND", "50"),
            ("HOLDEM_RUNOUT", "paced"),
            ("HOLDEM_STRICT_INVARIANTS", "true"),
            ("HOLDEM_LOG_LEVEL", "debug,holdem_table=trace"),
            ("PATH", "/usr/bin"),
        ]))
        .expect("settings from env");

        assert_eq!(settings.big_blind, 50);
        assert_eq!(settings.runout, RunoutMode::Paced);
        assert!(settings.strict_invariants);
        assert_eq!(settings.log_level, "debug,holdem_table=trace");
        assert_eq!(settings.history_capacity, 500);
    }

    #[test]
    fn env_rejects_garbage_and_unknown_keys() {
        assert!(TableSettings::from_vars(vars(&[("HOLDEM_BIG_BLIND", "lots")])).is_err());
        assert!(TableSettings::from_vars(vars(&[("HOLDEM_RUNOUT", "slow")])).is_err());
        assert!(TableSettings::from_vars(vars(&[("HOLDEM_COLOR", "1")])).is_err());
        assert!(TableSettings::from_vars(vars(&[("HOLDEM_BIG_BLIND", "3")])).is_err());
    }

    #[test]
    fn settings_store_rejects_invalid_updates() {
        let store = SettingsStore::new();

        let invalid = TableSettings {
            snapshot_capacity: 1000,
            ..Default::default()
        };
        assert!(store.update(invalid).is_err());

        let current = store.get().expect("get");
        assert_eq!(current, TableSettings::default());
    }

    #[test]
    fn settings_store_updates_individual_fields() {
        let store = SettingsStore::new();

        store
            .update_field("big_blind", serde_json::json!(40))
            .expect("update blind");
        store
            .update_field("runout", serde_json::json!("paced"))
            .expect("update runout");
        let settings = store.get().expect("get");
        assert_eq!(settings.big_blind, 40);
        assert_eq!(settings.runout, RunoutMode::Paced);

        assert!(store
            .update_field("big_blind", serde_json::json!("not a number"))
            .is_err());
        assert!(store
            .update_field("unknown_field", serde_json::json!(42))
            .is_err());
        assert_eq!(store.get().expect("get").big_blind, 40);

        let reset = store.reset().expect("reset");
        assert_eq!(reset, TableSettings::default());
    }

    #[test]
    fn settings_store_thread_safe() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SettingsStore::new());
        let mut handles = Vec::new();

        for i in 1..=5u32 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let settings = TableSettings {
                    big_blind: i * 10,
                    ..Default::default()
                };
                store.update(settings).ok();
            }));
        }

        for handle in handles {
            handle.join().expect("join thread");
        }

        let final_settings = store.get().expect("get");
        assert!(final_settings.validate().is_ok());
    }
}

// src/memory/mod.rs — Persistence adapters

pub mod schema;
pub mod store;

use std::sync::Mutex;
use std::time::Duration;

use crate::core::types::{Action, BehaviorPattern, MergeMarker};
use crate::infra::errors::ForesightError;

pub use store::SqliteStorage;

/// Attempts per storage call before a transient failure is given up on.
pub const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(25);

/// Everything the engine persists: recent actions (oldest first), the
/// learned pattern set, and which log that set was last merged from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub actions: Vec<Action>,
    pub patterns: Vec<BehaviorPattern>,
    pub marker: Option<MergeMarker>,
}

/// Durable storage for the engine's two collections.
///
/// Implementations report failures; the engine logs them and keeps running
/// from memory.
pub trait StorageAdapter: Send + Sync {
    fn load(&self) -> Result<PersistedState, ForesightError>;

    /// Append one action, keeping only the newest `retain` actions.
    fn append_action(&self, action: &Action, retain: usize) -> Result<(), ForesightError>;

    /// Replace the stored pattern set and its merge marker. A `None` marker
    /// removes the stored one.
    fn save_patterns(
        &self,
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError>;

    /// Replace everything.
    fn save(
        &self,
        actions: &[Action],
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError>;

    fn clear(&self) -> Result<(), ForesightError>;
}

/// Run a storage call, retrying transient failures with a short linear backoff.
/// Other errors, and the last transient one, are returned to the caller.
pub fn with_retry<T>(
    mut op: impl FnMut() -> Result<T, ForesightError>,
) -> Result<T, ForesightError> {
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if e.is_transient() && attempt < MAX_ATTEMPTS => {
                tracing::debug!("Transient storage failure (attempt {}): {}", attempt, e);
                std::thread::sleep(RETRY_DELAY * attempt);
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Process-local storage. Useful for tests and hosts without durability needs.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Mutex<PersistedState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Copy of what is currently stored.
    pub fn snapshot(&self) -> PersistedState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn load(&self) -> Result<PersistedState, ForesightError> {
        let state = self.state.lock().map_err(|_| ForesightError::LockPoisoned)?;
        Ok(state.clone())
    }

    fn append_action(&self, action: &Action, retain: usize) -> Result<(), ForesightError> {
        let mut state = self.state.lock().map_err(|_| ForesightError::LockPoisoned)?;
        state.actions.push(action.clone());
        let excess = state.actions.len().saturating_sub(retain);
        state.actions.drain(..excess);
        Ok(())
    }

    fn save_patterns(
        &self,
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError> {
        let mut state = self.state.lock().map_err(|_| ForesightError::LockPoisoned)?;
        state.patterns = patterns.to_vec();
        state.marker = marker.cloned();
        Ok(())
    }

    fn save(
        &self,
        actions: &[Action],
        patterns: &[BehaviorPattern],
        marker: Option<&MergeMarker>,
    ) -> Result<(), ForesightError> {
        let mut state = self.state.lock().map_err(|_| ForesightError::LockPoisoned)?;
        state.actions = actions.to_vec();
        state.patterns = patterns.to_vec();
        state.marker = marker.cloned();
        Ok(())
    }

    fn clear(&self) -> Result<(), ForesightError> {
        let mut state = self.state.lock().map_err(|_| ForesightError::LockPoisoned)?;
        *state = PersistedState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ActionKind, Context, DeviceClass, Payload, TimeOfDay};
    use chrono::{Utc, Weekday};

    fn action(id: &str) -> Action {
        Action {
            id: id.into(),
            kind: ActionKind::GestureUse,
            payload: Payload::new(),
            occurred_at: Utc::now(),
            context: Context {
                time_of_day: TimeOfDay::Afternoon,
                day_of_week: Weekday::Fri,
                device_class: DeviceClass::Tablet,
                current_location: "/".into(),
                recent_action_kinds: Vec::new(),
            },
        }
    }

    #[test]
    fn test_memory_append_retains_newest() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage.append_action(&action(&format!("a-{i}")), 3).unwrap();
        }
        let ids: Vec<String> = storage.load().unwrap().actions.into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["a-2", "a-3", "a-4"]);
    }

    #[test]
    fn test_retry_recovers_from_transient_failure() {
        let mut calls = 0;
        let result = with_retry(|| {
            calls += 1;
            if calls == 1 {
                Err(ForesightError::Io(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "interrupted",
                )))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_retry_gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(|| {
            calls += 1;
            Err(ForesightError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "busy",
            )))
        });
        assert!(result.is_err());
        assert_eq!(calls, MAX_ATTEMPTS);
    }

    #[test]
    fn test_retry_skips_permanent_failure() {
        let mut calls = 0;
        let result: Result<(), _> = with_retry(|| {
            calls += 1;
            Err(ForesightError::LockPoisoned)
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_memory_clear() {
        let storage = MemoryStorage::new();
        storage.append_action(&action("a-1"), 10).unwrap();
        storage.clear().unwrap();
        assert_eq!(storage.snapshot(), PersistedState::default());
    }
}

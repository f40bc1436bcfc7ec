// src/patterns/context.rs — Situational context resolution

use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Datelike, FixedOffset, Local, Timelike, Utc};

use crate::core::types::{ActionKind, Context, DeviceClass, TimeOfDay};

/// Number of preceding action kinds captured in each context.
pub const RECENT_WINDOW: usize = 5;

/// Source of wall-clock time, in the user's local offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// The host's real clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// What the host environment looks like right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surroundings {
    pub viewport_width: Option<u32>,
    pub location: String,
}

/// Supplies host-environment facts the engine must not read directly.
pub trait ContextProvider: Send + Sync {
    fn surroundings(&self) -> Surroundings;
}

/// A provider whose values the host updates as the UI changes.
#[derive(Debug)]
pub struct StaticContextProvider {
    state: RwLock<Surroundings>,
}

impl StaticContextProvider {
    pub fn new(viewport_width: Option<u32>, location: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(Surroundings {
                viewport_width,
                location: location.into(),
            }),
        }
    }

    pub fn set_location(&self, location: impl Into<String>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).location = location.into();
    }

    pub fn set_viewport_width(&self, width: Option<u32>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).viewport_width = width;
    }
}

impl Default for StaticContextProvider {
    fn default() -> Self {
        Self::new(None, "/")
    }
}

impl ContextProvider for StaticContextProvider {
    fn surroundings(&self) -> Surroundings {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Build a context from local time, host surroundings, and the kinds of the
/// most recent actions (oldest first). Only the last `RECENT_WINDOW` are kept.
pub fn resolve(
    now: DateTime<FixedOffset>,
    surroundings: Surroundings,
    recent: impl IntoIterator<Item = ActionKind>,
) -> Context {
    let mut recent_action_kinds: Vec<ActionKind> = recent.into_iter().collect();
    if recent_action_kinds.len() > RECENT_WINDOW {
        recent_action_kinds.drain(..recent_action_kinds.len() - RECENT_WINDOW);
    }

    Context {
        time_of_day: TimeOfDay::from_hour(now.hour()),
        day_of_week: now.weekday(),
        device_class: DeviceClass::from_width(surroundings.viewport_width),
        current_location: surroundings.location,
        recent_action_kinds,
    }
}

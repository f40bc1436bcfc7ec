// src/patterns/event_log.rs — Bounded action log

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset, Utc};
use uuid::Uuid;

use crate::core::types::{Action, ActionKind, Payload};
use crate::patterns::context::{self, Surroundings, RECENT_WINDOW};

/// Append-only, capacity-bounded log of actions. Oldest entries are evicted
/// first once the log is full.
#[derive(Debug, Clone)]
pub struct EventStore {
    actions: VecDeque<Action>,
    capacity: usize,
    version: u64,
}

impl EventStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            actions: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            version: 0,
        }
    }

    /// Restore a log from persisted actions (oldest first). Only the newest
    /// `capacity` entries are kept.
    pub fn from_actions(capacity: usize, actions: Vec<Action>) -> Self {
        let mut store = Self::new(capacity);
        for action in actions {
            store.push(action);
        }
        store
    }

    /// Record a new action. The context is resolved from the trailing window
    /// of stored actions before the new one is appended.
    pub fn record(
        &mut self,
        kind: ActionKind,
        payload: Payload,
        now: DateTime<FixedOffset>,
        surroundings: Surroundings,
    ) -> &Action {
        let context = context::resolve(now, surroundings, self.recent_kinds(RECENT_WINDOW));
        let action = Action {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            occurred_at: now.with_timezone(&Utc),
            context,
        };
        self.push(action)
    }

    fn push(&mut self, action: Action) -> &Action {
        self.actions.push_back(action);
        while self.actions.len() > self.capacity {
            self.actions.pop_front();
        }
        self.version += 1;
        // Non-empty: we just pushed.
        &self.actions[self.actions.len() - 1]
    }

    /// Kinds of the last `n` actions, oldest first.
    pub fn recent_kinds(&self, n: usize) -> Vec<ActionKind> {
        let skip = self.actions.len().saturating_sub(n);
        self.actions.iter().skip(skip).map(|a| a.kind).collect()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Action> + ExactSizeIterator {
        self.actions.iter()
    }

    /// Chronological kind sequence of the whole log.
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.actions.iter().map(|a| a.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes on every append or clear; used to detect unchanged input.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Most recently recorded action.
    pub fn latest(&self) -> Option<&Action> {
        self.actions.back()
    }

    /// Owned copy of the log, oldest first.
    pub fn to_vec(&self) -> Vec<Action> {
        self.actions.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.actions.clear();
        self.version += 1;
    }
}

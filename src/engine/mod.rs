// src/engine/mod.rs — Predictive engine facade

pub mod insights;
mod scheduler;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;

use crate::core::types::{
    Action, ActionKind, BehaviorPattern, Context, Insights, MergeMarker, Payload, Prediction,
    TaskSuggestion,
};
use crate::infra::config::EngineConfig;
use crate::infra::errors::ForesightError;
use crate::memory::{self, MemoryStorage, StorageAdapter};
use crate::patterns::context::{
    self, Clock, ContextProvider, StaticContextProvider, SystemClock, RECENT_WINDOW,
};
use crate::patterns::event_log::EventStore;
use crate::patterns::miner::PatternMiner;
use crate::patterns::pattern_store::{MergeOutcome, MergePolicy, PatternStore};
use crate::predict::{self, SuggestionLimits};

use scheduler::MiningScheduler;

/// Result of one mining pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiningReport {
    /// Learning is disabled.
    Paused,
    /// Too few actions recorded to mine.
    InsufficientData { have: usize, need: usize },
    /// The event log has not changed since the last merge.
    Unchanged,
    /// Learning data was cleared while the pass was running.
    Discarded,
    Merged(MergeOutcome),
}

struct EngineState {
    events: EventStore,
    patterns: PatternStore,
    current: Vec<Prediction>,
    /// Set once the log first reaches the prediction minimum.
    threshold_signalled: bool,
    /// Bumped by every clear so in-flight passes can tell they are stale.
    epoch: u64,
    last_mined_at: Option<DateTime<Utc>>,
    /// Persisted alongside the patterns; names the log they were merged from.
    last_merge: Option<MergeMarker>,
}

pub(crate) struct EngineInner {
    config: EngineConfig,
    storage: Arc<dyn StorageAdapter>,
    context: Arc<dyn ContextProvider>,
    clock: Arc<dyn Clock>,
    miner: PatternMiner,
    state: RwLock<EngineState>,
    /// Serializes mutations so a mining merge never interleaves with a record.
    writer: Mutex<()>,
    learning_enabled: AtomicBool,
    scheduler: Mutex<MiningScheduler>,
}

/// Assembles a [`PredictiveEngine`] from its collaborators.
pub struct EngineBuilder {
    config: EngineConfig,
    storage: Option<Arc<dyn StorageAdapter>>,
    context: Option<Arc<dyn ContextProvider>>,
    clock: Option<Arc<dyn Clock>>,
    miner: Option<PatternMiner>,
}

impl EngineBuilder {
    pub fn storage(mut self, storage: Arc<dyn StorageAdapter>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn context_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn miner(mut self, miner: PatternMiner) -> Self {
        self.miner = Some(miner);
        self
    }

    /// Build the engine, restoring whatever the storage adapter holds. A
    /// failed load is logged and the engine starts empty.
    ///
    /// When the newest restored action is the one the stored patterns were
    /// merged from, the restored log counts as merged and the first pass
    /// after a restart reports [`MiningReport::Unchanged`].
    pub fn build(self) -> PredictiveEngine {
        let config = self.config;
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        let persisted = match memory::with_retry(|| storage.load()) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("Failed to load learning data, starting empty: {}", e);
                Default::default()
            }
        };
        let events = EventStore::from_actions(config.max_stored_actions, persisted.actions);
        let mut patterns = PatternStore::from_patterns(persisted.patterns);
        if let Some(marker) = &persisted.marker {
            patterns.set_merged_at(marker.merged_at);
            let newest = events.latest().map(|a| a.id.as_str());
            if marker.last_action_id.as_deref() == newest {
                patterns.mark_merged(events.version());
            }
        }
        tracing::debug!(
            "Restored {} actions and {} patterns",
            events.len(),
            patterns.len()
        );

        let state = EngineState {
            threshold_signalled: events.len() >= config.min_actions_for_prediction,
            events,
            patterns,
            current: Vec::new(),
            epoch: 0,
            last_mined_at: None,
            last_merge: persisted.marker,
        };

        let scheduler = MiningScheduler::new(config.mining_interval());
        PredictiveEngine {
            inner: Arc::new(EngineInner {
                context: self
                    .context
                    .unwrap_or_else(|| Arc::new(StaticContextProvider::default())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                miner: self.miner.unwrap_or_default(),
                storage,
                config,
                state: RwLock::new(state),
                writer: Mutex::new(()),
                learning_enabled: AtomicBool::new(true),
                scheduler: Mutex::new(scheduler),
            }),
        }
    }
}

/// Learns behavior patterns from recorded actions and turns them into
/// predictions and task suggestions.
///
/// Cheap to clone; clones share state. Recording and query operations never
/// fail: storage problems are logged and the in-memory state carries on.
#[derive(Clone)]
pub struct PredictiveEngine {
    inner: Arc<EngineInner>,
}

impl PredictiveEngine {
    pub fn builder(config: EngineConfig) -> EngineBuilder {
        EngineBuilder {
            config,
            storage: None,
            context: None,
            clock: None,
            miner: None,
        }
    }

    /// In-memory engine on the system clock.
    pub fn new(config: EngineConfig) -> Self {
        Self::builder(config).build()
    }

    /// Engine restored from, and persisting to, `storage`.
    pub fn with_storage(config: EngineConfig, storage: Arc<dyn StorageAdapter>) -> Self {
        Self::builder(config).storage(storage).build()
    }

    pub(crate) fn from_inner(inner: Arc<EngineInner>) -> Self {
        Self { inner }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.inner.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.inner.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scheduler(&self) -> MutexGuard<'_, MiningScheduler> {
        self.inner.scheduler.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Recording --

    /// Record one user action with a freshly resolved context.
    pub fn record_action(&self, kind: ActionKind, payload: Payload) -> Action {
        let _writer = self.writer();
        let now = self.inner.clock.now();
        let surroundings = self.inner.context.surroundings();

        let (action, crossed) = {
            let mut state = self.write();
            let action = state.events.record(kind, payload, now, surroundings).clone();
            let crossed = !state.threshold_signalled
                && state.events.len() >= self.inner.config.min_actions_for_prediction;
            if crossed {
                state.threshold_signalled = true;
            }
            (action, crossed)
        };

        let retain = self.inner.config.max_persisted_actions;
        if let Err(e) = memory::with_retry(|| self.inner.storage.append_action(&action, retain)) {
            tracing::warn!("Failed to persist action {}: {}", action.id, e);
        }

        if crossed && self.is_learning_enabled() {
            tracing::debug!("Enough actions recorded, requesting a mining pass");
            self.scheduler().request();
        }
        action
    }

    // -- Learning --

    /// Mine the current log and merge the result into the pattern set.
    pub fn run_mining_pass(&self) -> MiningReport {
        if !self.is_learning_enabled() {
            return MiningReport::Paused;
        }
        let need = self.inner.config.min_actions_for_prediction;

        let (candidates, version, newest, epoch) = {
            let state = self.read();
            let have = state.events.len();
            if have < need {
                return MiningReport::InsufficientData { have, need };
            }
            let version = state.events.version();
            if state.patterns.merged_version() == Some(version) {
                return MiningReport::Unchanged;
            }
            let newest = state.events.latest().map(|a| a.id.clone());
            (self.inner.miner.mine(&state.events), version, newest, state.epoch)
        };

        let _writer = self.writer();
        let now = self.inner.clock.now_utc();
        let (outcome, snapshot) = {
            let mut state = self.write();
            if state.epoch != epoch {
                return MiningReport::Discarded;
            }
            let outcome = state
                .patterns
                .merge(version, candidates, self.merge_policy(), now);
            state.last_mined_at = Some(now);
            let snapshot = if outcome.skipped {
                None
            } else {
                let marker = MergeMarker {
                    last_action_id: newest,
                    merged_at: now,
                };
                state.last_merge = Some(marker.clone());
                Some((state.patterns.to_vec(), marker))
            };
            (outcome, snapshot)
        };

        if let Some((patterns, marker)) = snapshot {
            let saved = memory::with_retry(|| {
                self.inner.storage.save_patterns(&patterns, Some(&marker))
            });
            if let Err(e) = saved {
                tracing::warn!("Failed to persist behavior patterns: {}", e);
            }
        }
        if outcome.skipped {
            MiningReport::Unchanged
        } else {
            MiningReport::Merged(outcome)
        }
    }

    /// Run a pass only if a mining interval has elapsed since the last one.
    /// For hosts that drive learning themselves instead of running the loop.
    pub fn mine_if_due(&self) -> Option<MiningReport> {
        let now = self.inner.clock.now_utc();
        let due = match self.read().last_mined_at {
            None => true,
            Some(last) => chrono::Duration::from_std(self.inner.config.mining_interval())
                .map(|interval| now - last >= interval)
                .unwrap_or(true),
        };
        due.then(|| self.run_mining_pass())
    }

    fn merge_policy(&self) -> MergePolicy {
        let config = &self.inner.config;
        MergePolicy {
            reinforcement_step: config.reinforcement_step,
            confidence_floor: config.confidence_floor,
            decay_rate_per_week: config.decay_rate_per_week,
        }
    }

    /// Spawn the recurring mining task on the current tokio runtime.
    ///
    /// The runtime is remembered so resuming learning can restart the task.
    pub fn start_learning_loop(&self) -> Result<(), ForesightError> {
        let runtime = Handle::try_current().map_err(|_| ForesightError::NoRuntime)?;
        let threshold_reached = self.read().threshold_signalled;

        let mut scheduler = self.scheduler();
        scheduler.attach(runtime);
        if self.is_learning_enabled() {
            scheduler.start(Arc::downgrade(&self.inner));
            if threshold_reached {
                scheduler.request();
            }
        }
        Ok(())
    }

    /// Pause or resume scheduled mining. Recording continues either way and
    /// learned patterns are kept.
    pub fn set_learning_enabled(&self, enabled: bool) {
        let was = self.inner.learning_enabled.swap(enabled, Ordering::SeqCst);
        if was == enabled {
            return;
        }
        let mut scheduler = self.scheduler();
        if enabled {
            tracing::info!("Learning resumed");
            if scheduler.is_attached() {
                scheduler.start(Arc::downgrade(&self.inner));
            }
            if self.read().threshold_signalled {
                scheduler.request();
            }
        } else {
            tracing::info!("Learning paused");
            scheduler.stop();
        }
    }

    pub fn is_learning_enabled(&self) -> bool {
        self.inner.learning_enabled.load(Ordering::SeqCst)
    }

    /// Whether the recurring mining task is currently alive.
    pub fn is_learning_loop_running(&self) -> bool {
        self.scheduler().is_running()
    }

    // -- Predictions & suggestions --

    /// Context for the present moment, as the next recorded action would see it.
    pub fn current_context(&self) -> Context {
        let recent = self.read().events.recent_kinds(RECENT_WINDOW);
        context::resolve(
            self.inner.clock.now(),
            self.inner.context.surroundings(),
            recent,
        )
    }

    /// Generate predictions for the current context and keep them as current.
    pub fn generate_predictions(&self) -> Vec<Prediction> {
        let context = self.current_context();
        self.generate_predictions_for(&context)
    }

    /// Generate predictions for an explicit context and keep them as current.
    pub fn generate_predictions_for(&self, context: &Context) -> Vec<Prediction> {
        let _writer = self.writer();
        let now = self.inner.clock.now_utc();
        let mut state = self.write();
        let predictions = predict::generate(
            &state.events,
            &state.patterns,
            context,
            now,
            &self.inner.config,
        );
        tracing::debug!("Generated {} predictions", predictions.len());
        state.current = predictions.clone();
        predictions
    }

    /// Predictions from the last generation that have not expired.
    pub fn current_predictions(&self) -> Vec<Prediction> {
        let now = self.inner.clock.now_utc();
        self.read()
            .current
            .iter()
            .filter(|p| p.is_active(now))
            .cloned()
            .collect()
    }

    pub fn generate_smart_task_suggestions(&self) -> Vec<TaskSuggestion> {
        let context = self.current_context();
        let config = &self.inner.config;
        let limits = SuggestionLimits {
            min_task_actions: config.min_task_actions_for_suggestions,
            max_suggestions: config.max_suggestions,
        };
        predict::compose(self.read().events.iter(), &context, limits)
    }

    // -- Inspection --

    /// Learned patterns, ordered by signature.
    pub fn behavior_patterns(&self) -> Vec<BehaviorPattern> {
        self.read().patterns.to_vec()
    }

    /// Stored actions, oldest first.
    pub fn action_history(&self) -> Vec<Action> {
        self.read().events.to_vec()
    }

    pub fn insights(&self) -> Insights {
        let now = self.inner.clock.now_utc();
        let state = self.read();
        let active = state.current.iter().filter(|p| p.is_active(now)).count();
        insights::summarize(&state.events, &state.patterns, active)
    }

    // -- Maintenance --

    /// Forget every action, pattern, and prediction, in memory and in storage.
    pub fn clear_learning_data(&self) {
        let _writer = self.writer();
        {
            let mut state = self.write();
            state.events.clear();
            state.patterns.clear();
            state.current.clear();
            state.threshold_signalled = false;
            state.last_mined_at = None;
            state.last_merge = None;
            state.epoch += 1;
        }
        if let Err(e) = memory::with_retry(|| self.inner.storage.clear()) {
            tracing::warn!("Failed to clear persisted learning data: {}", e);
        }
        tracing::info!("Learning data cleared");
    }

    /// Write the full in-memory state to storage.
    pub fn flush(&self) -> Result<(), ForesightError> {
        let (actions, patterns, marker) = {
            let state = self.read();
            let actions = state.events.to_vec();
            let skip = actions
                .len()
                .saturating_sub(self.inner.config.max_persisted_actions);
            (
                actions[skip..].to_vec(),
                state.patterns.to_vec(),
                state.last_merge.clone(),
            )
        };
        memory::with_retry(|| self.inner.storage.save(&actions, &patterns, marker.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::context::ManualClock;
    use chrono::{FixedOffset, TimeZone};

    fn engine(min: usize) -> PredictiveEngine {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let clock = ManualClock::new(tz.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap());
        let config = EngineConfig {
            min_actions_for_prediction: min,
            ..Default::default()
        };
        PredictiveEngine::builder(config)
            .clock(Arc::new(clock))
            .build()
    }

    #[test]
    fn test_mining_needs_minimum_actions() {
        let engine = engine(3);
        engine.record_action(ActionKind::GestureUse, Payload::new());
        assert_eq!(
            engine.run_mining_pass(),
            MiningReport::InsufficientData { have: 1, need: 3 }
        );
    }

    #[test]
    fn test_second_pass_without_new_actions_is_unchanged() {
        let engine = engine(3);
        for _ in 0..4 {
            engine.record_action(ActionKind::PageNavigation, Payload::new());
        }
        assert!(matches!(engine.run_mining_pass(), MiningReport::Merged(_)));
        let before = engine.behavior_patterns();
        assert_eq!(engine.run_mining_pass(), MiningReport::Unchanged);
        assert_eq!(engine.behavior_patterns(), before);
    }

    #[test]
    fn test_rebuild_on_same_storage_is_unchanged() {
        let storage = Arc::new(MemoryStorage::new());
        let config = EngineConfig {
            min_actions_for_prediction: 3,
            ..Default::default()
        };
        let first = PredictiveEngine::builder(config.clone())
            .storage(storage.clone())
            .build();
        for _ in 0..4 {
            first.record_action(ActionKind::PageNavigation, Payload::new());
        }
        assert!(matches!(first.run_mining_pass(), MiningReport::Merged(_)));
        let before = first.behavior_patterns();

        let second = PredictiveEngine::builder(config).storage(storage).build();
        assert_eq!(second.run_mining_pass(), MiningReport::Unchanged);
        assert_eq!(second.behavior_patterns(), before);

        second.record_action(ActionKind::PageNavigation, Payload::new());
        assert!(matches!(second.run_mining_pass(), MiningReport::Merged(_)));
    }

    #[test]
    fn test_paused_engine_does_not_mine() {
        let engine = engine(1);
        engine.record_action(ActionKind::GestureUse, Payload::new());
        engine.set_learning_enabled(false);
        assert_eq!(engine.run_mining_pass(), MiningReport::Paused);
        assert_eq!(engine.action_history().len(), 1);
    }

    #[test]
    fn test_mine_if_due_respects_interval() {
        let engine = engine(1);
        engine.record_action(ActionKind::GestureUse, Payload::new());
        assert!(engine.mine_if_due().is_some());
        engine.record_action(ActionKind::GestureUse, Payload::new());
        assert!(engine.mine_if_due().is_none());
    }

    #[test]
    fn test_start_loop_without_runtime_fails() {
        let engine = engine(1);
        assert!(matches!(
            engine.start_learning_loop(),
            Err(ForesightError::NoRuntime)
        ));
    }

    #[test]
    fn test_clear_resets_everything() {
        let engine = engine(2);
        for _ in 0..3 {
            engine.record_action(ActionKind::TaskInteraction, Payload::new());
        }
        engine.run_mining_pass();
        engine.clear_learning_data();
        assert!(engine.action_history().is_empty());
        assert!(engine.behavior_patterns().is_empty());
        assert!(engine.current_predictions().is_empty());
    }
}

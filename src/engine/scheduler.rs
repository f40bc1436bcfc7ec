// src/engine/scheduler.rs — Background mining trigger

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{EngineInner, MiningReport, PredictiveEngine};

/// Owns the recurring mining task and the eager-request signal.
pub(crate) struct MiningScheduler {
    period: Duration,
    signal: Arc<Notify>,
    runtime: Option<Handle>,
    task: Option<JoinHandle<()>>,
}

impl MiningScheduler {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            signal: Arc::new(Notify::new()),
            runtime: None,
            task: None,
        }
    }

    /// Remember the runtime future restarts should spawn on.
    pub(crate) fn attach(&mut self, runtime: Handle) {
        self.runtime = Some(runtime);
    }

    pub(crate) fn is_attached(&self) -> bool {
        self.runtime.is_some()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the loop if attached and not already running.
    pub(crate) fn start(&mut self, engine: Weak<EngineInner>) {
        if self.is_running() {
            return;
        }
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };
        let signal = self.signal.clone();
        let period = self.period;
        self.task = Some(runtime.spawn(mining_loop(engine, signal, period)));
        tracing::info!("Learning loop started (every {:?})", period);
    }

    /// Cancel the recurring task. Learned state is untouched.
    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Learning loop stopped");
        }
    }

    /// Ask the loop to run a pass as soon as possible. A request made while
    /// the loop is busy or not yet started is kept until it next waits.
    pub(crate) fn request(&self) {
        self.signal.notify_one();
    }
}

impl Drop for MiningScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn mining_loop(engine: Weak<EngineInner>, signal: Arc<Notify>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Consume the immediate first tick
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal.notified() => {}
        }

        let Some(inner) = engine.upgrade() else {
            break;
        };
        match PredictiveEngine::from_inner(inner).run_mining_pass() {
            MiningReport::Merged(outcome) => tracing::debug!(
                "Mining pass: {} new, {} reinforced, {} pruned",
                outcome.inserted,
                outcome.reinforced,
                outcome.pruned
            ),
            other => tracing::trace!("Mining pass skipped: {:?}", other),
        }
    }
}

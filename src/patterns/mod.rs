// src/patterns/mod.rs — Behavior recording and pattern learning

pub mod context;
pub mod decay;
pub mod event_log;
pub mod miner;
pub mod pattern_store;

pub use context::{Clock, ContextProvider, ManualClock, StaticContextProvider, Surroundings, SystemClock};
pub use event_log::EventStore;
pub use miner::{MiningStrategy, PatternCandidate, PatternMiner};
pub use pattern_store::{MergeOutcome, MergePolicy, PatternStore};

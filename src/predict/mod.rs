// src/predict/mod.rs — Predictions and task suggestions

pub mod generator;
pub mod suggestions;

pub use generator::{generate, sequence_continuation};
pub use suggestions::{compose, default_suggestion, SuggestionLimits};

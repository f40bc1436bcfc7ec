// src/predict/generator.rs — Prediction generation from learned patterns

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::core::types::{
    Action, ActionKind, BehaviorPattern, Context, Prediction, PredictionKind, TimeOfDay,
};
use crate::infra::config::{EngineConfig, SequenceMatch};
use crate::patterns::event_log::EventStore;
use crate::patterns::pattern_store::PatternStore;
use crate::predict::suggestions::{self, SuggestionLimits};

/// Pattern confidence is discounted by this factor for next-action predictions.
const NEXT_ACTION_DISCOUNT: f64 = 0.8;
const TIME_ESTIMATE_CONFIDENCE: f64 = 0.7;
const MIN_PRIORITY_RULE_OCCURRENCES: usize = 2;

/// Produce ranked predictions for `context`. Reads state only.
///
/// Returns nothing until the log holds `min_actions_for_prediction` actions.
pub fn generate(
    events: &EventStore,
    patterns: &PatternStore,
    context: &Context,
    now: DateTime<Utc>,
    config: &EngineConfig,
) -> Vec<Prediction> {
    if events.len() < config.min_actions_for_prediction {
        return Vec::new();
    }

    let mut predictions = next_action_predictions(patterns, context, config.sequence_match, now);
    predictions.extend(task_suggestion_predictions(events, context, config, now));
    predictions.extend(time_estimate_prediction(events.iter(), context.time_of_day, now));
    predictions.extend(
        priority_adjustment_prediction(events.iter(), now)
            .filter(|p| p.confidence > config.prediction_threshold),
    );

    predictions.retain(|p| p.confidence > config.prediction_threshold);
    predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    predictions.truncate(config.max_predictions);
    predictions
}

/// The kind that should follow `history` according to a sequence pattern.
///
/// `Full` needs the pattern's first n-1 kinds to end the history. `Prefix`
/// accepts the longest leading run of the pattern that ends the history and
/// predicts the kind right after it.
pub fn sequence_continuation(
    pattern: &[ActionKind],
    history: &[ActionKind],
    mode: SequenceMatch,
) -> Option<ActionKind> {
    let n = pattern.len();
    if n < 2 {
        return None;
    }
    match mode {
        SequenceMatch::Full => history.ends_with(&pattern[..n - 1]).then(|| pattern[n - 1]),
        SequenceMatch::Prefix => (1..n)
            .rev()
            .find(|&k| history.ends_with(&pattern[..k]))
            .map(|k| pattern[k]),
    }
}

fn applies_to(pattern: &BehaviorPattern, context: &Context) -> bool {
    if !pattern.time_conditions.is_empty()
        && !pattern.time_conditions.contains(&context.time_of_day)
    {
        return false;
    }
    match &pattern.conditions.context {
        Some(key) => *key == context.situation_key(),
        None => true,
    }
}

fn next_action_predictions(
    patterns: &PatternStore,
    context: &Context,
    mode: SequenceMatch,
    now: DateTime<Utc>,
) -> Vec<Prediction> {
    let mut best: BTreeMap<ActionKind, (f64, &BehaviorPattern)> = BTreeMap::new();

    for pattern in patterns.iter().filter(|p| applies_to(p, context)) {
        let predicted = if pattern.conditions.sequence_length.is_some() {
            match sequence_continuation(&pattern.action_kinds, &context.recent_action_kinds, mode) {
                Some(kind) => kind,
                None => continue,
            }
        } else {
            match pattern.action_kinds.first() {
                Some(kind) => *kind,
                None => continue,
            }
        };

        let confidence = pattern.confidence * NEXT_ACTION_DISCOUNT;
        match best.get(&predicted) {
            Some((c, _)) if *c >= confidence => {}
            _ => {
                best.insert(predicted, (confidence, pattern));
            }
        }
    }

    best.into_iter()
        .map(|(action, (confidence, pattern))| {
            Prediction::new(
                PredictionKind::NextAction,
                confidence,
                json!({
                    "action": action,
                    "signature": pattern.signature,
                    "pattern_id": pattern.id,
                }),
                format!(
                    "Pattern '{}' observed {} times (confidence {:.2})",
                    pattern.signature, pattern.frequency, pattern.confidence
                ),
                now,
            )
        })
        .collect()
}

fn task_suggestion_predictions(
    events: &EventStore,
    context: &Context,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<Prediction> {
    let limits = SuggestionLimits {
        min_task_actions: config.min_task_actions_for_suggestions,
        max_suggestions: config.max_suggestions,
    };
    suggestions::compose(events.iter(), context, limits)
        .into_iter()
        .map(|s| {
            let reasoning = s.reason.clone();
            let confidence = s.confidence;
            let data = serde_json::to_value(&s).unwrap_or_default();
            Prediction::new(PredictionKind::TaskSuggestion, confidence, data, reasoning, now)
        })
        .collect()
}

/// Average `TimeSpent` duration for the current bucket, or across all
/// buckets when the current one has no samples.
fn time_estimate_prediction<'a>(
    actions: impl IntoIterator<Item = &'a Action>,
    time: TimeOfDay,
    now: DateTime<Utc>,
) -> Option<Prediction> {
    let mut per_bucket: BTreeMap<TimeOfDay, (f64, usize)> = BTreeMap::new();
    for action in actions {
        if let Some(minutes) = action.duration_minutes() {
            let entry = per_bucket.entry(action.context.time_of_day).or_default();
            entry.0 += minutes;
            entry.1 += 1;
        }
    }

    let (sum, samples, basis) = match per_bucket.get(&time) {
        Some(&(sum, n)) if n > 0 => (sum, n, "time_of_day"),
        _ => {
            let (sum, n) = per_bucket
                .values()
                .fold((0.0, 0usize), |(s, c), (bs, bc)| (s + bs, c + bc));
            if n == 0 {
                return None;
            }
            (sum, n, "global")
        }
    };
    let average = sum / samples as f64;

    let reasoning = if basis == "global" {
        format!("Average of {samples} recorded sessions (no data for the {time} yet)")
    } else {
        format!("Average of {samples} sessions recorded in the {time}")
    };

    Some(Prediction::new(
        PredictionKind::TimeEstimate,
        TIME_ESTIMATE_CONFIDENCE,
        json!({
            "estimated_minutes": average,
            "time_of_day": time,
            "basis": basis,
            "samples": samples,
        }),
        reasoning,
        now,
    ))
}

/// Priority changes the user keeps making, as `(from, to)` rules.
fn priority_adjustment_prediction<'a>(
    actions: impl IntoIterator<Item = &'a Action>,
    now: DateTime<Utc>,
) -> Option<Prediction> {
    let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
    for action in actions {
        if let Some((from, to)) = action.task().and_then(|t| t.priority_change()) {
            *counts.entry((from.to_string(), to.to_string())).or_default() += 1;
        }
    }

    let mut rules: Vec<((String, String), usize)> = counts
        .into_iter()
        .filter(|(_, n)| *n >= MIN_PRIORITY_RULE_OCCURRENCES)
        .collect();
    if rules.is_empty() {
        return None;
    }
    rules.sort_by(|a, b| b.1.cmp(&a.1));

    let confidence = (rules[0].1 as f64 / 5.0).min(1.0);
    let rule_values: Vec<serde_json::Value> = rules
        .iter()
        .map(|((from, to), n)| {
            json!({
                "from": from,
                "to": to,
                "occurrences": n,
                "confidence": (*n as f64 / 5.0).min(1.0),
            })
        })
        .collect();
    let ((top_from, top_to), top_n) = &rules[0];

    Some(Prediction::new(
        PredictionKind::PriorityAdjustment,
        confidence,
        json!({ "rules": rule_values }),
        format!("Priority changed from {top_from} to {top_to} {top_n} times"),
        now,
    ))
}

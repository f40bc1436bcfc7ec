// src/engine/insights.rs — Aggregate statistics over learned state

use std::collections::BTreeMap;

use crate::core::types::{ActionKind, Insights, KindUsage, TimeOfDay};
use crate::patterns::event_log::EventStore;
use crate::patterns::pattern_store::PatternStore;

const TOP_KINDS: usize = 5;
/// Actions needed before learning counts as complete.
const FULL_PROGRESS_ACTIONS: usize = 100;

pub fn summarize(events: &EventStore, patterns: &PatternStore, active_predictions: usize) -> Insights {
    let mut by_time: BTreeMap<TimeOfDay, usize> = BTreeMap::new();
    let mut by_kind: BTreeMap<ActionKind, usize> = BTreeMap::new();
    for action in events.iter() {
        *by_time.entry(action.context.time_of_day).or_default() += 1;
        *by_kind.entry(action.kind).or_default() += 1;
    }

    // Earliest bucket wins a tie
    let most_active_time = by_time
        .iter()
        .fold(None::<(TimeOfDay, usize)>, |best, (&time, &n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((time, n)),
        })
        .map(|(time, _)| time);

    let mut top_action_kinds: Vec<KindUsage> = by_kind
        .into_iter()
        .map(|(kind, count)| KindUsage { kind, count })
        .collect();
    top_action_kinds.sort_by(|a, b| b.count.cmp(&a.count));
    top_action_kinds.truncate(TOP_KINDS);

    Insights {
        total_actions: events.len(),
        pattern_count: patterns.len(),
        patterns_by_kind: patterns.count_by_kind(),
        active_predictions,
        most_active_time,
        top_action_kinds,
        learning_progress: events.len().min(FULL_PROGRESS_ACTIONS) as f64
            / FULL_PROGRESS_ACTIONS as f64
            * 100.0,
    }
}

// src/patterns/miner.rs — Pattern detection from the action log

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Weekday;

use crate::core::types::{
    situation_key, Action, ActionKind, PatternConditions, PatternKind, TimeOfDay,
};
use crate::patterns::event_log::EventStore;

/// Length of the n-grams considered by sequence mining.
pub const SEQUENCE_LENGTH: usize = 3;

/// A pattern observation produced by one strategy in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternCandidate {
    pub signature: String,
    pub kind: PatternKind,
    pub frequency: u32,
    pub time_conditions: BTreeSet<TimeOfDay>,
    pub conditions: PatternConditions,
    pub action_kinds: Vec<ActionKind>,
    pub confidence: f64,
}

/// One independent mining strategy.
pub trait MiningStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn mine(&self, actions: &[&Action]) -> Vec<PatternCandidate>;
}

/// Runs a set of strategies over an event log snapshot.
pub struct PatternMiner {
    strategies: Vec<Box<dyn MiningStrategy>>,
}

impl Default for PatternMiner {
    fn default() -> Self {
        Self::new(vec![
            Box::new(TemporalStrategy),
            Box::new(SequentialStrategy),
            Box::new(ContextualStrategy),
            Box::new(TaskStrategy),
        ])
    }
}

impl PatternMiner {
    pub fn new(strategies: Vec<Box<dyn MiningStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run every strategy and dedupe by signature. When two candidates share
    /// a signature the one with more support wins.
    pub fn mine(&self, events: &EventStore) -> Vec<PatternCandidate> {
        let actions: Vec<&Action> = events.iter().collect();
        let mut by_signature: BTreeMap<String, PatternCandidate> = BTreeMap::new();

        for strategy in &self.strategies {
            let found = strategy.mine(&actions);
            tracing::debug!("{} strategy produced {} candidates", strategy.name(), found.len());
            for candidate in found {
                match by_signature.get(&candidate.signature) {
                    Some(existing) if existing.frequency >= candidate.frequency => {}
                    _ => {
                        by_signature.insert(candidate.signature.clone(), candidate);
                    }
                }
            }
        }

        by_signature.into_values().collect()
    }
}

/// Distinct kinds in first-seen order.
fn distinct_kinds(actions: &[&Action]) -> Vec<ActionKind> {
    let mut seen = Vec::new();
    for action in actions {
        if !seen.contains(&action.kind) {
            seen.push(action.kind);
        }
    }
    seen
}

fn ratio(count: usize, divisor: f64) -> f64 {
    (count as f64 / divisor).min(1.0)
}

/// Groups actions by time-of-day bucket.
pub struct TemporalStrategy;

impl MiningStrategy for TemporalStrategy {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn mine(&self, actions: &[&Action]) -> Vec<PatternCandidate> {
        let mut buckets: BTreeMap<TimeOfDay, Vec<&Action>> = BTreeMap::new();
        for action in actions {
            buckets
                .entry(action.context.time_of_day)
                .or_default()
                .push(*action);
        }

        buckets
            .into_iter()
            .filter_map(|(time, group)| {
                let kinds = distinct_kinds(&group);
                if group.len() < 3 || kinds.len() < 2 {
                    return None;
                }
                Some(PatternCandidate {
                    signature: format!("temporal_{time}"),
                    kind: PatternKind::Temporal,
                    frequency: group.len() as u32,
                    time_conditions: BTreeSet::from([time]),
                    conditions: PatternConditions::default(),
                    action_kinds: kinds,
                    confidence: ratio(group.len(), 10.0),
                })
            })
            .collect()
    }
}

/// Counts contiguous 3-grams over the chronological kind sequence.
pub struct SequentialStrategy;

impl MiningStrategy for SequentialStrategy {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn mine(&self, actions: &[&Action]) -> Vec<PatternCandidate> {
        let kinds: Vec<ActionKind> = actions.iter().map(|a| a.kind).collect();
        let mut counts: BTreeMap<&[ActionKind], usize> = BTreeMap::new();
        for window in kinds.windows(SEQUENCE_LENGTH) {
            *counts.entry(window).or_default() += 1;
        }

        counts
            .into_iter()
            .filter(|(_, occurrences)| *occurrences >= 2)
            .map(|(gram, occurrences)| {
                let names: Vec<&str> = gram.iter().map(ActionKind::as_str).collect();
                PatternCandidate {
                    signature: format!("sequence_{}", names.join("_")),
                    kind: PatternKind::Sequential,
                    frequency: occurrences as u32,
                    time_conditions: BTreeSet::new(),
                    conditions: PatternConditions {
                        sequence_length: Some(SEQUENCE_LENGTH),
                        ..Default::default()
                    },
                    action_kinds: gram.to_vec(),
                    confidence: ratio(occurrences, 5.0),
                }
            })
            .collect()
    }
}

/// Groups actions by weekday and time of day together.
pub struct ContextualStrategy;

impl MiningStrategy for ContextualStrategy {
    fn name(&self) -> &'static str {
        "contextual"
    }

    fn mine(&self, actions: &[&Action]) -> Vec<PatternCandidate> {
        let mut buckets: HashMap<(Weekday, TimeOfDay), Vec<&Action>> = HashMap::new();
        for action in actions {
            buckets
                .entry((action.context.day_of_week, action.context.time_of_day))
                .or_default()
                .push(*action);
        }

        let mut out: Vec<PatternCandidate> = buckets
            .into_iter()
            .filter(|(_, group)| group.len() >= 3)
            .map(|((day, time), group)| {
                let key = situation_key(day, time);
                PatternCandidate {
                    signature: format!("context_{key}"),
                    kind: PatternKind::Contextual,
                    frequency: group.len() as u32,
                    time_conditions: BTreeSet::new(),
                    conditions: PatternConditions {
                        context: Some(key),
                        ..Default::default()
                    },
                    action_kinds: distinct_kinds(&group),
                    confidence: ratio(group.len(), 8.0),
                }
            })
            .collect();
        out.sort_by(|a, b| a.signature.cmp(&b.signature));
        out
    }
}

/// Finds when tasks are typically created and completed.
pub struct TaskStrategy;

impl TaskStrategy {
    fn lifecycle(
        actions: &[&Action],
        sub_action: &str,
        label: &str,
    ) -> Option<PatternCandidate> {
        let mut per_time: BTreeMap<TimeOfDay, usize> = BTreeMap::new();
        let mut total = 0usize;
        for action in actions {
            let Some(task) = action.task() else {
                continue;
            };
            if task.sub_action() == Some(sub_action) {
                *per_time.entry(action.context.time_of_day).or_default() += 1;
                total += 1;
            }
        }
        if total < 3 {
            return None;
        }

        // Ties go to the earliest bucket of the day.
        let (time, count) = per_time
            .into_iter()
            .fold(None, |best: Option<(TimeOfDay, usize)>, (time, count)| match best {
                Some((_, c)) if c >= count => best,
                _ => Some((time, count)),
            })?;

        Some(PatternCandidate {
            signature: format!("task_{label}_{time}"),
            kind: PatternKind::Task,
            frequency: count as u32,
            time_conditions: BTreeSet::from([time]),
            conditions: PatternConditions {
                task_action: Some(sub_action.to_string()),
                ..Default::default()
            },
            action_kinds: vec![ActionKind::TaskInteraction],
            confidence: count as f64 / total as f64,
        })
    }
}

impl MiningStrategy for TaskStrategy {
    fn name(&self) -> &'static str {
        "task"
    }

    fn mine(&self, actions: &[&Action]) -> Vec<PatternCandidate> {
        [("complete", "completion"), ("create", "creation")]
            .into_iter()
            .filter_map(|(sub_action, label)| Self::lifecycle(actions, sub_action, label))
            .collect()
    }
}

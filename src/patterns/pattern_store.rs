// src/patterns/pattern_store.rs — Learned pattern set with reinforcement

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::types::{BehaviorPattern, PatternKind};
use crate::patterns::decay;
use crate::patterns::miner::PatternCandidate;

/// Knobs for one merge pass.
#[derive(Debug, Clone, Copy)]
pub struct MergePolicy {
    pub reinforcement_step: f64,
    pub confidence_floor: f64,
    pub decay_rate_per_week: f64,
}

/// What a merge pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub inserted: usize,
    pub reinforced: usize,
    pub pruned: usize,
    /// The pass saw input it had already merged and changed nothing.
    pub skipped: bool,
}

/// The current set of learned patterns. Holds at most one pattern per
/// signature.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    patterns: BTreeMap<String, BehaviorPattern>,
    merged_version: Option<u64>,
    /// When decay was last applied. Untouched patterns decay only for the
    /// time since then.
    merged_at: Option<DateTime<Utc>>,
}

impl PatternStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from persisted patterns. Later duplicates of a signature win.
    pub fn from_patterns(patterns: Vec<BehaviorPattern>) -> Self {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| (p.signature.clone(), p))
                .collect(),
            merged_version: None,
            merged_at: None,
        }
    }

    /// Merge one pass worth of candidates mined from event log `version`.
    ///
    /// Existing signatures are reinforced, new ones inserted, then patterns
    /// this pass did not touch decay with age and anything at or below the
    /// confidence floor is removed. Merging the same version twice is a no-op.
    pub fn merge(
        &mut self,
        version: u64,
        candidates: Vec<PatternCandidate>,
        policy: MergePolicy,
        now: DateTime<Utc>,
    ) -> MergeOutcome {
        if self.merged_version == Some(version) {
            return MergeOutcome {
                skipped: true,
                ..Default::default()
            };
        }

        let mut outcome = MergeOutcome::default();
        let mut touched: HashSet<String> = HashSet::with_capacity(candidates.len());

        for candidate in candidates {
            if !touched.insert(candidate.signature.clone()) {
                continue;
            }
            match self.patterns.get_mut(&candidate.signature) {
                Some(existing) => {
                    existing.frequency = existing.frequency.saturating_add(1);
                    existing.confidence =
                        (existing.confidence + policy.reinforcement_step).min(1.0);
                    existing.last_updated = now;
                    outcome.reinforced += 1;
                }
                None => {
                    tracing::info!(
                        "New behavior pattern '{}' (confidence {:.2})",
                        candidate.signature,
                        candidate.confidence
                    );
                    self.patterns.insert(
                        candidate.signature.clone(),
                        BehaviorPattern {
                            id: Uuid::new_v4().to_string(),
                            signature: candidate.signature,
                            kind: candidate.kind,
                            frequency: candidate.frequency,
                            time_conditions: candidate.time_conditions,
                            conditions: candidate.conditions,
                            action_kinds: candidate.action_kinds,
                            confidence: candidate.confidence.clamp(0.0, 1.0),
                            last_updated: now,
                        },
                    );
                    outcome.inserted += 1;
                }
            }
        }

        for pattern in self.patterns.values_mut() {
            if !touched.contains(&pattern.signature) {
                let since = match self.merged_at {
                    Some(at) => at.max(pattern.last_updated),
                    None => pattern.last_updated,
                };
                pattern.confidence = decay::decayed_confidence(
                    pattern.confidence,
                    since,
                    now,
                    policy.decay_rate_per_week,
                );
            }
        }

        outcome.pruned = self.prune(policy.confidence_floor);
        self.merged_version = Some(version);
        self.merged_at = Some(self.merged_at.map_or(now, |at| at.max(now)));
        outcome
    }

    /// Event log version this store last merged, if any.
    pub fn merged_version(&self) -> Option<u64> {
        self.merged_version
    }

    /// Treat event log `version` as already merged, e.g. after restoring a
    /// pattern set whose source log is unchanged.
    pub fn mark_merged(&mut self, version: u64) {
        self.merged_version = Some(version);
    }

    /// When the last merge ran, if any.
    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        self.merged_at
    }

    /// Restore the time of the last merge so decay resumes from it.
    pub fn set_merged_at(&mut self, at: DateTime<Utc>) {
        self.merged_at = Some(at);
    }

    /// Remove patterns at or below `floor`. Returns how many were removed.
    pub fn prune(&mut self, floor: f64) -> usize {
        let before = self.patterns.len();
        self.patterns.retain(|_, p| p.confidence > floor);
        let pruned = before - self.patterns.len();
        if pruned > 0 {
            tracing::info!("Pruned {} weak behavior patterns", pruned);
        }
        pruned
    }

    pub fn get(&self, signature: &str) -> Option<&BehaviorPattern> {
        self.patterns.get(signature)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BehaviorPattern> {
        self.patterns.values()
    }

    /// All patterns, ordered by signature.
    pub fn to_vec(&self) -> Vec<BehaviorPattern> {
        self.patterns.values().cloned().collect()
    }

    pub fn count_by_kind(&self) -> Vec<(PatternKind, usize)> {
        let mut counts: BTreeMap<PatternKind, usize> = BTreeMap::new();
        for p in self.patterns.values() {
            *counts.entry(p.kind).or_default() += 1;
        }
        counts.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&mut self) {
        self.patterns.clear();
        self.merged_version = None;
        self.merged_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{ActionKind, PatternConditions, TimeOfDay};
    use std::collections::BTreeSet;

    fn policy() -> MergePolicy {
        MergePolicy {
            reinforcement_step: 0.1,
            confidence_floor: 0.3,
            decay_rate_per_week: 0.05,
        }
    }

    fn candidate(signature: &str, confidence: f64) -> PatternCandidate {
        PatternCandidate {
            signature: signature.into(),
            kind: PatternKind::Temporal,
            frequency: 4,
            time_conditions: BTreeSet::from([TimeOfDay::Morning]),
            conditions: PatternConditions::default(),
            action_kinds: vec![ActionKind::TaskInteraction, ActionKind::PageNavigation],
            confidence,
        }
    }

    #[test]
    fn test_insert_then_reinforce() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        let out = store.merge(1, vec![candidate("temporal_morning", 0.5)], policy(), now);
        assert_eq!(out.inserted, 1);
        assert_eq!(store.get("temporal_morning").unwrap().frequency, 4);

        let out = store.merge(2, vec![candidate("temporal_morning", 0.5)], policy(), now);
        assert_eq!(out.reinforced, 1);
        let p = store.get("temporal_morning").unwrap();
        assert_eq!(p.frequency, 5);
        assert!((p.confidence - 0.6).abs() < 1e-9);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_version_is_idempotent() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        store.merge(7, vec![candidate("temporal_morning", 0.5)], policy(), now);
        let before = store.to_vec();

        let out = store.merge(7, vec![candidate("temporal_morning", 0.5)], policy(), now);
        assert!(out.skipped);
        assert_eq!(store.to_vec(), before);
    }

    #[test]
    fn test_confidence_capped_at_one() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        for v in 0..5 {
            store.merge(v, vec![candidate("temporal_evening", 0.95)], policy(), now);
        }
        assert!((store.get("temporal_evening").unwrap().confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_prune_at_floor() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        let out = store.merge(
            1,
            vec![candidate("weak", 0.3), candidate("strong", 0.31)],
            policy(),
            now,
        );
        assert_eq!(out.pruned, 1);
        assert!(store.get("weak").is_none());
        assert!(store.get("strong").is_some());
    }

    #[test]
    fn test_duplicate_candidates_in_one_pass_count_once() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        store.merge(1, vec![candidate("x", 0.5)], policy(), now);
        store.merge(2, vec![candidate("x", 0.5), candidate("x", 0.5)], policy(), now);
        assert_eq!(store.get("x").unwrap().frequency, 5);
    }

    #[test]
    fn test_untouched_patterns_decay_and_prune() {
        let mut store = PatternStore::new();
        let long_ago = Utc::now() - chrono::Duration::weeks(40);
        store.merge(1, vec![candidate("stale", 0.5)], policy(), long_ago);

        // 0.5 * e^(-0.05 * 40) ≈ 0.068 → pruned
        let out = store.merge(2, vec![candidate("fresh", 0.5)], policy(), Utc::now());
        assert_eq!(out.pruned, 1);
        assert!(store.get("stale").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[test]
    fn test_repeated_passes_do_not_compound_decay() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        store.merge(
            1,
            vec![candidate("quiet", 0.9)],
            policy(),
            now - chrono::Duration::weeks(4),
        );

        for v in 2..22 {
            store.merge(v, vec![candidate("busy", 0.5)], policy(), now);
        }

        // Four weeks of decay, applied once: 0.9 * e^(-0.05 * 4)
        let expected = 0.9 * (-0.05f64 * 4.0).exp();
        let quiet = store.get("quiet").unwrap().confidence;
        assert!((quiet - expected).abs() < 1e-9, "got {quiet}, want {expected}");
        assert_eq!(store.merged_at(), Some(now));
    }

    #[test]
    fn test_restored_merge_time_bounds_decay() {
        let now = Utc::now();
        let week_ago = now - chrono::Duration::weeks(1);
        let mut source = PatternStore::new();
        source.merge(
            1,
            vec![candidate("quiet", 0.8)],
            policy(),
            now - chrono::Duration::weeks(5),
        );

        let mut restored = PatternStore::from_patterns(source.to_vec());
        restored.set_merged_at(week_ago);
        restored.merge(1, vec![candidate("busy", 0.5)], policy(), now);

        let expected = 0.8 * (-0.05f64).exp();
        assert!((restored.get("quiet").unwrap().confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn test_mark_merged_skips_that_version() {
        let mut store = PatternStore::new();
        store.mark_merged(3);
        let out = store.merge(3, vec![candidate("x", 0.5)], policy(), Utc::now());
        assert!(out.skipped);
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_resets_version() {
        let mut store = PatternStore::new();
        let now = Utc::now();
        store.merge(1, vec![candidate("x", 0.5)], policy(), now);
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.merged_at(), None);
        let out = store.merge(1, vec![candidate("x", 0.5)], policy(), now);
        assert_eq!(out.inserted, 1);
    }
}

// src/core/types.rs — Core domain types

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Open key-value payload attached to an action. Stored verbatim.
pub type Payload = Map<String, Value>;

/// The kinds of user interaction the engine tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TaskInteraction,
    PageNavigation,
    GestureUse,
    VoiceCommand,
    TimeSpent,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        Self::TaskInteraction,
        Self::PageNavigation,
        Self::GestureUse,
        Self::VoiceCommand,
        Self::TimeSpent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskInteraction => "task_interaction",
            Self::PageNavigation => "page_navigation",
            Self::GestureUse => "gesture_use",
            Self::VoiceCommand => "voice_command",
            Self::TimeSpent => "time_spent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse time-of-day bucket derived from the local wall-clock hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Night,
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 4] = [Self::Night, Self::Morning, Self::Afternoon, Self::Evening];

    /// Night 0–5, morning 6–11, afternoon 12–17, evening 18–23.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=5 => Self::Night,
            6..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Night => "night",
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device class derived from viewport width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    /// `<768` mobile, `<1024` tablet, otherwise desktop. Unknown width is desktop.
    pub fn from_width(width: Option<u32>) -> Self {
        match width {
            Some(w) if w < 768 => Self::Mobile,
            Some(w) if w < 1024 => Self::Tablet,
            _ => Self::Desktop,
        }
    }
}

/// Situational snapshot captured when an action is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub time_of_day: TimeOfDay,
    pub day_of_week: Weekday,
    pub device_class: DeviceClass,
    pub current_location: String,
    /// Up to five preceding action kinds, most recent last.
    pub recent_action_kinds: Vec<ActionKind>,
}

impl Context {
    /// Composite key used by contextual patterns, e.g. `Monday_morning`.
    pub fn situation_key(&self) -> String {
        situation_key(self.day_of_week, self.time_of_day)
    }
}

pub fn situation_key(day: Weekday, time: TimeOfDay) -> String {
    format!("{}_{}", weekday_name(day), time.as_str())
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// One recorded user interaction. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub kind: ActionKind,
    pub payload: Payload,
    pub occurred_at: DateTime<Utc>,
    pub context: Context,
}

impl Action {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Typed view over a `TaskInteraction` payload. `None` for other kinds.
    pub fn task(&self) -> Option<TaskPayload<'_>> {
        (self.kind == ActionKind::TaskInteraction).then_some(TaskPayload { action: self })
    }

    /// Minutes recorded by a `TimeSpent` action, if the payload carries a
    /// non-negative numeric `duration`.
    pub fn duration_minutes(&self) -> Option<f64> {
        if self.kind != ActionKind::TimeSpent {
            return None;
        }
        self.payload
            .get("duration")
            .and_then(Value::as_f64)
            .filter(|d| d.is_finite() && *d >= 0.0)
    }
}

/// Expected fields of a `TaskInteraction` payload:
/// `action` (`create|complete|priority_change`), `title`, `priority`,
/// `fromPriority`, `toPriority`, `reason`. All optional.
#[derive(Debug, Clone, Copy)]
pub struct TaskPayload<'a> {
    action: &'a Action,
}

impl<'a> TaskPayload<'a> {
    pub fn sub_action(&self) -> Option<&'a str> {
        self.action.str_field("action")
    }

    pub fn title(&self) -> Option<&'a str> {
        self.action.str_field("title")
    }

    pub fn priority_change(&self) -> Option<(&'a str, &'a str)> {
        if self.sub_action() != Some("priority_change") {
            return None;
        }
        Some((
            self.action.str_field("fromPriority")?,
            self.action.str_field("toPriority")?,
        ))
    }
}

/// Which mining strategy produced a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Temporal,
    Sequential,
    Contextual,
    Task,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temporal => "temporal",
            Self::Sequential => "sequential",
            Self::Contextual => "contextual",
            Self::Task => "task",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [Self::Temporal, Self::Sequential, Self::Contextual, Self::Task]
            .into_iter()
            .find(|k| k.as_str() == s)
    }
}

/// Additional scoping attached to a pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternConditions {
    /// `<Weekday>_<time>` key for contextual patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_length: Option<usize>,
    /// Task lifecycle event (`complete` / `create`) for task patterns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_action: Option<String>,
}

/// A learned, reinforced aggregate keyed by `signature`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorPattern {
    pub id: String,
    pub signature: String,
    pub kind: PatternKind,
    pub frequency: u32,
    pub time_conditions: BTreeSet<TimeOfDay>,
    pub conditions: PatternConditions,
    pub action_kinds: Vec<ActionKind>,
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
}

/// Identifies the event log a pattern set was last merged from, so a restart
/// does not merge the same actions again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMarker {
    /// Newest action in the log at merge time; `None` for an empty log.
    pub last_action_id: Option<String>,
    pub merged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    NextAction,
    TaskSuggestion,
    TimeEstimate,
    PriorityAdjustment,
}

impl PredictionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NextAction => "next_action",
            Self::TaskSuggestion => "task_suggestion",
            Self::TimeEstimate => "time_estimate",
            Self::PriorityAdjustment => "priority_adjustment",
        }
    }

    /// How long a prediction of this kind stays valid.
    pub fn validity(&self) -> chrono::Duration {
        match self {
            Self::NextAction => chrono::Duration::minutes(30),
            Self::TaskSuggestion => chrono::Duration::hours(24),
            Self::TimeEstimate => chrono::Duration::hours(1),
            Self::PriorityAdjustment => chrono::Duration::hours(12),
        }
    }
}

/// A transient, expiring inference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub kind: PredictionKind,
    pub confidence: f64,
    pub data: Value,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Prediction {
    pub fn new(
        kind: PredictionKind,
        confidence: f64,
        data: Value,
        reasoning: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            confidence,
            data,
            reasoning: reasoning.into(),
            created_at: now,
            expires_at: now + kind.validity(),
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A directly actionable task recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSuggestion {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub estimated_duration_minutes: u32,
    pub tags: Vec<String>,
    pub confidence: f64,
    pub reason: String,
    pub source_action_kinds: Vec<ActionKind>,
}

/// Usage count for one action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindUsage {
    pub kind: ActionKind,
    pub count: usize,
}

/// Aggregate statistics over the engine's learned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub total_actions: usize,
    pub pattern_count: usize,
    pub patterns_by_kind: Vec<(PatternKind, usize)>,
    pub active_predictions: usize,
    pub most_active_time: Option<TimeOfDay>,
    pub top_action_kinds: Vec<KindUsage>,
    /// Percentage in `[0, 100]`.
    pub learning_progress: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(kind: ActionKind, payload: Value) -> Action {
        Action {
            id: "a-1".into(),
            kind,
            payload: payload.as_object().cloned().unwrap_or_default(),
            occurred_at: Utc::now(),
            context: Context {
                time_of_day: TimeOfDay::Morning,
                day_of_week: Weekday::Mon,
                device_class: DeviceClass::Desktop,
                current_location: "/".into(),
                recent_action_kinds: Vec::new(),
            },
        }
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(6), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(18), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Evening);
    }

    #[test]
    fn test_device_class_thresholds() {
        assert_eq!(DeviceClass::from_width(Some(320)), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_width(Some(767)), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_width(Some(768)), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_width(Some(1023)), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_width(Some(1024)), DeviceClass::Desktop);
        assert_eq!(DeviceClass::from_width(None), DeviceClass::Desktop);
    }

    #[test]
    fn test_action_kind_parse_roundtrip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActionKind::parse("unknown"), None);
    }

    #[test]
    fn test_task_payload_view() {
        let a = action(
            ActionKind::TaskInteraction,
            json!({"action": "priority_change", "fromPriority": "low", "toPriority": "high"}),
        );
        let task = a.task().unwrap();
        assert_eq!(task.sub_action(), Some("priority_change"));
        assert_eq!(task.priority_change(), Some(("low", "high")));
        assert!(task.title().is_none());
    }

    #[test]
    fn test_task_payload_missing_fields() {
        let a = action(
            ActionKind::TaskInteraction,
            json!({"action": "priority_change", "fromPriority": 3}),
        );
        assert!(a.task().unwrap().priority_change().is_none());

        let nav = action(ActionKind::PageNavigation, json!({"action": "create"}));
        assert!(nav.task().is_none());
    }

    #[test]
    fn test_duration_minutes() {
        let a = action(ActionKind::TimeSpent, json!({"duration": 25}));
        assert_eq!(a.duration_minutes(), Some(25.0));

        let bad = action(ActionKind::TimeSpent, json!({"duration": "long"}));
        assert!(bad.duration_minutes().is_none());

        let negative = action(ActionKind::TimeSpent, json!({"duration": -4}));
        assert!(negative.duration_minutes().is_none());
    }

    #[test]
    fn test_prediction_expiry_window() {
        let now = Utc::now();
        let p = Prediction::new(PredictionKind::NextAction, 0.7, json!({}), "r", now);
        assert_eq!(p.expires_at - now, chrono::Duration::minutes(30));
        assert!(p.is_active(now));
        assert!(!p.is_active(now + chrono::Duration::minutes(30)));
    }

    #[test]
    fn test_validity_per_prediction_kind() {
        let now = Utc::now();
        for (kind, window) in [
            (PredictionKind::NextAction, chrono::Duration::minutes(30)),
            (PredictionKind::TaskSuggestion, chrono::Duration::hours(24)),
            (PredictionKind::TimeEstimate, chrono::Duration::hours(1)),
            (PredictionKind::PriorityAdjustment, chrono::Duration::hours(12)),
        ] {
            let p = Prediction::new(kind, 0.7, json!({}), "r", now);
            assert_eq!(p.expires_at - p.created_at, window, "{kind:?}");
        }
    }

    #[test]
    fn test_situation_key() {
        assert_eq!(situation_key(Weekday::Mon, TimeOfDay::Morning), "Monday_morning");
    }
}

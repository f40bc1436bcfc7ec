// src/predict/suggestions.rs — Task suggestion composition

use std::collections::HashMap;

use uuid::Uuid;

use crate::core::types::{Action, ActionKind, Context, Priority, TaskSuggestion, TimeOfDay};

/// Limits used when composing suggestions.
#[derive(Debug, Clone, Copy)]
pub struct SuggestionLimits {
    /// Below this many task interactions only the default suggestion is returned.
    pub min_task_actions: usize,
    pub max_suggestions: usize,
}

impl Default for SuggestionLimits {
    fn default() -> Self {
        Self {
            min_task_actions: 5,
            max_suggestions: 5,
        }
    }
}

const KEYWORD_LIMIT: usize = 3;
const KEYWORD_CONFIDENCE: f64 = 0.6;

/// Built-in suggestion for users without enough history.
pub fn default_suggestion() -> TaskSuggestion {
    TaskSuggestion {
        id: Uuid::new_v4().to_string(),
        title: "Organize today's tasks".into(),
        description: "Review what is on your plate and decide what matters most today.".into(),
        priority: Priority::High,
        estimated_duration_minutes: 15,
        tags: vec!["planning".into(), "daily".into()],
        confidence: 0.5,
        reason: "Not enough history yet; a short planning session is a good start".into(),
        source_action_kinds: Vec::new(),
    }
}

/// Compose task suggestions from history and the current context.
///
/// Always returns at least one suggestion and never more than
/// `limits.max_suggestions`.
pub fn compose<'a>(
    actions: impl IntoIterator<Item = &'a Action>,
    context: &Context,
    limits: SuggestionLimits,
) -> Vec<TaskSuggestion> {
    let tasks: Vec<&Action> = actions
        .into_iter()
        .filter(|a| a.kind == ActionKind::TaskInteraction)
        .collect();

    if tasks.len() < limits.min_task_actions {
        return vec![default_suggestion()];
    }

    let mut out: Vec<TaskSuggestion> = context_suggestion(context.time_of_day).into_iter().collect();

    let titles = tasks.iter().filter_map(|a| {
        let task = a.task()?;
        if task.sub_action() == Some("create") {
            task.title()
        } else {
            None
        }
    });
    for keyword in frequent_keywords(titles, KEYWORD_LIMIT) {
        let suggestion = keyword_suggestion(&keyword, context.time_of_day);
        // Aliases such as "meeting" and "meetings" share one template
        if out.iter().all(|s| s.title != suggestion.title) {
            out.push(suggestion);
        }
    }

    out.truncate(limits.max_suggestions.max(1));
    if out.is_empty() {
        out.push(default_suggestion());
    }
    out
}

/// Fixed template keyed only by time of day.
fn context_suggestion(time: TimeOfDay) -> Option<TaskSuggestion> {
    let (title, description, priority, minutes, tags, confidence) = match time {
        TimeOfDay::Morning => (
            "Set today's goals",
            "Pick the three outcomes that would make today a success.",
            Priority::High,
            10,
            vec!["planning", "morning"],
            0.8,
        ),
        TimeOfDay::Afternoon => (
            "Check progress on open tasks",
            "Look over what is in flight and adjust the rest of the day.",
            Priority::Medium,
            10,
            vec!["review", "afternoon"],
            0.65,
        ),
        TimeOfDay::Evening => (
            "Review today and prepare tomorrow",
            "Close out finished work and line up tomorrow's first task.",
            Priority::Medium,
            15,
            vec!["review", "planning", "evening"],
            0.7,
        ),
        TimeOfDay::Night => return None,
    };

    Some(TaskSuggestion {
        id: Uuid::new_v4().to_string(),
        title: title.into(),
        description: description.into(),
        priority,
        estimated_duration_minutes: minutes,
        tags: tags.into_iter().map(String::from).collect(),
        confidence,
        reason: format!("Suggested for the {time}"),
        source_action_kinds: Vec::new(),
    })
}

/// Lowercased tokens of at least three characters that occur at least twice,
/// most frequent first (ties alphabetical), at most `limit` of them.
pub fn frequent_keywords<'a>(titles: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for title in titles {
        for token in title
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.chars().count() >= 3)
        {
            *counts.entry(token.to_lowercase()).or_default() += 1;
        }
    }

    let mut frequent: Vec<(String, usize)> = counts.into_iter().filter(|(_, n)| *n >= 2).collect();
    frequent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    frequent.into_iter().take(limit).map(|(t, _)| t).collect()
}

struct TaskTemplate {
    title: &'static str,
    description: &'static str,
    tags: &'static [&'static str],
    minutes: u32,
}

fn task_template(keyword: &str) -> Option<TaskTemplate> {
    let template = match keyword {
        "meeting" | "meetings" | "sync" => TaskTemplate {
            title: "Prepare for the next meeting",
            description: "Draft an agenda and gather the material you will need.",
            tags: &["meeting", "preparation"],
            minutes: 20,
        },
        "report" | "reports" => TaskTemplate {
            title: "Work on a report",
            description: "Block focused time to move the next report forward.",
            tags: &["report", "writing"],
            minutes: 45,
        },
        "email" | "emails" | "mail" | "inbox" => TaskTemplate {
            title: "Process your inbox",
            description: "Reply to pending emails and archive what is done.",
            tags: &["email", "communication"],
            minutes: 20,
        },
        "review" | "reviews" => TaskTemplate {
            title: "Schedule a review session",
            description: "Go through pending items that need your review.",
            tags: &["review"],
            minutes: 30,
        },
        "call" | "calls" => TaskTemplate {
            title: "Make follow-up calls",
            description: "Return calls and confirm open commitments.",
            tags: &["call", "communication"],
            minutes: 15,
        },
        "plan" | "planning" => TaskTemplate {
            title: "Update your plan",
            description: "Revisit priorities and adjust upcoming work.",
            tags: &["planning"],
            minutes: 20,
        },
        "study" | "learn" | "learning" => TaskTemplate {
            title: "Set aside study time",
            description: "Reserve an uninterrupted block for learning.",
            tags: &["learning"],
            minutes: 60,
        },
        "exercise" | "workout" | "gym" => TaskTemplate {
            title: "Fit in some exercise",
            description: "Keep the habit going with a short workout.",
            tags: &["health"],
            minutes: 30,
        },
        _ => return None,
    };
    Some(template)
}

fn priority_for(time: TimeOfDay) -> Priority {
    match time {
        TimeOfDay::Morning => Priority::High,
        TimeOfDay::Evening => Priority::Low,
        _ => Priority::Medium,
    }
}

fn keyword_suggestion(keyword: &str, time: TimeOfDay) -> TaskSuggestion {
    let (title, description, tags, minutes) = match task_template(keyword) {
        Some(t) => (
            t.title.to_string(),
            t.description.to_string(),
            t.tags.iter().map(|s| s.to_string()).collect::<Vec<String>>(),
            t.minutes,
        ),
        None => (
            format!("Work on {keyword} tasks"),
            format!("You often create tasks about \"{keyword}\"; consider scheduling the next one."),
            vec![keyword.to_string()],
            30,
        ),
    };

    TaskSuggestion {
        id: Uuid::new_v4().to_string(),
        title,
        description,
        priority: priority_for(time),
        estimated_duration_minutes: minutes,
        tags,
        confidence: KEYWORD_CONFIDENCE,
        reason: format!("Based on a frequently created task type: \"{keyword}\""),
        source_action_kinds: vec![ActionKind::TaskInteraction],
    }
}

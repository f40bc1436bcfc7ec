// src/cli/commands.rs — Subcommand implementations

use anyhow::{anyhow, Context as _};
use serde::Serialize;

use crate::core::types::{ActionKind, Payload};
use crate::engine::{MiningReport, PredictiveEngine};

use super::Commands;

/// Run one subcommand against `engine` and print its result as JSON.
pub fn execute(engine: &PredictiveEngine, command: &Commands) -> anyhow::Result<()> {
    match command {
        Commands::Record { kind, payload, .. } => {
            let kind = parse_kind(kind)?;
            let payload = parse_payload(payload.as_deref())?;
            print_json(&engine.record_action(kind, payload))
        }
        Commands::Mine => {
            let report = engine.run_mining_pass();
            if let MiningReport::InsufficientData { have, need } = report {
                eprintln!("Not enough actions to mine yet ({have}/{need}).");
            }
            print_json(&mining_summary(&report, engine.behavior_patterns().len()))
        }
        Commands::Predict => print_json(&engine.generate_predictions()),
        Commands::Suggest => print_json(&engine.generate_smart_task_suggestions()),
        Commands::Patterns => print_json(&engine.behavior_patterns()),
        Commands::History { limit } => {
            let mut history = engine.action_history();
            if let Some(limit) = limit {
                let skip = history.len().saturating_sub(*limit);
                history.drain(..skip);
            }
            print_json(&history)
        }
        Commands::Insights => print_json(&engine.insights()),
        Commands::Clear => {
            engine.clear_learning_data();
            eprintln!("Learning data cleared.");
            Ok(())
        }
    }
}

pub fn parse_kind(raw: &str) -> anyhow::Result<ActionKind> {
    ActionKind::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = ActionKind::ALL.iter().map(ActionKind::as_str).collect();
        anyhow!("unknown action kind '{raw}' (expected one of: {})", known.join(", "))
    })
}

pub fn parse_payload(raw: Option<&str>) -> anyhow::Result<Payload> {
    let Some(raw) = raw else {
        return Ok(Payload::new());
    };
    let value: serde_json::Value = serde_json::from_str(raw).context("payload is not valid JSON")?;
    match value {
        serde_json::Value::Object(map) => Ok(map),
        _ => Err(anyhow!("payload must be a JSON object")),
    }
}

#[derive(Serialize)]
struct MiningSummary {
    status: &'static str,
    inserted: usize,
    reinforced: usize,
    pruned: usize,
    patterns: usize,
}

fn mining_summary(report: &MiningReport, patterns: usize) -> MiningSummary {
    let (status, inserted, reinforced, pruned) = match report {
        MiningReport::Paused => ("paused", 0, 0, 0),
        MiningReport::InsufficientData { .. } => ("insufficient_data", 0, 0, 0),
        MiningReport::Unchanged => ("unchanged", 0, 0, 0),
        MiningReport::Discarded => ("discarded", 0, 0, 0),
        MiningReport::Merged(o) => ("merged", o.inserted, o.reinforced, o.pruned),
    };
    MiningSummary {
        status,
        inserted,
        reinforced,
        pruned,
        patterns,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind() {
        assert_eq!(parse_kind("voice_command").unwrap(), ActionKind::VoiceCommand);
        let err = parse_kind("telepathy").unwrap_err().to_string();
        assert!(err.contains("page_navigation"));
    }

    #[test]
    fn test_parse_payload() {
        assert!(parse_payload(None).unwrap().is_empty());
        let map = parse_payload(Some(r#"{"action":"complete","duration":25}"#)).unwrap();
        assert_eq!(map["action"], "complete");
        assert!(parse_payload(Some("[1,2]")).is_err());
        assert!(parse_payload(Some("{oops")).is_err());
    }

    #[test]
    fn test_mining_summary_status() {
        let s = mining_summary(&MiningReport::InsufficientData { have: 2, need: 10 }, 0);
        assert_eq!(s.status, "insufficient_data");
    }
}

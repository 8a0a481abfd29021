//! Workflow data model: triggers, workflows, and execution logs.
//!
//! Trigger and step configs are persisted as JSON but decoded exactly once,
//! at load time, into typed variants with explicit validation errors. A
//! workflow whose stored config does not validate is not schedulable: it
//! never fires, it never crashes the evaluation pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weft_core::error::{Result, WeftError};
use weft_core::types::{ChainEventFilter, Step};

/// Generate a short prefixed id: `wf_3fa9c10d42`.
pub fn short_id(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..10])
}

/// Which side of the threshold a price trigger watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Above,
    Below,
}

/// The condition under which a workflow fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Trigger {
    /// Fires whenever `interval_minutes` have passed since the last run.
    Interval { interval_minutes: u32 },
    /// Fires when the ticker's current price crosses the threshold.
    PriceThreshold {
        ticker: String,
        threshold: f64,
        direction: Direction,
    },
    /// Fires at most once, at or after the given instant.
    TimeOnce { at: DateTime<Utc> },
    /// Never fires from the scheduler; only via an explicit run request.
    Manual,
    /// Fires when the chain watcher reports a matching on-chain event.
    ChainEvent(ChainEventFilter),
}

impl Trigger {
    pub fn kind(&self) -> &'static str {
        match self {
            Trigger::Interval { .. } => "interval",
            Trigger::PriceThreshold { .. } => "price_threshold",
            Trigger::TimeOnce { .. } => "time_once",
            Trigger::Manual => "manual",
            Trigger::ChainEvent(_) => "chain_event",
        }
    }

    /// Decode a trigger from its persisted `(kind, config)` pair, validating
    /// the config shape for that kind.
    pub fn from_parts(kind: &str, config: &serde_json::Value) -> Result<Self> {
        match kind {
            "interval" => {
                let minutes = config
                    .get("interval_minutes")
                    .and_then(|v| v.as_u64())
                    .ok_or_else(|| {
                        WeftError::Validation("interval trigger needs interval_minutes".into())
                    })?;
                if minutes == 0 {
                    return Err(WeftError::Validation(
                        "interval_minutes must be greater than zero".into(),
                    ));
                }
                Ok(Trigger::Interval {
                    interval_minutes: minutes as u32,
                })
            }
            "price_threshold" => {
                let ticker = config
                    .get("ticker")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                if ticker.is_empty() {
                    return Err(WeftError::Validation(
                        "price_threshold trigger needs a ticker".into(),
                    ));
                }
                let threshold = config
                    .get("threshold")
                    .and_then(|v| v.as_f64())
                    .ok_or_else(|| {
                        WeftError::Validation("price_threshold trigger needs a threshold".into())
                    })?;
                let direction = match config.get("direction").and_then(|v| v.as_str()) {
                    Some("above") => Direction::Above,
                    Some("below") | None => Direction::Below,
                    Some(other) => {
                        return Err(WeftError::Validation(format!(
                            "unknown direction: {other}"
                        )));
                    }
                };
                Ok(Trigger::PriceThreshold {
                    ticker,
                    threshold,
                    direction,
                })
            }
            "time_once" => {
                let raw = config.get("at").and_then(|v| v.as_str()).ok_or_else(|| {
                    WeftError::Validation("time_once trigger needs an 'at' timestamp".into())
                })?;
                let at = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| WeftError::Validation(format!("invalid 'at' timestamp: {e}")))?
                    .with_timezone(&Utc);
                Ok(Trigger::TimeOnce { at })
            }
            "manual" => Ok(Trigger::Manual),
            "chain_event" => {
                let filter: ChainEventFilter = serde_json::from_value(config.clone())
                    .map_err(|e| WeftError::Validation(format!("invalid chain_event config: {e}")))?;
                if filter.event_type.is_empty() {
                    return Err(WeftError::Validation(
                        "chain_event trigger needs an event_type".into(),
                    ));
                }
                Ok(Trigger::ChainEvent(filter))
            }
            other => Err(WeftError::Validation(format!("unknown trigger type: {other}"))),
        }
    }

    /// Encode back to the persisted `(kind, config)` pair.
    pub fn to_parts(&self) -> (&'static str, serde_json::Value) {
        let config = match self {
            Trigger::Interval { interval_minutes } => {
                serde_json::json!({"interval_minutes": interval_minutes})
            }
            Trigger::PriceThreshold {
                ticker,
                threshold,
                direction,
            } => serde_json::json!({
                "ticker": ticker,
                "threshold": threshold,
                "direction": match direction { Direction::Above => "above", Direction::Below => "below" },
            }),
            Trigger::TimeOnce { at } => serde_json::json!({"at": at.to_rfc3339()}),
            Trigger::Manual => serde_json::json!({}),
            Trigger::ChainEvent(filter) => {
                serde_json::to_value(filter).unwrap_or_else(|_| serde_json::json!({}))
            }
        };
        (self.kind(), config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Active,
    Paused,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Active => "active",
            WorkflowStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "paused" => WorkflowStatus::Paused,
            _ => WorkflowStatus::Active,
        }
    }
}

/// A persisted automation: one trigger, an ordered list of steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub trigger: Trigger,
    pub steps: Vec<Step>,
    /// Snapshot of the last run's variables, kept for inspection only.
    /// Runs always build a fresh store.
    #[serde(default)]
    pub variables: serde_json::Value,
    pub status: WorkflowStatus,
    pub run_count: u32,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        owner_id: &str,
        name: &str,
        description: &str,
        trigger: Trigger,
        steps: Vec<Step>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: short_id("wf"),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            trigger,
            steps,
            variables: serde_json::json!({}),
            status: WorkflowStatus::Active,
            run_count: 0,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate an untrusted draft (e.g. parsed from natural language by an
    /// LLM collaborator) into a schedulable workflow. Nothing reaches the
    /// store without passing through here.
    pub fn from_draft(owner_id: &str, draft: WorkflowDraft) -> Result<Self> {
        if draft.name.trim().is_empty() {
            return Err(WeftError::Validation("workflow needs a name".into()));
        }
        if draft.steps.is_empty() {
            return Err(WeftError::Validation("workflow needs at least one step".into()));
        }
        for (i, step) in draft.steps.iter().enumerate() {
            if step.kind.trim().is_empty() {
                return Err(WeftError::Validation(format!(
                    "step {} has no action type",
                    i + 1
                )));
            }
        }
        let trigger = Trigger::from_parts(&draft.trigger_type, &draft.trigger_config)?;
        Ok(Self::new(
            owner_id,
            draft.name.trim(),
            draft.description.trim(),
            trigger,
            draft.steps,
        ))
    }
}

/// An unvalidated workflow definition as produced by an external parser.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub trigger_type: String,
    #[serde(default)]
    pub trigger_config: serde_json::Value,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Terminal status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Halted,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Halted => "halted",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "halted" => RunStatus::Halted,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Completed,
        }
    }
}

/// Outcome of a single step within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// 1-based step index.
    pub step: usize,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub success: bool,
    pub output_preview: String,
}

/// Immutable record of one execution attempt. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub workflow_id: String,
    pub owner_id: String,
    pub status: RunStatus,
    pub steps: Vec<StepOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_trigger_validation() {
        let trigger =
            Trigger::from_parts("interval", &serde_json::json!({"interval_minutes": 60})).unwrap();
        assert_eq!(trigger.kind(), "interval");

        assert!(Trigger::from_parts("interval", &serde_json::json!({})).is_err());
        assert!(
            Trigger::from_parts("interval", &serde_json::json!({"interval_minutes": 0})).is_err()
        );
    }

    #[test]
    fn test_price_threshold_validation() {
        let trigger = Trigger::from_parts(
            "price_threshold",
            &serde_json::json!({"ticker": "AAPL", "threshold": 150.0, "direction": "above"}),
        )
        .unwrap();
        match trigger {
            Trigger::PriceThreshold { direction, .. } => assert_eq!(direction, Direction::Above),
            other => panic!("wrong trigger: {other:?}"),
        }

        assert!(
            Trigger::from_parts("price_threshold", &serde_json::json!({"threshold": 1})).is_err()
        );
        assert!(Trigger::from_parts(
            "price_threshold",
            &serde_json::json!({"ticker": "AAPL", "threshold": 1, "direction": "sideways"}),
        )
        .is_err());
    }

    #[test]
    fn test_unknown_trigger_type() {
        assert!(Trigger::from_parts("on_vibe", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_trigger_roundtrip() {
        let trigger = Trigger::from_parts(
            "time_once",
            &serde_json::json!({"at": "2026-03-01T09:00:00+00:00"}),
        )
        .unwrap();
        let (kind, config) = trigger.to_parts();
        let again = Trigger::from_parts(kind, &config).unwrap();
        match (trigger, again) {
            (Trigger::TimeOnce { at: a }, Trigger::TimeOnce { at: b }) => assert_eq!(a, b),
            other => panic!("wrong roundtrip: {other:?}"),
        }
    }

    #[test]
    fn test_draft_validation() {
        let draft = WorkflowDraft {
            name: "Morning digest".into(),
            description: String::new(),
            trigger_type: "interval".into(),
            trigger_config: serde_json::json!({"interval_minutes": 1440}),
            steps: vec![Step::new(
                "Fetch",
                "web_scrape",
                serde_json::json!({"query": "markets"}),
            )],
        };
        let workflow = Workflow::from_draft("tg:7", draft.clone()).unwrap();
        assert_eq!(workflow.owner_id, "tg:7");
        assert_eq!(workflow.status, WorkflowStatus::Active);
        assert!(workflow.id.starts_with("wf_"));

        let mut empty_steps = draft.clone();
        empty_steps.steps.clear();
        assert!(Workflow::from_draft("tg:7", empty_steps).is_err());

        let mut bad_trigger = draft;
        bad_trigger.trigger_config = serde_json::json!({});
        assert!(Workflow::from_draft("tg:7", bad_trigger).is_err());
    }
}

//! Shared data types for steps and action results.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One unit of work inside a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Display name ("Fetch headlines").
    pub name: String,
    /// Action kind, dispatched against the handler registry.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific configuration. String fields may contain `{{variable}}`
    /// placeholders resolved against the run's variable store.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Legacy per-step override: halt the run when this step fails.
    #[serde(default)]
    pub stop_on_failure: bool,
}

impl Step {
    pub fn new(name: &str, kind: &str, config: serde_json::Value) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            config,
            stop_on_failure: false,
        }
    }

    /// A string field from the step config, or "" when absent.
    pub fn config_str(&self, key: &str) -> &str {
        self.config.get(key).and_then(|v| v.as_str()).unwrap_or("")
    }
}

/// Uniform result of executing one action node.
///
/// Handlers never return errors: anything that goes wrong becomes a failed
/// result so one misbehaving action cannot take down the run loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub output: String,
    /// Handler-specific extras (e.g. `condition_passed` for condition steps,
    /// `status_code` for HTTP calls).
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ActionResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn fail(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// The `condition_passed` extra, defaulting to true when absent.
    pub fn condition_passed(&self) -> bool {
        self.extra
            .get("condition_passed")
            .and_then(|v| v.as_bool())
            .unwrap_or(true)
    }
}

/// Variables produced by an external trigger event, injected into the run's
/// variable store before the first step executes.
pub type EventVars = HashMap<String, serde_json::Value>;

/// Filter for on-chain event triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainEventFilter {
    /// Event kind, e.g. "whale_transfer".
    pub event_type: String,
    /// Minimum transfer amount in whole units.
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,
    /// Optional: only fire for transfers involving this address.
    #[serde(default)]
    pub watch_address: Option<String>,
}

fn default_min_amount() -> f64 {
    10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_deserialize_type_field() {
        let step: Step = serde_json::from_value(serde_json::json!({
            "name": "Check price",
            "type": "stock_lookup",
            "config": {"ticker": "AAPL"}
        }))
        .unwrap();
        assert_eq!(step.kind, "stock_lookup");
        assert_eq!(step.config_str("ticker"), "AAPL");
        assert!(!step.stop_on_failure);
    }

    #[test]
    fn test_condition_passed_default() {
        assert!(ActionResult::ok("yes").condition_passed());
        let r = ActionResult::ok("false").with_extra("condition_passed", serde_json::json!(false));
        assert!(!r.condition_passed());
    }
}

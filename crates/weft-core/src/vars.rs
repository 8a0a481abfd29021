//! Per-run variable store and template interpolation.
//!
//! Each workflow run owns exactly one store. It starts with run metadata
//! (`_workflow_id`, `_owner_id`, `_timestamp`) plus any trigger event
//! variables, and grows by `step_{i}_output` / `step_{i}_success` as steps
//! complete. It is dropped when the run finishes; only the execution log
//! survives.

use std::collections::HashMap;

use crate::types::EventVars;

/// String-keyed variable map scoped to a single workflow run.
#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: HashMap<String, serde_json::Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with run metadata.
    pub fn seeded(workflow_id: &str, owner_id: &str, timestamp: &str) -> Self {
        let mut store = Self::new();
        store.set("_workflow_id", workflow_id);
        store.set("_owner_id", owner_id);
        store.set("_timestamp", timestamp);
        store
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.vars.get(key)
    }

    /// The stringified value of a variable, or None when absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(stringify)
    }

    pub fn set(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.vars.insert(key.to_string(), value.into());
    }

    /// Merge trigger event variables into the store.
    pub fn inject(&mut self, event: EventVars) {
        for (key, value) in event {
            self.vars.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Replace every `{{name}}` occurrence with the stringified value of
    /// `name` if present. Unknown placeholders are left untouched: later
    /// steps routinely reference outputs of steps a condition skipped, and
    /// that must not be an error.
    pub fn interpolate(&self, template: &str) -> String {
        let mut out = template.to_string();
        for (key, value) in &self.vars {
            let placeholder = format!("{{{{{key}}}}}");
            if out.contains(&placeholder) {
                out = out.replace(&placeholder, &stringify(value));
            }
        }
        out
    }
}

/// Render a JSON value the way a template expects: bare strings, no quotes.
fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolate_present_and_missing() {
        let mut store = VariableStore::new();
        store.set("step_2_output", "42");
        let out = store.interpolate("value={{step_2_output}} missing={{step_9_output}}");
        assert_eq!(out, "value=42 missing={{step_9_output}}");
    }

    #[test]
    fn test_interpolate_non_string_values() {
        let mut store = VariableStore::new();
        store.set("count", 3);
        store.set("ok", true);
        assert_eq!(store.interpolate("{{count}}/{{ok}}"), "3/true");
    }

    #[test]
    fn test_seeded_metadata() {
        let store = VariableStore::seeded("wf_abc", "tg:42", "2026-01-01T00:00:00Z");
        assert_eq!(store.get_str("_workflow_id").unwrap(), "wf_abc");
        assert_eq!(store.get_str("_owner_id").unwrap(), "tg:42");
    }

    #[test]
    fn test_inject_event_vars() {
        let mut store = VariableStore::new();
        let mut event = EventVars::new();
        event.insert("event_amount".into(), serde_json::json!(12500.0));
        store.inject(event);
        assert_eq!(store.get_str("event_amount").unwrap(), "12500.0");
    }
}

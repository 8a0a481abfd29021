//! Action executor — dispatches a step to its registered handler.
//!
//! The registry is populated at startup by the binary; nothing in the engine
//! hardcodes an action kind. An unknown kind is a failed result, and a
//! panicking handler is contained here, so a single bad action can never
//! take down the run loop.

use std::collections::HashMap;
use std::sync::Arc;

use futures::FutureExt;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its kind. Last registration wins.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Registered kinds, sorted for stable display.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.handlers.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Execute one step against the store. Never errors, never panics.
    pub async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let Some(handler) = self.handlers.get(&step.kind) else {
            return ActionResult::fail(format!("unknown action type: {}", step.kind));
        };

        match std::panic::AssertUnwindSafe(handler.execute(step, vars))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!("Action handler '{}' panicked", step.kind);
                ActionResult::fail(format!("action '{}' panicked", step.kind))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoAction;

    #[async_trait]
    impl ActionHandler for EchoAction {
        fn kind(&self) -> &str {
            "echo"
        }

        async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
            ActionResult::ok(vars.interpolate(step.config_str("text")))
        }
    }

    struct PanicAction;

    #[async_trait]
    impl ActionHandler for PanicAction {
        fn kind(&self) -> &str {
            "explode"
        }

        async fn execute(&self, _step: &Step, _vars: &VariableStore) -> ActionResult {
            panic!("boom");
        }
    }

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));
        registry.register(Arc::new(PanicAction));
        registry
    }

    #[tokio::test]
    async fn test_dispatch_by_kind() {
        let registry = registry();
        let mut vars = VariableStore::new();
        vars.set("who", "world");
        let step = Step::new("say", "echo", serde_json::json!({"text": "hello {{who}}"}));
        let result = registry.execute(&step, &vars).await;
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn test_unknown_kind_fails_cleanly() {
        let registry = registry();
        let step = Step::new("mystery", "teleport", serde_json::json!({}));
        let result = registry.execute(&step, &VariableStore::new()).await;
        assert!(!result.success);
        assert_eq!(result.output, "unknown action type: teleport");
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let registry = registry();
        let step = Step::new("boom", "explode", serde_json::json!({}));
        let result = registry.execute(&step, &VariableStore::new()).await;
        assert!(!result.success);
        assert!(result.output.contains("panicked"));
    }
}

//! Condition step — if/else branching on the run's variables.
//!
//! The expression runs through the sandboxed evaluator in `weft_core::expr`.
//! An expression that fails to evaluate counts as "did not pass", matching
//! how a broken condition should read in a notification: the branch was
//! skipped, the run completed.

use async_trait::async_trait;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct ConditionAction;

impl ConditionAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConditionAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for ConditionAction {
    fn kind(&self) -> &str {
        "condition"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let expression = vars.interpolate(step.config_str("condition"));
        let passed = match weft_core::expr::evaluate(&expression, vars) {
            Ok(passed) => passed,
            Err(e) => {
                tracing::warn!("Condition '{}' failed to evaluate: {}", expression, e);
                false
            }
        };
        ActionResult::ok(passed.to_string())
            .with_extra("condition_passed", serde_json::json!(passed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_condition_pass_and_fail() {
        let mut vars = VariableStore::new();
        vars.set("step_1_output", "87");

        let step = Step::new(
            "price check",
            "condition",
            serde_json::json!({"condition": "step_1_output > 50"}),
        );
        let result = ConditionAction::new().execute(&step, &vars).await;
        assert!(result.success);
        assert!(result.condition_passed());

        let step = Step::new(
            "price check",
            "condition",
            serde_json::json!({"condition": "step_1_output > 100"}),
        );
        let result = ConditionAction::new().execute(&step, &vars).await;
        assert!(result.success);
        assert!(!result.condition_passed());
    }

    #[tokio::test]
    async fn test_broken_expression_does_not_pass() {
        let step = Step::new(
            "bad",
            "condition",
            serde_json::json!({"condition": "os.system('rm')"}),
        );
        let result = ConditionAction::new()
            .execute(&step, &VariableStore::new())
            .await;
        assert!(result.success);
        assert!(!result.condition_passed());
    }
}

//! Transform step — format collected variables through a template.

use async_trait::async_trait;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct TransformAction;

impl TransformAction {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TransformAction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActionHandler for TransformAction {
    fn kind(&self) -> &str {
        "transform"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        ActionResult::ok(vars.interpolate(step.config_str("template")))
    }
}

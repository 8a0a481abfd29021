//! Delay step — pause a run for a configured number of seconds.
//!
//! The sleep is capped so a single step cannot stall a run indefinitely.
//! Runs execute on their own spawned task, so this suspends only the one
//! workflow, never the scheduler tick.

use async_trait::async_trait;
use weft_core::traits::ActionHandler;
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct DelayAction {
    max_secs: u64,
}

impl DelayAction {
    pub fn new(max_secs: u64) -> Self {
        Self { max_secs }
    }
}

#[async_trait]
impl ActionHandler for DelayAction {
    fn kind(&self) -> &str {
        "delay"
    }

    async fn execute(&self, step: &Step, _vars: &VariableStore) -> ActionResult {
        let requested = step
            .config
            .get("seconds")
            .and_then(|v| v.as_u64())
            .unwrap_or(5);
        let seconds = requested.min(self.max_secs);
        tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
        ActionResult::ok(format!("Waited {seconds}s"))
    }
}

//! Send-message step — deliver text to the workflow's owner through the
//! injected notifier.

use std::sync::Arc;

use async_trait::async_trait;
use weft_core::traits::{ActionHandler, Notifier};
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct SendMessageAction {
    notifier: Arc<dyn Notifier>,
}

impl SendMessageAction {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ActionHandler for SendMessageAction {
    fn kind(&self) -> &str {
        "send_message"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let message = vars.interpolate(step.config_str("message"));

        // Explicit recipient in the step config wins, else the run's owner.
        let owner = match step.config_str("owner_id") {
            "" => vars.get_str("_owner_id").unwrap_or_default(),
            explicit => explicit.to_string(),
        };
        if owner.is_empty() {
            return ActionResult::fail("send_message: no recipient");
        }

        match self.notifier.notify(&owner, &message).await {
            Ok(()) => ActionResult::ok(format!("Message sent to {owner}")),
            Err(e) => ActionResult::fail(format!("Send failed: {e}")),
        }
    }
}

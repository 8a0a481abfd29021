//! Collaborator seams. Everything the engine needs from the outside world
//! comes in through one of these traits, constructor-injected; there is no
//! package-level mutable state anywhere in Weft.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ActionResult, ChainEventFilter, EventVars, Step};
use crate::vars::VariableStore;

/// One registered action kind.
///
/// Contract: called at most once per step per run, no retries. Handlers must
/// convert their own failures (timeouts included) into a failed
/// [`ActionResult`]; nothing may escape into the run loop.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// The step kind this handler serves, e.g. "http_request".
    fn kind(&self) -> &str;

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult;
}

/// Delivers a text summary to the owner of a workflow or scheduled message.
/// A failed notification is never fatal to the run it reports on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, owner_id: &str, text: &str) -> Result<()>;
}

/// Current market price for a ticker symbol.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    async fn current_price(&self, ticker: &str) -> Result<f64>;
}

/// Polls an external chain for events matching a trigger's filter.
/// Returns the event variables to inject into the run when something matched.
#[async_trait]
pub trait ChainWatcher: Send + Sync {
    async fn poll(&self, filter: &ChainEventFilter) -> Result<Option<EventVars>>;
}

/// AI analysis collaborator behind the `ai_analyze` action.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<String>;
}

//! Trigger evaluation — decides, per workflow, whether to fire on this tick.
//!
//! Each kind is a pure function of (config, last_run_at, now) plus, for the
//! externally driven kinds, one collaborator call. A price fetch failure
//! means "does not fire this tick", never a failed evaluation pass.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use weft_core::error::Result;
use weft_core::traits::{ChainWatcher, PriceFeed};
use weft_core::types::EventVars;

use crate::workflow::{Direction, Trigger, Workflow};

#[derive(Default)]
pub struct TriggerEvaluator {
    market: Option<Arc<dyn PriceFeed>>,
    chain: Option<Arc<dyn ChainWatcher>>,
}

impl TriggerEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_market(mut self, feed: Arc<dyn PriceFeed>) -> Self {
        self.market = Some(feed);
        self
    }

    pub fn with_chain(mut self, watcher: Arc<dyn ChainWatcher>) -> Self {
        self.chain = Some(watcher);
        self
    }

    /// Should this workflow fire now? `Ok(Some(vars))` fires with the given
    /// event variables injected into the run.
    pub async fn should_fire(
        &self,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> Result<Option<EventVars>> {
        match &workflow.trigger {
            Trigger::Interval { interval_minutes } => {
                let due = match workflow.last_run_at {
                    None => true,
                    Some(last) => now - last >= Duration::minutes(*interval_minutes as i64),
                };
                Ok(due.then(EventVars::new))
            }

            Trigger::PriceThreshold {
                ticker,
                threshold,
                direction,
            } => {
                let Some(feed) = &self.market else {
                    tracing::debug!("No price feed configured; {} cannot fire", workflow.id);
                    return Ok(None);
                };
                let price = match feed.current_price(ticker).await {
                    Ok(price) => price,
                    Err(e) => {
                        tracing::warn!(
                            "Price fetch failed for {} ({}): {} — not firing this tick",
                            ticker,
                            workflow.id,
                            e
                        );
                        return Ok(None);
                    }
                };
                let crossed = match direction {
                    Direction::Below => price <= *threshold,
                    Direction::Above => price >= *threshold,
                };
                Ok(crossed.then(|| {
                    let mut vars = EventVars::new();
                    vars.insert("trigger_price".into(), serde_json::json!(price));
                    vars
                }))
            }

            Trigger::TimeOnce { at } => {
                Ok((now >= *at && workflow.last_run_at.is_none()).then(EventVars::new))
            }

            Trigger::Manual => Ok(None),

            Trigger::ChainEvent(filter) => {
                let Some(chain) = &self.chain else {
                    tracing::debug!("No chain watcher configured; {} cannot fire", workflow.id);
                    return Ok(None);
                };
                chain.poll(filter).await
            }
        }
    }
}

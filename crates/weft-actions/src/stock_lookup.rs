//! Stock lookup step — fetch a quote through the injected price feed.

use std::sync::Arc;

use async_trait::async_trait;
use weft_core::traits::{ActionHandler, PriceFeed};
use weft_core::types::{ActionResult, Step};
use weft_core::vars::VariableStore;

pub struct StockLookupAction {
    feed: Arc<dyn PriceFeed>,
}

impl StockLookupAction {
    pub fn new(feed: Arc<dyn PriceFeed>) -> Self {
        Self { feed }
    }
}

#[async_trait]
impl ActionHandler for StockLookupAction {
    fn kind(&self) -> &str {
        "stock_lookup"
    }

    async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
        let ticker = vars.interpolate(step.config_str("ticker"));
        if ticker.is_empty() {
            return ActionResult::fail("stock_lookup: missing 'ticker'");
        }

        match self.feed.current_price(&ticker).await {
            Ok(price) => {
                let symbol = ticker.to_uppercase();
                ActionResult::ok(format!("📊 {symbol} price: ${price:.2}"))
                    .with_extra("price", serde_json::json!(price))
                    .with_extra("ticker", serde_json::json!(symbol))
            }
            Err(e) => ActionResult::fail(format!("Could not fetch data for {ticker}: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::error::{Result, WeftError};

    struct FixedFeed(f64);

    #[async_trait]
    impl PriceFeed for FixedFeed {
        async fn current_price(&self, _ticker: &str) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct DownFeed;

    #[async_trait]
    impl PriceFeed for DownFeed {
        async fn current_price(&self, ticker: &str) -> Result<f64> {
            Err(WeftError::Market(format!("no data for {ticker}")))
        }
    }

    #[tokio::test]
    async fn test_quote_output() {
        let action = StockLookupAction::new(Arc::new(FixedFeed(142.5)));
        let step = Step::new("quote", "stock_lookup", serde_json::json!({"ticker": "aapl"}));
        let result = action.execute(&step, &VariableStore::new()).await;
        assert!(result.success);
        assert_eq!(result.output, "📊 AAPL price: $142.50");
        assert_eq!(result.extra["price"], serde_json::json!(142.5));
    }

    #[tokio::test]
    async fn test_feed_failure_becomes_failed_result() {
        let action = StockLookupAction::new(Arc::new(DownFeed));
        let step = Step::new("quote", "stock_lookup", serde_json::json!({"ticker": "TSLA"}));
        let result = action.execute(&step, &VariableStore::new()).await;
        assert!(!result.success);
        assert!(result.output.contains("TSLA"));
    }
}

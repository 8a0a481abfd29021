//! Market data collaborator — current prices via a chart/quote JSON API.
//!
//! Default endpoint is the public Yahoo chart API; any service with the same
//! response shape can be pointed at through `[market] quote_url`.

use async_trait::async_trait;
use weft_core::config::MarketConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::PriceFeed;

pub struct QuoteFeed {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl QuoteFeed {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            base_url: config.quote_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl PriceFeed for QuoteFeed {
    async fn current_price(&self, ticker: &str) -> Result<f64> {
        let url = format!(
            "{}/{}",
            self.base_url,
            urlencoding::encode(&ticker.to_uppercase())
        );
        let response = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .send()
            .await
            .map_err(|e| WeftError::Market(format!("Quote fetch failed for {ticker}: {e}")))?;

        if !response.status().is_success() {
            return Err(WeftError::Market(format!(
                "Quote API error for {ticker}: {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| WeftError::Market(format!("Invalid quote response: {e}")))?;

        extract_price(&body)
            .ok_or_else(|| WeftError::Market(format!("No price in quote response for {ticker}")))
    }
}

/// Pull `chart.result[0].meta.regularMarketPrice` out of a chart response.
fn extract_price(body: &serde_json::Value) -> Option<f64> {
    body.get("chart")?
        .get("result")?
        .get(0)?
        .get("meta")?
        .get("regularMarketPrice")?
        .as_f64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_price() {
        let body = serde_json::json!({
            "chart": {
                "result": [
                    {"meta": {"regularMarketPrice": 142.55, "currency": "USD"}}
                ]
            }
        });
        assert_eq!(extract_price(&body), Some(142.55));
    }

    #[test]
    fn test_extract_price_missing() {
        assert_eq!(extract_price(&serde_json::json!({"chart": {"result": []}})), None);
        assert_eq!(extract_price(&serde_json::json!({"error": "not found"})), None);
    }
}

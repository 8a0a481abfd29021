//! On-chain event collaborator — polls an Algorand indexer for large
//! payment transactions ("whale transfers").
//!
//! The watcher keeps a monotone round cursor so each transaction is reported
//! at most once. With no cursor yet (fresh process), it starts a small
//! window behind the chain tip rather than replaying history.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use weft_core::config::ChainConfig;
use weft_core::error::{Result, WeftError};
use weft_core::traits::ChainWatcher;
use weft_core::types::{ChainEventFilter, EventVars};

const MICRO_PER_UNIT: f64 = 1_000_000.0;
const POLL_LIMIT: u32 = 10;

pub struct IndexerWatcher {
    base_url: String,
    catchup_rounds: u64,
    client: reqwest::Client,
    last_round: AtomicU64,
}

#[derive(Debug, Clone)]
struct WhaleTxn {
    tx_id: String,
    sender: String,
    receiver: String,
    amount: f64,
}

impl IndexerWatcher {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            base_url: config.indexer_url.trim_end_matches('/').to_string(),
            catchup_rounds: config.catchup_rounds,
            client: reqwest::Client::new(),
            last_round: AtomicU64::new(0),
        }
    }

    async fn current_round(&self) -> Result<u64> {
        let url = format!("{}/health", self.base_url);
        let body: serde_json::Value = self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| WeftError::Chain(format!("Indexer health failed: {e}")))?
            .json()
            .await
            .map_err(|e| WeftError::Chain(format!("Invalid health response: {e}")))?;
        body.get("round")
            .and_then(|r| r.as_u64())
            .ok_or_else(|| WeftError::Chain("No round in health response".into()))
    }

    async fn search(&self, min_round: u64, min_micro: u64) -> Result<serde_json::Value> {
        let url = format!("{}/v2/transactions", self.base_url);
        self.client
            .get(&url)
            .query(&[
                ("min-round", min_round.to_string()),
                ("currency-greater-than", min_micro.to_string()),
                ("tx-type", "pay".to_string()),
                ("limit", POLL_LIMIT.to_string()),
            ])
            .timeout(std::time::Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| WeftError::Chain(format!("Indexer search failed: {e}")))?
            .json()
            .await
            .map_err(|e| WeftError::Chain(format!("Invalid indexer response: {e}")))
    }
}

#[async_trait]
impl ChainWatcher for IndexerWatcher {
    async fn poll(&self, filter: &ChainEventFilter) -> Result<Option<EventVars>> {
        if filter.event_type != "whale_transfer" {
            return Ok(None);
        }

        let mut last_round = self.last_round.load(Ordering::Acquire);
        if last_round == 0 {
            let tip = self.current_round().await?;
            last_round = tip.saturating_sub(self.catchup_rounds);
        }

        let min_micro = (filter.min_amount * MICRO_PER_UNIT) as u64;
        let body = self.search(last_round + 1, min_micro).await?;

        let current_round = body
            .get("current-round")
            .and_then(|r| r.as_u64())
            .unwrap_or(last_round);
        if current_round > last_round {
            self.last_round.store(current_round, Ordering::Release);
        }

        let txns = parse_whale_txns(&body, filter.watch_address.as_deref());
        let Some(vars) = event_vars(&txns) else {
            return Ok(None);
        };

        tracing::info!(
            "🐋 Found {} whale transfer(s) ≥ {} from round {}",
            txns.len(),
            filter.min_amount,
            last_round + 1
        );
        Ok(Some(vars))
    }
}

/// Decode matching payment transactions from an indexer search response.
fn parse_whale_txns(body: &serde_json::Value, watch_address: Option<&str>) -> Vec<WhaleTxn> {
    let Some(txns) = body.get("transactions").and_then(|t| t.as_array()) else {
        return Vec::new();
    };

    txns.iter()
        .filter_map(|txn| {
            let pay = txn.get("payment-transaction")?;
            let whale = WhaleTxn {
                tx_id: txn.get("id")?.as_str()?.to_string(),
                sender: txn.get("sender").and_then(|s| s.as_str()).unwrap_or("").to_string(),
                receiver: pay.get("receiver").and_then(|r| r.as_str()).unwrap_or("").to_string(),
                amount: pay.get("amount").and_then(|a| a.as_u64()).unwrap_or(0) as f64
                    / MICRO_PER_UNIT,
            };
            match watch_address {
                Some(addr) if whale.sender != addr && whale.receiver != addr => None,
                _ => Some(whale),
            }
        })
        .collect()
}

/// Variables describing the event, led by the biggest transfer.
fn event_vars(txns: &[WhaleTxn]) -> Option<EventVars> {
    let biggest = txns.iter().max_by(|a, b| a.amount.total_cmp(&b.amount))?;

    let mut vars = EventVars::new();
    vars.insert("event_type".into(), serde_json::json!("whale_transfer"));
    vars.insert("event_tx_id".into(), serde_json::json!(biggest.tx_id));
    vars.insert("event_sender".into(), serde_json::json!(biggest.sender));
    vars.insert("event_receiver".into(), serde_json::json!(biggest.receiver));
    vars.insert("event_amount".into(), serde_json::json!(biggest.amount));
    vars.insert("event_count".into(), serde_json::json!(txns.len()));
    Some(vars)
}

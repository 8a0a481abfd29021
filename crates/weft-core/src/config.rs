//! Weft configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftConfig {
    /// Path to the automation database. Empty = default (~/.weft/weft.db).
    #[serde(default)]
    pub db_path: String,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub analyst: AnalystConfig,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            engine: EngineConfig::default(),
            notify: NotifyConfig::default(),
            market: MarketConfig::default(),
            chain: ChainConfig::default(),
            analyst: AnalystConfig::default(),
        }
    }
}

impl WeftConfig {
    /// Load config from the default path (~/.weft/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::WeftError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::WeftError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::WeftError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Weft home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".weft")
    }

    /// Resolved database path.
    pub fn database_path(&self) -> PathBuf {
        if self.db_path.is_empty() {
            Self::home_dir().join("weft.db")
        } else {
            PathBuf::from(&self.db_path)
        }
    }
}

/// Engine cadences and limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between workflow trigger evaluation passes.
    #[serde(default = "default_workflow_tick")]
    pub workflow_tick_secs: u64,
    /// Seconds between scheduled-message delivery passes.
    #[serde(default = "default_message_tick")]
    pub message_tick_secs: u64,
    /// Upper bound for the `delay` step, in seconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
}

fn default_workflow_tick() -> u64 {
    30
}
fn default_message_tick() -> u64 {
    30
}
fn default_max_delay() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workflow_tick_secs: default_workflow_tick(),
            message_tick_secs: default_message_tick(),
            max_delay_secs: default_max_delay(),
        }
    }
}

/// Notification channel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    #[serde(default)]
    pub telegram: Option<TelegramNotifyConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookNotifyConfig>,
}

/// Telegram Bot API notifications. The owner id of a workflow or message
/// is used as the destination chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramNotifyConfig {
    pub bot_token: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

/// Generic outbound webhook notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotifyConfig {
    pub url: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
}

fn bool_true() -> bool {
    true
}

/// Market data (quote) endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Chart/quote API base. The ticker symbol is appended as a path segment.
    #[serde(default = "default_quote_url")]
    pub quote_url: String,
    #[serde(default = "default_market_timeout")]
    pub timeout_secs: u64,
}

fn default_quote_url() -> String {
    "https://query1.finance.yahoo.com/v8/finance/chart".into()
}
fn default_market_timeout() -> u64 {
    10
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            timeout_secs: default_market_timeout(),
        }
    }
}

/// On-chain event polling (Algorand indexer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_indexer_url")]
    pub indexer_url: String,
    /// How many rounds behind the tip to start when there is no cursor yet.
    #[serde(default = "default_catchup_rounds")]
    pub catchup_rounds: u64,
}

fn default_indexer_url() -> String {
    "https://mainnet-idx.algonode.cloud".into()
}
fn default_catchup_rounds() -> u64 {
    50
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            indexer_url: default_indexer_url(),
            catchup_rounds: default_catchup_rounds(),
        }
    }
}

/// AI analysis collaborator (any OpenAI-compatible chat endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_analyst_model")]
    pub model: String,
}

fn default_analyst_model() -> String {
    "llama-3.1-8b-instant".into()
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            api_key: String::new(),
            model: default_analyst_model(),
        }
    }
}

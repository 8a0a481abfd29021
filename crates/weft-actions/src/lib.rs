//! # Weft Actions
//!
//! Built-in action handlers (the nodes a workflow pipeline is made of)
//! plus the market-data and chain-polling collaborators the trigger
//! evaluator consumes. One handler per file; every handler converts its own
//! failures into a failed `ActionResult`.

pub mod ai_analyze;
pub mod chain;
pub mod condition;
pub mod delay;
pub mod http_request;
pub mod market;
pub mod send_message;
pub mod stock_lookup;
pub mod transform;
pub mod web_scrape;

pub use ai_analyze::{AiAnalyzeAction, OpenAiAnalyst};
pub use chain::IndexerWatcher;
pub use condition::ConditionAction;
pub use delay::DelayAction;
pub use http_request::HttpRequestAction;
pub use market::QuoteFeed;
pub use send_message::SendMessageAction;
pub use stock_lookup::StockLookupAction;
pub use transform::TransformAction;
pub use web_scrape::WebScrapeAction;

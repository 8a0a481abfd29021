//! # Weft Core
//!
//! Shared foundation for the Weft automation engine: the error type,
//! TOML configuration, the per-run variable store, the condition
//! expression evaluator, and the traits that wire collaborators
//! (action handlers, notifiers, market/chain data) into the engine.

pub mod config;
pub mod error;
pub mod expr;
pub mod traits;
pub mod types;
pub mod vars;

pub use config::WeftConfig;
pub use error::{Result, WeftError};
pub use types::{ActionResult, ChainEventFilter, EventVars, Step};
pub use vars::VariableStore;

//! # Weft Automation
//!
//! Trigger evaluation and workflow execution engine. Workflows declare
//! "when trigger X holds, run steps 1..N, passing data between them"; this
//! crate evaluates the triggers on a cadence, runs the step pipelines, and
//! persists enough state to resume correctly across restarts.
//!
//! ## Architecture
//! ```text
//! WorkflowScheduler (tokio interval)
//!   ├── load active workflows
//!   ├── TriggerEvaluator.should_fire(workflow, now)
//!   │     ├── interval / time_once / manual  — pure time checks
//!   │     ├── price_threshold               — PriceFeed collaborator
//!   │     └── chain_event                   — ChainWatcher collaborator
//!   └── on fire → spawn WorkflowRunner.execute(workflow)
//!         ├── per step: ActionRegistry.execute(step, vars)
//!         ├── vars: step_{i}_output / step_{i}_success
//!         ├── condition short-circuit, halting policy
//!         └── record ExecutionLog + run stats → notify owner
//!
//! MessageDispatcher (tokio interval)
//!   └── due scheduled messages → Notifier → delivered / rescheduled
//! ```

pub mod executor;
pub mod messages;
pub mod notify;
pub mod persistence;
pub mod runner;
pub mod scheduler;
pub mod triggers;
pub mod workflow;

pub use executor::ActionRegistry;
pub use messages::{MessageDispatcher, MessageStatus, ScheduledMessage, spawn_message_dispatcher};
pub use notify::{LogNotifier, TelegramNotifier, WebhookNotifier, notifier_from_config};
pub use persistence::{AutomationDb, MessageStore, WorkflowStore};
pub use runner::{DATA_PRODUCING_KINDS, WorkflowRunner, is_data_producing};
pub use scheduler::{WorkflowScheduler, spawn_workflow_scheduler};
pub use triggers::TriggerEvaluator;
pub use workflow::{
    Direction, ExecutionLog, RunStatus, StepOutcome, Trigger, Workflow, WorkflowDraft,
    WorkflowStatus,
};

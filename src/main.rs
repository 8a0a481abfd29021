//! # Weft — trigger-driven workflow automation
//!
//! Evaluates workflow triggers on a cadence, runs matching step pipelines,
//! and delivers scheduled messages.
//!
//! Usage:
//!   weft serve                     # Start both scheduler loops
//!   weft run <workflow-id>         # Execute one workflow immediately
//!   weft list --owner tg:123      # List an owner's workflows
//!   weft messages --owner tg:123  # List an owner's scheduled messages

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use weft_actions::{
    AiAnalyzeAction, ConditionAction, DelayAction, HttpRequestAction, IndexerWatcher,
    OpenAiAnalyst, QuoteFeed, SendMessageAction, StockLookupAction, TransformAction,
    WebScrapeAction,
};
use weft_automation::{
    ActionRegistry, AutomationDb, MessageDispatcher, MessageStore, TriggerEvaluator,
    WorkflowRunner, WorkflowScheduler, WorkflowStore, notifier_from_config,
    spawn_message_dispatcher, spawn_workflow_scheduler,
};
use weft_core::WeftConfig;
use weft_core::traits::Notifier;

#[derive(Parser)]
#[command(name = "weft", version, about = "🧵 Weft — workflow automation engine")]
struct Cli {
    /// Path to config.toml (default: ~/.weft/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the workflow scheduler and message dispatcher.
    Serve,
    /// Execute one workflow immediately, bypassing its trigger.
    Run { workflow_id: String },
    /// List an owner's workflows.
    List {
        #[arg(long)]
        owner: String,
    },
    /// List an owner's scheduled messages.
    Messages {
        #[arg(long)]
        owner: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "weft=debug,weft_core=debug,weft_actions=debug,weft_automation=debug"
    } else {
        "weft=info,weft_core=info,weft_actions=info,weft_automation=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => WeftConfig::load_from(path)?,
        None => WeftConfig::load()?,
    };

    let db_path = cli.db.clone().unwrap_or_else(|| config.database_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = Arc::new(AutomationDb::open(&db_path)?);

    let notifier = notifier_from_config(&config.notify);
    let scheduler = Arc::new(build_scheduler(&config, db.clone(), notifier.clone()));

    match cli.command {
        Command::Serve => {
            let workflow_loop =
                spawn_workflow_scheduler(scheduler.clone(), config.engine.workflow_tick_secs);
            let dispatcher = Arc::new(MessageDispatcher::new(
                db.clone() as Arc<dyn MessageStore>,
                notifier,
            ));
            let message_loop =
                spawn_message_dispatcher(dispatcher, config.engine.message_tick_secs);

            tracing::info!("🧵 Weft running (db: {})", db_path.display());
            tokio::signal::ctrl_c().await?;
            tracing::info!("Shutting down — waiting for in-flight runs…");
            workflow_loop.abort();
            message_loop.abort();
            scheduler.wait_for_runs().await;
        }
        Command::Run { workflow_id } => {
            let log = scheduler.run_now(&workflow_id).await?;
            println!("{}", serde_json::to_string_pretty(&log)?);
        }
        Command::List { owner } => {
            let workflows = db.workflows_for_owner(&owner)?;
            if workflows.is_empty() {
                println!("No workflows for {owner}");
            }
            for workflow in workflows {
                println!(
                    "{}  [{}] {} — trigger: {}, runs: {}, last: {}",
                    workflow.id,
                    workflow.status.as_str(),
                    workflow.name,
                    workflow.trigger.kind(),
                    workflow.run_count,
                    workflow
                        .last_run_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".into()),
                );
            }
        }
        Command::Messages { owner } => {
            let messages = db.messages_for_owner(&owner)?;
            if messages.is_empty() {
                println!("No scheduled messages for {owner}");
            }
            for message in messages {
                println!(
                    "{}  [{}] \"{}\" — due: {}{}",
                    message.id,
                    message.status.as_str(),
                    message.message,
                    message
                        .run_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "every tick".into()),
                    if message.repeat {
                        format!(", repeats every {}m", message.repeat_interval_minutes)
                    } else {
                        String::new()
                    },
                );
            }
        }
    }

    Ok(())
}

/// Wire the engine: built-in handlers, collaborators, trigger evaluator.
fn build_scheduler(
    config: &WeftConfig,
    db: Arc<AutomationDb>,
    notifier: Arc<dyn Notifier>,
) -> WorkflowScheduler {
    let feed = Arc::new(QuoteFeed::new(&config.market));

    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(TransformAction::new()));
    registry.register(Arc::new(ConditionAction::new()));
    registry.register(Arc::new(DelayAction::new(config.engine.max_delay_secs)));
    registry.register(Arc::new(HttpRequestAction::new()));
    registry.register(Arc::new(WebScrapeAction::new()));
    registry.register(Arc::new(SendMessageAction::new(notifier.clone())));
    registry.register(Arc::new(StockLookupAction::new(feed.clone())));
    if config.analyst.enabled && !config.analyst.endpoint.is_empty() {
        let analyst = Arc::new(OpenAiAnalyst::new(&config.analyst));
        registry.register(Arc::new(AiAnalyzeAction::new(analyst)));
    }
    tracing::info!("🧩 Registered actions: {}", registry.kinds().join(", "));

    let mut evaluator = TriggerEvaluator::new().with_market(feed);
    if config.chain.enabled {
        evaluator = evaluator.with_chain(Arc::new(IndexerWatcher::new(&config.chain)));
    }

    let store = db as Arc<dyn WorkflowStore>;
    let runner = Arc::new(WorkflowRunner::new(
        Arc::new(registry),
        store.clone(),
        notifier.clone(),
    ));
    WorkflowScheduler::new(store, evaluator, runner, notifier)
}

//! Workflow scheduler — the periodic evaluation pass.
//!
//! Each tick loads the active workflows, asks the trigger evaluator which
//! should fire, and *launches* the matching runs as independent tokio tasks.
//! The tick never hosts a run: a workflow sleeping in a `delay` step cannot
//! stall evaluation of its siblings. A per-workflow in-flight set keeps an
//! overlapping tick from re-firing a workflow whose previous run has not
//! finished.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use weft_core::error::{Result, WeftError};
use weft_core::traits::Notifier;
use weft_core::types::EventVars;

use crate::notify::escape_markdown;
use crate::persistence::WorkflowStore;
use crate::runner::{WorkflowRunner, truncate};
use crate::triggers::TriggerEvaluator;
use crate::workflow::{ExecutionLog, RunStatus, Workflow};

/// In-flight marker: Some(handle) for spawned runs, None for inline
/// (run-now) executions that cannot be aborted.
type RunSlot = Option<JoinHandle<()>>;

pub struct WorkflowScheduler {
    store: Arc<dyn WorkflowStore>,
    evaluator: TriggerEvaluator,
    runner: Arc<WorkflowRunner>,
    notifier: Arc<dyn Notifier>,
    running: Arc<Mutex<HashMap<String, RunSlot>>>,
}

impl WorkflowScheduler {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        evaluator: TriggerEvaluator,
        runner: Arc<WorkflowRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            evaluator,
            runner,
            notifier,
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// One evaluation pass. Returns how many runs were launched. A failure
    /// anywhere in one workflow's evaluation is logged and never stops the
    /// pass.
    pub async fn tick(&self) -> usize {
        let now = Utc::now();
        let workflows = match self.store.load_active() {
            Ok(workflows) => workflows,
            Err(e) => {
                tracing::error!("Failed to load active workflows: {e}");
                return 0;
            }
        };

        let mut launched = 0;
        for workflow in workflows {
            if self.is_running(&workflow.id).await {
                tracing::debug!("Workflow {} still running, skipping this tick", workflow.id);
                continue;
            }

            match self.evaluator.should_fire(&workflow, now).await {
                Ok(Some(event)) => {
                    tracing::info!("🔥 Workflow {} ({}) triggered", workflow.id, workflow.name);
                    self.launch(workflow, event).await;
                    launched += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Error evaluating workflow {}: {e}", workflow.id);
                }
            }
        }
        launched
    }

    /// Run a workflow immediately, bypassing trigger evaluation. This is the
    /// entry point for `manual` triggers and operator tooling.
    pub async fn run_now(&self, workflow_id: &str) -> Result<ExecutionLog> {
        let workflow = self
            .store
            .get_workflow(workflow_id)?
            .ok_or_else(|| WeftError::Store(format!("workflow not found: {workflow_id}")))?;

        {
            let mut running = self.running.lock().await;
            if running.contains_key(workflow_id) {
                return Err(WeftError::Validation(format!(
                    "workflow {workflow_id} is already running"
                )));
            }
            running.insert(workflow_id.to_string(), None);
        }

        let result = self.runner.execute(&workflow, EventVars::new()).await;
        self.running.lock().await.remove(workflow_id);

        let log = result?;
        notify_summary(self.notifier.as_ref(), &workflow, &log).await;
        Ok(log)
    }

    /// Best-effort cancellation of an in-flight run. Returns true when a
    /// spawned run was aborted.
    pub async fn cancel_run(&self, workflow_id: &str) -> bool {
        let mut running = self.running.lock().await;
        match running.remove(workflow_id) {
            Some(Some(handle)) => {
                handle.abort();
                tracing::info!("🛑 Cancelled run of workflow {workflow_id}");
                true
            }
            Some(None) => {
                // Inline run-now execution; cannot be aborted from here.
                running.insert(workflow_id.to_string(), None);
                false
            }
            None => false,
        }
    }

    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.running.lock().await.contains_key(workflow_id)
    }

    pub async fn in_flight(&self) -> usize {
        self.running.lock().await.len()
    }

    /// Wait until every in-flight run has finished. Used for graceful
    /// shutdown (and by tests).
    pub async fn wait_for_runs(&self) {
        loop {
            if self.running.lock().await.is_empty() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    /// Spawn one run as its own task and track it in the in-flight set.
    async fn launch(&self, workflow: Workflow, event: EventVars) {
        let runner = self.runner.clone();
        let notifier = self.notifier.clone();
        let running = Arc::clone(&self.running);
        let workflow_id = workflow.id.clone();

        // Hold the lock across the spawn so the task's own cleanup cannot
        // race the handle insertion.
        let mut guard = self.running.lock().await;
        if guard.contains_key(&workflow_id) {
            return;
        }

        let task_workflow_id = workflow_id.clone();
        let handle = tokio::spawn(async move {
            match runner.execute(&workflow, event).await {
                Ok(log) => notify_summary(notifier.as_ref(), &workflow, &log).await,
                Err(e) => {
                    tracing::error!("Workflow {} run failed: {e}", workflow.id);
                }
            }
            running.lock().await.remove(&task_workflow_id);
        });
        guard.insert(workflow_id, Some(handle));
    }
}

/// Status-tagged step summary sent to the owner after every run.
pub(crate) async fn notify_summary(notifier: &dyn Notifier, workflow: &Workflow, log: &ExecutionLog) {
    let status_emoji = match log.status {
        RunStatus::Completed => "✅",
        RunStatus::Halted => "⚠️",
        RunStatus::Failed => "❌",
    };

    let mut steps_summary = String::new();
    for outcome in &log.steps {
        steps_summary.push_str(&format!(
            "  {} {} — {}\n",
            if outcome.success { "✅" } else { "❌" },
            outcome.name,
            truncate(&outcome.output_preview, 80)
        ));
    }

    let text = format!(
        "⚡ *Workflow executed: {}*\n\nStatus: {} `{}`\nSteps:\n{}\n_Run #{}_",
        escape_markdown(&workflow.name),
        status_emoji,
        log.status.as_str(),
        steps_summary,
        workflow.run_count + 1
    );

    if let Err(e) = notifier.notify(&workflow.owner_id, &text).await {
        tracing::warn!("⚠️ Notify failed for {}: {e}", workflow.owner_id);
    }
}

/// Spawn the scheduler loop as a background tokio task.
pub fn spawn_workflow_scheduler(
    scheduler: Arc<WorkflowScheduler>,
    check_interval_secs: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("⏰ Workflow scheduler started (check every {check_interval_secs}s)");
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(check_interval_secs));
        loop {
            interval.tick().await;
            scheduler.tick().await;
        }
    })
}

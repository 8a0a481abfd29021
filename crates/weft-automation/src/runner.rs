//! Workflow runner — executes a workflow's steps in order against one
//! fresh variable store.
//!
//! Halting policy: a data-producing step that fails, or returns nothing a
//! later step could use, stops the run as `halted` and tells the owner
//! exactly which step broke. Letting a send_message step ship empty or
//! error text as if it were real data is the worse failure mode.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use weft_core::error::Result;
use weft_core::traits::Notifier;
use weft_core::types::EventVars;
use weft_core::vars::VariableStore;

use crate::executor::ActionRegistry;
use crate::notify::escape_markdown;
use crate::persistence::WorkflowStore;
use crate::workflow::{ExecutionLog, RunStatus, StepOutcome, Workflow, short_id};

/// Step kinds whose job is to fetch or derive data later steps consume.
/// These are subject to the halting policy.
pub const DATA_PRODUCING_KINDS: &[&str] = &[
    "ai_analyze",
    "web_scrape",
    "stock_lookup",
    "youtube_research",
    "http_request",
    "sentiment",
];

/// Anything shorter than this (trimmed) is not usable downstream.
const MIN_USEFUL_OUTPUT_CHARS: usize = 10;
const PREVIEW_LIMIT: usize = 200;

pub fn is_data_producing(kind: &str) -> bool {
    DATA_PRODUCING_KINDS.contains(&kind)
}

pub(crate) fn truncate(s: &str, limit: usize) -> String {
    s.chars().take(limit).collect()
}

pub struct WorkflowRunner {
    registry: Arc<ActionRegistry>,
    store: Arc<dyn WorkflowStore>,
    notifier: Arc<dyn Notifier>,
}

impl WorkflowRunner {
    pub fn new(
        registry: Arc<ActionRegistry>,
        store: Arc<dyn WorkflowStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            store,
            notifier,
        }
    }

    /// Execute a full workflow (trigger already confirmed). Persists the
    /// execution log and the workflow's run stats before returning.
    pub async fn execute(&self, workflow: &Workflow, event: EventVars) -> Result<ExecutionLog> {
        let started_at = Utc::now();

        let mut vars = VariableStore::new();
        // Last run's snapshot is seeded for convenience; metadata and the
        // trigger event always win.
        if let Some(snapshot) = workflow.variables.as_object() {
            for (key, value) in snapshot {
                vars.set(key, value.clone());
            }
        }
        vars.set("_workflow_id", workflow.id.as_str());
        vars.set("_owner_id", workflow.owner_id.as_str());
        vars.set("_timestamp", started_at.to_rfc3339());
        vars.inject(event);

        let mut outcomes = Vec::new();
        let loop_result = std::panic::AssertUnwindSafe(self.run_steps(
            workflow,
            &mut vars,
            &mut outcomes,
        ))
        .catch_unwind()
        .await;

        let (status, error) = match loop_result {
            Ok(status) => (status, None),
            Err(panic) => {
                let reason = panic_text(panic);
                tracing::error!("Workflow {} execution failed: {}", workflow.id, reason);
                (RunStatus::Failed, Some(reason))
            }
        };

        let log = ExecutionLog {
            id: short_id("log"),
            workflow_id: workflow.id.clone(),
            owner_id: workflow.owner_id.clone(),
            status,
            steps: outcomes,
            started_at,
            finished_at: Utc::now(),
            error,
        };
        self.store.record_run(&log)?;

        tracing::info!(
            "🏁 Workflow {} finished: {} ({} step(s))",
            workflow.id,
            status.as_str(),
            log.steps.len()
        );
        Ok(log)
    }

    async fn run_steps(
        &self,
        workflow: &Workflow,
        vars: &mut VariableStore,
        outcomes: &mut Vec<StepOutcome>,
    ) -> RunStatus {
        for (idx, step) in workflow.steps.iter().enumerate() {
            let index = idx + 1;
            tracing::info!(
                "▶️ Workflow {} step {}: {} ({})",
                workflow.id,
                index,
                step.name,
                step.kind
            );

            let result = self.registry.execute(step, vars).await;

            outcomes.push(StepOutcome {
                step: index,
                name: step.name.clone(),
                kind: step.kind.clone(),
                success: result.success,
                output_preview: truncate(&result.output, PREVIEW_LIMIT),
            });

            vars.set(&format!("step_{index}_output"), result.output.clone());
            vars.set(&format!("step_{index}_success"), result.success);

            // A failed condition is a normal short-circuit, not a halt.
            if step.kind == "condition" && !result.condition_passed() {
                tracing::info!(
                    "⏭️ Condition failed at step {}, skipping remaining steps",
                    index
                );
                return RunStatus::Completed;
            }

            if is_data_producing(&step.kind)
                && (!result.success || result.output.trim().chars().count() < MIN_USEFUL_OUTPUT_CHARS)
            {
                tracing::warn!(
                    "⛔ Workflow {} halted: step {} ({}) returned nothing usable",
                    workflow.id,
                    index,
                    step.name
                );
                self.notify_halt(workflow, index, &step.name, &result.output)
                    .await;
                return RunStatus::Halted;
            }

            if !result.success && step.stop_on_failure {
                tracing::warn!("⛔ Step {} failed with stop_on_failure set", index);
                return RunStatus::Halted;
            }
        }
        RunStatus::Completed
    }

    async fn notify_halt(&self, workflow: &Workflow, index: usize, step_name: &str, output: &str) {
        let detail = if output.trim().is_empty() {
            "no output returned".to_string()
        } else {
            truncate(output, PREVIEW_LIMIT)
        };
        let text = format!(
            "⚠️ *Workflow halted: {}*\n\nStep {} ({}) produced nothing usable:\n{}\n\nRemaining steps were skipped.",
            escape_markdown(&workflow.name),
            index,
            step_name,
            detail
        );
        if let Err(e) = self.notifier.notify(&workflow.owner_id, &text).await {
            tracing::warn!("⚠️ Halt notification failed for {}: {e}", workflow.owner_id);
        }
    }
}

fn panic_text(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic in run loop".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::AutomationDb;
    use crate::workflow::Trigger;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use weft_core::error::Result;
    use weft_core::traits::ActionHandler;
    use weft_core::types::{ActionResult, Step};

    /// Returns a fixed result and records that it ran.
    struct StubAction {
        kind: String,
        result: ActionResult,
        ran: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ActionHandler for StubAction {
        fn kind(&self) -> &str {
            &self.kind
        }

        async fn execute(&self, step: &Step, vars: &VariableStore) -> ActionResult {
            self.ran.lock().unwrap().push(step.name.clone());
            let mut result = self.result.clone();
            result.output = vars.interpolate(&result.output);
            result
        }
    }

    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, owner_id: &str, text: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((owner_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        dir: std::path::PathBuf,
        store: Arc<AutomationDb>,
        notifier: Arc<RecordingNotifier>,
        ran: Arc<Mutex<Vec<String>>>,
        runner: WorkflowRunner,
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    /// Registry of stubs: (kind, result) pairs sharing one `ran` recorder.
    fn fixture(name: &str, stubs: Vec<(&str, ActionResult)>) -> Fixture {
        let dir = std::env::temp_dir().join(format!("weft-runner-test-{name}"));
        std::fs::create_dir_all(&dir).ok();
        let path = dir.join("test.db");
        std::fs::remove_file(&path).ok();
        let store = Arc::new(AutomationDb::open(&path).unwrap());

        let ran = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ActionRegistry::new();
        for (kind, result) in stubs {
            registry.register(Arc::new(StubAction {
                kind: kind.to_string(),
                result,
                ran: ran.clone(),
            }));
        }

        let notifier = Arc::new(RecordingNotifier {
            sent: Mutex::new(Vec::new()),
        });
        let runner = WorkflowRunner::new(Arc::new(registry), store.clone(), notifier.clone());
        Fixture {
            dir,
            store,
            notifier,
            ran,
            runner,
        }
    }

    fn workflow(store: &AutomationDb, steps: Vec<Step>) -> Workflow {
        let workflow = Workflow::new(
            "tg:7",
            "Digest",
            "",
            Trigger::Interval {
                interval_minutes: 10,
            },
            steps,
        );
        crate::persistence::WorkflowStore::create_workflow(store, &workflow).unwrap();
        workflow
    }

    #[tokio::test]
    async fn test_completed_run_records_stats() {
        let f = fixture(
            "completed",
            vec![
                ("web_scrape", ActionResult::ok("a".repeat(120))),
                ("send_message", ActionResult::ok("Message sent to tg:7")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("fetch_rss", "web_scrape", serde_json::json!({"query": "news"})),
                Step::new("send_message", "send_message", serde_json::json!({"message": "x"})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Completed);
        assert_eq!(log.steps.len(), 2);
        assert!(log.steps.iter().all(|s| s.success));

        let stored = f.store.get_workflow(&wf.id).unwrap().unwrap();
        assert_eq!(stored.run_count, 1);
        assert!(stored.last_run_at.is_some());
    }

    #[tokio::test]
    async fn test_halting_invariant_on_empty_output() {
        let f = fixture(
            "halt-empty",
            vec![
                ("web_scrape", ActionResult::ok("")),
                ("send_message", ActionResult::ok("sent")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("fetch_rss", "web_scrape", serde_json::json!({"query": "news"})),
                Step::new("send_message", "send_message", serde_json::json!({"message": "x"})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Halted);
        assert_eq!(log.steps.len(), 1);

        // Later steps never ran.
        assert_eq!(f.ran.lock().unwrap().as_slice(), ["fetch_rss"]);

        // The owner was told which step broke.
        let sent = f.notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "tg:7");
        assert!(sent[0].1.contains("fetch_rss"));
        assert!(sent[0].1.contains("no output returned"));
    }

    #[tokio::test]
    async fn test_halting_invariant_on_short_output() {
        let f = fixture(
            "halt-short",
            vec![
                ("stock_lookup", ActionResult::ok("err")),
                ("send_message", ActionResult::ok("sent")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("quote", "stock_lookup", serde_json::json!({"ticker": "AAPL"})),
                Step::new("notify", "send_message", serde_json::json!({"message": "x"})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Halted);
        assert_eq!(f.ran.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_halting_invariant_on_failed_data_step() {
        let f = fixture(
            "halt-fail",
            vec![
                (
                    "http_request",
                    ActionResult::fail("Request failed: connection refused"),
                ),
                ("send_message", ActionResult::ok("sent")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("call api", "http_request", serde_json::json!({"url": "x"})),
                Step::new("notify", "send_message", serde_json::json!({"message": "x"})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Halted);
        let sent = f.notifier.sent.lock().unwrap();
        assert!(sent[0].1.contains("call api"));
        assert!(sent[0].1.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_condition_short_circuit_completes() {
        let f = fixture(
            "condition",
            vec![
                (
                    "condition",
                    ActionResult::ok("false")
                        .with_extra("condition_passed", serde_json::json!(false)),
                ),
                ("send_message", ActionResult::ok("sent")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("gate", "condition", serde_json::json!({"condition": "1 > 2"})),
                Step::new("notify", "send_message", serde_json::json!({"message": "x"})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        // Skipped branch, but a normal completion, not a halt.
        assert_eq!(log.status, RunStatus::Completed);
        assert_eq!(log.steps.len(), 1);
        assert!(f.notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_variable_propagation_between_steps() {
        let f = fixture(
            "vars",
            vec![
                ("web_scrape", ActionResult::ok("4242424242")),
                ("transform", ActionResult::ok("value was {{step_1_output}}")),
            ],
        );
        let wf = workflow(
            &f.store,
            vec![
                Step::new("fetch", "web_scrape", serde_json::json!({"query": "q"})),
                Step::new("format", "transform", serde_json::json!({})),
            ],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Completed);
        assert_eq!(log.steps[1].output_preview, "value was 4242424242");
    }

    #[tokio::test]
    async fn test_stop_on_failure_override() {
        let f = fixture(
            "stop-on-failure",
            vec![
                ("send_message", ActionResult::fail("channel down")),
                ("transform", ActionResult::ok("never")),
            ],
        );
        let mut first = Step::new("notify", "send_message", serde_json::json!({"message": "x"}));
        first.stop_on_failure = true;
        let wf = workflow(
            &f.store,
            vec![first, Step::new("format", "transform", serde_json::json!({}))],
        );

        let log = f.runner.execute(&wf, EventVars::new()).await.unwrap();
        assert_eq!(log.status, RunStatus::Halted);
        assert_eq!(log.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_event_vars_reach_steps() {
        let f = fixture(
            "event-vars",
            vec![("transform", ActionResult::ok("whale moved {{event_amount}}"))],
        );
        let wf = workflow(
            &f.store,
            vec![Step::new("format", "transform", serde_json::json!({}))],
        );

        let mut event = EventVars::new();
        event.insert("event_amount".into(), serde_json::json!(25000.5));
        let log = f.runner.execute(&wf, event).await.unwrap();
        assert_eq!(log.steps[0].output_preview, "whale moved 25000.5");
    }
}

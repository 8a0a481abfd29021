//! SQLite-backed persistence for workflows, execution logs, and scheduled
//! messages.
//!
//! The engine consumes the `WorkflowStore` / `MessageStore` traits; this
//! module provides the one real implementation. The engine only ever writes
//! back the fields it is responsible for (run stats, status transitions);
//! everything else belongs to whoever created the record.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use weft_core::error::{Result, WeftError};
use weft_core::types::Step;

use crate::messages::{MessageStatus, ScheduledMessage};
use crate::workflow::{ExecutionLog, RunStatus, Trigger, Workflow, WorkflowStatus};

/// Persistence interface the runner and scheduler depend on.
pub trait WorkflowStore: Send + Sync {
    fn create_workflow(&self, workflow: &Workflow) -> Result<()>;
    fn get_workflow(&self, id: &str) -> Result<Option<Workflow>>;
    /// All schedulable workflows. Rows whose stored config no longer
    /// validates are skipped; an invalid workflow never fires.
    fn load_active(&self) -> Result<Vec<Workflow>>;
    fn workflows_for_owner(&self, owner_id: &str) -> Result<Vec<Workflow>>;
    fn set_workflow_status(&self, id: &str, status: WorkflowStatus) -> Result<()>;
    fn delete_workflow(&self, id: &str) -> Result<bool>;
    /// Persist a finished run: insert its log and, in the same transaction,
    /// bump the workflow's run_count and last_run_at.
    fn record_run(&self, log: &ExecutionLog) -> Result<()>;
    fn recent_logs(&self, workflow_id: &str, limit: usize) -> Result<Vec<ExecutionLog>>;
}

/// Persistence interface the message dispatcher depends on.
pub trait MessageStore: Send + Sync {
    fn create_message(&self, message: &ScheduledMessage) -> Result<()>;
    /// Active messages due at `now` (run_at null or in the past).
    fn due_messages(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledMessage>>;
    fn messages_for_owner(&self, owner_id: &str) -> Result<Vec<ScheduledMessage>>;
    fn mark_delivered(&self, id: &str, now: DateTime<Utc>) -> Result<()>;
    fn reschedule(&self, id: &str, now: DateTime<Utc>, next: DateTime<Utc>) -> Result<()>;
    fn delete_message(&self, id: &str) -> Result<bool>;
}

/// SQLite store for all automation state.
pub struct AutomationDb {
    conn: Mutex<Connection>,
}

impl AutomationDb {
    /// Open or create the database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| WeftError::Store(format!("DB open: {e}")))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| WeftError::Store(format!("Lock: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        self.lock()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS workflows (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL,
                name        TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                trigger_type TEXT NOT NULL,
                trigger_config TEXT NOT NULL DEFAULT '{}',
                steps       TEXT NOT NULL DEFAULT '[]',
                variables   TEXT NOT NULL DEFAULT '{}',
                status      TEXT NOT NULL DEFAULT 'active',
                run_count   INTEGER NOT NULL DEFAULT 0,
                last_run_at TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS workflow_logs (
                id          TEXT PRIMARY KEY,
                workflow_id TEXT NOT NULL,
                owner_id    TEXT NOT NULL,
                status      TEXT NOT NULL,
                steps_log   TEXT NOT NULL DEFAULT '[]',
                started_at  TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                error       TEXT
            );

            CREATE TABLE IF NOT EXISTS scheduled_messages (
                id          TEXT PRIMARY KEY,
                owner_id    TEXT NOT NULL,
                message     TEXT NOT NULL,
                run_at      TEXT,
                repeat      INTEGER NOT NULL DEFAULT 0,
                repeat_interval_min INTEGER NOT NULL DEFAULT 0,
                status      TEXT NOT NULL DEFAULT 'active',
                run_count   INTEGER NOT NULL DEFAULT 0,
                last_run_at TEXT,
                created_at  TEXT NOT NULL
            );
         ",
            )
            .map_err(|e| WeftError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    fn query_workflows(&self, sql: &str, param: Option<&str>) -> Result<Vec<Workflow>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| WeftError::Store(format!("Prepare: {e}")))?;

        let map_row = |row: &rusqlite::Row<'_>| -> rusqlite::Result<WorkflowRow> {
            Ok(WorkflowRow {
                id: row.get(0)?,
                owner_id: row.get(1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                trigger_type: row.get(4)?,
                trigger_config: row.get(5)?,
                steps: row.get(6)?,
                variables: row.get(7)?,
                status: row.get(8)?,
                run_count: row.get(9)?,
                last_run_at: row.get(10)?,
                created_at: row.get(11)?,
                updated_at: row.get(12)?,
            })
        };

        let rows: Vec<WorkflowRow> = match param {
            Some(p) => stmt.query_map([p], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| WeftError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();

        Ok(rows
            .into_iter()
            .filter_map(|raw| match raw.decode() {
                Ok(workflow) => Some(workflow),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping workflow with invalid config: {e}");
                    None
                }
            })
            .collect())
    }
}

const WORKFLOW_COLUMNS: &str = "id, owner_id, name, description, trigger_type, trigger_config, \
     steps, variables, status, run_count, last_run_at, created_at, updated_at";

/// Raw workflow row before the stored JSON is decoded and validated.
struct WorkflowRow {
    id: String,
    owner_id: String,
    name: String,
    description: String,
    trigger_type: String,
    trigger_config: String,
    steps: String,
    variables: String,
    status: String,
    run_count: u32,
    last_run_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn decode(self) -> Result<Workflow> {
        let trigger_config: serde_json::Value = serde_json::from_str(&self.trigger_config)
            .map_err(|e| WeftError::Validation(format!("{}: bad trigger_config: {e}", self.id)))?;
        let trigger = Trigger::from_parts(&self.trigger_type, &trigger_config)
            .map_err(|e| WeftError::Validation(format!("{}: {e}", self.id)))?;
        let steps: Vec<Step> = serde_json::from_str(&self.steps)
            .map_err(|e| WeftError::Validation(format!("{}: bad steps: {e}", self.id)))?;
        let variables =
            serde_json::from_str(&self.variables).unwrap_or_else(|_| serde_json::json!({}));

        Ok(Workflow {
            id: self.id,
            owner_id: self.owner_id,
            name: self.name,
            description: self.description,
            trigger,
            steps,
            variables,
            status: WorkflowStatus::parse(&self.status),
            run_count: self.run_count,
            last_run_at: parse_ts_opt(self.last_run_at.as_deref()),
            created_at: parse_ts(&self.created_at),
            updated_at: parse_ts(&self.updated_at),
        })
    }
}

fn parse_ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_ts_opt(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}

impl WorkflowStore for AutomationDb {
    fn create_workflow(&self, workflow: &Workflow) -> Result<()> {
        let (trigger_type, trigger_config) = workflow.trigger.to_parts();
        let steps = serde_json::to_string(&workflow.steps)
            .map_err(|e| WeftError::Store(format!("Serialize steps: {e}")))?;
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO workflows
                 (id, owner_id, name, description, trigger_type, trigger_config, steps, variables,
                  status, run_count, last_run_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    workflow.id,
                    workflow.owner_id,
                    workflow.name,
                    workflow.description,
                    trigger_type,
                    trigger_config.to_string(),
                    steps,
                    workflow.variables.to_string(),
                    workflow.status.as_str(),
                    workflow.run_count,
                    workflow.last_run_at.map(|t| t.to_rfc3339()),
                    workflow.created_at.to_rfc3339(),
                    workflow.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| WeftError::Store(format!("Save workflow: {e}")))?;
        Ok(())
    }

    fn get_workflow(&self, id: &str) -> Result<Option<Workflow>> {
        let sql = format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?1");
        Ok(self.query_workflows(&sql, Some(id))?.into_iter().next())
    }

    fn load_active(&self) -> Result<Vec<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE status = 'active' ORDER BY created_at"
        );
        self.query_workflows(&sql, None)
    }

    fn workflows_for_owner(&self, owner_id: &str) -> Result<Vec<Workflow>> {
        let sql = format!(
            "SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE owner_id = ?1 ORDER BY created_at DESC"
        );
        self.query_workflows(&sql, Some(owner_id))
    }

    fn set_workflow_status(&self, id: &str, status: WorkflowStatus) -> Result<()> {
        self.lock()?
            .execute(
                "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status.as_str(), Utc::now().to_rfc3339(), id],
            )
            .map_err(|e| WeftError::Store(format!("Update status: {e}")))?;
        Ok(())
    }

    fn delete_workflow(&self, id: &str) -> Result<bool> {
        let affected = self
            .lock()?
            .execute("DELETE FROM workflows WHERE id = ?1", [id])
            .map_err(|e| WeftError::Store(format!("Delete workflow: {e}")))?;
        Ok(affected > 0)
    }

    fn record_run(&self, log: &ExecutionLog) -> Result<()> {
        let steps_log = serde_json::to_string(&log.steps)
            .map_err(|e| WeftError::Store(format!("Serialize log: {e}")))?;
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| WeftError::Store(format!("Begin: {e}")))?;
        tx.execute(
            "INSERT INTO workflow_logs
             (id, workflow_id, owner_id, status, steps_log, started_at, finished_at, error)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                log.id,
                log.workflow_id,
                log.owner_id,
                log.status.as_str(),
                steps_log,
                log.started_at.to_rfc3339(),
                log.finished_at.to_rfc3339(),
                log.error,
            ],
        )
        .map_err(|e| WeftError::Store(format!("Insert log: {e}")))?;
        tx.execute(
            "UPDATE workflows
             SET run_count = run_count + 1, last_run_at = ?1, updated_at = ?1
             WHERE id = ?2",
            params![log.finished_at.to_rfc3339(), log.workflow_id],
        )
        .map_err(|e| WeftError::Store(format!("Update run stats: {e}")))?;
        tx.commit()
            .map_err(|e| WeftError::Store(format!("Commit: {e}")))?;
        Ok(())
    }

    fn recent_logs(&self, workflow_id: &str, limit: usize) -> Result<Vec<ExecutionLog>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, workflow_id, owner_id, status, steps_log, started_at, finished_at, error
                 FROM workflow_logs WHERE workflow_id = ?1 ORDER BY started_at DESC LIMIT ?2",
            )
            .map_err(|e| WeftError::Store(format!("Prepare: {e}")))?;
        let logs = stmt
            .query_map(params![workflow_id, limit as i64], |row| {
                let steps_log: String = row.get(4)?;
                let status: String = row.get(3)?;
                let started_at: String = row.get(5)?;
                let finished_at: String = row.get(6)?;
                Ok(ExecutionLog {
                    id: row.get(0)?,
                    workflow_id: row.get(1)?,
                    owner_id: row.get(2)?,
                    status: RunStatus::parse(&status),
                    steps: serde_json::from_str(&steps_log).unwrap_or_default(),
                    started_at: parse_ts(&started_at),
                    finished_at: parse_ts(&finished_at),
                    error: row.get(7)?,
                })
            })
            .map_err(|e| WeftError::Store(format!("Query logs: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(logs)
    }
}

const MESSAGE_COLUMNS: &str = "id, owner_id, message, run_at, repeat, repeat_interval_min, \
     status, run_count, last_run_at, created_at";

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledMessage> {
    let run_at: Option<String> = row.get(3)?;
    let status: String = row.get(6)?;
    let last_run_at: Option<String> = row.get(8)?;
    let created_at: String = row.get(9)?;
    Ok(ScheduledMessage {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        message: row.get(2)?,
        run_at: parse_ts_opt(run_at.as_deref()),
        repeat: row.get::<_, i64>(4)? != 0,
        repeat_interval_minutes: row.get::<_, i64>(5)?.max(0) as u32,
        status: MessageStatus::parse(&status),
        run_count: row.get(7)?,
        last_run_at: parse_ts_opt(last_run_at.as_deref()),
        created_at: parse_ts(&created_at),
    })
}

impl MessageStore for AutomationDb {
    fn create_message(&self, message: &ScheduledMessage) -> Result<()> {
        self.lock()?
            .execute(
                "INSERT OR REPLACE INTO scheduled_messages
                 (id, owner_id, message, run_at, repeat, repeat_interval_min, status, run_count,
                  last_run_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    message.id,
                    message.owner_id,
                    message.message,
                    message.run_at.map(|t| t.to_rfc3339()),
                    message.repeat as i64,
                    message.repeat_interval_minutes,
                    message.status.as_str(),
                    message.run_count,
                    message.last_run_at.map(|t| t.to_rfc3339()),
                    message.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| WeftError::Store(format!("Save message: {e}")))?;
        Ok(())
    }

    fn due_messages(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledMessage>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM scheduled_messages
             WHERE status = 'active' AND (run_at IS NULL OR run_at <= ?1) ORDER BY created_at"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| WeftError::Store(format!("Prepare: {e}")))?;
        let messages = stmt
            .query_map([now.to_rfc3339()], map_message_row)
            .map_err(|e| WeftError::Store(format!("Query messages: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(messages)
    }

    fn messages_for_owner(&self, owner_id: &str) -> Result<Vec<ScheduledMessage>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM scheduled_messages
             WHERE owner_id = ?1 ORDER BY created_at DESC"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| WeftError::Store(format!("Prepare: {e}")))?;
        let messages = stmt
            .query_map([owner_id], map_message_row)
            .map_err(|e| WeftError::Store(format!("Query messages: {e}")))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(messages)
    }

    fn mark_delivered(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        self.lock()?
            .execute(
                "UPDATE scheduled_messages
                 SET status = 'delivered', run_count = run_count + 1, last_run_at = ?1
                 WHERE id = ?2",
                params![now.to_rfc3339(), id],
            )
            .map_err(|e| WeftError::Store(format!("Mark delivered: {e}")))?;
        Ok(())
    }

    fn reschedule(&self, id: &str, now: DateTime<Utc>, next: DateTime<Utc>) -> Result<()> {
        self.lock()?
            .execute(
                "UPDATE scheduled_messages
                 SET run_count = run_count + 1, last_run_at = ?1, run_at = ?2
                 WHERE id = ?3",
                params![now.to_rfc3339(), next.to_rfc3339(), id],
            )
            .map_err(|e| WeftError::Store(format!("Reschedule: {e}")))?;
        Ok(())
    }

    fn delete_message(&self, id: &str) -> Result<bool> {
        let affected = self
            .lock()?
            .execute("DELETE FROM scheduled_messages WHERE id = ?1", [id])
            .map_err(|e| WeftError::Store(format!("Delete message: {e}")))?;
        Ok(affected > 0)
    }
}

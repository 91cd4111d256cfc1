use chrono::{DateTime, Utc};
use sbx_core::types::{ErrorCategory, Task, TaskStatus};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::StoreError;
use crate::mapping::row_to_task;
use crate::schema::SCHEMA;

/// Durable task store (spec component C3). One `tokio_rusqlite` connection
/// serializes every call onto a single background thread, which is what
/// makes the "exactly one running task" invariant enforceable without a
/// distributed lock: every transaction below runs to completion before the
/// next one starts.
pub struct TaskDb {
    conn: Connection,
}

impl TaskDb {
    pub async fn new(path: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.into()).await?;
        let db = Self { conn };
        db.init_schema().await?;
        Ok(db)
    }

    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        let db = Self { conn };
        db.init_schema().await?;
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| Ok(conn.execute_batch(SCHEMA)?))
            .await?;
        Ok(())
    }

    pub async fn insert_task(&self, task: Task) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO tasks (
                        id, credential_id, purl, package_name, package_version, ecosystem,
                        idempotency_key, status, created_at, queued_at, started_at,
                        completed_at, queue_position, priority, timeout_minutes,
                        container_id, last_heartbeat, report_id, download_url,
                        error_category, error_message, error_details
                    ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)",
                    rusqlite::params![
                        task.id.to_string(),
                        task.credential_id.to_string(),
                        task.purl,
                        task.package_name,
                        task.package_version,
                        task.ecosystem.as_str(),
                        task.idempotency_key,
                        task.status.as_str(),
                        task.created_at.to_rfc3339(),
                        task.queued_at.map(|d| d.to_rfc3339()),
                        task.started_at.map(|d| d.to_rfc3339()),
                        task.completed_at.map(|d| d.to_rfc3339()),
                        task.queue_position,
                        task.priority,
                        task.timeout_minutes,
                        task.container_id,
                        task.last_heartbeat.map(|d| d.to_rfc3339()),
                        task.report_id.map(|id| id.to_string()),
                        task.download_url,
                        task.error_category.map(|c| c.as_str().to_string()),
                        task.error_message,
                        task.error_details.map(|v| v.to_string()),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_task(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    /// Admission step 1: newest completed task for this exact PURL with a
    /// linked report.
    pub async fn find_latest_completed_by_purl(&self, purl: &str) -> Result<Option<Task>, StoreError> {
        let purl = purl.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE purl = ?1 AND status = 'completed'
                     AND report_id IS NOT NULL ORDER BY completed_at DESC LIMIT 1",
                )?;
                let mut rows = stmt.query(rusqlite::params![purl])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_task(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    /// Admission steps 2 and 3: an in-flight task for this PURL created no
    /// earlier than `since`. Called twice by the admission controller with
    /// two different `since` values (24h, then 1m) — the narrower call is
    /// the race-window guard.
    pub async fn find_active_by_purl_since(
        &self,
        purl: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<Task>, StoreError> {
        let purl = purl.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE purl = ?1
                     AND status IN ('pending','queued','running')
                     AND created_at >= ?2
                     ORDER BY created_at DESC LIMIT 1",
                )?;
                let mut rows = stmt.query(rusqlite::params![purl, since.to_rfc3339()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_task(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn find_by_idempotency(
        &self,
        credential_id: Uuid,
        key: &str,
    ) -> Result<Option<Task>, StoreError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE credential_id = ?1 AND idempotency_key = ?2
                     ORDER BY created_at DESC LIMIT 1",
                )?;
                let mut rows = stmt.query(rusqlite::params![credential_id.to_string(), key])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_task(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    /// Assign the next dense queue position and transition `pending ->
    /// queued`. Returns the assigned position.
    pub async fn enqueue(&self, task_id: Uuid) -> Result<i64, StoreError> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let max_position: Option<i64> = tx.query_row(
                    "SELECT MAX(queue_position) FROM tasks WHERE status = 'queued'",
                    [],
                    |row| row.get(0),
                )?;
                let next = max_position.unwrap_or(0) + 1;
                let now = chrono::Utc::now().to_rfc3339();
                tx.execute(
                    "UPDATE tasks SET status = 'queued', queued_at = ?1, queue_position = ?2
                     WHERE id = ?3",
                    rusqlite::params![now, next, task_id.to_string()],
                )?;
                tx.commit()?;
                Ok(next)
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn any_running(&self) -> Result<bool, StoreError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM tasks WHERE status = 'running'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(StoreError::from)
    }

    /// Ordered head of the queue: `priority DESC, queued_at ASC`.
    pub async fn dequeue_head(&self) -> Result<Option<Task>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE status = 'queued'
                     ORDER BY priority DESC, queued_at ASC LIMIT 1",
                )?;
                let mut rows = stmt.query([])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_task(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    /// Transition `queued -> running` as a single atomic update: status,
    /// `started_at`, `last_heartbeat` all set and `queue_position` cleared
    /// in one statement, not two separate saves.
    pub async fn mark_running(&self, task_id: Uuid) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                let now = chrono::Utc::now().to_rfc3339();
                conn.execute(
                    "UPDATE tasks SET status = 'running', started_at = ?1,
                     last_heartbeat = ?1, queue_position = NULL WHERE id = ?2",
                    rusqlite::params![now, task_id.to_string()],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn refresh_heartbeat(&self, task_id: Uuid) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET last_heartbeat = ?1 WHERE id = ?2",
                    rusqlite::params![chrono::Utc::now().to_rfc3339(), task_id.to_string()],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn set_container_id(&self, task_id: Uuid, container_id: &str) -> Result<(), StoreError> {
        let container_id = container_id.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET container_id = ?1 WHERE id = ?2",
                    rusqlite::params![container_id, task_id.to_string()],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn complete_task(
        &self,
        task_id: Uuid,
        report_id: Uuid,
        download_url: &str,
    ) -> Result<(), StoreError> {
        let download_url = download_url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = 'completed', completed_at = ?1,
                     report_id = ?2, download_url = ?3 WHERE id = ?4",
                    rusqlite::params![
                        chrono::Utc::now().to_rfc3339(),
                        report_id.to_string(),
                        download_url,
                        task_id.to_string(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    /// The worker's late-cache-hit path: fold a still-queued task into a
    /// report that completed for the same PURL after it was enqueued,
    /// without ever invoking the sandbox for it.
    pub async fn complete_via_cache_hit(
        &self,
        task_id: Uuid,
        report_id: Uuid,
        download_url: &str,
    ) -> Result<(), StoreError> {
        let download_url = download_url.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = 'completed', completed_at = ?1,
                     report_id = ?2, download_url = ?3, queue_position = NULL WHERE id = ?4",
                    rusqlite::params![
                        chrono::Utc::now().to_rfc3339(),
                        report_id.to_string(),
                        download_url,
                        task_id.to_string(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn fail_task(
        &self,
        task_id: Uuid,
        category: ErrorCategory,
        message: &str,
        details: serde_json::Value,
    ) -> Result<(), StoreError> {
        let message = message.to_string();
        let details = details.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = 'failed', completed_at = ?1,
                     error_category = ?2, error_message = ?3, error_details = ?4,
                     queue_position = NULL WHERE id = ?5",
                    rusqlite::params![
                        chrono::Utc::now().to_rfc3339(),
                        category.as_str(),
                        message,
                        details,
                        task_id.to_string(),
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    /// Mark a still-`pending` task as failed outright — the one
    /// `pending -> failed` edge, used when enqueueing itself errors out, so
    /// a task never gets stranded with `status = queued` and no queue row.
    pub async fn fail_pending_task(&self, task_id: Uuid, message: &str) -> Result<(), StoreError> {
        let message = message.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE tasks SET status = 'failed', completed_at = ?1,
                     error_category = 'unknown_error', error_message = ?2
                     WHERE id = ?3 AND status = 'pending'",
                    rusqlite::params![chrono::Utc::now().to_rfc3339(), message, task_id.to_string()],
                )?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    /// Dense renumbering of all queued tasks using the same ordering key as
    /// selection: `priority DESC, queued_at ASC`.
    pub async fn renumber_queue(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                let ids: Vec<String> = {
                    let mut stmt = tx.prepare(
                        "SELECT id FROM tasks WHERE status = 'queued'
                         ORDER BY priority DESC, queued_at ASC",
                    )?;
                    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                    rows.collect::<rusqlite::Result<Vec<_>>>()?
                };
                for (idx, id) in ids.iter().enumerate() {
                    tx.execute(
                        "UPDATE tasks SET queue_position = ?1 WHERE id = ?2",
                        rusqlite::params![(idx + 1) as i64, id],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn list_running(&self) -> Result<Vec<Task>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE status = 'running' ORDER BY started_at ASC",
                )?;
                let rows = stmt.query_map([], row_to_task)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(Into::into)
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn list_queued(&self) -> Result<Vec<Task>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM tasks WHERE status = 'queued'
                     ORDER BY priority DESC, queued_at ASC",
                )?;
                let rows = stmt.query_map([], row_to_task)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(Into::into)
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn list_by_credential(
        &self,
        credential_id: Uuid,
        page: i64,
        page_size: i64,
        status: Option<TaskStatus>,
    ) -> Result<(Vec<Task>, i64), StoreError> {
        self.conn
            .call(move |conn| {
                let offset = (page.max(1) - 1) * page_size;
                let (where_clause, status_str) = match status {
                    Some(s) => (" AND status = ?2", Some(s.as_str().to_string())),
                    None => ("", None),
                };

                let total: i64 = match &status_str {
                    Some(s) => conn.query_row(
                        "SELECT COUNT(*) FROM tasks WHERE credential_id = ?1 AND status = ?2",
                        rusqlite::params![credential_id.to_string(), s],
                        |row| row.get(0),
                    )?,
                    None => conn.query_row(
                        "SELECT COUNT(*) FROM tasks WHERE credential_id = ?1",
                        rusqlite::params![credential_id.to_string()],
                        |row| row.get(0),
                    )?,
                };

                let sql = format!(
                    "SELECT * FROM tasks WHERE credential_id = ?1{where_clause}
                     ORDER BY created_at DESC LIMIT ?3 OFFSET ?4"
                );
                let mut stmt = conn.prepare(&sql)?;
                let items = if let Some(s) = &status_str {
                    stmt.query_map(
                        rusqlite::params![credential_id.to_string(), s, page_size, offset],
                        row_to_task,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?
                } else {
                    stmt.query_map(
                        rusqlite::params![credential_id.to_string(), page_size, offset],
                        row_to_task,
                    )?
                    .collect::<rusqlite::Result<Vec<_>>>()?
                };

                Ok((items, total))
            })
            .await
            .map_err(StoreError::from)
    }
}

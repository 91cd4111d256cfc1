//! Admission controller (spec component C5): the six-step decision sequence
//! that turns a submitted PURL into either a reused result or a freshly
//! queued task, grounded on `analyze_api`/`add_task_to_queue`.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use sbx_core::error::AdmissionError;
use sbx_core::purl::{self, Ecosystem};
use sbx_core::types::{canonical_download_url, Credential, Task, TaskStatus};
use sbx_store::{Store, StoreError};

/// Metadata about an existing, on-disk report, shaped for the API's
/// `report_metadata` response field.
#[derive(Debug, Clone)]
pub struct ReportMetadata {
    pub filename: String,
    pub size_bytes: u64,
    pub download_url: String,
    pub folder_structure: String,
}

/// What admission decided to do with a submitted PURL. Every variant carries
/// the full `Task` row so the caller can format a response without a second
/// round trip; predicted URLs for non-completed tasks are derived by the
/// caller from `task.ecosystem`/`package_name`/`package_version`, since a
/// task's `download_url` column is only ever set once it's actually completed.
pub enum AdmissionOutcome {
    /// A completed analysis already exists for this exact PURL (step 1).
    Completed {
        task: Task,
        report_metadata: ReportMetadata,
    },
    /// An in-flight task for this PURL already exists (steps 2 or 3), or the
    /// caller replayed a request it already made (step 4, idempotency key).
    Existing { task: Task },
    /// A new task was created and enqueued (steps 5-6).
    Queued { task: Task },
}

pub struct AdmissionController {
    store: Arc<Store>,
    dedupe_window: ChronoDuration,
    race_window: ChronoDuration,
    default_timeout_minutes: i64,
    media_base_url: String,
}

impl AdmissionController {
    pub fn new(
        store: Arc<Store>,
        dedupe_active_window_hours: i64,
        default_timeout_minutes: i64,
        media_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            dedupe_window: ChronoDuration::hours(dedupe_active_window_hours),
            race_window: ChronoDuration::minutes(1),
            default_timeout_minutes,
            media_base_url: media_base_url.into(),
        }
    }

    /// Run the full admission sequence for one submission.
    pub async fn submit(
        &self,
        credential: &Credential,
        purl_str: &str,
        priority: i32,
        idempotency_key: Option<String>,
    ) -> Result<AdmissionOutcome, AdmissionError> {
        let (package_name, package_version, ecosystem) =
            purl::extract_package_info(purl_str).map_err(AdmissionError::from)?;

        // Step 1: exact-PURL cache hit against a completed, reportable task.
        if let Some(task) = self
            .store
            .tasks
            .find_latest_completed_by_purl(purl_str)
            .await
            .map_err(internal)?
        {
            if let Some(report_id) = task.report_id {
                if let Some(report) = self.store.reports.get(report_id).await.map_err(internal)? {
                    self.store.reports.rematerialize(&report).await.map_err(internal)?;
                    let download_url = task.download_url.clone().unwrap_or_else(|| {
                        canonical_download_url(&self.media_base_url, ecosystem, &package_name, &package_version)
                    });
                    let (size_bytes, _modified) = self
                        .store
                        .reports
                        .file_metadata(ecosystem, &package_name, &package_version)
                        .await
                        .unwrap_or((0, std::time::SystemTime::now()));
                    let report_metadata = ReportMetadata {
                        filename: format!("{package_version}.json"),
                        size_bytes,
                        download_url,
                        folder_structure: format!(
                            "reports/{}/{}/",
                            ecosystem.as_str(),
                            sbx_core::types::sanitize_name(&package_name)
                        ),
                    };
                    return Ok(AdmissionOutcome::Completed { task, report_metadata });
                }
            }
        }

        // Step 2: an active duplicate within the dedupe window.
        let dedupe_since = Utc::now() - self.dedupe_window;
        if let Some(task) = self
            .store
            .tasks
            .find_active_by_purl_since(purl_str, dedupe_since)
            .await
            .map_err(internal)?
        {
            return Ok(AdmissionOutcome::Existing { task });
        }

        // Step 3: narrow race-window re-check immediately before creating a
        // new row — closes the gap between step 2's read and this write.
        let race_since = Utc::now() - self.race_window;
        if let Some(task) = self
            .store
            .tasks
            .find_active_by_purl_since(purl_str, race_since)
            .await
            .map_err(internal)?
        {
            return Ok(AdmissionOutcome::Existing { task });
        }

        // Step 4: idempotent replay of a previous submission by this caller.
        if let Some(key) = &idempotency_key {
            if let Some(task) = self
                .store
                .tasks
                .find_by_idempotency(credential.id, key)
                .await
                .map_err(internal)?
            {
                return Ok(AdmissionOutcome::Existing { task });
            }
        }

        // Step 5: create the task row.
        let mut task = Task::new(
            credential.id,
            purl_str.to_string(),
            package_name,
            package_version,
            ecosystem,
            priority,
            self.default_timeout_minutes,
            idempotency_key,
        );
        self.store.tasks.insert_task(task.clone()).await.map_err(internal)?;

        // Step 6: enqueue, or fail the row outright rather than strand it.
        match self.store.tasks.enqueue(task.id).await {
            Ok(position) => {
                task.status = TaskStatus::Queued;
                task.queued_at = Some(Utc::now());
                task.queue_position = Some(position);
                Ok(AdmissionOutcome::Queued { task })
            }
            Err(e) => {
                let _ = self.store.tasks.fail_pending_task(task.id, &e.to_string()).await;
                Err(AdmissionError::Internal(e.to_string()))
            }
        }
    }

    /// The configured media base URL, needed by callers (the query API) to
    /// compute the same predicted download URL this controller uses
    /// internally for the cache-hit path.
    pub fn media_base_url(&self) -> &str {
        &self.media_base_url
    }
}

fn internal(e: StoreError) -> AdmissionError {
    AdmissionError::Internal(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn controller() -> (AdmissionController, Arc<Store>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(Store::open_in_memory(dir.path()).await.unwrap());
        let controller = AdmissionController::new(
            store.clone(),
            24,
            30,
            "http://127.0.0.1:8080/media",
        );
        (controller, store)
    }

    async fn sample_credential(store: &Store) -> Credential {
        let cred = Credential::new("sk-test".into(), "ci", 100);
        store.credentials.insert(cred.clone()).await.unwrap();
        cred
    }

    #[tokio::test]
    async fn fresh_submission_gets_queued() {
        let (controller, store) = controller().await;
        let cred = sample_credential(&store).await;

        let outcome = controller
            .submit(&cred, "pkg:pypi/django@1.11.1", 0, None)
            .await
            .unwrap();

        match outcome {
            AdmissionOutcome::Queued { task } => {
                assert_eq!(task.status, TaskStatus::Queued);
                assert_eq!(task.queue_position, Some(1));
            }
            _ => panic!("expected Queued"),
        }
    }

    #[tokio::test]
    async fn duplicate_submission_returns_existing() {
        let (controller, store) = controller().await;
        let cred = sample_credential(&store).await;

        controller.submit(&cred, "pkg:pypi/django@1.11.1", 0, None).await.unwrap();
        let second = controller
            .submit(&cred, "pkg:pypi/django@1.11.1", 0, None)
            .await
            .unwrap();

        assert!(matches!(second, AdmissionOutcome::Existing { .. }));
    }

    #[tokio::test]
    async fn idempotency_key_replays_same_task() {
        let (controller, store) = controller().await;
        let cred = sample_credential(&store).await;

        let first = controller
            .submit(&cred, "pkg:pypi/django@1.11.1", 0, Some("k-1".into()))
            .await
            .unwrap();
        let first_id = match first {
            AdmissionOutcome::Queued { task } => task.id,
            _ => panic!("expected Queued"),
        };

        // A different purl with the same idempotency key still replays,
        // since lookup is keyed on (credential_id, idempotency_key) alone.
        let second = controller
            .submit(&cred, "pkg:pypi/django@1.11.1", 5, Some("k-1".into()))
            .await
            .unwrap();
        match second {
            AdmissionOutcome::Existing { task } => assert_eq!(task.id, first_id),
            _ => panic!("expected Existing (idempotent replay)"),
        }
    }

    #[tokio::test]
    async fn invalid_purl_is_rejected_before_touching_the_store() {
        let (controller, store) = controller().await;
        let cred = sample_credential(&store).await;

        let err = controller.submit(&cred, "not-a-purl", 0, None).await.unwrap_err();
        assert!(matches!(err, AdmissionError::Purl(_)));
    }

    #[tokio::test]
    async fn completed_task_is_served_from_cache() {
        let (controller, store) = controller().await;
        let cred = sample_credential(&store).await;

        let report = sbx_core::types::Report {
            id: Uuid::new_v4(),
            ecosystem: Ecosystem::Pypi,
            package_name: "django".into(),
            package_version: "1.11.1".into(),
            duration_seconds: 1.0,
            payload: serde_json::json!({"ok": true}),
            created_at: Utc::now(),
        };
        store.reports.insert(report.clone()).await.unwrap();

        let mut task = Task::new(
            cred.id,
            "pkg:pypi/django@1.11.1".into(),
            "django".into(),
            "1.11.1".into(),
            Ecosystem::Pypi,
            0,
            30,
            None,
        );
        task.status = TaskStatus::Running;
        store.tasks.insert_task(task.clone()).await.unwrap();
        store
            .tasks
            .complete_task(task.id, report.id, "http://example/report.json")
            .await
            .unwrap();

        let outcome = controller
            .submit(&cred, "pkg:pypi/django@1.11.1", 0, None)
            .await
            .unwrap();
        match outcome {
            AdmissionOutcome::Completed { report_metadata, .. } => {
                assert_eq!(report_metadata.filename, "1.11.1.json");
            }
            _ => panic!("expected Completed"),
        }
    }
}

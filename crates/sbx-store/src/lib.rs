//! SQLite-backed persistence for tasks, reports, and credentials (spec
//! components C3, C4, and the persistence half of C2). One `tokio_rusqlite`
//! connection per store keeps every write on a single background thread.

pub mod credential_store;
pub mod error;
pub mod mapping;
pub mod report_store;
pub mod schema;
pub mod task_store;

pub use credential_store::CredentialDb;
pub use error::StoreError;
pub use report_store::ReportDb;
pub use task_store::TaskDb;

/// All three stores bundled together, as `sbx-worker` and `sbx-api` receive
/// them — each backed by its own connection so task writes never contend
/// with report or credential lookups.
pub struct Store {
    pub tasks: TaskDb,
    pub reports: ReportDb,
    pub credentials: CredentialDb,
}

impl Store {
    pub async fn open(
        database_path: impl Into<std::path::PathBuf>,
        media_root: impl Into<std::path::PathBuf>,
    ) -> Result<Self, StoreError> {
        let database_path = database_path.into();
        let tasks = TaskDb::new(database_path.clone()).await?;
        let reports = ReportDb::new(database_path.clone(), media_root).await?;
        let credentials = CredentialDb::new(database_path).await?;
        Ok(Self {
            tasks,
            reports,
            credentials,
        })
    }

    /// Three independent in-memory connections, one per store. Used by
    /// `sbx-worker`/`sbx-api`/`sbx-cli` tests that need a disposable store
    /// without touching the filesystem.
    pub async fn open_in_memory(media_root: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        Ok(Self {
            tasks: TaskDb::new_in_memory().await?,
            reports: ReportDb::new_in_memory(media_root).await?,
            credentials: CredentialDb::new_in_memory().await?,
        })
    }
}

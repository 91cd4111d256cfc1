use sbx_core::purl::Ecosystem;
use sbx_core::types::{canonical_relative_path, Report};
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::StoreError;
use crate::mapping::row_to_report;
use crate::schema::SCHEMA;

/// Durable report store (spec component C4). Reports are written to two
/// places that must never disagree: a row in `reports` for queries, and a
/// JSON file under the media root at the canonical `ecosystem/package/version`
/// path for direct download.
pub struct ReportDb {
    conn: Connection,
    media_root: std::path::PathBuf,
}

impl ReportDb {
    pub async fn new(
        path: impl Into<std::path::PathBuf>,
        media_root: impl Into<std::path::PathBuf>,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(path.into()).await?;
        conn.call(|conn| Ok(conn.execute_batch(SCHEMA)?)).await?;
        Ok(Self {
            conn,
            media_root: media_root.into(),
        })
    }

    pub async fn new_in_memory(media_root: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(conn.execute_batch(SCHEMA))).await??;
        Ok(Self {
            conn,
            media_root: media_root.into(),
        })
    }

    pub fn path_for(&self, ecosystem: Ecosystem, package_name: &str, version: &str) -> std::path::PathBuf {
        self.media_root
            .join(canonical_relative_path(ecosystem, package_name, version))
    }

    /// Write a report's JSON to its canonical path without touching the row.
    /// Used both by `insert` and by the admission controller's cache-hit path
    /// (re-serve a previously completed report), so a deleted file on disk
    /// self-heals the next time that PURL is requested.
    pub async fn rematerialize(&self, report: &Report) -> Result<(), StoreError> {
        let file_path = self.path_for(report.ecosystem, &report.package_name, &report.package_version);
        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, serde_json::to_vec_pretty(&report.payload)?).await?;
        Ok(())
    }

    /// Persist a completed report: write the row, then write the JSON file
    /// to its canonical path. The row is the source of truth for querying;
    /// the file is what `download_url` ultimately serves.
    pub async fn insert(&self, report: Report) -> Result<(), StoreError> {
        self.rematerialize(&report).await?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO reports (id, ecosystem, package_name, package_version,
                     duration_seconds, payload, created_at) VALUES (?1,?2,?3,?4,?5,?6,?7)",
                    rusqlite::params![
                        report.id.to_string(),
                        report.ecosystem.as_str(),
                        report.package_name,
                        report.package_version,
                        report.duration_seconds,
                        report.payload.to_string(),
                        report.created_at.to_rfc3339(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM reports WHERE id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_report(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn find_by_triple(
        &self,
        ecosystem: Ecosystem,
        package_name: &str,
        version: &str,
    ) -> Result<Option<Report>, StoreError> {
        let ecosystem_str = ecosystem.as_str().to_string();
        let package_name = package_name.to_string();
        let version = version.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT * FROM reports WHERE ecosystem = ?1 AND package_name = ?2
                     AND package_version = ?3 ORDER BY created_at DESC LIMIT 1",
                )?;
                let mut rows = stmt.query(rusqlite::params![ecosystem_str, package_name, version])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_report(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    /// Filesystem-only metadata lookup used by the task status endpoint — it
    /// doesn't need the full payload, just whether the file exists and its
    /// size, without touching the database.
    pub async fn file_metadata(
        &self,
        ecosystem: Ecosystem,
        package_name: &str,
        version: &str,
    ) -> Option<(u64, std::time::SystemTime)> {
        let path = self.path_for(ecosystem, package_name, version);
        let meta = tokio::fs::metadata(&path).await.ok()?;
        let modified = meta.modified().ok()?;
        Some((meta.len(), modified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> Report {
        Report {
            id: Uuid::new_v4(),
            ecosystem: Ecosystem::Pypi,
            package_name: "django".into(),
            package_version: "1.11.1".into(),
            duration_seconds: 12.5,
            payload: serde_json::json!({"status": "success"}),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_writes_row_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = ReportDb::new_in_memory(dir.path()).await.unwrap();
        let report = sample_report();
        db.insert(report.clone()).await.unwrap();

        let fetched = db.get(report.id).await.unwrap().unwrap();
        assert_eq!(fetched.package_name, "django");

        let path = db.path_for(Ecosystem::Pypi, "django", "1.11.1");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn find_by_triple_returns_latest() {
        let dir = tempfile::tempdir().unwrap();
        let db = ReportDb::new_in_memory(dir.path()).await.unwrap();
        db.insert(sample_report()).await.unwrap();

        let found = db
            .find_by_triple(Ecosystem::Pypi, "django", "1.11.1")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}

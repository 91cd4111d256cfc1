use sbx_core::types::Credential;
use tokio_rusqlite::Connection;
use uuid::Uuid;

use crate::error::StoreError;
use crate::mapping::row_to_credential;
use crate::schema::SCHEMA;

/// Persistence half of the credential gate (spec component C2). Comparison
/// against the presented key happens in `sbx-api`; this store only looks
/// credentials up by their plaintext key and tracks last-used timestamps.
pub struct CredentialDb {
    conn: Connection,
}

impl CredentialDb {
    pub async fn new(path: impl Into<std::path::PathBuf>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.into()).await?;
        conn.call(|conn| Ok(conn.execute_batch(SCHEMA))).await??;
        Ok(Self { conn })
    }

    pub async fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| Ok(conn.execute_batch(SCHEMA))).await??;
        Ok(Self { conn })
    }

    pub async fn insert(&self, credential: Credential) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO credentials (id, key, label, rate_limit_per_hour,
                     is_active, created_at, last_used) VALUES (?1,?2,?3,?4,?5,?6,?7)",
                    rusqlite::params![
                        credential.id.to_string(),
                        credential.key,
                        credential.label,
                        credential.rate_limit_per_hour,
                        credential.is_active,
                        credential.created_at.to_rfc3339(),
                        credential.last_used.map(|d| d.to_rfc3339()),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn get_by_key(&self, key: &str) -> Result<Option<Credential>, StoreError> {
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM credentials WHERE key = ?1")?;
                let mut rows = stmt.query(rusqlite::params![key])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_credential(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT * FROM credentials WHERE id = ?1")?;
                let mut rows = stmt.query(rusqlite::params![id.to_string()])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row_to_credential(row)?)),
                    None => Ok(None),
                }
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn list(&self) -> Result<Vec<Credential>, StoreError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT * FROM credentials ORDER BY created_at ASC")?;
                let rows = stmt.query_map([], row_to_credential)?;
                rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
            })
            .await
            .map_err(StoreError::from)
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE credentials SET is_active = 0 WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn touch_last_used(&self, id: Uuid) -> Result<(), StoreError> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE credentials SET last_used = ?1 WHERE id = ?2",
                    rusqlite::params![chrono::Utc::now().to_rfc3339(), id.to_string()],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_lookup_by_key() {
        let db = CredentialDb::new_in_memory().await.unwrap();
        let cred = Credential::new("sk-test-123".into(), "ci-bot", 100);
        db.insert(cred.clone()).await.unwrap();

        let found = db.get_by_key("sk-test-123").await.unwrap().unwrap();
        assert_eq!(found.id, cred.id);
        assert!(found.is_active);
    }

    #[tokio::test]
    async fn deactivate_flips_flag() {
        let db = CredentialDb::new_in_memory().await.unwrap();
        let cred = Credential::new("sk-test-456".into(), "ci-bot", 100);
        db.insert(cred.clone()).await.unwrap();
        db.deactivate(cred.id).await.unwrap();

        let found = db.get_by_id(cred.id).await.unwrap().unwrap();
        assert!(!found.is_active);
    }
}

//! Credential provisioning (mint/list/deactivate), grounded on
//! `create_api_key.py`'s command shape: print the freshly minted key once
//! and warn it cannot be retrieved again, since `CredentialDb` only ever
//! stores the plaintext key for lookup, not a recovery path.

use std::path::Path;

use anyhow::Context;
use rand::RngCore;
use sbx_core::types::Credential;
use sbx_store::CredentialDb;

/// A 64-character hex token, matching the `key` width specified for
/// `Credential` in the data model (§3: "`key` (64-char token)").
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

async fn open_db(database_path: &Path) -> anyhow::Result<CredentialDb> {
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    CredentialDb::new(database_path)
        .await
        .with_context(|| format!("failed to open store at {}", database_path.display()))
}

pub async fn create(database_path: &Path, label: &str, rate_limit: u32, inactive: bool) -> anyhow::Result<()> {
    let db = open_db(database_path).await?;

    let key = generate_key();
    let mut credential = Credential::new(key.clone(), label, rate_limit);
    credential.is_active = !inactive;
    db.insert(credential.clone()).await.context("failed to insert credential")?;

    println!("Successfully created credential: {label}");
    println!("Credential ID: {}", credential.id);
    println!("API Key:       {key}");
    println!("Rate limit:    {rate_limit} requests/hour");
    println!("Status:        {}", if credential.is_active { "active" } else { "inactive" });
    println!("Created:       {}", credential.created_at.to_rfc3339());
    println!();
    println!("IMPORTANT: store this key securely. It cannot be retrieved again once created.");

    Ok(())
}

pub async fn list(database_path: &Path) -> anyhow::Result<()> {
    let db = open_db(database_path).await?;
    let credentials = db.list().await.context("failed to list credentials")?;

    if credentials.is_empty() {
        println!("no credentials found");
        return Ok(());
    }

    println!("{:<38} {:<20} {:>10} {:<8} {:<12}", "ID", "LABEL", "RATE/HR", "ACTIVE", "LAST USED");
    for credential in credentials {
        println!(
            "{:<38} {:<20} {:>10} {:<8} {:<12}",
            credential.id,
            credential.label,
            credential.rate_limit_per_hour,
            credential.is_active,
            credential
                .last_used
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }

    Ok(())
}

pub async fn deactivate(database_path: &Path, credential_id: &str) -> anyhow::Result<()> {
    let id = uuid::Uuid::parse_str(credential_id).context("credential id must be a UUID")?;
    let db = open_db(database_path).await?;

    if db.get_by_id(id).await.context("failed to look up credential")?.is_none() {
        anyhow::bail!("no credential found with id {id}");
    }

    db.deactivate(id).await.context("failed to deactivate credential")?;
    println!("credential {id} deactivated");
    Ok(())
}

//! `sbx` — the credential provisioning CLI (spec component C2's
//! out-of-band lifecycle: "created out-of-band" per §3). Grounded on
//! `at-cli`'s `Cli`/`Commands` clap shape and its `main.rs` dispatch, with
//! the agent-orchestration subcommands replaced by credential
//! mint/list/deactivate, grounded on
//! `create_api_key.py`'s `--name`/`--rate-limit`/`--inactive` flags.

mod commands;

use clap::{Parser, Subcommand};

/// package-sandbox CLI -- provision and manage API credentials.
#[derive(Parser)]
#[command(name = "sbx", version, about)]
struct Cli {
    /// Path to the task/report database (defaults to the configured store path).
    #[arg(long, global = true)]
    database_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Credential management.
    Credential {
        #[command(subcommand)]
        command: CredentialCommands,
    },
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Mint a new API credential.
    Create {
        /// Human-readable label for the credential.
        #[arg(long)]
        label: String,
        /// Requests per hour before the credential is rate-limited.
        #[arg(long, default_value_t = 100)]
        rate_limit: u32,
        /// Create the credential in an inactive state.
        #[arg(long, default_value_t = false)]
        inactive: bool,
    },
    /// List all known credentials.
    List,
    /// Deactivate a credential so it can no longer authenticate.
    Deactivate {
        /// Credential id (UUID).
        credential_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let database_path = cli
        .database_path
        .map(|p| sbx_core::config::expand_path(&p))
        .unwrap_or_else(|| {
            sbx_core::config::expand_path(&sbx_core::config::Config::load().unwrap_or_default().store.database_path)
        });

    match cli.command {
        Commands::Credential { command } => match command {
            CredentialCommands::Create {
                label,
                rate_limit,
                inactive,
            } => commands::credential::create(&database_path, &label, rate_limit, inactive).await?,
            CredentialCommands::List => commands::credential::list(&database_path).await?,
            CredentialCommands::Deactivate { credential_id } => {
                commands::credential::deactivate(&database_path, &credential_id).await?
            }
        },
    }

    Ok(())
}

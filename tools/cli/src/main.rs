//! Lockbox CLI - command line client for a Lockbox server.
//!
//! Every invocation authenticates (register or login), runs one command,
//! then shuts the session down.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use lockbox_client::{CardRecord, Client, ClientConfig, CredentialPair, Payload};
use lockbox_common::{Credentials, ResourceId, ResourceKind};

/// Environment variable read before prompting for the account password.
const PASSWORD_ENV: &str = "LOCKBOX_PASSWORD";

#[derive(Parser)]
#[command(name = "lockbox")]
#[command(about = "Lockbox - store credentials, cards and files on a Lockbox server")]
#[command(version)]
struct Cli {
    /// Server URL.
    #[arg(short, long, default_value = lockbox_client::config::DEFAULT_SERVER_URL)]
    server: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Account login.
    #[arg(short, long)]
    login: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the account.
    Register,

    /// Store a login and password.
    SaveCredential {
        /// Stored login.
        #[arg(short, long)]
        username: String,

        /// Label shown in listings.
        #[arg(short, long, default_value = "")]
        meta: String,
    },

    /// Store a payment card.
    SaveCard {
        #[arg(long)]
        number: String,

        /// Expiry, e.g. 12/29.
        #[arg(long)]
        until: String,

        #[arg(long)]
        name: String,

        #[arg(long)]
        surname: String,

        /// Label shown in listings.
        #[arg(short, long, default_value = "")]
        meta: String,
    },

    /// Upload a file.
    SaveFile {
        /// File to upload.
        path: PathBuf,
    },

    /// List stored resources of one kind.
    List {
        /// credential_pair, card_record or file.
        kind: ResourceKind,
    },

    /// Show one stored resource.
    Get { id: ResourceId },

    /// Download a file.
    GetFile {
        id: ResourceId,

        /// Target directory (default: the download directory).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Delete a stored resource.
    Delete { id: ResourceId },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = ClientConfig::default().with_server_url(cli.server);
    let client = Client::connect(&config).context("Invalid server address")?;

    let credentials = Credentials::new(cli.login, account_password()?);
    if matches!(cli.command, Commands::Register) {
        client
            .register(credentials)
            .await
            .context("Registration failed")?;
    } else {
        client.login(credentials).await.context("Login failed")?;
    }

    let result = run(&client, &config, cli.command).await;
    client.shutdown().await;
    result
}

/// Account password from the environment, else a hidden prompt.
fn account_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        debug!("Using password from {}", PASSWORD_ENV);
        return Ok(password);
    }
    rpassword::prompt_password("Password: ").context("Failed to read password")
}

async fn run(client: &Client, config: &ClientConfig, command: Commands) -> Result<()> {
    let resources = client.resources();
    match command {
        Commands::Register => println!("Account created."),

        Commands::SaveCredential { username, meta } => {
            let password = rpassword::prompt_password("Stored password: ")
                .context("Failed to read password")?;
            let payload = Payload::Credential(CredentialPair {
                login: username,
                password,
            });
            let id = resources
                .save_payload(&payload, meta.into_bytes())
                .await
                .context("Failed to save credential")?;
            println!("{}", id);
        }

        Commands::SaveCard {
            number,
            until,
            name,
            surname,
            meta,
        } => {
            let payload = Payload::Card(CardRecord {
                number,
                until,
                name,
                surname,
            });
            let id = resources
                .save_payload(&payload, meta.into_bytes())
                .await
                .context("Failed to save card")?;
            println!("{}", id);
        }

        Commands::SaveFile { path } => {
            let id = resources
                .save_file_from(&path)
                .await
                .with_context(|| format!("Failed to upload {}", path.display()))?;
            println!("{}", id);
        }

        Commands::List { kind } => {
            let items = resources.list(kind).await.context("Failed to list")?;
            if items.is_empty() {
                println!("No {} resources.", kind);
            }
            for item in items {
                println!("{}  {}", item.id, String::from_utf8_lossy(&item.meta));
            }
        }

        Commands::Get { id } => {
            let fetched = resources.get(id).await.context("Failed to fetch")?;
            println!("kind: {}", fetched.payload.kind());
            println!("meta: {}", fetched.meta_text());
            println!("{}", fetched.payload);
        }

        Commands::GetFile { id, dir } => {
            let dir = dir.unwrap_or_else(|| config.download_dir.clone());
            let path = resources
                .get_file_to(id, &dir)
                .await
                .context("Failed to download")?;
            println!("Saved to {}", path.display());
        }

        Commands::Delete { id } => {
            resources.delete(id).await.context("Failed to delete")?;
            println!("Deleted {}", id);
        }
    }
    Ok(())
}

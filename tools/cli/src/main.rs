//! dadpass CLI - run the one-time message service or operate its store.
//!
//! `serve` starts the HTTP API. `create`, `read` and `purge` talk to the
//! configured record store directly, with the same key and store flags.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dadpass_common::TtlOption;
use dadpass_crypto::MasterKey;
use dadpass_messages::MessageStore;
use dadpass_server::config::default_data_dir;
use dadpass_server::{open_message_store, KeySource, MessageService, ServerConfig, StoreSettings};
use dadpass_storage::create_default_registry;

#[derive(Parser)]
#[command(name = "dadpass")]
#[command(about = "dadpass - one-time encrypted messages")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve {
        #[command(flatten)]
        store: StoreArgs,

        /// Listen address.
        #[arg(short, long)]
        bind: Option<SocketAddr>,

        /// Seconds between expiry sweeps (0 disables).
        #[arg(long)]
        sweep_interval: Option<u64>,
    },

    /// Print a fresh master key.
    Keygen,

    /// Store a message and print its retrieval key.
    Create {
        #[command(flatten)]
        store: StoreArgs,

        /// Message text.
        #[arg(short, long)]
        message: String,

        /// Lifetime: 15min, 1hour, 1day or 5days.
        #[arg(short, long)]
        ttl: Option<String>,
    },

    /// Consume a message by key.
    Read {
        #[command(flatten)]
        store: StoreArgs,

        /// Retrieval key.
        key: String,
    },

    /// Remove expired messages.
    Purge {
        #[command(flatten)]
        store: StoreArgs,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum StoreKind {
    Memory,
    Local,
    Sqlite,
}

/// Flags shared by every command that opens the store.
#[derive(Args, Debug)]
struct StoreArgs {
    /// JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Record store backend.
    #[arg(long, value_enum)]
    store: Option<StoreKind>,

    /// Data location: directory for `local`, database file for `sqlite`.
    #[arg(long)]
    data: Option<PathBuf>,

    /// Read the master key from a file.
    #[arg(long, conflicts_with = "key_env")]
    key_file: Option<PathBuf>,

    /// Read the master key from an environment variable.
    #[arg(long)]
    key_env: Option<String>,
}

impl StoreArgs {
    /// Configuration file (if any) with command-line overrides applied.
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ServerConfig::default(),
        };

        if let Some(kind) = self.store {
            config.store = match kind {
                StoreKind::Memory => StoreSettings::memory(),
                StoreKind::Local => StoreSettings::local(
                    self.data.clone().unwrap_or_else(|| default_data_dir().join("records")),
                ),
                StoreKind::Sqlite => StoreSettings::sqlite(
                    self.data
                        .clone()
                        .unwrap_or_else(|| default_data_dir().join("messages.db")),
                ),
            };
        } else if let Some(data) = &self.data {
            config.store = match config.store.kind.as_str() {
                "local" => StoreSettings::local(data),
                "sqlite" => StoreSettings::sqlite(data),
                other => anyhow::bail!("--data has no meaning for the {} store", other),
            };
        }

        if let Some(path) = &self.key_file {
            config.key_source = KeySource::File(path.clone());
        } else if let Some(var) = &self.key_env {
            config.key_source = KeySource::Env(var.clone());
        }

        Ok(config)
    }

    fn open(&self) -> Result<MessageStore> {
        let config = self.server_config()?;
        open_message_store(&config, &create_default_registry())
            .context("Failed to open message store")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
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

    match cli.command {
        Commands::Serve {
            store,
            bind,
            sweep_interval,
        } => cmd_serve(&store, bind, sweep_interval).await,

        Commands::Keygen => cmd_keygen(),

        Commands::Create {
            store,
            message,
            ttl,
        } => cmd_create(&store, &message, ttl.as_deref()).await,

        Commands::Read { store, key } => cmd_read(&store, &key).await,

        Commands::Purge { store } => cmd_purge(&store).await,
    }
}

/// Run the HTTP service until Ctrl-C.
async fn cmd_serve(
    args: &StoreArgs,
    bind: Option<SocketAddr>,
    sweep_interval: Option<u64>,
) -> Result<()> {
    let mut config = args.server_config()?;
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(secs) = sweep_interval {
        config.sweep_interval_secs = secs;
    }

    let service = MessageService::from_config(config, &create_default_registry())
        .context("Failed to start service")?;

    service
        .run(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
        })
        .await
        .context("Service failed")?;

    Ok(())
}

fn cmd_keygen() -> Result<()> {
    println!("{}", MasterKey::generate().to_base64());
    Ok(())
}

async fn cmd_create(args: &StoreArgs, message: &str, ttl: Option<&str>) -> Result<()> {
    if let Some(ttl) = ttl {
        // Unlike the HTTP API, unknown labels are rejected here.
        ttl.parse::<TtlOption>()
            .with_context(|| format!("Unknown TTL option: {}", ttl))?;
    }

    let store = args.open()?;
    let key = store
        .create(Some(message), ttl)
        .await
        .context("Failed to create message")?;

    println!("{}", key);
    Ok(())
}

async fn cmd_read(args: &StoreArgs, key: &str) -> Result<()> {
    let store = args.open()?;
    match store.read(key).await.context("Failed to read message")? {
        Some(retrieved) => {
            println!("{}", retrieved.message);
            info!(ttl_option = %retrieved.ttl_option, "Message consumed");
        }
        None => println!("{}", dadpass_server::NOT_AVAILABLE),
    }
    Ok(())
}

async fn cmd_purge(args: &StoreArgs) -> Result<()> {
    let store = args.open()?;
    let purged = store
        .purge_expired()
        .await
        .context("Failed to purge expired messages")?;
    println!("Purged {} expired message(s) from {}", purged, store.backend());
    Ok(())
}

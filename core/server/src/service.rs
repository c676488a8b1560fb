//! Service assembly and lifecycle.

use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::routes::{router, AppState};
use crate::sweeper::spawn_sweeper;
use dadpass_common::{Error, Result};
use dadpass_crypto::EnvelopeCipher;
use dadpass_messages::MessageStore;
use dadpass_storage::StoreRegistry;

/// Build a message store from configuration.
///
/// Loads the master key, resolves the record store backend from `registry`
/// and wires both into a [`MessageStore`].
///
/// # Errors
/// - `Config` if the key cannot be loaded or the backend is unknown
/// - `Storage` if the backend cannot be opened
pub fn open_message_store(config: &ServerConfig, registry: &StoreRegistry) -> Result<MessageStore> {
    config.validate()?;

    let master_key = config.key_source.provider().load_master_key()?;

    let records = registry.resolve(&config.store.kind, &config.store.options_value())?;
    info!(backend = records.name(), "Record store opened");

    MessageStore::new(
        EnvelopeCipher::new(master_key),
        records,
        config.message_store_config(),
    )
}

/// The running HTTP service: configuration plus the shared message store.
pub struct MessageService {
    config: ServerConfig,
    messages: Arc<MessageStore>,
}

impl MessageService {
    pub fn from_config(config: ServerConfig, registry: &StoreRegistry) -> Result<Self> {
        let messages = open_message_store(&config, registry)?;
        Ok(Self::new(config, messages))
    }

    pub fn new(config: ServerConfig, messages: MessageStore) -> Self {
        Self {
            config,
            messages: Arc::new(messages),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn messages(&self) -> Arc<MessageStore> {
        self.messages.clone()
    }

    pub fn router(&self) -> Router {
        router(AppState::new(self.messages.clone()))
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config.bind).await.map_err(|e| {
            Error::Config(format!("Cannot bind {}: {}", self.config.bind, e))
        })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        let (stop_tx, stop_rx) = watch::channel(false);

        let sweeper = self
            .config
            .sweep_interval()
            .map(|every| spawn_sweeper(self.messages.clone(), every, stop_rx));

        info!(%addr, backend = self.messages.backend(), "dadpass listening");
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        let _ = stop_tx.send(true);
        if let Some(handle) = sweeper {
            if let Err(e) = handle.await {
                warn!(error = %e, "Sweeper task ended abnormally");
            }
        }

        let stats = self.messages.stats();
        info!(
            created = stats.created,
            delivered = stats.delivered,
            expired = stats.expired,
            missing = stats.missing,
            undecryptable = stats.undecryptable,
            collisions = stats.collisions,
            "dadpass stopped"
        );

        served.map_err(Error::Io)
    }
}

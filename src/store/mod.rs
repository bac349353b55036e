//! Process-wide configuration store.
//!
//! # Data Flow
//! ```text
//! startup
//!     → ConfigStore::for_host (backend chosen once)
//!     → initialize(): backend.load() or write default
//!     → ArcSwap<Configuration> holds the live value
//!
//! set()/update():
//!     → validate
//!     → backend.save() (failure logged, store degrades to memory only)
//!     → atomic swap
//!     → observers notified in insertion order
//!
//! reload():
//!     → backend.load() bypassing the cache
//!     → swap + notify (always)
//!
//! reload_if_changed():
//!     → same, but an unchanged document publishes nothing
//! ```
//!
//! # Design Decisions
//! - Every operation awaits the one-time initialization barrier first
//! - Writers are serialized through a single async mutex; readers never block
//!   on writers
//! - Persistence problems never escape as errors to readers

pub mod backend;
pub mod model;

pub use backend::{FileBackend, HostContext, LocalBackend, PersistenceBackend};
pub use model::Configuration;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OnceCell};

use crate::config::StoreSettings;
use crate::error::{PersistenceError, RelayResult};
use crate::observability::metrics;

/// Callback invoked with every published configuration.
pub type Observer = Arc<dyn Fn(&Configuration) + Send + Sync>;

/// Handle returned by [`ConfigStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Configuration store with a single active persistence backend.
pub struct ConfigStore {
    backend: PersistenceBackend,
    current: ArcSwap<Configuration>,
    ready: OnceCell<()>,
    writer: AsyncMutex<()>,
    observers: Mutex<Vec<(SubscriptionId, Observer)>>,
    next_subscription: AtomicU64,
    degraded: AtomicBool,
}

impl ConfigStore {
    pub fn new(backend: PersistenceBackend) -> Self {
        Self {
            backend,
            current: ArcSwap::from_pointee(Configuration::default()),
            ready: OnceCell::new(),
            writer: AsyncMutex::new(()),
            observers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            degraded: AtomicBool::new(false),
        }
    }

    /// Build a store whose backend matches the configured host context.
    pub fn for_host(settings: &StoreSettings) -> Self {
        Self::new(PersistenceBackend::for_host(settings.host, settings))
    }

    /// Load the persisted configuration, or persist the default.
    ///
    /// Runs once per store. Concurrent and later callers wait for that single
    /// run and observe its result.
    pub async fn initialize(&self) -> Arc<Configuration> {
        self.ready.get_or_init(|| self.load_initial()).await;
        self.current.load_full()
    }

    /// Current configuration, after the initialization barrier.
    pub async fn get(&self) -> Arc<Configuration> {
        self.initialize().await
    }

    /// Validate, persist and publish a new configuration.
    pub async fn set(&self, config: Configuration) -> RelayResult<Arc<Configuration>> {
        self.initialize().await;
        let _writer = self.writer.lock().await;
        self.apply(config).await
    }

    /// Read-modify-write under the writer lock.
    pub async fn update<F>(&self, f: F) -> RelayResult<Arc<Configuration>>
    where
        F: FnOnce(&Configuration) -> Configuration,
    {
        self.initialize().await;
        let _writer = self.writer.lock().await;
        let next = f(&self.current.load());
        self.apply(next).await
    }

    /// Register an observer. It is called immediately with the current value
    /// and then after every successful write or reload.
    pub async fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Configuration) + Send + Sync + 'static,
    {
        self.initialize().await;
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let observer: Observer = Arc::new(observer);

        // No publish may land between registration and the initial call.
        let _writer = self.writer.lock().await;
        self.observers.lock().push((id, observer.clone()));
        observer(&self.current.load());
        id
    }

    /// Remove an observer. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|(sid, _)| *sid != id);
        observers.len() != before
    }

    /// Re-read the backend, bypassing the in-memory value, and publish the
    /// result to every observer.
    ///
    /// A missing, unreadable or invalid document leaves the current value in
    /// place and publishes nothing.
    pub async fn reload(&self) -> Arc<Configuration> {
        self.reload_from_backend(false).await
    }

    /// Like [`ConfigStore::reload`], but a document equal to the current
    /// value is not republished. Used for file change notifications, where
    /// our own saves come back unchanged.
    pub async fn reload_if_changed(&self) -> Arc<Configuration> {
        self.reload_from_backend(true).await
    }

    async fn reload_from_backend(&self, skip_unchanged: bool) -> Arc<Configuration> {
        self.initialize().await;
        let _writer = self.writer.lock().await;

        match self.backend.load().await {
            Ok(Some(config)) => match config.validate() {
                Ok(()) if skip_unchanged && config == **self.current.load() => {
                    tracing::debug!("Persisted configuration unchanged, nothing to publish");
                    self.current.load_full()
                }
                Ok(()) => {
                    let config = Arc::new(config);
                    self.current.store(config.clone());
                    self.publish(&config);
                    tracing::info!(path = %self.backend.path().display(), "Configuration reloaded");
                    config
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Reloaded configuration is invalid, keeping current");
                    self.current.load_full()
                }
            },
            Ok(None) => {
                tracing::warn!(
                    path = %self.backend.path().display(),
                    "No persisted configuration to reload, keeping current"
                );
                self.current.load_full()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to reload configuration, keeping current");
                self.current.load_full()
            }
        }
    }

    /// True once a persistence failure has switched the store to memory only.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub fn backend(&self) -> &PersistenceBackend {
        &self.backend
    }

    async fn load_initial(&self) {
        let path = self.backend.path().display().to_string();
        tracing::info!(path = %path, host = ?self.backend.host(), "Loading configuration");

        let config = match self.backend.load().await {
            Ok(Some(config)) => match config.validate() {
                Ok(()) => {
                    tracing::info!(path = %path, "Loaded persisted configuration");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Persisted configuration is invalid, using defaults");
                    Configuration::default()
                }
            },
            Ok(None) => {
                tracing::info!(path = %path, "No persisted configuration, writing defaults");
                let config = Configuration::default();
                self.persist(&config).await;
                config
            }
            Err(e @ PersistenceError::Malformed { .. }) => {
                tracing::warn!(error = %e, "Persisted configuration is malformed, using defaults");
                Configuration::default()
            }
            Err(e) => {
                self.degrade(&e);
                Configuration::default()
            }
        };

        self.current.store(Arc::new(config));
    }

    /// Caller must hold the writer lock.
    async fn apply(&self, config: Configuration) -> RelayResult<Arc<Configuration>> {
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "Rejected configuration update");
            metrics::record_config_update("rejected");
            return Err(e);
        }

        self.persist(&config).await;

        let config = Arc::new(config);
        self.current.store(config.clone());
        self.publish(&config);
        metrics::record_config_update("applied");
        tracing::info!(
            api_base_url = %config.api_base_url,
            websocket_url = %config.websocket_url,
            file_server_url = %config.file_server_url,
            "Configuration updated"
        );
        Ok(config)
    }

    async fn persist(&self, config: &Configuration) {
        if self.is_degraded() {
            tracing::debug!("Store is memory only, skipping save");
            return;
        }
        if let Err(e) = self.backend.save(config).await {
            self.degrade(&e);
        }
    }

    fn degrade(&self, error: &PersistenceError) {
        metrics::record_persistence_failure();
        if !self.degraded.swap(true, Ordering::AcqRel) {
            tracing::error!(
                error = %error,
                "Configuration persistence failed, continuing in memory only"
            );
        }
    }

    fn publish(&self, config: &Configuration) {
        // Snapshot so observers may subscribe or unsubscribe re-entrantly.
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in observers {
            observer(config);
        }
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("backend", &self.backend)
            .field("initialized", &self.ready.initialized())
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

//! Provider boundary and its synchronous facade
//!
//! The hosted app is reached through an async [`Provider`]. The formula
//! evaluator is synchronous, so [`ProviderHandle`] submits each call to a
//! tokio runtime and blocks the caller until the result arrives or the
//! configured deadline passes.

use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, trace, warn};

use apptest_common::{EngineConfig, Error, ItemPath, PropertyEnvelope, Result};

/// Remote reads and writes against the live control tree.
///
/// Implementations report transport problems as [`Error::Transport`]; the
/// facade takes care of timeouts and outdated-app classification.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Raw JSON reply (`{"propertyValue": ...}`), or `None` when there is no value
    async fn get_property_value(&self, path: &ItemPath) -> Result<Option<String>>;

    /// Current number of rows behind an unindexed table path
    async fn get_item_count(&self, path: &ItemPath) -> Result<usize>;

    async fn select_control(&self, path: &ItemPath) -> Result<bool>;

    async fn set_property(&self, path: &ItemPath, value: serde_json::Value) -> Result<bool>;
}

/// Blocking, deadline-bounded access to a [`Provider`].
///
/// Cheap to clone. Must not be used from inside an async task: every call
/// parks the current thread until the provider answers or the timeout hits.
/// A timeout only releases the caller; the remote operation keeps running.
#[derive(Clone)]
pub struct ProviderHandle {
    provider: Arc<dyn Provider>,
    runtime: Handle,
    config: Arc<EngineConfig>,
    // Keeps an owned runtime alive for as long as any clone exists
    _owned: Option<Arc<Runtime>>,
}

impl ProviderHandle {
    /// Drive `provider` on an existing runtime
    pub fn new(provider: Arc<dyn Provider>, runtime: Handle, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            provider,
            runtime,
            config: Arc::new(config),
            _owned: None,
        })
    }

    /// Drive `provider` on a dedicated multi-threaded runtime
    pub fn with_owned_runtime(provider: Arc<dyn Provider>, config: EngineConfig) -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("apptest-provider")
            .enable_all()
            .build()?;

        let mut handle = Self::new(provider, runtime.handle().clone(), config)?;
        handle._owned = Some(Arc::new(runtime));
        Ok(handle)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_property_value(&self, path: &ItemPath) -> Result<Option<String>> {
        let provider = self.provider.clone();
        let owned = path.clone();
        self.wait("getPropertyValue", path, async move {
            provider.get_property_value(&owned).await
        })
    }

    /// Fetch a leaf and unwrap its envelope
    pub fn fetch_payload(&self, path: &ItemPath) -> Result<Option<String>> {
        path.validate(true)?;
        let raw = self.get_property_value(path)?;
        PropertyEnvelope::payload_of(raw.as_deref())
    }

    pub fn get_item_count(&self, path: &ItemPath) -> Result<usize> {
        let provider = self.provider.clone();
        let owned = path.clone();
        self.wait("getItemCount", path, async move {
            provider.get_item_count(&owned).await
        })
    }

    pub fn select_control(&self, path: &ItemPath) -> Result<bool> {
        let provider = self.provider.clone();
        let owned = path.clone();
        self.wait("selectControl", path, async move {
            provider.select_control(&owned).await
        })
    }

    pub fn set_property(&self, path: &ItemPath, value: serde_json::Value) -> Result<bool> {
        let provider = self.provider.clone();
        let owned = path.clone();
        self.wait("setProperty", path, async move {
            provider.set_property(&owned, value).await
        })
    }

    /// Submit `operation` and block until it resolves or the deadline passes
    fn wait<T, F>(&self, name: &str, path: &ItemPath, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = mpsc::sync_channel(1);
        self.runtime.spawn(async move {
            // The receiver is gone once the caller has timed out
            let _ = tx.send(operation.await);
        });

        let timeout = self.config.timeout();
        let interval = self.config.poll_interval();
        let start = Instant::now();
        debug!("{} {} started", name, path);

        loop {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!("{} {} timed out after {:?}", name, path, timeout);
                return Err(Error::Timeout {
                    operation: format!("{} {}", name, path),
                    timeout_ms: self.config.timeout_ms,
                });
            }

            match rx.recv_timeout(interval.min(timeout - elapsed)) {
                Ok(result) => {
                    debug!("{} {} finished in {:?}", name, path, start.elapsed());
                    return result.map_err(|e| self.classify(e));
                }
                Err(RecvTimeoutError::Timeout) => {
                    trace!("{} {} still pending after {:?}", name, path, start.elapsed());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Runtime(format!(
                        "{} {} was dropped before completing",
                        name, path
                    )));
                }
            }
        }
    }

    fn classify(&self, error: Error) -> Error {
        match error {
            Error::Transport(message) => {
                Error::from_transport(message, &self.config.outdated_app_signatures)
            }
            other => other,
        }
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("timeout_ms", &self.config.timeout_ms)
            .field("poll_interval_ms", &self.config.poll_interval_ms)
            .finish_non_exhaustive()
    }
}

use std::fmt;
use std::sync::Arc;

use tokio::sync::{RwLock, watch};
use tracing::{error, info, warn};

use crate::config::{EngineMode, RegistryConfig};
use crate::core::{RegistryError, Result, Value};
use crate::engine::{Engine, SqliteEngine, WorkerEngine};
use crate::result::RecordSet;

/// Lifecycle of a [`DatabaseHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    Initializing,
    Ready,
    Failed(String),
    Disposed,
}

impl HandleState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Ready => write!(f, "ready"),
            Self::Failed(message) => write!(f, "failed: {}", message),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// Owned handle to the embedded engine.
///
/// The handle starts in [`HandleState::Initializing`]; [`DatabaseHandle::init`]
/// opens the engine and moves it to `Ready` or `Failed`. A failed handle may be
/// initialized again, a disposed one may not. Every transition is published to
/// subscribers of [`DatabaseHandle::watch_state`].
///
/// Calls made while the handle is not `Ready` return
/// [`RegistryError::NotReady`] instead of doing nothing.
pub struct DatabaseHandle {
    config: RegistryConfig,
    engine: RwLock<Option<Arc<dyn Engine>>>,
    state: watch::Sender<HandleState>,
}

impl DatabaseHandle {
    pub fn new(config: RegistryConfig) -> Arc<Self> {
        let (state, _) = watch::channel(HandleState::Initializing);
        Arc::new(Self {
            config,
            engine: RwLock::new(None),
            state,
        })
    }

    /// Creates and initializes a handle, failing if the engine cannot open.
    pub async fn open(config: RegistryConfig) -> Result<Arc<Self>> {
        let handle = Self::new(config);
        handle.init().await?;
        Ok(handle)
    }

    /// Wraps an already running engine; the handle is `Ready` immediately.
    pub fn with_engine(config: RegistryConfig, engine: Arc<dyn Engine>) -> Arc<Self> {
        let (state, _) = watch::channel(HandleState::Ready);
        Arc::new(Self {
            config,
            engine: RwLock::new(Some(engine)),
            state,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn state(&self) -> HandleState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().is_ready()
    }

    pub fn watch_state(&self) -> watch::Receiver<HandleState> {
        self.state.subscribe()
    }

    fn transition(&self, next: HandleState) {
        info!(state = %next, "database handle state changed");
        self.state.send_replace(next);
    }

    /// Opens the engine. A no-op when already `Ready`.
    pub async fn init(&self) -> Result<()> {
        match self.state() {
            HandleState::Ready => return Ok(()),
            HandleState::Disposed => {
                return Err(RegistryError::NotReady(HandleState::Disposed.to_string()));
            }
            HandleState::Failed(_) => self.transition(HandleState::Initializing),
            HandleState::Initializing => {}
        }

        if let Err(err) = self.config.validate() {
            return Err(self.fail(err));
        }

        let opened: Result<Arc<dyn Engine>> = match self.config.engine_mode {
            EngineMode::Worker => WorkerEngine::spawn(&self.config)
                .await
                .map(|e| Arc::new(e) as Arc<dyn Engine>),
            EngineMode::InProcess => {
                SqliteEngine::open(&self.config).map(|e| Arc::new(e) as Arc<dyn Engine>)
            }
        };

        match opened {
            Ok(engine) => {
                info!(url = %engine.url(), mode = ?self.config.engine_mode, "database opened");
                *self.engine.write().await = Some(engine);
                self.transition(HandleState::Ready);
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&self, err: RegistryError) -> RegistryError {
        error!(error = %err, "database initialization failed");
        self.transition(HandleState::Failed(err.to_string()));
        err
    }

    async fn engine(&self) -> Result<Arc<dyn Engine>> {
        let state = self.state();
        if !state.is_ready() {
            return Err(RegistryError::NotReady(state.to_string()));
        }
        self.engine
            .read()
            .await
            .clone()
            .ok_or_else(|| RegistryError::NotReady(state.to_string()))
    }

    /// Runs one statement with bound parameters.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        self.engine().await?.query(sql, params).await
    }

    /// Runs a multi-statement text, one record set per statement.
    pub async fn exec(&self, sql: &str) -> Result<Vec<RecordSet>> {
        self.engine().await?.exec(sql).await
    }

    /// Closes the engine. The handle stays `Disposed` for good.
    pub async fn dispose(&self) -> Result<()> {
        if self.state() == HandleState::Disposed {
            return Ok(());
        }
        let engine = self.engine.write().await.take();
        self.transition(HandleState::Disposed);

        if let Some(engine) = engine {
            if let Err(err) = engine.close().await {
                warn!(error = %err, "engine did not close cleanly");
                return Err(err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions_are_observable() {
        let handle = DatabaseHandle::new(RegistryConfig::in_memory());
        let mut states = handle.watch_state();
        assert_eq!(*states.borrow(), HandleState::Initializing);

        handle.init().await.unwrap();
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), HandleState::Ready);

        handle.dispose().await.unwrap();
        assert_eq!(*states.borrow_and_update(), HandleState::Disposed);
        assert!(handle.init().await.is_err());
    }

    #[tokio::test]
    async fn calls_before_init_are_refused() {
        let handle = DatabaseHandle::new(RegistryConfig::in_memory());
        let err = handle.query("SELECT 1", &[]).await.unwrap_err();
        assert_eq!(err, RegistryError::NotReady("initializing".into()));
    }

    #[tokio::test]
    async fn failed_init_is_reported_as_state() {
        let handle = DatabaseHandle::new(
            RegistryConfig::in_memory().channel_capacity(0),
        );
        assert!(handle.init().await.is_err());
        assert!(matches!(handle.state(), HandleState::Failed(_)));
        assert!(matches!(
            handle.exec("SELECT 1").await,
            Err(RegistryError::NotReady(_))
        ));
    }

    #[tokio::test]
    async fn in_process_mode_opens() {
        let handle = DatabaseHandle::open(
            RegistryConfig::in_memory().engine_mode(EngineMode::InProcess),
        )
        .await
        .unwrap();
        let set = handle.query("SELECT 1 AS one", &[]).await.unwrap();
        assert_eq!(set.get(0, "one"), Some(&Value::Integer(1)));
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{RegistryError, Result};

pub const DEFAULT_CHANNEL_NAME: &str = "patient-db-sync";
pub const DEFAULT_QUERY: &str = "SELECT * FROM patients";

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// How the engine connection is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    /// Connection owned by a dedicated worker thread.
    #[default]
    Worker,
    /// Connection shared behind a mutex, calls run on the blocking pool.
    InProcess,
}

/// What a session does with a change message from another session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Replace the displayed records with the message payload.
    #[default]
    Mirror,
    /// Ignore the payload and re-fetch the canonical listing.
    Reconcile,
}

/// Registry configuration
///
/// Built with chained setters, or parsed from a connection URL.
///
/// # Examples
///
/// ```
/// use patientdb::config::{RegistryConfig, SyncMode};
///
/// let config = RegistryConfig::in_memory()
///     .sync_mode(SyncMode::Reconcile)
///     .channel_name("ward-7");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Database file or in-memory database
    pub database: DatabaseLocation,

    /// Engine hosting
    pub engine_mode: EngineMode,

    /// Name of the change channel shared by sessions
    pub channel_name: String,

    /// Frames buffered per subscriber before the slowest one starts lagging
    pub channel_capacity: usize,

    /// Reaction to incoming change messages
    pub sync_mode: SyncMode,

    /// Whether sessions announce their writes
    pub broadcast_writes: bool,

    /// Text the SQL console starts with
    pub default_query: String,

    /// How long a file database waits on a lock held by another process
    pub busy_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl RegistryConfig {
    /// Configuration for a database file
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_location(DatabaseLocation::File(path.as_ref().to_path_buf()))
    }

    /// Configuration for a private in-memory database
    pub fn in_memory() -> Self {
        Self::with_location(DatabaseLocation::InMemory)
    }

    fn with_location(database: DatabaseLocation) -> Self {
        Self {
            database,
            engine_mode: EngineMode::default(),
            channel_name: DEFAULT_CHANNEL_NAME.to_string(),
            channel_capacity: 64,
            sync_mode: SyncMode::default(),
            broadcast_writes: true,
            default_query: DEFAULT_QUERY.to_string(),
            busy_timeout: Duration::from_secs(5),
        }
    }

    pub fn engine_mode(mut self, mode: EngineMode) -> Self {
        self.engine_mode = mode;
        self
    }

    pub fn channel_name(mut self, name: &str) -> Self {
        self.channel_name = name.to_string();
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn broadcast_writes(mut self, enabled: bool) -> Self {
        self.broadcast_writes = enabled;
        self
    }

    pub fn default_query(mut self, query: &str) -> Self {
        self.default_query = query.to_string();
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Parse from a connection URL
    ///
    /// Accepts `sqlite://<path>`, `sqlite:<path>` and `sqlite::memory:`.
    ///
    /// # Examples
    ///
    /// ```
    /// use patientdb::config::{DatabaseLocation, RegistryConfig};
    ///
    /// let config = RegistryConfig::from_url("sqlite://data/patients.db").unwrap();
    /// assert_eq!(
    ///     config.database,
    ///     DatabaseLocation::File("data/patients.db".into())
    /// );
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url.strip_prefix("sqlite:").ok_or_else(|| {
            RegistryError::precondition("URL must start with 'sqlite:'")
        })?;

        if rest == ":memory:" || rest == "//:memory:" {
            return Ok(Self::in_memory());
        }

        let path = rest.strip_prefix("//").unwrap_or(rest);
        if path.is_empty() {
            return Err(RegistryError::precondition("URL has no database path"));
        }
        Ok(Self::new(path))
    }

    /// Convert to connection URL
    pub fn to_url(&self) -> String {
        match &self.database {
            DatabaseLocation::InMemory => "sqlite::memory:".to_string(),
            DatabaseLocation::File(path) => format!("sqlite://{}", path.display()),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.channel_name.trim().is_empty() {
            return Err(RegistryError::precondition("channel_name cannot be empty"));
        }

        if self.channel_capacity == 0 {
            return Err(RegistryError::precondition("channel_capacity must be > 0"));
        }

        if let DatabaseLocation::File(path) = &self.database {
            if path.as_os_str().is_empty() {
                return Err(RegistryError::precondition("database path cannot be empty"));
            }
        }

        Ok(())
    }
}

use thiserror::Error;

/// Failure classes surfaced to the user as a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The database handle could not be created or is not usable.
    Initialization,
    /// The engine rejected a statement (syntax, constraint, type).
    Statement,
    /// The operation was refused before reaching the engine, including any
    /// use of a handle that is not `Ready`.
    Precondition,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Database is not ready ({0})")]
    NotReady(String),

    #[error("Failed to initialize database: {0}")]
    Init(String),

    /// Engine message text, verbatim.
    #[error("{0}")]
    Statement(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Engine worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

impl RegistryError {
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Init(_) | Self::WorkerUnavailable(_) | Self::IoError(_) => {
                ErrorCategory::Initialization
            }
            // Using a handle that is not `Ready` is refused before the engine sees it.
            Self::NotReady(_) | Self::Precondition(_) => ErrorCategory::Precondition,
            Self::Statement(_)
            | Self::TypeMismatch(_)
            | Self::Channel(_)
            | Self::LockError(_) => ErrorCategory::Statement,
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Statement(err.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Channel(err.to_string())
    }
}

impl From<std::io::Error> for RegistryError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RegistryError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

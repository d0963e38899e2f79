// ============================================================================
// patientdb Library
// ============================================================================

pub mod config;
pub mod core;
pub mod engine;
pub mod facade;
pub mod prelude;
pub mod registry;
pub mod result;
pub mod session;
pub mod sql;
pub mod sync;
pub mod view;

// Re-export main types for convenience
pub use config::{RegistryConfig, SyncMode};
pub use core::{RegistryError, Result, Value};
pub use facade::{DatabaseHandle, HandleState};
pub use result::RecordSet;
pub use session::{QueryOutcome, Session};

// ============================================================================
// Crate-level smoke tests
// ============================================================================

//! Common imports for applications built on the registry.
//!
//! ```
//! use patientdb::prelude::*;
//!
//! let config = RegistryConfig::in_memory();
//! assert_eq!(config.sync_mode, SyncMode::Mirror);
//! ```

pub use crate::config::{DatabaseLocation, EngineMode, RegistryConfig, SyncMode};
pub use crate::core::{RegistryError, Result, Value};
pub use crate::facade::{DatabaseHandle, HandleState};
pub use crate::registry::{BloodGroup, Gender, Patient, PatientForm};
pub use crate::result::{RecordSet, Row};
pub use crate::session::{QueryOutcome, Session};
pub use crate::sql::StatementClass;
pub use crate::view::{Notification, NotificationKind, ViewState};

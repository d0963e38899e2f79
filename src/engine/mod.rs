//! Embedded engine boundary.
//!
//! The registry never talks to SQLite directly: everything goes through the
//! two primitives of [`Engine`]. Two implementations exist, one that keeps the
//! connection in-process behind a mutex and one that parks it on a dedicated
//! worker thread and marshals calls to it.

pub mod sqlite;
pub mod worker;

use async_trait::async_trait;

use crate::core::{Result, Value};
use crate::result::RecordSet;

pub use sqlite::SqliteEngine;
pub use worker::WorkerEngine;

#[async_trait]
pub trait Engine: Send + Sync {
    /// Runs exactly one statement with positionally bound parameters.
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RecordSet>;

    /// Runs every statement in `sql`, returning one record set per statement.
    async fn exec(&self, sql: &str) -> Result<Vec<RecordSet>>;

    /// Releases the underlying connection. Further calls fail.
    async fn close(&self) -> Result<()>;

    /// Connection URL, for logs.
    fn url(&self) -> String;
}

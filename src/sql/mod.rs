pub mod classify;

pub use classify::{StatementClass, StatementKind, classify, requires_autocommit, statement_kinds};

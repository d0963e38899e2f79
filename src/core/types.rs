use serde::{Deserialize, Serialize};

use super::Value;

/// Postgres type OIDs used as field type identifiers.
pub mod type_oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const INT8: u32 = 20;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const FLOAT8: u32 = 701;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const NUMERIC: u32 = 1700;
}

/// One result column: its name and type identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "dataTypeID")]
    pub type_id: u32,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, type_id: u32) -> Self {
        Self {
            name: name.into(),
            type_id,
        }
    }

    /// Maps a declared column type to a type identifier, following SQLite's
    /// affinity rules for anything not recognised by name.
    pub fn type_id_for_decl(decl: &str) -> u32 {
        let decl = decl.trim().to_ascii_uppercase();

        if decl.starts_with("BOOL") {
            return type_oid::BOOL;
        }
        if decl.starts_with("BIGINT") || decl == "INT8" {
            return type_oid::INT8;
        }
        if decl.contains("INT") {
            return type_oid::INT4;
        }
        if decl.starts_with("VARCHAR") || decl.starts_with("CHARACTER VARYING") {
            return type_oid::VARCHAR;
        }
        if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            return type_oid::TEXT;
        }
        if decl.contains("BLOB") || decl == "BYTEA" {
            return type_oid::BYTEA;
        }
        if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            return type_oid::FLOAT8;
        }
        if decl.starts_with("TIMESTAMP") || decl.starts_with("DATETIME") {
            return type_oid::TIMESTAMP;
        }
        if decl == "DATE" {
            return type_oid::DATE;
        }
        if decl.starts_with("NUMERIC") || decl.starts_with("DECIMAL") {
            return type_oid::NUMERIC;
        }
        type_oid::TEXT
    }

    /// Type identifier for an expression column with no declared type.
    pub fn type_id_for_value(value: &Value) -> u32 {
        match value {
            Value::Integer(_) => type_oid::INT8,
            Value::Float(_) => type_oid::FLOAT8,
            Value::Boolean(_) => type_oid::BOOL,
            Value::Text(_) | Value::Null => type_oid::TEXT,
        }
    }
}

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::{FieldDescriptor, RegistryError, Result, Value};

/// A row keyed by field name, in column order.
pub type Row = IndexMap<String, Value>;

/// Normalized result of one statement.
///
/// Every row carries exactly the keys named by `fields`. A record set is never
/// mutated after construction; newer data replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawRecordSet")]
pub struct RecordSet {
    affected_rows: u64,
    fields: Vec<FieldDescriptor>,
    rows: Vec<Row>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecordSet {
    #[serde(default)]
    affected_rows: u64,
    #[serde(default)]
    fields: Vec<FieldDescriptor>,
    #[serde(default)]
    rows: Vec<Row>,
}

impl TryFrom<RawRecordSet> for RecordSet {
    type Error = RegistryError;

    fn try_from(raw: RawRecordSet) -> Result<Self> {
        let names: HashSet<&str> = raw.fields.iter().map(|f| f.name.as_str()).collect();
        for (index, row) in raw.rows.iter().enumerate() {
            let matches = row.len() == names.len() && row.keys().all(|k| names.contains(k.as_str()));
            if !matches {
                return Err(RegistryError::TypeMismatch(format!(
                    "row {} does not match the field list",
                    index
                )));
            }
        }
        Ok(Self {
            affected_rows: raw.affected_rows,
            fields: raw.fields,
            rows: raw.rows,
        })
    }
}

impl RecordSet {
    pub fn empty() -> Self {
        Self {
            affected_rows: 0,
            fields: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Builds a record set from positional rows. Each row must have one value
    /// per field. A repeated field name keeps the last value, like an object
    /// literal would.
    pub fn new(
        affected_rows: u64,
        fields: Vec<FieldDescriptor>,
        values: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let mut rows = Vec::with_capacity(values.len());
        for (index, row) in values.into_iter().enumerate() {
            if row.len() != fields.len() {
                return Err(RegistryError::TypeMismatch(format!(
                    "row {} has {} values for {} fields",
                    index,
                    row.len(),
                    fields.len()
                )));
            }
            let mapped: Row = fields
                .iter()
                .map(|f| f.name.clone())
                .zip(row)
                .collect();
            rows.push(mapped);
        }

        Ok(Self {
            affected_rows,
            fields,
            rows,
        })
    }

    /// Record set for a statement that produced no columns.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::empty()
        }
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(field))
    }
}

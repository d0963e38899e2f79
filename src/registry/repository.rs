//! Statements the registry issues against the `patients` table.

use chrono::NaiveDate;
use tracing::debug;

use super::patient::{Patient, PatientForm};
use crate::core::{Result, Value};
use crate::facade::DatabaseHandle;
use crate::result::RecordSet;

pub const PATIENTS_TABLE: &str = "patients";

pub const CREATE_PATIENTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    age INTEGER,
    gender TEXT,
    contact TEXT,
    blood_group TEXT,
    description TEXT
);";

pub const FETCH_PATIENTS: &str = "SELECT * FROM patients ORDER BY id";

pub const INSERT_PATIENT: &str = "INSERT INTO patients (name, age, gender, contact, blood_group, description) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

pub const DELETE_PATIENT: &str = "DELETE FROM patients WHERE id = ?1";

const LIST_TABLES: &str =
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const LIST_COLUMNS: &str = "SELECT name FROM pragma_table_info(?1) ORDER BY cid";

/// Creates the schema. Safe to run any number of times.
pub async fn create_schema(handle: &DatabaseHandle) -> Result<()> {
    handle.exec(CREATE_PATIENTS_TABLE).await?;
    Ok(())
}

/// The canonical listing.
pub async fn fetch_all(handle: &DatabaseHandle) -> Result<RecordSet> {
    handle.query(FETCH_PATIENTS, &[]).await
}

pub async fn insert(handle: &DatabaseHandle, form: &PatientForm, today: NaiveDate) -> Result<RecordSet> {
    let params = form.insert_params(today);
    debug!(name = %form.name, "inserting patient");
    handle.query(INSERT_PATIENT, &params).await
}

/// Deletes by primary key; an unknown id affects zero rows.
pub async fn delete(handle: &DatabaseHandle, id: i64) -> Result<RecordSet> {
    handle.query(DELETE_PATIENT, &[Value::Integer(id)]).await
}

pub async fn find(handle: &DatabaseHandle, id: i64) -> Result<Option<Patient>> {
    let set = handle
        .query("SELECT * FROM patients WHERE id = ?1", &[Value::Integer(id)])
        .await?;
    set.rows().first().map(Patient::from_row).transpose()
}

pub async fn list_tables(handle: &DatabaseHandle) -> Result<Vec<String>> {
    let set = handle.query(LIST_TABLES, &[]).await?;
    Ok(text_column(&set, "name"))
}

pub async fn list_columns(handle: &DatabaseHandle, table: &str) -> Result<Vec<String>> {
    let set = handle.query(LIST_COLUMNS, &[Value::from(table)]).await?;
    Ok(text_column(&set, "name"))
}

fn text_column(set: &RecordSet, column: &str) -> Vec<String> {
    set.rows()
        .iter()
        .filter_map(|row| row.get(column).and_then(Value::as_str).map(str::to_string))
        .collect()
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{Batch, Connection, Statement};
use tracing::debug;

use super::Engine;
use crate::config::{DatabaseLocation, RegistryConfig};
use crate::core::{FieldDescriptor, RegistryError, Result, Value, type_oid};
use crate::result::RecordSet;
use crate::sql::requires_autocommit;

/// Opens a connection for `location`. Failures are initialization errors.
pub(crate) fn open_connection(location: &DatabaseLocation, busy_timeout: Duration) -> Result<Connection> {
    let conn = match location {
        DatabaseLocation::InMemory => Connection::open_in_memory(),
        DatabaseLocation::File(path) => Connection::open(path),
    }
    .map_err(|e| RegistryError::Init(e.to_string()))?;

    conn.busy_timeout(busy_timeout)
        .map_err(|e| RegistryError::Init(e.to_string()))?;

    Ok(conn)
}

pub(crate) fn location_url(location: &DatabaseLocation) -> String {
    match location {
        DatabaseLocation::InMemory => "sqlite::memory:".to_string(),
        DatabaseLocation::File(path) => format!("sqlite://{}", path.display()),
    }
}

struct ColumnInfo {
    name: String,
    decl_type: Option<String>,
}

/// Runs one prepared statement to completion and normalizes its result.
fn run_statement(conn: &Connection, stmt: &mut Statement<'_>, params: &[Value]) -> Result<RecordSet> {
    let expected = stmt.parameter_count();
    if expected != params.len() {
        return Err(RegistryError::Statement(format!(
            "statement expects {} parameter(s), {} supplied",
            expected,
            params.len()
        )));
    }
    for (index, param) in params.iter().enumerate() {
        stmt.raw_bind_parameter(index + 1, param)?;
    }

    let columns: Vec<ColumnInfo> = stmt
        .columns()
        .iter()
        .map(|c| ColumnInfo {
            name: c.name().to_string(),
            decl_type: c.decl_type().map(str::to_string),
        })
        .collect();

    let before = conn.total_changes();
    let mut values: Vec<Vec<Value>> = Vec::new();

    if columns.is_empty() {
        stmt.raw_execute()?;
    } else {
        let booleans: Vec<bool> = columns
            .iter()
            .map(|c| {
                c.decl_type
                    .as_deref()
                    .is_some_and(|d| d.trim().to_ascii_uppercase().starts_with("BOOL"))
            })
            .collect();

        let mut rows = stmt.raw_query();
        while let Some(row) = rows.next()? {
            let mut out = Vec::with_capacity(columns.len());
            for (index, boolean) in booleans.iter().enumerate() {
                out.push(Value::from_sql_ref(row.get_ref(index)?, *boolean)?);
            }
            values.push(out);
        }
    }

    let affected = conn.total_changes().saturating_sub(before);

    let fields = columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let type_id = match &column.decl_type {
                Some(decl) => FieldDescriptor::type_id_for_decl(decl),
                None => values
                    .iter()
                    .map(|row| &row[index])
                    .find(|v| !v.is_null())
                    .map(FieldDescriptor::type_id_for_value)
                    .unwrap_or(type_oid::TEXT),
            };
            FieldDescriptor::new(column.name.clone(), type_id)
        })
        .collect();

    RecordSet::new(affected, fields, values)
}

/// Single-statement query with bound parameters.
pub(crate) fn run_query(conn: &Connection, sql: &str, params: &[Value]) -> Result<RecordSet> {
    let mut batch = Batch::new(conn, sql);
    let mut stmt = batch
        .next()?
        .ok_or_else(|| RegistryError::Statement("no statement to execute".into()))?;

    if batch.next()?.is_some() {
        return Err(RegistryError::Statement(
            "query takes exactly one statement".into(),
        ));
    }

    run_statement(conn, &mut stmt, params)
}

/// Multi-statement execution, atomic unless the text manages its own
/// transactions.
pub(crate) fn run_batch(conn: &Connection, sql: &str) -> Result<Vec<RecordSet>> {
    if conn.is_autocommit() && !requires_autocommit(sql) {
        let tx = conn.unchecked_transaction()?;
        let results = run_statements(conn, sql)?;
        tx.commit()?;
        Ok(results)
    } else {
        run_statements(conn, sql)
    }
}

fn run_statements(conn: &Connection, sql: &str) -> Result<Vec<RecordSet>> {
    let mut batch = Batch::new(conn, sql);
    let mut results = Vec::new();
    while let Some(mut stmt) = batch.next()? {
        results.push(run_statement(conn, &mut stmt, &[])?);
    }
    Ok(results)
}

pub(crate) fn close_connection(conn: Connection) -> Result<()> {
    conn.close().map_err(|(_, err)| err.into())
}

/// Engine keeping its connection in-process.
///
/// Calls take the connection lock on the blocking pool, so the async runtime
/// never stalls on SQLite.
pub struct SqliteEngine {
    conn: Arc<Mutex<Option<Connection>>>,
    url: String,
}

impl SqliteEngine {
    pub fn open(config: &RegistryConfig) -> Result<Self> {
        let conn = open_connection(&config.database, config.busy_timeout)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            url: location_url(&config.database),
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock()?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| RegistryError::NotReady("connection closed".into()))?;
            f(conn)
        })
        .await
        .map_err(|e| RegistryError::WorkerUnavailable(e.to_string()))?
    }
}

#[async_trait]
impl Engine for SqliteEngine {
    async fn query(&self, sql: &str, params: &[Value]) -> Result<RecordSet> {
        let sql = sql.to_string();
        let params = params.to_vec();
        self.with_connection(move |conn| run_query(conn, &sql, &params))
            .await
    }

    async fn exec(&self, sql: &str) -> Result<Vec<RecordSet>> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_batch(conn, &sql)).await
    }

    async fn close(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let taken = conn.lock()?.take();
            match taken {
                Some(conn) => close_connection(conn),
                None => Ok(()),
            }
        })
        .await
        .map_err(|e| RegistryError::WorkerUnavailable(e.to_string()))??;

        debug!(url = %self.url, "sqlite engine closed");
        Ok(())
    }

    fn url(&self) -> String {
        self.url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Connection {
        open_connection(&DatabaseLocation::InMemory, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn batch_returns_one_result_per_statement() {
        let conn = memory();
        let results = run_batch(
            &conn,
            "CREATE TABLE t (id INTEGER PRIMARY KEY, flag BOOLEAN); \
             INSERT INTO t (flag) VALUES (1), (0); \
             SELECT * FROM t ORDER BY id;",
        )
        .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].affected_rows(), 0);
        assert_eq!(results[1].affected_rows(), 2);
        assert_eq!(results[2].affected_rows(), 0);
        assert_eq!(results[2].column_names(), vec!["id", "flag"]);
        assert_eq!(results[2].fields()[1].type_id, type_oid::BOOL);
        assert_eq!(results[2].get(0, "flag"), Some(&Value::Boolean(true)));
        assert_eq!(results[2].get(1, "flag"), Some(&Value::Boolean(false)));
    }

    #[test]
    fn failing_batch_rolls_back() {
        let conn = memory();
        run_batch(&conn, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL)").unwrap();

        let err = run_batch(
            &conn,
            "INSERT INTO t (name) VALUES ('a'); INSERT INTO t (name) VALUES (NULL);",
        )
        .unwrap_err();
        assert!(err.to_string().contains("NOT NULL"));

        let count = run_query(&conn, "SELECT COUNT(*) AS n FROM t", &[]).unwrap();
        assert_eq!(count.get(0, "n"), Some(&Value::Integer(0)));
    }

    #[test]
    fn explicit_transactions_are_left_to_the_text() {
        let conn = memory();
        let results = run_batch(
            &conn,
            "CREATE TABLE t (id INTEGER); BEGIN; INSERT INTO t VALUES (1); COMMIT;",
        )
        .unwrap();
        assert_eq!(results.len(), 4);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn query_binds_positional_parameters() {
        let conn = memory();
        run_batch(&conn, "CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)").unwrap();

        let inserted = run_query(
            &conn,
            "INSERT INTO t (name, age) VALUES (?1, ?2)",
            &[Value::Text("O'Brien".into()), Value::Null],
        )
        .unwrap();
        assert_eq!(inserted.affected_rows(), 1);

        let rows = run_query(&conn, "SELECT name, age FROM t WHERE name = ?1", &["O'Brien".into()]).unwrap();
        assert_eq!(rows.row_count(), 1);
        assert_eq!(rows.get(0, "age"), Some(&Value::Null));
    }

    #[test]
    fn query_rejects_wrong_parameter_count_and_batches() {
        let conn = memory();
        assert!(run_query(&conn, "SELECT ?1", &[]).is_err());
        assert!(run_query(&conn, "SELECT 1; SELECT 2", &[]).is_err());
        assert!(run_query(&conn, "   ", &[]).is_err());
    }

    #[test]
    fn expression_columns_are_typed_from_values() {
        let conn = memory();
        let set = run_query(&conn, "SELECT 1 AS a, 2.5 AS b, 'x' AS c, NULL AS d", &[]).unwrap();
        let types: Vec<u32> = set.fields().iter().map(|f| f.type_id).collect();
        assert_eq!(types, vec![type_oid::INT8, type_oid::FLOAT8, type_oid::TEXT, type_oid::TEXT]);
    }

    #[tokio::test]
    async fn closed_engine_refuses_calls() {
        let engine = SqliteEngine::open(&RegistryConfig::in_memory()).unwrap();
        engine.exec("CREATE TABLE t (id INTEGER)").await.unwrap();
        engine.close().await.unwrap();
        assert!(matches!(
            engine.query("SELECT 1", &[]).await,
            Err(RegistryError::NotReady(_))
        ));
    }
}

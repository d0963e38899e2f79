use patientdb::facade::DatabaseHandle;
use patientdb::registry::repository;
use tracing::warn;

const KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "FROM", "WHERE", "CREATE", "TABLE", "DROP", "INDEX",
    "INTO", "VALUES", "SET", "AND", "OR", "NOT", "NULL", "TRUE", "FALSE", "INTEGER", "TEXT",
    "BOOLEAN", "REAL", "PRIMARY", "KEY", "UNIQUE", "ORDER", "BY", "GROUP", "HAVING", "LIMIT",
    "OFFSET", "BEGIN", "COMMIT", "ROLLBACK", "LIKE", "BETWEEN", "IS", "IN", "AS", "DISTINCT",
    "JOIN", "LEFT", "ON", "COUNT", "SUM", "AVG", "MIN", "MAX",
];

/// Completes SQL keywords plus the table and column names of the open
/// database. Names are cached and reloaded with [`Autocompleter::refresh`].
pub struct Autocompleter {
    tables: Vec<String>,
    columns: Vec<String>,
}

impl Autocompleter {
    pub fn new() -> Self {
        Self {
            tables: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub async fn refresh(&mut self, handle: &DatabaseHandle) {
        let tables = match repository::list_tables(handle).await {
            Ok(tables) => tables,
            Err(err) => {
                warn!(error = %err, "could not list tables for autocomplete");
                return;
            }
        };

        let mut columns = Vec::new();
        for table in &tables {
            match repository::list_columns(handle, table).await {
                Ok(names) => columns.extend(names),
                Err(err) => warn!(table = %table, error = %err, "could not list columns"),
            }
        }
        columns.sort();
        columns.dedup();

        self.tables = tables;
        self.columns = columns;
    }

    /// Case-insensitive prefix matches: keywords first, then tables, then
    /// columns.
    pub fn suggestions(&self, input: &str) -> Vec<String> {
        if input.is_empty() {
            return Vec::new();
        }
        let input_upper = input.to_uppercase();
        let matches = |candidate: &str| {
            let upper = candidate.to_uppercase();
            upper.starts_with(&input_upper) && upper != input_upper
        };

        let mut suggestions: Vec<String> = KEYWORDS
            .iter()
            .filter(|kw| matches(kw))
            .map(|kw| kw.to_string())
            .collect();
        suggestions.sort();

        for name in self.tables.iter().chain(self.columns.iter()) {
            if matches(name) && !suggestions.contains(name) {
                suggestions.push(name.clone());
            }
        }
        suggestions
    }
}

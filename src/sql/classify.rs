use std::fmt;

use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

/// What a single statement does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Insert,
    Update,
    Delete,
    Schema,
    Transaction,
    Maintenance,
    Other,
}

/// How a whole statement text is treated by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    /// Produces rows to display; the listing comes from the text's own result.
    Read,
    /// Mutates rows; the canonical listing is re-fetched afterwards.
    Write,
    /// Changes the schema; handled like a write.
    Schema,
}

impl StatementClass {
    pub fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl fmt::Display for StatementClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Schema => write!(f, "schema"),
        }
    }
}

/// Kinds of every statement in `sql`, in order.
///
/// Falls back to the leading keyword when the text does not parse; the engine
/// reports the real syntax error later.
pub fn statement_kinds(sql: &str) -> Vec<StatementKind> {
    match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(statements) if !statements.is_empty() => {
            statements.iter().map(kind_of_statement).collect()
        }
        Ok(_) => Vec::new(),
        Err(_) => {
            let keyword = leading_keyword(sql);
            if keyword.is_empty() {
                Vec::new()
            } else {
                vec![kind_of_keyword(&keyword)]
            }
        }
    }
}

pub fn classify(sql: &str) -> StatementClass {
    classify_kinds(&statement_kinds(sql))
}

pub fn classify_kinds(kinds: &[StatementKind]) -> StatementClass {
    if !kinds.is_empty() && kinds.iter().all(|k| *k == StatementKind::Query) {
        StatementClass::Read
    } else if kinds.contains(&StatementKind::Schema) {
        StatementClass::Schema
    } else {
        StatementClass::Write
    }
}

/// True when the text manages transactions itself or contains statements
/// SQLite refuses to run inside one.
pub fn requires_autocommit(sql: &str) -> bool {
    statement_kinds(sql)
        .iter()
        .any(|k| matches!(k, StatementKind::Transaction | StatementKind::Maintenance))
}

fn kind_of_statement(statement: &Statement) -> StatementKind {
    if let Statement::Query(query) = statement {
        // `WITH ... INSERT/UPDATE/DELETE` parses as a query with a DML body.
        return match query.body.as_ref() {
            SetExpr::Select(_)
            | SetExpr::Query(_)
            | SetExpr::SetOperation { .. }
            | SetExpr::Values(_)
            | SetExpr::Table(_) => StatementKind::Query,
            SetExpr::Insert(_) => StatementKind::Insert,
            SetExpr::Update(_) => StatementKind::Update,
            SetExpr::Delete(_) => StatementKind::Delete,
            _ => StatementKind::Other,
        };
    }
    kind_of_keyword(&leading_keyword(&statement.to_string()))
}

fn kind_of_keyword(keyword: &str) -> StatementKind {
    match keyword {
        "SELECT" | "WITH" | "VALUES" | "EXPLAIN" | "SHOW" | "DESCRIBE" | "DESC" | "TABLE" => {
            StatementKind::Query
        }
        "INSERT" | "REPLACE" | "UPSERT" => StatementKind::Insert,
        "UPDATE" => StatementKind::Update,
        "DELETE" => StatementKind::Delete,
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" | "COMMENT" | "RENAME" => StatementKind::Schema,
        "BEGIN" | "START" | "COMMIT" | "END" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" | "ABORT" => {
            StatementKind::Transaction
        }
        "VACUUM" | "ATTACH" | "DETACH" | "ANALYZE" | "REINDEX" | "PRAGMA" => {
            StatementKind::Maintenance
        }
        _ => StatementKind::Other,
    }
}

/// First keyword of `sql`, upper-cased, skipping comments and parentheses.
pub fn leading_keyword(sql: &str) -> String {
    let mut rest = sql;
    loop {
        rest = rest.trim_start();
        if let Some(tail) = rest.strip_prefix("--") {
            rest = tail.split_once('\n').map(|(_, t)| t).unwrap_or("");
        } else if let Some(tail) = rest.strip_prefix("/*") {
            rest = tail.split_once("*/").map(|(_, t)| t).unwrap_or("");
        } else if let Some(tail) = rest.strip_prefix('(') {
            rest = tail;
        } else {
            break;
        }
    }

    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_is_read() {
        assert_eq!(classify("SELECT * FROM patients"), StatementClass::Read);
        assert_eq!(classify("  select name from patients;"), StatementClass::Read);
        assert_eq!(
            classify("-- listing\n/* all */ SELECT id FROM patients"),
            StatementClass::Read
        );
    }

    #[test]
    fn insert_is_write() {
        assert_eq!(
            classify("INSERT INTO patients (name) VALUES ('Ravi')"),
            StatementClass::Write
        );
        assert_eq!(classify("DELETE FROM patients WHERE id = 4"), StatementClass::Write);
        assert_eq!(classify("UPDATE patients SET age = 3"), StatementClass::Write);
    }

    #[test]
    fn embedded_select_does_not_make_a_read() {
        assert_eq!(
            classify("INSERT INTO patients (name) SELECT name FROM archive"),
            StatementClass::Write
        );
        assert_eq!(
            classify("DELETE FROM patients WHERE id IN (SELECT id FROM patients WHERE age > 90)"),
            StatementClass::Write
        );
        let cte_delete =
            "WITH old AS (SELECT id FROM patients) DELETE FROM patients WHERE id IN (SELECT id FROM old)";
        assert_eq!(statement_kinds(cte_delete), vec![StatementKind::Delete]);
        assert_eq!(classify(cte_delete), StatementClass::Write);
        assert_eq!(
            classify("WITH n AS (SELECT 1 AS v) UPDATE patients SET age = (SELECT v FROM n)"),
            StatementClass::Write
        );
        assert_eq!(
            classify("WITH n AS (SELECT 1 AS v) SELECT v FROM n"),
            StatementClass::Read
        );
    }

    #[test]
    fn mixed_text_is_write() {
        assert_eq!(
            classify("INSERT INTO patients (name) VALUES ('A'); SELECT * FROM patients"),
            StatementClass::Write
        );
        assert_eq!(classify("SELECT 1; SELECT 2"), StatementClass::Read);
    }

    #[test]
    fn ddl_is_schema() {
        assert_eq!(
            classify("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY)"),
            StatementClass::Schema
        );
        assert_eq!(classify("DROP TABLE t"), StatementClass::Schema);
    }

    #[test]
    fn unparseable_text_uses_leading_keyword() {
        assert_eq!(statement_kinds("SELEC nonsense"), vec![StatementKind::Other]);
        assert_eq!(classify("SELECT FROM WHERE ((("), StatementClass::Read);
        assert!(statement_kinds("   ").is_empty());
    }

    #[test]
    fn transaction_control_requires_autocommit() {
        assert!(requires_autocommit("BEGIN; INSERT INTO t VALUES (1); COMMIT;"));
        assert!(requires_autocommit("VACUUM"));
        assert!(!requires_autocommit("INSERT INTO t VALUES (1); INSERT INTO t VALUES (2)"));
    }

    #[test]
    fn leading_keyword_skips_noise() {
        assert_eq!(leading_keyword("  (select 1)"), "SELECT");
        assert_eq!(leading_keyword("/* x */ -- y\n insert"), "INSERT");
        assert_eq!(leading_keyword(""), "");
    }
}

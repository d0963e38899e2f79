use crate::core::Value;
use crate::result::RecordSet;

pub const TRUE_GLYPH: &str = "✅";
pub const FALSE_GLYPH: &str = "❌";

/// Upper-cases the first character of a column name, leaving the rest alone.
pub fn titlecase(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Cell text as shown in the records table. NULL renders as nothing.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Boolean(true) => TRUE_GLYPH.to_string(),
        Value::Boolean(false) => FALSE_GLYPH.to_string(),
        other => other.to_string(),
    }
}

/// Display-ready copy of a record set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl TableView {
    pub fn from_record_set(set: &RecordSet) -> Self {
        let headers = set.fields().iter().map(|f| titlecase(&f.name)).collect();
        let rows = set
            .rows()
            .iter()
            .map(|row| {
                set.fields()
                    .iter()
                    .map(|f| row.get(&f.name).map(display_value).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self { headers, rows }
    }

    /// Width of each column in characters, header included.
    pub fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }
        widths
    }

    /// Renders the table as plain text lines.
    pub fn render(&self) -> String {
        if self.headers.is_empty() {
            return "Empty result set\n".to_string();
        }

        let widths = self.column_widths();
        let pad = |cell: &str, width: usize| {
            let fill = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(fill))
        };

        let mut out = String::new();
        let header: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| pad(h, widths[i]))
            .collect();
        out.push_str(&header.join(" | "));
        out.push('\n');

        let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        out.push_str(&separator.join("-+-"));
        out.push('\n');

        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| pad(cell, widths[i]))
                .collect();
            out.push_str(&cells.join(" | "));
            out.push('\n');
        }

        out.push_str(&format!("\n{} row(s)\n", self.rows.len()));
        out
    }
}

impl RecordSet {
    pub fn print(&self) {
        if self.fields().is_empty() {
            println!("OK. Rows affected: {}", self.affected_rows());
            return;
        }
        print!("{}", TableView::from_record_set(self).render());
    }
}

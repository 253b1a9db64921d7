use once_cell::sync::Lazy;
use regex::Regex;

/// Display label for statements whose table cannot be determined.
pub const UNKNOWN_TABLE: &str = "Unknown Table";

static TABLE_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:from|into|update|table)\s+`?(\w+)`?").unwrap()
});

const READ_KEYWORDS: &[&str] = &["select", "show", "describe", "desc", "explain", "with"];

/// How a statement is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Read,
    Write,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Insert => "insert",
            StatementKind::Read => "read",
            StatementKind::Write => "write",
        }
    }
}

/// One statement of a batch with its routing and display label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        let sql = sql.into();
        let kind = classify(&sql);
        let table = extract_table_name(&sql);
        Self { sql, kind, table }
    }

    pub fn label(&self) -> &str {
        self.table.as_deref().unwrap_or(UNKNOWN_TABLE)
    }
}

/// Split on `;`, trimming pieces and dropping empty ones.
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_batch(sql: &str) -> Vec<Statement> {
    split_statements(sql).into_iter().map(Statement::new).collect()
}

fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase()
}

pub fn classify(sql: &str) -> StatementKind {
    let keyword = leading_keyword(sql);
    if keyword == "insert" {
        StatementKind::Insert
    } else if READ_KEYWORDS.contains(&keyword.as_str()) {
        StatementKind::Read
    } else {
        StatementKind::Write
    }
}

/// Word following the first `from`/`into`/`update`/`table`. Only a label:
/// subqueries and joins make it ambiguous.
pub fn extract_table_name(sql: &str) -> Option<String> {
    TABLE_NAME_REGEX
        .captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

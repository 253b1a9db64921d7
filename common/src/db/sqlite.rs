use crate::db::{Connection, Database, ResultSet};
use crate::error::{Result, SqlaskError};
use crate::schema::{ColumnInfo, Schema, SchemaSource, TableSchema};
use crate::sql::SqlValue;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::OptionalExtension;
use std::borrow::Cow;
use std::path::PathBuf;

static SHOW_TABLES_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*show\s+(?:full\s+)?tables\s*$").unwrap());

static START_TRANSACTION_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*start\s+transaction\s*$").unwrap());

static DESCRIBE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:describe|desc|show\s+columns\s+from)\s+`?(\w+)`?\s*$").unwrap()
});

const LIST_TABLES_SQL: &str = "SELECT name AS table_name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name";

const TRANSACTION_KEYWORDS: &[&str] = &[
    "begin", "start", "commit", "end", "rollback", "savepoint", "release",
];

/// Statements that open or close a transaction themselves.
fn is_transaction_control(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();
    TRANSACTION_KEYWORDS.contains(&keyword.as_str())
}

/// SQLite has no SHOW/DESCRIBE or START TRANSACTION; map them onto
/// catalog queries and BEGIN.
pub fn rewrite_for_sqlite(sql: &str) -> Cow<'_, str> {
    if START_TRANSACTION_REGEX.is_match(sql) {
        return Cow::Borrowed("BEGIN");
    }
    if SHOW_TABLES_REGEX.is_match(sql) {
        return Cow::Borrowed(LIST_TABLES_SQL);
    }
    if let Some(table) = DESCRIBE_REGEX.captures(sql).and_then(|c| c.get(1)) {
        return Cow::Owned(format!(
            "SELECT name AS Field, type AS Type, \
             CASE \"notnull\" WHEN 0 THEN 'YES' ELSE 'NO' END AS \"Null\", \
             CASE pk WHEN 0 THEN '' ELSE 'PRI' END AS \"Key\", \
             dflt_value AS \"Default\" \
             FROM pragma_table_info('{}') ORDER BY cid",
            table.as_str()
        ));
    }
    Cow::Borrowed(sql)
}

/// File-backed SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteDatabase {
    path: PathBuf,
}

impl SqliteDatabase {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn raw_connection(&self) -> Result<rusqlite::Connection> {
        let conn = rusqlite::Connection::open(&self.path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        Ok(conn)
    }
}

impl Database for SqliteDatabase {
    fn dialect(&self) -> &str {
        "SQLite"
    }

    fn connect(&self) -> Result<Box<dyn Connection>> {
        tracing::debug!(path = %self.path.display(), "opening sqlite connection");
        Ok(Box::new(SqliteConnection {
            conn: self.raw_connection()?,
            implicit_transaction: false,
        }))
    }
}

impl SchemaSource for SqliteDatabase {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    fn introspect(&self) -> Result<Schema> {
        let schema = introspect_connection(&self.raw_connection()?)?;
        tracing::info!(tables = schema.len(), "schema introspected");
        Ok(schema)
    }
}

/// Catalog as seen by `conn`, including its own uncommitted changes.
fn introspect_connection(conn: &rusqlite::Connection) -> Result<Schema> {
    let tables: Vec<String> = {
        let mut stmt = conn.prepare(LIST_TABLES_SQL)?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<rusqlite::Result<_>>()?
    };

    let mut schema = Schema::new();
    for table in tables {
        let columns = table_columns(conn, &table)?;
        schema.insert_table(table, TableSchema::new(columns));
    }
    Ok(schema)
}

fn table_columns(conn: &rusqlite::Connection, table: &str) -> Result<Vec<ColumnInfo>> {
    let mut stmt = conn.prepare(
        "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )?;
    let mut columns = stmt
        .query_map([table], |row| {
            let mut column = ColumnInfo::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
            column.nullable = row.get::<_, i64>(2)? == 0;
            column.primary_key = row.get::<_, i64>(3)? > 0;
            Ok(column)
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt =
        conn.prepare("SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?1)")?;
    let foreign_keys = stmt
        .query_map([table], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    for (from, parent, to) in foreign_keys {
        // an omitted target column means the parent's primary key
        let to = match to {
            Some(to) => Some(to),
            None => conn
                .query_row(
                    "SELECT name FROM pragma_table_info(?1) WHERE pk = 1",
                    [&parent],
                    |row| row.get::<_, String>(0),
                )
                .optional()?,
        };
        if let Some(column) = columns.iter_mut().find(|c| c.name == from) {
            column.foreign_key = Some(match to {
                Some(to) => format!("{}.{}", parent, to),
                None => parent,
            });
        }
    }

    Ok(columns)
}

/// Writes run inside a transaction opened lazily on the first write and
/// ended by `commit`. A transaction the batch opens itself with BEGIN is
/// left to the batch's own COMMIT or ROLLBACK.
struct SqliteConnection {
    conn: rusqlite::Connection,
    implicit_transaction: bool,
}

impl SqliteConnection {
    fn begin(&mut self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
            self.implicit_transaction = true;
        }
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<usize> {
        if is_transaction_control(sql) {
            self.conn.execute_batch(&rewrite_for_sqlite(sql))?;
            self.implicit_transaction = false;
            return Ok(0);
        }
        self.begin()?;
        Ok(self.conn.execute(sql, [])?)
    }

    fn query(&mut self, sql: &str) -> Result<ResultSet> {
        let sql = rewrite_for_sqlite(sql);
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                values.push(SqlValue::from(row.get_ref(idx)?));
            }
            rows.push(values);
        }

        Ok(ResultSet { columns, rows })
    }

    fn execute_many(&mut self, template: &str, rows: &[Vec<SqlValue>]) -> Result<usize> {
        self.begin()?;
        let mut stmt = self.conn.prepare(template)?;
        let mut affected = 0;
        for row in rows {
            affected += stmt.execute(rusqlite::params_from_iter(row.iter()))?;
        }
        Ok(affected)
    }

    fn commit(&mut self) -> Result<()> {
        if self.implicit_transaction && !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.implicit_transaction = false;
        Ok(())
    }

    fn drain_pending(&mut self) -> Result<usize> {
        // rows are always fetched eagerly, so nothing is ever left unread
        Err(SqlaskError::NoPendingResults)
    }

    fn introspect(&mut self) -> Result<Schema> {
        introspect_connection(&self.conn)
    }

    fn close(self: Box<Self>) -> Result<()> {
        let conn = self.conn;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        conn.close().map_err(|(_, e)| SqlaskError::Database(e))
    }
}

pub mod sqlite;

use crate::error::Result;
use crate::schema::Schema;
use crate::sql::SqlValue;
use serde::Serialize;

pub use sqlite::SqliteDatabase;

/// Rows fetched by a read statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One open database session.
pub trait Connection: Send {
    /// Run a statement that returns no rows; returns the affected row count.
    fn execute(&mut self, sql: &str) -> Result<usize>;

    /// Run a read statement and fetch every row.
    fn query(&mut self, sql: &str) -> Result<ResultSet>;

    /// Run `template` once per parameter row.
    fn execute_many(&mut self, template: &str, rows: &[Vec<SqlValue>]) -> Result<usize>;

    fn commit(&mut self) -> Result<()>;

    /// Discard unread result sets. Fails with `NoPendingResults` when there
    /// is nothing to drain.
    fn drain_pending(&mut self) -> Result<usize>;

    /// Schema visible to this session, uncommitted changes included.
    fn introspect(&mut self) -> Result<Schema>;

    fn close(self: Box<Self>) -> Result<()>;
}

pub trait Database: Send + Sync {
    /// Dialect name used in the model instructions.
    fn dialect(&self) -> &str;

    fn connect(&self) -> Result<Box<dyn Connection>>;
}

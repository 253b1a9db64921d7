use crate::db::{Connection, Database};
use crate::error::{Result, SqlaskError};
use crate::exec::report::{BatchReport, StatementOutcome};
use crate::schema::{Schema, SchemaStore};
use crate::sql::{parse_batch, repair_insert, Statement, StatementKind};
use std::sync::Arc;

const DDL_KEYWORDS: &[&str] = &["create", "alter", "drop", "rename"];

/// Owns the connection for one batch and releases it exactly once, on the
/// normal path or on unwind.
struct ConnectionGuard {
    conn: Option<Box<dyn Connection>>,
}

impl ConnectionGuard {
    fn new(conn: Box<dyn Connection>) -> Self {
        Self { conn: Some(conn) }
    }

    fn release(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        loop {
            match conn.drain_pending() {
                Ok(0) | Err(SqlaskError::NoPendingResults) => break,
                Ok(n) => tracing::debug!("discarded {} unread result sets", n),
                Err(e) => {
                    tracing::warn!("draining pending results failed: {}", e);
                    break;
                }
            }
        }

        if let Err(e) = conn.close() {
            tracing::warn!("closing connection failed: {}", e);
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Runs statement batches against a database.
pub struct Executor {
    db: Arc<dyn Database>,
    schema: Arc<SchemaStore>,
}

impl Executor {
    pub fn new(db: Arc<dyn Database>, schema: Arc<SchemaStore>) -> Self {
        Self { db, schema }
    }

    /// Split `sql` and execute each statement in order. Insert repair
    /// failures skip that statement; a database error stops the batch.
    /// Only a failure to connect is returned as `Err`.
    #[tracing::instrument(skip(self, sql), fields(sql_len = sql.len()))]
    pub fn run(&self, sql: &str) -> Result<BatchReport> {
        let batch = parse_batch(sql);
        if batch.is_empty() {
            tracing::warn!("no valid sql statement found");
            return Ok(BatchReport::default());
        }

        tracing::info!(statements = batch.len(), "executing batch");

        let mut guard = ConnectionGuard::new(self.db.connect()?);
        let mut report = BatchReport::default();
        let mut structure_changed = false;
        if let Some(conn) = guard.conn.as_deref_mut() {
            structure_changed = self.execute_batch(conn, &batch, &mut report);
        }
        guard.release();

        // keep the persisted copy in step for later runs
        if structure_changed {
            if let Err(e) = self.schema.refresh(true) {
                tracing::warn!("schema refresh after ddl failed: {}", e);
            }
        }

        tracing::info!(
            executed = report.outcomes.len(),
            aborted = report.aborted,
            "batch finished"
        );
        Ok(report)
    }

    fn execute_batch(
        &self,
        conn: &mut dyn Connection,
        batch: &[Statement],
        report: &mut BatchReport,
    ) -> bool {
        let mut schema: Option<Arc<Schema>> = None;
        let mut schema_stale = false;
        let mut structure_changed = false;

        for stmt in batch {
            let table = stmt.label().to_string();
            let sql = stmt.sql.clone();
            tracing::debug!(kind = stmt.kind.as_str(), table = %table, "running statement");

            let result = match stmt.kind {
                StatementKind::Insert => {
                    let repaired = self
                        .current_schema(conn, &mut schema, &mut schema_stale)
                        .and_then(|schema| match stmt.table.as_deref() {
                            Some(target) => repair_insert(&stmt.sql, target, &schema),
                            None => Err(SqlaskError::Repair(
                                "could not determine the target table".to_string(),
                            )),
                        });

                    let repaired = match repaired {
                        Ok(repaired) => repaired,
                        Err(e) => {
                            tracing::warn!(table = %table, "skipping insert: {}", e);
                            report.outcomes.push(StatementOutcome::Skipped {
                                sql,
                                table,
                                reason: e.to_string(),
                            });
                            continue;
                        }
                    };

                    conn.execute_many(&repaired.template, &repaired.rows)
                        .and_then(|rows| conn.commit().map(|_| rows))
                        .map(|rows| StatementOutcome::Inserted {
                            sql: sql.clone(),
                            table: repaired.table.clone(),
                            rows,
                        })
                }
                StatementKind::Read => conn.query(&stmt.sql).map(|result| StatementOutcome::Rows {
                    sql: sql.clone(),
                    table: table.clone(),
                    result,
                }),
                StatementKind::Write => {
                    let outcome = conn
                        .execute(&stmt.sql)
                        .and_then(|affected| conn.commit().map(|_| affected))
                        .map(|affected| StatementOutcome::Executed {
                            sql: sql.clone(),
                            table: table.clone(),
                            affected,
                        });
                    if outcome.is_ok() && is_ddl(&stmt.sql) {
                        schema_stale = true;
                        structure_changed = true;
                    }
                    outcome
                }
            };

            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(table = %table, "sql execution error: {}", e);
                    report.outcomes.push(StatementOutcome::Failed {
                        sql,
                        table,
                        error: e.to_string(),
                    });
                    report.aborted = true;
                    break;
                }
            }
        }
        structure_changed
    }

    /// Schema for insert repair. Refreshed from the database before the
    /// first insert of a batch. After a statement changed the structure it is
    /// re-read through the batch's own connection, which also sees changes
    /// not yet committed.
    fn current_schema(
        &self,
        conn: &mut dyn Connection,
        cached: &mut Option<Arc<Schema>>,
        stale: &mut bool,
    ) -> Result<Arc<Schema>> {
        let schema = match (cached.as_ref(), *stale) {
            (Some(schema), false) => return Ok(Arc::clone(schema)),
            (_, true) => Arc::new(conn.introspect()?),
            (None, false) => self.schema.refresh(true)?,
        };
        *cached = Some(Arc::clone(&schema));
        *stale = false;
        Ok(schema)
    }
}

fn is_ddl(sql: &str) -> bool {
    let keyword: String = sql
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_lowercase();
    DDL_KEYWORDS.contains(&keyword.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ResultSet;
    use crate::schema::ColumnInfo;
    use crate::sql::SqlValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        log: Mutex<Vec<String>>,
        connects: AtomicUsize,
        closes: AtomicUsize,
    }

    struct FakeDb {
        calls: Arc<Calls>,
        fail_on: Option<&'static str>,
    }

    struct FakeConn {
        calls: Arc<Calls>,
        fail_on: Option<&'static str>,
    }

    impl FakeConn {
        fn record(&self, entry: String) -> Result<()> {
            let failing = self.fail_on.is_some_and(|f| entry.contains(f));
            self.calls.log.lock().unwrap().push(entry);
            if failing {
                return Err(SqlaskError::Database(rusqlite::Error::InvalidQuery));
            }
            Ok(())
        }
    }

    impl Connection for FakeConn {
        fn execute(&mut self, sql: &str) -> Result<usize> {
            self.record(format!("execute {}", sql))?;
            Ok(1)
        }

        fn query(&mut self, sql: &str) -> Result<ResultSet> {
            self.record(format!("query {}", sql))?;
            Ok(ResultSet {
                columns: vec!["n".to_string()],
                rows: vec![vec![SqlValue::Integer(1)]],
            })
        }

        fn execute_many(&mut self, template: &str, rows: &[Vec<SqlValue>]) -> Result<usize> {
            self.record(format!("execute_many {} x{}", template, rows.len()))?;
            Ok(rows.len())
        }

        fn commit(&mut self) -> Result<()> {
            self.record("commit".to_string())
        }

        fn drain_pending(&mut self) -> Result<usize> {
            Err(SqlaskError::NoPendingResults)
        }

        fn introspect(&mut self) -> Result<Schema> {
            self.record("introspect".to_string())?;
            Ok(Schema::new())
        }

        fn close(self: Box<Self>) -> Result<()> {
            self.calls.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    impl Database for FakeDb {
        fn dialect(&self) -> &str {
            "fake"
        }

        fn connect(&self) -> Result<Box<dyn Connection>> {
            self.calls.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeConn {
                calls: Arc::clone(&self.calls),
                fail_on: self.fail_on,
            }))
        }
    }

    fn executor(fail_on: Option<&'static str>) -> (Executor, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let schema = Schema::new().with_table(
            "STUDENT",
            vec![
                ColumnInfo::new("id", "INTEGER").primary_key(),
                ColumnInfo::new("name", "TEXT"),
            ],
        );
        let db = FakeDb {
            calls: Arc::clone(&calls),
            fail_on,
        };
        (
            Executor::new(Arc::new(db), Arc::new(SchemaStore::fixed(schema))),
            calls,
        )
    }

    fn log(calls: &Calls) -> Vec<String> {
        calls.log.lock().unwrap().clone()
    }

    #[test]
    fn test_empty_batch_never_connects() {
        let (executor, calls) = executor(None);
        let report = executor.run("  ; \n ;").unwrap();

        assert!(report.no_statements());
        assert_eq!(calls.connects.load(Ordering::SeqCst), 0);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_routes_each_kind() {
        let (executor, calls) = executor(None);
        let report = executor
            .run("INSERT INTO STUDENT VALUES (1, 'Asha'), (2, 'Ravi'); SELECT * FROM STUDENT; UPDATE STUDENT SET name = 'x'")
            .unwrap();

        assert_eq!(
            log(&calls),
            vec![
                "execute_many INSERT INTO `STUDENT` (`id`, `name`) VALUES (?, ?) x2",
                "commit",
                "query SELECT * FROM STUDENT",
                "execute UPDATE STUDENT SET name = 'x'",
                "commit",
            ]
        );
        assert!(matches!(report.outcomes[0], StatementOutcome::Inserted { rows: 2, .. }));
        assert!(matches!(report.outcomes[1], StatementOutcome::Rows { .. }));
        assert!(matches!(report.outcomes[2], StatementOutcome::Executed { .. }));
        assert!(!report.has_failures());
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repair_failure_skips_and_continues() {
        let (executor, calls) = executor(None);
        let report = executor
            .run("INSERT INTO FACULTY VALUES (1); SELECT 1")
            .unwrap();

        assert!(matches!(
            &report.outcomes[0],
            StatementOutcome::Skipped { table, reason, .. }
                if table == "FACULTY" && reason.contains("not found")
        ));
        assert!(matches!(report.outcomes[1], StatementOutcome::Rows { .. }));
        assert!(!report.aborted);
        assert_eq!(log(&calls), vec!["query SELECT 1"]);
    }

    #[test]
    fn test_driver_error_aborts_and_still_closes_once() {
        let (executor, calls) = executor(Some("DROP"));
        let report = executor
            .run("SELECT 1; DROP TABLE STUDENT; SELECT 2")
            .unwrap();

        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcomes[1], StatementOutcome::Failed { .. }));
        assert!(!log(&calls).iter().any(|l| l.contains("SELECT 2")));
        assert_eq!(calls.connects.load(Ordering::SeqCst), 1);
        assert_eq!(calls.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_table_label() {
        let (executor, _calls) = executor(None);
        let report = executor.run("SELECT 1").unwrap();
        assert!(matches!(
            &report.outcomes[0],
            StatementOutcome::Rows { table, .. } if table == crate::sql::UNKNOWN_TABLE
        ));
    }

    /// Schema source whose tables can change behind the store's back.
    struct LiveSchema(Mutex<Schema>);

    impl crate::schema::SchemaSource for LiveSchema {
        fn introspect(&self) -> Result<Schema> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    #[test]
    fn test_insert_sees_tables_created_since_last_refresh() {
        let calls = Arc::new(Calls::default());
        let source = Arc::new(LiveSchema(Mutex::new(Schema::new())));
        let store = Arc::new(SchemaStore::new(source.clone()));
        store.refresh(true).unwrap();

        // table created by an earlier batch or another process
        *source.0.lock().unwrap() = Schema::new().with_table(
            "FACULTY",
            vec![ColumnInfo::new("id", "INTEGER"), ColumnInfo::new("name", "TEXT")],
        );

        let db = FakeDb {
            calls: Arc::clone(&calls),
            fail_on: None,
        };
        let executor = Executor::new(Arc::new(db), store);
        let report = executor.run("INSERT INTO FACULTY VALUES (1, 'Mia')").unwrap();

        assert!(matches!(
            &report.outcomes[0],
            StatementOutcome::Inserted { table, rows: 1, .. } if table == "FACULTY"
        ));
    }

    #[test]
    fn test_is_ddl() {
        assert!(is_ddl("CREATE TABLE x (id INT)"));
        assert!(is_ddl("  drop table x"));
        assert!(!is_ddl("DELETE FROM x"));
    }
}

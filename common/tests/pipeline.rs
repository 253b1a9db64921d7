use async_trait::async_trait;
use common::config::{Settings, SettingsOverrides};
use common::exec::StatementOutcome;
use common::llm::{Generator, Message, Passthrough};
use common::pipeline::{execute_sql, open_database, refresh_schema, Sqlask};
use common::sql::SqlValue;
use common::{Result, SqlaskError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Replays canned replies and keeps every prompt it was sent.
struct Scripted {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl Scripted {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_user_prompt(&self) -> String {
        let prompts = self.prompts.lock().unwrap();
        prompts.last().unwrap()[1].content.clone()
    }
}

#[async_trait]
impl Generator for Scripted {
    async fn generate(&self, messages: Vec<Message>) -> Result<String> {
        self.prompts.lock().unwrap().push(messages);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| SqlaskError::Generation("no reply scripted".to_string()))
    }
}

fn setup(dir: &TempDir, model: Arc<Scripted>) -> Sqlask {
    let settings = Settings::resolve(SettingsOverrides {
        database: Some(dir.path().join("school.db")),
        schema_cache: Some(dir.path().join("cache").join("schema.json")),
        no_translate: true,
        ..Default::default()
    });
    let (db, store) = open_database(&settings);
    Sqlask::new(db, store, model, Arc::new(Passthrough))
}

#[tokio::test]
async fn test_create_insert_then_select() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(Scripted::new(&[
        "```sql\nCREATE TABLE STUDENT (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);\nINSERT INTO STUDENT VALUES (1, 'Asha', 20), (2, 'Ravi', 22);\n```",
        "SELECT name FROM STUDENT ORDER BY id;",
    ]));
    let app = setup(&dir, Arc::clone(&model));

    let answer = app
        .ask("create a student table with two students", false)
        .await
        .unwrap();
    assert!(answer.sql.starts_with("CREATE TABLE STUDENT"));
    let report = answer.report.unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.outcomes.len(), 2);
    assert!(matches!(
        &report.outcomes[1],
        StatementOutcome::Inserted { table, rows: 2, .. } if table == "STUDENT"
    ));

    let answer = app.ask("list every STUDENT name", false).await.unwrap();
    // the second prompt sees the table created by the first batch
    assert!(model
        .last_user_prompt()
        .contains("Table `STUDENT`: Columns → id, name, age"));

    match &answer.report.unwrap().outcomes[0] {
        StatementOutcome::Rows { table, result, .. } => {
            assert_eq!(table, "STUDENT");
            assert_eq!(result.columns, vec!["name".to_string()]);
            assert_eq!(
                result.rows,
                vec![
                    vec![SqlValue::Text("Asha".into())],
                    vec![SqlValue::Text("Ravi".into())],
                ]
            );
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    assert!(dir.path().join("cache").join("schema.json").exists());
}

#[tokio::test]
async fn test_dry_run_does_not_execute() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(Scripted::new(&["CREATE TABLE COURSE (id INTEGER);"]));
    let app = setup(&dir, model);

    let answer = app.ask("make a course table", true).await.unwrap();
    assert_eq!(answer.sql, "CREATE TABLE COURSE (id INTEGER);");
    assert!(answer.report.is_none());

    let report = execute_sql(app.executor(), "SHOW TABLES".to_string())
        .await
        .unwrap();
    match &report.outcomes[0] {
        StatementOutcome::Rows { result, .. } => assert!(result.is_empty()),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_bad_insert_is_skipped_and_error_stops_batch() {
    let dir = TempDir::new().unwrap();
    let model = Arc::new(Scripted::new(&[
        "CREATE TABLE DEPT (id INTEGER PRIMARY KEY, name TEXT);\n\
         INSERT INTO DEPT VALUES (1, 'Physics', 'extra');\n\
         INSERT INTO DEPT VALUES (2, 'Maths');\n\
         SELECT * FROM MISSING;\n\
         INSERT INTO DEPT VALUES (3, 'Art');",
    ]));
    let app = setup(&dir, model);

    let report = app.ask("departments", false).await.unwrap().report.unwrap();
    assert_eq!(report.outcomes.len(), 4);
    assert!(matches!(report.outcomes[1], StatementOutcome::Skipped { .. }));
    assert!(matches!(
        report.outcomes[2],
        StatementOutcome::Inserted { rows: 1, .. }
    ));
    assert!(matches!(report.outcomes[3], StatementOutcome::Failed { .. }));
    assert!(report.aborted);
}

#[tokio::test]
async fn test_generation_failure_is_an_error() {
    let dir = TempDir::new().unwrap();
    let app = setup(&dir, Arc::new(Scripted::new(&[])));

    let err = app.ask("anything", false).await.unwrap_err();
    assert!(matches!(err, SqlaskError::Generation(_)));
}

#[tokio::test]
async fn test_schema_refresh_persists_introspection() {
    let dir = TempDir::new().unwrap();
    let settings = Settings::resolve(SettingsOverrides {
        database: Some(dir.path().join("school.db")),
        schema_cache: Some(dir.path().join("schema.json")),
        ..Default::default()
    });
    let (db, store) = open_database(&settings);
    let executor = Arc::new(common::exec::Executor::new(db, Arc::clone(&store)));
    execute_sql(
        executor,
        "CREATE TABLE A (id INTEGER PRIMARY KEY); CREATE TABLE B (id INTEGER, a_id INTEGER REFERENCES A(id));"
            .to_string(),
    )
    .await
    .unwrap();

    let schema = refresh_schema(store, true).await.unwrap();
    assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["A", "B"]);
    let fk = schema.table("B").unwrap().columns[1].foreign_key.clone();
    assert_eq!(fk.as_deref(), Some("A.id"));
    assert!(dir.path().join("schema.json").exists());
}

fn settings_in(dir: &TempDir) -> Settings {
    Settings::resolve(SettingsOverrides {
        database: Some(dir.path().join("school.db")),
        schema_cache: Some(dir.path().join("schema.json")),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_insert_after_ddl_in_earlier_batch() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let (db, store) = open_database(&settings);
    refresh_schema(Arc::clone(&store), true).await.unwrap();

    let executor = Arc::new(common::exec::Executor::new(db, store));
    let created = execute_sql(
        Arc::clone(&executor),
        "CREATE TABLE T (id INTEGER, name TEXT)".to_string(),
    )
    .await
    .unwrap();
    assert!(!created.has_failures());

    // same store, as in the shell
    let report = execute_sql(Arc::clone(&executor), "INSERT INTO T VALUES (1, 'a')".to_string())
        .await
        .unwrap();
    assert!(matches!(
        &report.outcomes[0],
        StatementOutcome::Inserted { table, rows: 1, .. } if table == "T"
    ));

    // fresh store over the same cache file, as in a second process
    let (db, store) = open_database(&settings);
    let executor = Arc::new(common::exec::Executor::new(db, store));
    let report = execute_sql(executor, "INSERT INTO T VALUES (2, 'b')".to_string())
        .await
        .unwrap();
    assert!(matches!(
        report.outcomes[0],
        StatementOutcome::Inserted { rows: 1, .. }
    ));
}

#[tokio::test]
async fn test_cache_file_follows_ddl() {
    let dir = TempDir::new().unwrap();
    let settings = settings_in(&dir);
    let (db, store) = open_database(&settings);
    refresh_schema(Arc::clone(&store), true).await.unwrap();

    let executor = Arc::new(common::exec::Executor::new(db, Arc::clone(&store)));
    execute_sql(executor, "CREATE TABLE T (id INTEGER)".to_string())
        .await
        .unwrap();

    let (_db, other) = open_database(&settings);
    let cached = refresh_schema(other, false).await.unwrap();
    assert!(cached.table("T").is_some());
}

#[tokio::test]
async fn test_batch_wrapped_in_transaction() {
    let dir = TempDir::new().unwrap();
    let (db, store) = open_database(&settings_in(&dir));
    let executor = Arc::new(common::exec::Executor::new(db, store));

    let report = execute_sql(
        Arc::clone(&executor),
        "BEGIN TRANSACTION; CREATE TABLE T (id INTEGER, name TEXT); \
         INSERT INTO T VALUES (1, 'a'), (2, 'b'); COMMIT;"
            .to_string(),
    )
    .await
    .unwrap();
    assert!(!report.aborted, "{:?}", report);
    assert!(matches!(
        report.outcomes[2],
        StatementOutcome::Inserted { rows: 2, .. }
    ));

    let report = execute_sql(executor, "SELECT COUNT(*) FROM T".to_string())
        .await
        .unwrap();
    match &report.outcomes[0] {
        StatementOutcome::Rows { result, .. } => {
            assert_eq!(result.rows, vec![vec![SqlValue::Integer(2)]])
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

use crate::agent::SqlGenerator;
use crate::config::Settings;
use crate::db::{Database, SqliteDatabase};
use crate::error::Result;
use crate::exec::{BatchReport, Executor};
use crate::llm::{GeminiClient, Generator, GoogleTranslator, Passthrough, Translator};
use crate::schema::{Schema, SchemaStore};
use serde::Serialize;
use std::sync::Arc;

/// Generated SQL together with its execution report, if it was executed.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<BatchReport>,
}

/// Database handle plus the schema store introspecting it.
pub fn open_database(settings: &Settings) -> (Arc<SqliteDatabase>, Arc<SchemaStore>) {
    let db = Arc::new(SqliteDatabase::open(&settings.database));
    let store = SchemaStore::new(db.clone()).with_cache_file(&settings.schema_cache);
    (db, Arc::new(store))
}

/// Executes a batch on the blocking pool.
pub async fn execute_sql(executor: Arc<Executor>, sql: String) -> Result<BatchReport> {
    tokio::task::spawn_blocking(move || executor.run(&sql)).await?
}

pub async fn refresh_schema(store: Arc<SchemaStore>, force: bool) -> Result<Arc<Schema>> {
    tokio::task::spawn_blocking(move || store.refresh(force)).await?
}

/// Natural-language request in, executed statements out.
pub struct Sqlask {
    generator: SqlGenerator,
    executor: Arc<Executor>,
}

impl Sqlask {
    pub fn new(
        db: Arc<dyn Database>,
        schema: Arc<SchemaStore>,
        model: Arc<dyn Generator>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        let generator = SqlGenerator::new(model, translator, Arc::clone(&schema), db.dialect());
        let executor = Arc::new(Executor::new(db, schema));
        Self {
            generator,
            executor,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let model = GeminiClient::new(settings.model_config()?)?;
        let translator: Arc<dyn Translator> = if settings.translate {
            Arc::new(GoogleTranslator::new())
        } else {
            Arc::new(Passthrough)
        };
        let (db, store) = open_database(settings);
        Ok(Self::new(db, store, Arc::new(model), translator))
    }

    pub fn executor(&self) -> Arc<Executor> {
        Arc::clone(&self.executor)
    }

    /// Generate SQL for `request` and, unless `dry_run`, execute it.
    #[tracing::instrument(skip(self, request))]
    pub async fn ask(&self, request: &str, dry_run: bool) -> Result<Answer> {
        let sql = self.generator.generate_sql(request).await?;
        if dry_run {
            return Ok(Answer { sql, report: None });
        }
        let report = execute_sql(self.executor(), sql.clone()).await?;
        Ok(Answer {
            sql,
            report: Some(report),
        })
    }
}

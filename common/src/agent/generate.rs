use crate::agent::parser::strip_code_fences;
use crate::agent::prompt::{build_sql_task_prompt, sql_system_prompt};
use crate::error::{Result, SqlaskError};
use crate::llm::model::{Generator, Message};
use crate::llm::translate::{translate_to_english, Translator};
use crate::schema::SchemaStore;
use std::sync::Arc;

/// Turns a natural-language request into SQL text.
pub struct SqlGenerator {
    generator: Arc<dyn Generator>,
    translator: Arc<dyn Translator>,
    schema: Arc<SchemaStore>,
    dialect: String,
}

impl SqlGenerator {
    pub fn new(
        generator: Arc<dyn Generator>,
        translator: Arc<dyn Translator>,
        schema: Arc<SchemaStore>,
        dialect: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            translator,
            schema,
            dialect: dialect.into(),
        }
    }

    /// Refresh the schema, translate, build the prompt, call the model and
    /// strip fences. The returned text may be empty; a model failure is
    /// always an `Err` and never SQL text.
    #[tracing::instrument(skip(self, request), fields(request_len = request.len()))]
    pub async fn generate_sql(&self, request: &str) -> Result<String> {
        let store = Arc::clone(&self.schema);
        let schema = tokio::task::spawn_blocking(move || store.refresh(true)).await??;

        let translated = translate_to_english(self.translator.as_ref(), request, &schema).await;
        tracing::debug!(translated = %translated, "request translated");

        let prompt = build_sql_task_prompt(&schema, &translated);
        let messages = vec![
            Message::system(sql_system_prompt(&self.dialect)),
            Message::user(prompt),
        ];

        let output = self.generator.generate(messages).await.map_err(|e| match e {
            SqlaskError::Generation(_) => e,
            other => SqlaskError::Generation(other.to_string()),
        })?;

        let sql = strip_code_fences(&output);
        tracing::info!(sql_length = sql.len(), "sql generated");
        Ok(sql)
    }
}

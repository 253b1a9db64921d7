use crate::error::{Result, SqlaskError};
use crate::schema::Schema;
use async_trait::async_trait;
use serde_json::Value;

const DEFAULT_TRANSLATE_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Text translation service.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String>;
}

/// Returns the input unchanged. Used when translation is switched off.
pub struct Passthrough;

#[async_trait]
impl Translator for Passthrough {
    async fn translate(&self, text: &str, _source: &str, _target: &str) -> Result<String> {
        Ok(text.to_string())
    }
}

/// Client for the public google translate web endpoint.
pub struct GoogleTranslator {
    http: reqwest::Client,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_TRANSLATE_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for GoogleTranslator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SqlaskError::Translation(format!(
                "http {}",
                response.status()
            )));
        }

        let body: Value = response.json().await?;
        parse_translation(&body)
    }
}

/// The endpoint answers with nested arrays; the first element holds
/// `[translated, original, ...]` segments.
fn parse_translation(body: &Value) -> Result<String> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| SqlaskError::Translation("unexpected response shape".to_string()))?;

    let text: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();

    if text.is_empty() {
        return Err(SqlaskError::Translation("empty translation".to_string()));
    }
    Ok(text)
}

/// Word-by-word translation to english. Tokens naming a known table are
/// kept verbatim, and a token whose translation fails is kept as is.
#[tracing::instrument(skip(translator, text, schema), fields(text_len = text.len()))]
pub async fn translate_to_english(
    translator: &dyn Translator,
    text: &str,
    schema: &Schema,
) -> String {
    let mut words = Vec::new();

    for word in text.split_whitespace() {
        if schema.is_table_name(word) {
            words.push(word.to_string());
            continue;
        }

        match translator.translate(word, "auto", "en").await {
            Ok(translated) => words.push(translated),
            Err(e) => {
                tracing::debug!("keeping untranslated token {:?}: {}", word, e);
                words.push(word.to_string());
            }
        }
    }

    words.join(" ")
}

use crate::error::{Result, SqlaskError};
use crate::schema::model::Schema;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Something that can describe the live database structure.
pub trait SchemaSource: Send + Sync {
    fn introspect(&self) -> Result<Schema>;
}

/// A fixed schema is its own source.
impl SchemaSource for Schema {
    fn introspect(&self) -> Result<Schema> {
        Ok(self.clone())
    }
}

/// Refreshable schema handle. Replaced wholesale on every refresh and
/// optionally persisted as json so later runs can load it without
/// re-introspecting.
pub struct SchemaStore {
    source: Arc<dyn SchemaSource>,
    cache_path: Option<PathBuf>,
    current: RwLock<Option<Arc<Schema>>>,
}

impl SchemaStore {
    pub fn new(source: Arc<dyn SchemaSource>) -> Self {
        Self {
            source,
            cache_path: None,
            current: RwLock::new(None),
        }
    }

    pub fn fixed(schema: Schema) -> Self {
        Self::new(Arc::new(schema))
    }

    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Recompute the schema. Without `force` an in-memory or persisted copy
    /// is reused when one exists.
    #[tracing::instrument(skip(self))]
    pub fn refresh(&self, force: bool) -> Result<Arc<Schema>> {
        if !force {
            if let Some(schema) = self.read_current()? {
                return Ok(schema);
            }
            if let Some(schema) = self.read_cache_file()? {
                tracing::debug!(tables = schema.len(), "schema loaded from cache file");
                return self.install(schema);
            }
        }

        let schema = self.source.introspect()?;
        tracing::debug!(tables = schema.len(), "schema introspected");

        if let Some(path) = &self.cache_path {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&schema)?)?;
        }

        self.install(schema)
    }

    fn read_current(&self) -> Result<Option<Arc<Schema>>> {
        let guard = self
            .current
            .read()
            .map_err(|_| SqlaskError::Schema("schema cache lock poisoned".to_string()))?;
        Ok(guard.clone())
    }

    fn read_cache_file(&self) -> Result<Option<Schema>> {
        let Some(path) = &self.cache_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn install(&self, schema: Schema) -> Result<Arc<Schema>> {
        let schema = Arc::new(schema);
        let mut guard = self
            .current
            .write()
            .map_err(|_| SqlaskError::Schema("schema cache lock poisoned".to_string()))?;
        *guard = Some(Arc::clone(&schema));
        Ok(schema)
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::{SchemaSet, StructSchema, builtin_schemas, load_schemas};
use crate::error::{Error, Result};

/// Validated, read-only lookup of structure schemas by name
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    version: String,
    schemas: Vec<Arc<StructSchema>>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    /// Validate every schema; any defect rejects the whole set
    pub fn new(set: SchemaSet) -> Result<Self> {
        let mut schemas = Vec::with_capacity(set.schemas.len());
        let mut index = HashMap::with_capacity(set.schemas.len());

        for schema in set.schemas {
            schema.validate()?;
            if index.contains_key(&schema.name) {
                return Err(Error::SchemaMismatch {
                    schema: schema.name,
                    reason: "registered twice".to_string(),
                });
            }
            index.insert(schema.name.clone(), schemas.len());
            schemas.push(Arc::new(schema));
        }

        debug!(
            "Schema registry {} ready with {} schemas",
            set.version,
            schemas.len()
        );

        Ok(Self {
            version: set.version,
            schemas,
            index,
        })
    }

    pub fn builtin() -> Result<Self> {
        Self::new(builtin_schemas())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(load_schemas(path)?)
    }

    pub fn get(&self, name: &str) -> Result<&Arc<StructSchema>> {
        self.index
            .get(name)
            .map(|&i| &self.schemas[i])
            .ok_or_else(|| Error::UnknownSchema(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Schemas in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<StructSchema>> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn to_set(&self) -> SchemaSet {
        SchemaSet {
            version: self.version.clone(),
            schemas: self.schemas.iter().map(|s| s.as_ref().clone()).collect(),
        }
    }
}

//! Offset schema registry
//!
//! Named structure layouts used to overlay typed views on foreign memory.
//! Schemas are validated once when the registry is built; a registry holding
//! a malformed schema is never constructed.

mod builtin;
mod kind;
mod registry;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use builtin::*;
pub use kind::{DecodeKind, TextEncoding};
pub use registry::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub offset: usize,
    pub size: usize,
    pub kind: DecodeKind,
}

impl FieldDef {
    /// Field whose size is the natural width of `kind`
    pub fn new(name: impl Into<String>, offset: usize, kind: DecodeKind) -> Self {
        Self {
            name: name.into(),
            offset,
            size: kind.width(),
            kind,
        }
    }

    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.size)
    }
}

/// Layout of one foreign structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructSchema {
    pub name: String,
    /// Declared structure size in bytes
    pub size: usize,
    /// Address field that must hold the structure's own address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub self_field: Option<String>,
    pub fields: Vec<FieldDef>,
}

impl StructSchema {
    pub fn new(name: impl Into<String>, size: usize, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            size,
            self_field: None,
            fields,
        }
    }

    pub fn with_self_field(mut self, field: impl Into<String>) -> Self {
        self.self_field = Some(field.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Bytes covered by one overlay read: the furthest field end
    pub fn span(&self) -> usize {
        self.fields.iter().map(FieldDef::end).max().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<()> {
        let mismatch = |reason: String| Error::SchemaMismatch {
            schema: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(mismatch("schema has no name".to_string()));
        }
        if self.size == 0 {
            return Err(mismatch("declared size is zero".to_string()));
        }
        if self.fields.is_empty() {
            return Err(mismatch("no fields".to_string()));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(mismatch(format!("duplicate field '{}'", field.name)));
            }
            if field.size == 0 {
                return Err(mismatch(format!("field '{}' has zero size", field.name)));
            }
            if field.size != field.kind.width() {
                return Err(mismatch(format!(
                    "field '{}' is {} bytes but {} needs {}",
                    field.name,
                    field.size,
                    field.kind.name(),
                    field.kind.width()
                )));
            }
            match field.offset.checked_add(field.size) {
                Some(end) if end <= self.size => {}
                _ => {
                    return Err(mismatch(format!(
                        "field '{}' at {:#x}+{} exceeds structure size {:#x}",
                        field.name, field.offset, field.size, self.size
                    )));
                }
            }
        }

        let mut ordered: Vec<&FieldDef> = self.fields.iter().collect();
        ordered.sort_by_key(|field| field.offset);
        for pair in ordered.windows(2) {
            if pair[0].end() > pair[1].offset {
                return Err(mismatch(format!(
                    "fields '{}' and '{}' overlap",
                    pair[0].name, pair[1].name
                )));
            }
        }

        if let Some(self_field) = &self.self_field {
            match self.field(self_field) {
                Some(field) if field.kind == DecodeKind::Address => {}
                Some(_) => {
                    return Err(mismatch(format!(
                        "self-consistency field '{}' is not an address",
                        self_field
                    )));
                }
                None => {
                    return Err(mismatch(format!(
                        "self-consistency field '{}' does not exist",
                        self_field
                    )));
                }
            }
        }

        Ok(())
    }
}

/// On-disk schema table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaSet {
    pub version: String,
    pub schemas: Vec<StructSchema>,
}

pub fn load_schemas<P: AsRef<Path>>(path: P) -> Result<SchemaSet> {
    let content = fs::read_to_string(&path)?;
    let data = serde_json::from_str(&content)?;
    Ok(data)
}

pub fn save_schemas<P: AsRef<Path>>(path: P, schemas: &SchemaSet) -> Result<()> {
    let content = serde_json::to_string_pretty(schemas)?;
    fs::write(path, content)?;
    Ok(())
}

//! Provider catalogs.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};

use super::ModelRecord;
use crate::{CatalogError, Result};

/// What one provider currently offers: item id → metadata.
///
/// Serialized as a plain JSON object, which is also the durable file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    entries: BTreeMap<String, ModelRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a serialized catalog.
    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)
            .map_err(|e| CatalogError::Validation(format!("malformed catalog JSON: {e}")))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate every record; the first failure names the offending id.
    pub fn validate(&self) -> Result<()> {
        for (id, record) in &self.entries {
            if id.is_empty() {
                return Err(CatalogError::Validation("empty model id".to_string()));
            }
            record
                .validate()
                .map_err(|e| CatalogError::Validation(format!("{id}: {e}")))?;
        }
        Ok(())
    }

    /// Insert (or replace) a record.
    pub fn insert(&mut self, id: impl Into<String>, record: ModelRecord) {
        self.entries.insert(id.into(), record);
    }

    pub fn with(mut self, id: impl Into<String>, record: ModelRecord) -> Self {
        self.insert(id, record);
        self
    }

    pub fn get(&self, id: &str) -> Option<&ModelRecord> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ModelRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ModelRecord)> for Catalog {
    fn from_iter<I: IntoIterator<Item = (String, ModelRecord)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Catalog {
    type Item = (String, ModelRecord);
    type IntoIter = btree_map::IntoIter<String, ModelRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = (&'a String, &'a ModelRecord);
    type IntoIter = btree_map::Iter<'a, String, ModelRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

//! Schema catalog: table names mapped to their declared schemas,
//! persisted as a single metadata file under the base path.

pub mod schema;

use crate::storage::error::{StorageError, StorageResult};
use log::info;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;

pub use schema::{Column, Schema};

const CATALOG_FILE: &str = "tables.meta";

pub struct Catalog {
    base_path: PathBuf,
    schemas: RwLock<HashMap<String, Schema>>,
}

impl Catalog {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Load the catalog from `tables.meta`. A missing file is an empty
    /// catalog, not an error.
    pub fn load(&self) -> StorageResult<()> {
        let path = self.meta_path();
        if !path.exists() {
            return Ok(());
        }

        let data = std::fs::read_to_string(&path)?;
        let schemas: HashMap<String, Schema> = serde_json::from_str(&data)?;

        *self.schemas.write() = schemas;
        Ok(())
    }

    /// Persist the whole catalog.
    pub fn save(&self) -> StorageResult<()> {
        let schemas = self.schemas.read();
        self.save_to_disk(&schemas)
    }

    /// Register a new table and persist the catalog.
    pub fn create_table(&self, name: &str, schema: Schema) -> StorageResult<()> {
        let mut schemas = self.schemas.write();
        if schemas.contains_key(name) {
            return Err(StorageError::DuplicateTable(name.to_string()));
        }

        schemas.insert(name.to_string(), schema);
        self.save_to_disk(&schemas)?;

        info!("created table '{}'", name);
        Ok(())
    }

    pub fn get_schema(&self, name: &str) -> StorageResult<Schema> {
        self.schemas
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::UnknownTable(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.schemas.read().contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.schemas.read().keys().cloned().collect()
    }

    fn save_to_disk(&self, schemas: &HashMap<String, Schema>) -> StorageResult<()> {
        let data = serde_json::to_string_pretty(schemas)?;
        std::fs::write(self.meta_path(), data)?;
        Ok(())
    }

    fn meta_path(&self) -> PathBuf {
        self.base_path.join(CATALOG_FILE)
    }
}

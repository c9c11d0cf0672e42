use super::StorageBackend;
use crate::core::{Attributes, EntityKey, Result, UowError};
use std::collections::HashMap;

/// In-memory storage backend with an observable statement log.
///
/// Tables are created by `execute_write("CREATE TABLE <name> ...")`; every
/// write appends one rendered statement to the log (and mirrors it through
/// `log::debug!`), which stands in for the SQL logging of a real backend.
pub struct MemoryBackend {
    tables: HashMap<String, HashMap<EntityKey, Attributes>>,
    statements: Vec<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            statements: Vec::new(),
        }
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.table(table)?.len())
    }

    fn table(&self, name: &str) -> Result<&HashMap<EntityKey, Attributes>> {
        self.tables
            .get(name)
            .ok_or_else(|| UowError::TableNotFound(name.to_string()))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut HashMap<EntityKey, Attributes>> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| UowError::TableNotFound(name.to_string()))
    }

    fn record(&mut self, statement: String) {
        log::debug!("{statement}");
        self.statements.push(statement);
    }

    fn render_row(row: &Attributes) -> Result<String> {
        serde_json::to_string(row).map_err(|e| UowError::StorageError(e.to_string()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    /// Recognizes `CREATE TABLE <name>` and registers the table; anything
    /// else is recorded verbatim.
    fn execute_write(&mut self, statement: &str) -> Result<()> {
        let trimmed = statement.trim();
        if let Some(rest) = trimmed.strip_prefix("CREATE TABLE ") {
            let name = rest
                .split_whitespace()
                .next()
                .ok_or_else(|| UowError::ExecutionError("CREATE TABLE without a name".into()))?;
            if self.tables.contains_key(name) {
                return Err(UowError::ExecutionError(format!(
                    "Table '{name}' already exists"
                )));
            }
            self.tables.insert(name.to_string(), HashMap::new());
        }
        self.record(trimmed.to_string());
        Ok(())
    }

    fn persist_row(&mut self, table: &str, key: &EntityKey, row: &Attributes) -> Result<()> {
        let rendered = Self::render_row(row)?;
        let rows = self.table_mut(table)?;
        if rows.contains_key(key) {
            return Err(UowError::ConstraintViolation(format!(
                "duplicate key {key} in table '{table}'"
            )));
        }
        rows.insert(key.clone(), row.clone());
        self.record(format!("INSERT INTO {table} {rendered}"));
        Ok(())
    }

    fn update_row(&mut self, table: &str, key: &EntityKey, row: &Attributes) -> Result<bool> {
        let rendered = Self::render_row(row)?;
        let rows = self.table_mut(table)?;
        let Some(existing) = rows.get_mut(key) else {
            return Ok(false);
        };
        for (field, value) in row {
            existing.insert(field.clone(), value.clone());
        }
        self.record(format!("UPDATE {table} SET {rendered} WHERE id = {key}"));
        Ok(true)
    }

    fn delete_row(&mut self, table: &str, key: &EntityKey) -> Result<bool> {
        let removed = self.table_mut(table)?.remove(key).is_some();
        if removed {
            self.record(format!("DELETE FROM {table} WHERE id = {key}"));
        }
        Ok(removed)
    }

    fn find_by_id(&self, table: &str, key: &EntityKey) -> Result<Option<Attributes>> {
        Ok(self.table(table)?.get(key).cloned())
    }

    /// Ordered log of every statement executed against this backend.
    fn statements(&self) -> &[String] {
        &self.statements
    }
}

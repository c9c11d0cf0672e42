use crate::core::{Attributes, EntityKey, Result};

/// Storage backend trait - allows pluggable durable stores
///
/// The flush engine translates pending entity changes into these primitives.
/// Any durable key-value or relational store suffices; failures are reported
/// synchronously and leave the failed entity pending.
pub trait StorageBackend {
    /// Execute a raw write statement (schema/DDL bootstrap)
    fn execute_write(&mut self, statement: &str) -> Result<()>;

    /// Insert a row keyed by identity
    fn persist_row(&mut self, table: &str, key: &EntityKey, row: &Attributes) -> Result<()>;

    /// Merge attribute changes into an existing row; false if the row is missing
    fn update_row(&mut self, table: &str, key: &EntityKey, row: &Attributes) -> Result<bool>;

    /// Delete a row; false if the row is missing
    fn delete_row(&mut self, table: &str, key: &EntityKey) -> Result<bool>;

    /// Fetch a row by identity
    fn find_by_id(&self, table: &str, key: &EntityKey) -> Result<Option<Attributes>>;

    /// Ordered log of executed statements, for backends that keep one
    fn statements(&self) -> &[String] {
        &[]
    }
}

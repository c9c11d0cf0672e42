// ============================================================================
// Entity Metadata
// ============================================================================
//
// Per entity type: table name, identity field, declared attribute list and
// registered lifecycle listeners. Built once at startup and handed to the
// session; the flush engine itself never inspects concrete entity types.
//
// ============================================================================

use crate::core::{Attributes, EntityKey, Result, UowError};
use crate::event::LifecycleListener;
use indexmap::IndexMap;
use std::rc::Rc;

/// Mapping description of one entity type.
pub struct EntityDescriptor {
    type_tag: String,
    table: String,
    id_field: String,
    fields: Vec<String>,
    listeners: Vec<Rc<dyn LifecycleListener>>,
}

impl EntityDescriptor {
    /// The identity field is always part of the declared field list.
    pub fn new(
        type_tag: impl Into<String>,
        table: impl Into<String>,
        id_field: impl Into<String>,
    ) -> Self {
        let id_field = id_field.into();
        Self {
            type_tag: type_tag.into(),
            table: table.into(),
            fields: vec![id_field.clone()],
            id_field,
            listeners: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
        self
    }

    pub fn with_listener(mut self, listener: Rc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn type_tag(&self) -> &str {
        &self.type_tag
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn listeners(&self) -> &[Rc<dyn LifecycleListener>] {
        &self.listeners
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Check that every payload field is declared for this type.
    ///
    /// # Errors
    /// Returns `FieldNotFound` on the first undeclared field.
    pub fn validate(&self, payload: &Attributes) -> Result<()> {
        for field in payload.keys() {
            self.validate_field(field)?;
        }
        Ok(())
    }

    /// # Errors
    /// Returns `FieldNotFound` if the field is not declared for this type.
    pub fn validate_field(&self, field: &str) -> Result<()> {
        if self.fields.iter().any(|f| f == field) {
            Ok(())
        } else {
            Err(UowError::FieldNotFound(
                field.to_string(),
                self.type_tag.clone(),
            ))
        }
    }

    /// Extract the identity key from a payload.
    ///
    /// # Errors
    /// Returns `ExecutionError` if the identity field is absent, or
    /// `TypeMismatch` if its value cannot serve as a key.
    pub fn identity_of(&self, payload: &Attributes) -> Result<EntityKey> {
        let value = payload.get(&self.id_field).ok_or_else(|| {
            UowError::ExecutionError(format!(
                "payload for '{}' is missing identity field '{}'",
                self.type_tag, self.id_field
            ))
        })?;
        EntityKey::from_value(value)
    }
}

impl std::fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityDescriptor")
            .field("type_tag", &self.type_tag)
            .field("table", &self.table)
            .field("id_field", &self.id_field)
            .field("fields", &self.fields)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Startup-time registry of entity descriptors, keyed by type tag.
#[derive(Debug, Default)]
pub struct MetadataRegistry {
    types: IndexMap<String, EntityDescriptor>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, descriptor: EntityDescriptor) -> Self {
        self.types
            .insert(descriptor.type_tag().to_string(), descriptor);
        self
    }

    /// # Errors
    /// Returns `TypeNotRegistered` for an unknown type tag.
    pub fn descriptor(&self, type_tag: &str) -> Result<&EntityDescriptor> {
        self.types
            .get(type_tag)
            .ok_or_else(|| UowError::TypeNotRegistered(type_tag.to_string()))
    }

    pub fn type_tags(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }
}

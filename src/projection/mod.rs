// ============================================================================
// Read-Model Projection
// ============================================================================
//
// Example lifecycle-listener consumer: maintains a denormalized read model
// from inside post-persist / post-update hooks. The lookup-or-create plus
// immediate nested flush inside a notification callback is the exact
// pattern that exposes registry-iteration bugs in a flush engine.
//
// ============================================================================

use crate::core::{EntityKey, Result, UowError, Value};
use crate::entity::PendingEntity;
use crate::event::LifecycleListener;
use crate::uow::Session;
use std::collections::HashMap;

/// Declarative correlation from one source entity type to the read model.
///
/// Carries the field holding the correlation key and the field-level copies
/// to apply, so the projector needs no type inspection beyond a tag lookup.
#[derive(Debug, Clone)]
pub struct ProjectionRule {
    source_tag: String,
    correlation_field: String,
    copies: Vec<(String, String)>,
}

impl ProjectionRule {
    pub fn new(source_tag: impl Into<String>, correlation_field: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            correlation_field: correlation_field.into(),
            copies: Vec::new(),
        }
    }

    /// Copy `source_field` of the source entity into `target_field` of the
    /// read model.
    pub fn copy(mut self, source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        self.copies.push((source_field.into(), target_field.into()));
        self
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }
}

/// Maintains one read-model entity per correlation key, lazily created on
/// first observation and updated in place thereafter. The read model is
/// persisted through the same session, so every notification handled here
/// triggers a nested flush.
pub struct ReadModelProjector {
    target_tag: String,
    rules: HashMap<String, ProjectionRule>,
}

impl ReadModelProjector {
    pub fn new(target_tag: impl Into<String>) -> Self {
        Self {
            target_tag: target_tag.into(),
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, rule: ProjectionRule) -> Self {
        self.rules.insert(rule.source_tag().to_string(), rule);
        self
    }

    fn denormalize(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        let Some(rule) = self.rules.get(entity.type_tag()) else {
            return Ok(());
        };
        let key_value = entity.get(&rule.correlation_field).ok_or_else(|| {
            UowError::ExecutionError(format!(
                "correlation field '{}' missing on {}",
                rule.correlation_field,
                entity.id()
            ))
        })?;
        let key = EntityKey::from_value(key_value)?;

        let target_id = match session.find(&self.target_tag, key.clone())? {
            Some(id) => id,
            None => {
                let id_field = session.identity_field(&self.target_tag)?;
                let mut payload = crate::core::Attributes::new();
                payload.insert(id_field, key.to_value());
                session.persist(&self.target_tag, payload)?
            }
        };
        for (source_field, target_field) in &rule.copies {
            let value = entity.get(source_field).cloned().unwrap_or(Value::Null);
            session.set(&target_id, target_field, value)?;
        }
        session.flush()
    }
}

impl LifecycleListener for ReadModelProjector {
    fn post_persist(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        self.denormalize(entity, session)
    }

    fn post_update(&self, entity: &PendingEntity, session: &Session) -> Result<()> {
        self.denormalize(entity, session)
    }
}

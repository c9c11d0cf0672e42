use thiserror::Error;

#[derive(Error, Debug)]
pub enum UowError {
    #[error("Entity type '{0}' is not registered")]
    TypeNotRegistered(String),

    #[error("Entity '{0}' not found")]
    EntityNotFound(String),

    #[error("Entity '{0}' is already managed by this session")]
    DuplicateIdentity(String),

    #[error("Field '{0}' is not declared for entity type '{1}'")]
    FieldNotFound(String, String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),
}

pub type Result<T> = std::result::Result<T, UowError>;
